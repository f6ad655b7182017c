use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ConversionError, schema::ColumnType};

/// A decoded field value handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Guid(Uuid),
    Binary(Vec<u8>),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            Value::Time(t) => t.format("%H:%M:%S").to_string(),
            Value::Guid(g) => g.to_string(),
            Value::Binary(bytes) => format!("0x{}", hex::encode(bytes)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| parse_naive_date(value).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

pub fn parse_naive_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// Converts raw text into a typed value for a destination column type.
///
/// `Ok(None)` means the value is null.
pub trait ValueConverter {
    fn convert_value(
        &self,
        raw: &str,
        target: ColumnType,
    ) -> Result<Option<Value>, ConversionError>;
}

/// Built-in converter for every [`ColumnType`] except BLOBs, which go through
/// a [`BlobDecoder`](crate::lob::BlobDecoder).
#[derive(Debug, Clone, Default)]
pub struct DefaultValueConverter {
    illegal_date_is_null: bool,
    decimal_separator: Option<char>,
}

impl DefaultValueConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unparseable date, time and timestamp values become null instead of errors.
    pub fn with_illegal_date_is_null(mut self, enabled: bool) -> Self {
        self.illegal_date_is_null = enabled;
        self
    }

    /// Decimal separator other than `.` used by numeric input.
    pub fn with_decimal_separator(mut self, separator: Option<char>) -> Self {
        self.decimal_separator = separator.filter(|c| *c != '.');
        self
    }

    fn normalize_number<'a>(&self, value: &'a str) -> std::borrow::Cow<'a, str> {
        match self.decimal_separator {
            Some(sep) if value.contains(sep) => {
                std::borrow::Cow::Owned(value.replace('.', "").replace(sep, "."))
            }
            _ => std::borrow::Cow::Borrowed(value),
        }
    }

    fn temporal<T>(
        &self,
        value: &str,
        parsed: Option<T>,
        target: ColumnType,
        wrap: fn(T) -> Value,
    ) -> Result<Option<Value>, ConversionError> {
        match parsed {
            Some(v) => Ok(Some(wrap(v))),
            None if self.illegal_date_is_null => Ok(None),
            None => Err(ConversionError::invalid(value, target.as_str())),
        }
    }
}

impl ValueConverter for DefaultValueConverter {
    fn convert_value(
        &self,
        raw: &str,
        target: ColumnType,
    ) -> Result<Option<Value>, ConversionError> {
        if target.is_character() {
            return Ok(Some(Value::String(raw.to_string())));
        }
        let value = raw.trim();
        if value.is_empty() {
            return Ok(None);
        }
        let invalid = || ConversionError::invalid(value, target.as_str());
        let converted = match target {
            ColumnType::Integer => {
                let parsed: i64 = value.parse().map_err(|_| invalid())?;
                Value::Integer(parsed)
            }
            ColumnType::Float => {
                let parsed: f64 = self.normalize_number(value).parse().map_err(|_| invalid())?;
                Value::Float(parsed)
            }
            ColumnType::Decimal => {
                let normalized = self.normalize_number(value);
                let parsed = normalized
                    .parse::<Decimal>()
                    .or_else(|_| Decimal::from_scientific(&normalized))
                    .map_err(|_| invalid())?;
                Value::Decimal(parsed)
            }
            ColumnType::Boolean => {
                let parsed = match value.to_ascii_lowercase().as_str() {
                    "true" | "t" | "yes" | "y" | "1" => true,
                    "false" | "f" | "no" | "n" | "0" => false,
                    _ => return Err(invalid()),
                };
                Value::Boolean(parsed)
            }
            ColumnType::Date => {
                return self.temporal(value, parse_naive_date(value), target, Value::Date);
            }
            ColumnType::DateTime => {
                return self.temporal(value, parse_naive_datetime(value), target, Value::DateTime);
            }
            ColumnType::Time => {
                return self.temporal(value, parse_naive_time(value), target, Value::Time);
            }
            ColumnType::Guid => {
                let trimmed = value.trim_matches(|c| matches!(c, '{' | '}'));
                Value::Guid(Uuid::parse_str(trimmed).map_err(|_| invalid())?)
            }
            ColumnType::Blob => {
                return Err(ConversionError::invalid(value, "blob (use a BLOB decoder)"));
            }
            ColumnType::String | ColumnType::Clob | ColumnType::Xml => {
                Value::String(value.to_string())
            }
        };
        Ok(Some(converted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(raw: &str, target: ColumnType) -> Result<Option<Value>, ConversionError> {
        DefaultValueConverter::new().convert_value(raw, target)
    }

    #[test]
    fn numeric_values_are_trimmed_and_parsed() {
        assert_eq!(convert(" 42 ", ColumnType::Integer).unwrap(), Some(Value::Integer(42)));
        assert_eq!(convert("", ColumnType::Integer).unwrap(), None);
        assert!(convert("4x", ColumnType::Integer).is_err());
        assert_eq!(
            convert("1.25e2", ColumnType::Decimal).unwrap(),
            Some(Value::Decimal(Decimal::new(125, 0)))
        );
    }

    #[test]
    fn decimal_separator_is_honoured() {
        let converter = DefaultValueConverter::new().with_decimal_separator(Some(','));
        assert_eq!(
            converter.convert_value("1.234,5", ColumnType::Float).unwrap(),
            Some(Value::Float(1234.5))
        );
    }

    #[test]
    fn character_values_keep_whitespace() {
        assert_eq!(
            convert(" ", ColumnType::String).unwrap(),
            Some(Value::String(" ".to_string()))
        );
    }

    #[test]
    fn dates_support_multiple_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        assert_eq!(convert("2024-05-06", ColumnType::Date).unwrap(), Some(Value::Date(expected)));
        assert_eq!(convert("06.05.2024", ColumnType::Date).unwrap(), Some(Value::Date(expected)));
        assert_eq!(
            convert("2024-05-06", ColumnType::DateTime).unwrap(),
            Some(Value::DateTime(expected.and_hms_opt(0, 0, 0).unwrap()))
        );
        assert_eq!(
            convert("14:30", ColumnType::Time).unwrap(),
            Some(Value::Time(NaiveTime::from_hms_opt(14, 30, 0).unwrap()))
        );
    }

    #[test]
    fn illegal_dates_become_null_when_lenient() {
        assert!(convert("2024-02-31", ColumnType::Date).is_err());
        let lenient = DefaultValueConverter::new().with_illegal_date_is_null(true);
        assert_eq!(lenient.convert_value("2024-02-31", ColumnType::Date).unwrap(), None);
        // leniency does not extend to numbers
        assert!(lenient.convert_value("abc", ColumnType::Integer).is_err());
    }

    #[test]
    fn guid_and_boolean_inputs() {
        let raw = "{550e8400-e29b-41d4-a716-446655440000}";
        assert!(matches!(convert(raw, ColumnType::Guid).unwrap(), Some(Value::Guid(_))));
        assert_eq!(convert("Yes", ColumnType::Boolean).unwrap(), Some(Value::Boolean(true)));
        assert!(convert("maybe", ColumnType::Boolean).is_err());
    }

    #[test]
    fn binary_values_display_as_hex() {
        assert_eq!(Value::Binary(vec![0xca, 0xfe]).as_display(), "0xcafe");
    }
}
