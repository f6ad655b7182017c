//! Hooks applied to raw field text before type decoding.
//!
//! - [`ValueModifier`] rewrites a field's raw text. [`ColumnModifiers`] is the
//!   configurable implementation (substring and regex replacement per column).
//! - [`ColumnFilter`] vetoes a whole row based on one column's value.
//!   [`RegexColumnFilter`] keeps a row only when every filtered column matches.
//!
//! Both receive a [`RawRow`] so rules may look at other columns of the same
//! line, e.g. deriving one column from another's raw text.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ImportError, Result},
    mapping::ImportFileColumn,
    text,
};

/// Raw values of the line currently being decoded, by source position.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    columns: &'a [ImportFileColumn],
    values: &'a [Option<String>],
}

impl<'a> RawRow<'a> {
    pub fn new(columns: &'a [ImportFileColumn], values: &'a [Option<String>]) -> Self {
        Self { columns, values }
    }

    pub fn value(&self, source_index: usize) -> Option<&'a str> {
        self.values.get(source_index).and_then(|v| v.as_deref())
    }

    pub fn value_by_name(&self, name: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| self.value(c.source_index))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub trait ValueModifier {
    /// Returns the replacement text, or `None` to keep `value`.
    fn modify_value(
        &self,
        column: &ImportFileColumn,
        value: &str,
        row: &RawRow<'_>,
    ) -> Option<String>;
}

pub trait ColumnFilter {
    /// `false` excludes the entire row.
    fn accepts(&self, column: &ImportFileColumn, value: Option<&str>, row: &RawRow<'_>) -> bool;
}

#[derive(Debug, Clone)]
pub enum ColumnModifier {
    Substring { start: usize, length: Option<usize> },
    RegexReplace { regex: Regex, replacement: String },
}

impl ColumnModifier {
    fn apply<'v>(&self, value: &'v str) -> std::borrow::Cow<'v, str> {
        match self {
            ColumnModifier::Substring { start, length } => text::substring(value, *start, *length),
            ColumnModifier::RegexReplace { regex, replacement } => {
                text::regex_replace(value, regex, replacement)
            }
        }
    }
}

/// Configuration form of a modifier, as written in import profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSpec {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substring: Option<SubstringSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default)]
    pub replacement: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringSpec {
    pub start: usize,
    #[serde(default)]
    pub length: Option<usize>,
}

/// Modifier chains keyed by source column name, applied in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ColumnModifiers {
    by_column: HashMap<String, Vec<ColumnModifier>>,
}

impl ColumnModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_specs(specs: &[ModifierSpec]) -> Result<Self> {
        let mut modifiers = Self::new();
        for spec in specs {
            if let Some(substring) = spec.substring {
                modifiers.add(
                    &spec.column,
                    ColumnModifier::Substring {
                        start: substring.start,
                        length: substring.length,
                    },
                );
            }
            if let Some(pattern) = &spec.regex {
                let regex = compile(pattern)?;
                modifiers.add(
                    &spec.column,
                    ColumnModifier::RegexReplace {
                        regex,
                        replacement: spec.replacement.clone(),
                    },
                );
            }
        }
        Ok(modifiers)
    }

    pub fn add(&mut self, column: &str, modifier: ColumnModifier) {
        self.by_column
            .entry(column.to_string())
            .or_default()
            .push(modifier);
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

impl ValueModifier for ColumnModifiers {
    fn modify_value(
        &self,
        column: &ImportFileColumn,
        value: &str,
        _row: &RawRow<'_>,
    ) -> Option<String> {
        let chain = self.by_column.get(&column.name)?;
        let mut current = value.to_string();
        for modifier in chain {
            let next = modifier.apply(&current).into_owned();
            current = next;
        }
        (current != value).then_some(current)
    }
}

/// Keeps a row only if each filtered column's value matches its regex.
/// A null value never matches.
#[derive(Debug, Clone, Default)]
pub struct RegexColumnFilter {
    filters: HashMap<String, Regex>,
}

impl RegexColumnFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(patterns: &BTreeMap<String, String>) -> Result<Self> {
        let mut filter = Self::new();
        for (column, pattern) in patterns {
            filter.add(column, pattern)?;
        }
        Ok(filter)
    }

    pub fn add(&mut self, column: &str, pattern: &str) -> Result<()> {
        self.filters.insert(column.to_string(), compile(pattern)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl ColumnFilter for RegexColumnFilter {
    fn accepts(&self, column: &ImportFileColumn, value: Option<&str>, _row: &RawRow<'_>) -> bool {
        match self.filters.get(&column.name) {
            None => true,
            Some(regex) => value.is_some_and(|v| regex.is_match(v)),
        }
    }
}

pub(crate) fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ImportError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, idx: usize) -> ImportFileColumn {
        ImportFileColumn {
            source_index: idx,
            name: name.to_string(),
            target: None,
            target_index: Some(idx),
            data_width: None,
        }
    }

    #[test]
    fn modifiers_chain_in_order() {
        let specs = vec![
            ModifierSpec {
                column: "code".into(),
                substring: Some(SubstringSpec {
                    start: 2,
                    length: None,
                }),
                regex: Some("-".into()),
                replacement: String::new(),
            },
        ];
        let modifiers = ColumnModifiers::from_specs(&specs).unwrap();
        let columns = vec![column("code", 0), column("other", 1)];
        let values = vec![Some("X-12-34".to_string()), Some("a-b".to_string())];
        let row = RawRow::new(&columns, &values);
        assert_eq!(
            modifiers.modify_value(&columns[0], "X-12-34", &row),
            Some("1234".to_string())
        );
        assert_eq!(modifiers.modify_value(&columns[1], "a-b", &row), None);
    }

    #[test]
    fn invalid_modifier_regex_is_a_configuration_error() {
        let specs = vec![ModifierSpec {
            column: "c".into(),
            substring: None,
            regex: Some("(".into()),
            replacement: String::new(),
        }];
        assert!(matches!(
            ColumnModifiers::from_specs(&specs),
            Err(ImportError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn regex_filter_requires_match_and_rejects_null() {
        let mut filter = RegexColumnFilter::new();
        filter.add("status", "^(open|closed)$").unwrap();
        let columns = vec![column("status", 0), column("note", 1)];
        let values = vec![Some("open".to_string()), None];
        let row = RawRow::new(&columns, &values);
        assert!(filter.accepts(&columns[0], Some("open"), &row));
        assert!(!filter.accepts(&columns[0], Some("pending"), &row));
        assert!(!filter.accepts(&columns[0], None, &row));
        assert!(filter.accepts(&columns[1], None, &row));
    }

    #[test]
    fn raw_row_gives_cross_column_access() {
        let columns = vec![column("a", 0), column("b", 1)];
        let values = vec![Some("1".to_string()), None];
        let row = RawRow::new(&columns, &values);
        assert_eq!(row.value_by_name("a"), Some("1"));
        assert_eq!(row.value(1), None);
        assert_eq!(row.value(7), None);
        assert_eq!(row.len(), 2);
    }
}
