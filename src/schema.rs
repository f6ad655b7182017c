//! Destination table model.
//!
//! The import engine never introspects a database itself. It asks a
//! [`SchemaProvider`] for the ordered column list of the target table and uses
//! it for name matching and type dispatch only. [`TableDefinition`] is the
//! bundled provider: a YAML document describing the table.
//!
//! ```yaml
//! name: person
//! columns:
//!   - name: id
//!     type: integer
//!   - name: born
//!     type: date
//!     dbms_type: DATE
//!   - name: full_name
//!     type: string
//!     expression: true
//! ```

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// Logical type of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    String,
    Clob,
    Xml,
    Blob,
    Integer,
    Float,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Time,
    Guid,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::String => "string",
            ColumnType::Clob => "clob",
            ColumnType::Xml => "xml",
            ColumnType::Blob => "blob",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "datetime",
            ColumnType::Time => "time",
            ColumnType::Guid => "guid",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string", "clob", "xml", "blob", "integer", "float", "decimal", "boolean", "date",
            "datetime", "time", "guid",
        ]
    }

    /// Character-like types that are passed through as text.
    pub fn is_character(&self) -> bool {
        matches!(self, ColumnType::String | ColumnType::Clob | ColumnType::Xml)
    }

    /// Types whose value may be a file name when LOB-as-file import is active.
    pub fn is_large_text(&self) -> bool {
        matches!(self, ColumnType::Clob | ColumnType::Xml)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "varchar" | "char" | "text" => Ok(ColumnType::String),
            "clob" | "longtext" => Ok(ColumnType::Clob),
            "xml" => Ok(ColumnType::Xml),
            "blob" | "binary" | "bytea" | "varbinary" => Ok(ColumnType::Blob),
            "integer" | "int" | "bigint" | "smallint" => Ok(ColumnType::Integer),
            "float" | "double" | "real" => Ok(ColumnType::Float),
            "decimal" | "numeric" => Ok(ColumnType::Decimal),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            "date" => Ok(ColumnType::Date),
            "datetime" | "timestamp" => Ok(ColumnType::DateTime),
            "time" => Ok(ColumnType::Time),
            "guid" | "uuid" => Ok(ColumnType::Guid),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                ColumnType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        ColumnType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}

/// One column of the destination table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: ColumnType,
    /// Vendor type name, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbms_type: Option<String>,
    /// Computed columns receive the raw text unmodified.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expression: bool,
}

impl TargetColumn {
    pub fn new(name: impl Into<String>, datatype: ColumnType) -> Self {
        Self {
            name: name.into(),
            datatype,
            dbms_type: None,
            expression: false,
        }
    }

    pub fn with_dbms_type(mut self, dbms_type: impl Into<String>) -> Self {
        self.dbms_type = Some(dbms_type.into());
        self
    }

    pub fn as_expression(mut self) -> Self {
        self.expression = true;
        self
    }
}

/// Supplies the destination's column list.
pub trait SchemaProvider {
    fn table_name(&self) -> &str;
    fn columns(&self) -> Result<Vec<TargetColumn>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<TargetColumn>,
}

impl TableDefinition {
    pub fn new(name: impl Into<String>, columns: Vec<TargetColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening table definition {path:?}"))?;
        let table: TableDefinition = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing table definition {path:?}"))?;
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(anyhow!("Table definition is missing a name"));
        }
        if self.columns.is_empty() {
            return Err(anyhow!("Table '{}' does not define any columns", self.name));
        }
        let mut seen = std::collections::HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.as_str()) {
                return Err(anyhow!(
                    "Column '{}' is defined more than once in table '{}'",
                    column.name,
                    self.name
                ));
            }
        }
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

impl SchemaProvider for TableDefinition {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Result<Vec<TargetColumn>> {
        Ok(self.columns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn column_type_parses_aliases() {
        assert_eq!("BIGINT".parse::<ColumnType>().unwrap(), ColumnType::Integer);
        assert_eq!("timestamp".parse::<ColumnType>().unwrap(), ColumnType::DateTime);
        assert_eq!("bytea".parse::<ColumnType>().unwrap(), ColumnType::Blob);
        assert!("geometry".parse::<ColumnType>().is_err());
    }

    #[test]
    fn loads_table_definition_from_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "name: person\ncolumns:\n  - name: id\n    type: integer\n  - name: notes\n    type: clob\n    dbms_type: TEXT\n  - name: label\n    type: string\n    expression: true\n"
        )
        .unwrap();
        let table = TableDefinition::load(file.path()).unwrap();
        assert_eq!(table.name, "person");
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.columns[1].dbms_type.as_deref(), Some("TEXT"));
        assert!(table.columns[2].expression);
        assert_eq!(table.column_index("notes"), Some(1));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let table = TableDefinition::new(
            "t",
            vec![
                TargetColumn::new("a", ColumnType::String),
                TargetColumn::new("a", ColumnType::Integer),
            ],
        );
        assert!(table.validate().is_err());
    }
}
