//! Reconciles the columns declared by the input with the destination table.
//!
//! Resolution happens once per import, before any data row is read. Every
//! source column ends up either skipped or bound to exactly one destination
//! column; bound columns receive dense target indexes `0..n` in source order.
//! The row buffer handed to the sink is sized by that `n`.

use log::warn;

use crate::{
    error::{ImportError, Result},
    schema::TargetColumn,
};

/// Source column name that marks a column as "do not import".
pub const SKIP_COLUMN: &str = "$skip$";

/// A column as declared by the input stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub name: String,
    pub data_width: Option<usize>,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_width: None,
        }
    }

    pub fn with_width(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            data_width: Some(width),
        }
    }

    /// `Column1`, `Column2`, ... for inputs without a header line.
    pub fn synthesized(count: usize) -> Vec<SourceColumn> {
        (1..=count)
            .map(|idx| SourceColumn::new(format!("Column{idx}")))
            .collect()
    }
}

/// One input column together with its place in the decoded row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFileColumn {
    /// Position of the column in the tokenized line.
    pub source_index: usize,
    pub name: String,
    /// Destination column, `None` when skipped.
    pub target: Option<TargetColumn>,
    /// Position in the decoded row, `None` when skipped.
    pub target_index: Option<usize>,
    pub data_width: Option<usize>,
}

impl ImportFileColumn {
    pub fn is_imported(&self) -> bool {
        self.target_index.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MappingOptions {
    /// When non-empty, only these source columns are imported.
    pub import_columns: Vec<String>,
    /// Unmatched source columns abort the job instead of being skipped.
    pub strict: bool,
    /// Source columns were synthesized and bind to the destination by position.
    pub positional: bool,
}

#[derive(Debug, Clone)]
pub struct ColumnMapping {
    columns: Vec<ImportFileColumn>,
    warnings: Vec<String>,
    target_count: usize,
}

impl ColumnMapping {
    pub fn resolve(
        source: &[SourceColumn],
        destination: &[TargetColumn],
        table_name: &str,
        source_name: &str,
        options: &MappingOptions,
    ) -> Result<Self> {
        let mut columns = Vec::with_capacity(source.len());
        let mut warnings = Vec::new();
        let mut next_target = 0usize;

        for (source_index, column) in source.iter().enumerate() {
            let mut file_column = ImportFileColumn {
                source_index,
                name: column.name.clone(),
                target: None,
                target_index: None,
                data_width: column.data_width,
            };

            if column.name == SKIP_COLUMN || !is_allowed(&column.name, &options.import_columns)
            {
                columns.push(file_column);
                continue;
            }

            let matched = if options.positional {
                destination.get(source_index)
            } else {
                destination.iter().find(|target| target.name == column.name)
            };

            match matched {
                Some(target) => {
                    file_column.target = Some(target.clone());
                    file_column.target_index = Some(next_target);
                    next_target += 1;
                }
                None if options.strict => {
                    return Err(ImportError::ColumnNotFound {
                        column: column.name.clone(),
                        table: table_name.to_string(),
                    });
                }
                None => {
                    let message = format!(
                        "Column '{}' not found in target table '{}', it will be ignored",
                        column.name, table_name
                    );
                    warn!("{message}");
                    warnings.push(message);
                }
            }
            columns.push(file_column);
        }

        if next_target == 0 {
            return Err(ImportError::NoColumnsMapped {
                source_name: source_name.to_string(),
                table: table_name.to_string(),
            });
        }

        Ok(Self {
            columns,
            warnings,
            target_count: next_target,
        })
    }

    pub fn columns(&self) -> &[ImportFileColumn] {
        &self.columns
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Length of the decoded row.
    pub fn target_column_count(&self) -> usize {
        self.target_count
    }

    pub fn imported(&self) -> impl Iterator<Item = &ImportFileColumn> {
        self.columns.iter().filter(|c| c.is_imported())
    }

    /// Destination columns in row order.
    pub fn target_columns(&self) -> Vec<TargetColumn> {
        self.imported().filter_map(|c| c.target.clone()).collect()
    }

    /// Number of fields a line must have to populate every imported column.
    pub fn required_field_count(&self) -> usize {
        self.imported()
            .map(|c| c.source_index + 1)
            .max()
            .unwrap_or(0)
    }
}

fn is_allowed(name: &str, allow_list: &[String]) -> bool {
    allow_list.is_empty() || allow_list.iter().any(|allowed| allowed == name)
}
