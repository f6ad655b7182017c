//! Parser configuration.
//!
//! [`ImportOptions`] is set once before a run and not changed while it
//! streams. It can be built in code, loaded from a YAML profile, and then
//! overridden from the command line:
//!
//! ```yaml
//! delimiter: "\\t"
//! quote_char: "'"
//! contains_header: true
//! null_string: "<NULL>"
//! abort_on_error: false
//! column_filters:
//!   status: "^(open|closed)$"
//! ```

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ImportError, Result},
    lob::BlobMode,
    mapping::SourceColumn,
    modifiers::ModifierSpec,
    text,
    tokenizer::{QuoteEscaping, QuoteRules},
};

/// Width of one fixed-width column, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnWidth {
    pub name: String,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Field separator; escaped forms such as `\t` are accepted.
    pub delimiter: String,
    pub quote_char: Option<char>,
    pub quote_escaping: QuoteEscaping,
    pub contains_header: bool,
    /// Ordered column layout; when present the input is fixed-width.
    pub column_widths: Vec<ColumnWidth>,
    /// Explicit source column names, overriding the header line.
    pub columns: Vec<String>,
    /// Allow-list of source columns to import.
    pub import_columns: Vec<String>,
    pub strict_column_mapping: bool,
    pub null_string: Option<String>,
    pub empty_string_is_null: bool,
    pub always_quoted: bool,
    pub trim_values: bool,
    pub decode_unicode: bool,
    pub illegal_date_is_null: bool,
    pub decimal_separator: Option<char>,
    /// Lines not matching this regex are not imported.
    pub line_filter: Option<String>,
    pub multi_line: bool,
    pub ignore_empty_lines: bool,
    pub abort_on_error: bool,
    pub ignore_all_null_rows: bool,
    pub encoding: Option<String>,
    /// CLOB/XML values name files holding the text.
    pub clob_as_file: bool,
    pub blob_mode: BlobMode,
    pub column_filters: BTreeMap<String, String>,
    pub modifiers: Vec<ModifierSpec>,
    pub progress_interval: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            quote_char: Some('"'),
            quote_escaping: QuoteEscaping::Duplicate,
            contains_header: true,
            column_widths: Vec::new(),
            columns: Vec::new(),
            import_columns: Vec::new(),
            strict_column_mapping: false,
            null_string: None,
            empty_string_is_null: true,
            always_quoted: false,
            trim_values: false,
            decode_unicode: false,
            illegal_date_is_null: false,
            decimal_separator: None,
            line_filter: None,
            multi_line: false,
            ignore_empty_lines: true,
            abort_on_error: true,
            ignore_all_null_rows: false,
            encoding: None,
            clob_as_file: false,
            blob_mode: BlobMode::File,
            column_filters: BTreeMap::new(),
            modifiers: Vec::new(),
            progress_interval: 1000,
        }
    }
}

impl ImportOptions {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening import profile {path:?}"))?;
        let options: ImportOptions = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing import profile {path:?}"))?;
        options
            .validate()
            .with_context(|| format!("Validating import profile {path:?}"))?;
        Ok(options)
    }

    /// The delimiter with escapes (`\t`, `\u0009`) and the word `tab` resolved.
    pub fn effective_delimiter(&self) -> String {
        if self.delimiter.eq_ignore_ascii_case("tab") {
            return "\t".to_string();
        }
        text::decode_escapes(&self.delimiter).into_owned()
    }

    pub fn is_fixed_width(&self) -> bool {
        !self.column_widths.is_empty()
    }

    pub fn quote_rules(&self) -> QuoteRules {
        QuoteRules::new(self.quote_char, self.quote_escaping)
    }

    /// Source columns declared by configuration rather than by the header.
    pub fn declared_source_columns(&self) -> Option<Vec<SourceColumn>> {
        if self.is_fixed_width() {
            return Some(
                self.column_widths
                    .iter()
                    .map(|c| SourceColumn::with_width(c.name.clone(), c.width))
                    .collect(),
            );
        }
        if self.columns.is_empty() {
            None
        } else {
            Some(self.columns.iter().map(SourceColumn::new).collect())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_fixed_width() {
            if let Some(zero) = self.column_widths.iter().find(|c| c.width == 0) {
                return Err(ImportError::configuration(format!(
                    "Column width for '{}' must be positive",
                    zero.name
                )));
            }
        } else {
            let delimiter = self.effective_delimiter();
            if delimiter.is_empty() {
                return Err(ImportError::configuration("Delimiter must not be empty"));
            }
            if let Some(quote) = self.quote_char
                && delimiter.contains(quote)
            {
                return Err(ImportError::configuration(format!(
                    "Quote character '{quote}' must not be part of the delimiter"
                )));
            }
        }
        if self.columns.iter().any(|c| c.trim().is_empty()) {
            return Err(ImportError::configuration("Column names must not be empty"));
        }
        if self.progress_interval == 0 {
            return Err(ImportError::configuration(
                "Progress interval must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Parses `name=width` pairs separated by commas, e.g. `id=5,name=20`.
pub fn parse_column_widths(spec: &str) -> anyhow::Result<Vec<ColumnWidth>> {
    spec.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (name, width) = part
                .split_once('=')
                .ok_or_else(|| anyhow!("Column width '{part}' must be written as name=width"))?;
            let width = width
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid width in '{part}'"))?;
            Ok(ColumnWidth {
                name: name.trim().to_string(),
                width,
            })
        })
        .collect()
}
