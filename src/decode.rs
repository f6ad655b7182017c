//! Per-row decode pipeline.
//!
//! For each imported column of a tokenized line the pipeline applies, in
//! order: null substitution, the value modifier, the column filter and finally
//! the type-specific decoder chosen when the mapping was resolved. Decode
//! errors are handled per field; the error policy decides whether the run
//! continues with a null in that slot or stops.

use std::{borrow::Cow, path::PathBuf};

use encoding_rs::{Encoding, UTF_8};
use log::warn;

use crate::{
    data::{DefaultValueConverter, Value, ValueConverter},
    error::{ConversionError, ImportError, Result},
    lob::{BlobDecoder, BlobMode, FileBlobDecoder, read_clob_file},
    mapping::{ColumnMapping, ImportFileColumn},
    messages::MessageLog,
    modifiers::{ColumnFilter, RawRow, ValueModifier},
    schema::{ColumnType, TargetColumn},
    text,
};

/// Decision of an [`ErrorHandler`] for a failed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    Abort,
    Continue,
    /// Continue, and do not ask again for the rest of the run.
    IgnoreAll,
}

/// Consulted on recoverable field errors, typically backed by a user prompt.
pub trait ErrorHandler {
    fn action_on_error(
        &mut self,
        line_number: usize,
        column: Option<&str>,
        raw_value: &str,
        error: &str,
    ) -> ErrorAction;
}

/// Type-specific decoding strategy of one column, fixed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDecoder {
    /// Computed column; the raw text is passed through.
    Expression,
    /// Character data. `large` marks CLOB/XML columns.
    Character { large: bool },
    Blob,
    Typed(ColumnType),
}

impl ColumnDecoder {
    pub fn for_column(target: &TargetColumn, is_expression: bool) -> Self {
        if is_expression || target.expression {
            return ColumnDecoder::Expression;
        }
        match target.datatype {
            character if character.is_character() => ColumnDecoder::Character {
                large: character.is_large_text(),
            },
            ColumnType::Blob => ColumnDecoder::Blob,
            other => ColumnDecoder::Typed(other),
        }
    }
}

/// Decoded values of the current row, indexed by target position.
///
/// The buffer is allocated once per run and cleared before every row so a
/// slot that is not populated for a row can never leak the previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBuffer {
    values: Vec<Option<Value>>,
}

impl RowBuffer {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|slot| *slot = None);
    }

    pub fn set(&mut self, index: usize, value: Option<Value>) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value;
        }
    }

    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    pub fn is_all_null(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }
}

/// Result of decoding one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    Ready,
    /// A column filter vetoed the row.
    Filtered,
    /// Every decoded value is null and all-null rows are ignored.
    AllNull,
}

/// Options of the decode pipeline, derived from the import options.
#[derive(Debug, Clone)]
pub struct DecodeSettings {
    pub null_string: Option<String>,
    pub empty_string_is_null: bool,
    pub decode_unicode: bool,
    pub clob_as_file: bool,
    pub blob_mode: BlobMode,
    pub abort_on_error: bool,
    pub ignore_all_null_rows: bool,
    pub lob_encoding: &'static Encoding,
    pub base_dir: Option<PathBuf>,
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self {
            null_string: None,
            empty_string_is_null: true,
            decode_unicode: false,
            clob_as_file: false,
            blob_mode: BlobMode::File,
            abort_on_error: true,
            ignore_all_null_rows: false,
            lob_encoding: UTF_8,
            base_dir: None,
        }
    }
}

pub struct RowDecoder {
    settings: DecodeSettings,
    plan: Vec<ColumnDecoder>,
    converter: Box<dyn ValueConverter>,
    blob_decoder: Option<Box<dyn BlobDecoder>>,
    modifier: Option<Box<dyn ValueModifier>>,
    filter: Option<Box<dyn ColumnFilter>>,
    error_handler: Option<Box<dyn ErrorHandler>>,
    ignore_all_errors: bool,
    required_fields: usize,
    missing_fields_reported: bool,
    field_errors: usize,
}

impl Default for RowDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RowDecoder {
    pub fn new() -> Self {
        Self {
            settings: DecodeSettings::default(),
            plan: Vec::new(),
            converter: Box::new(DefaultValueConverter::new()),
            blob_decoder: None,
            modifier: None,
            filter: None,
            error_handler: None,
            ignore_all_errors: false,
            required_fields: 0,
            missing_fields_reported: false,
            field_errors: 0,
        }
    }

    pub fn set_converter(&mut self, converter: Box<dyn ValueConverter>) {
        self.converter = converter;
    }

    /// Replaces the BLOB decoder; by default one resolving files against the
    /// input's directory is used.
    pub fn set_blob_decoder(&mut self, decoder: Box<dyn BlobDecoder>) {
        self.blob_decoder = Some(decoder);
    }

    pub fn set_value_modifier(&mut self, modifier: Option<Box<dyn ValueModifier>>) {
        self.modifier = modifier;
    }

    pub fn set_column_filter(&mut self, filter: Option<Box<dyn ColumnFilter>>) {
        self.filter = filter;
    }

    pub fn set_error_handler(&mut self, handler: Option<Box<dyn ErrorHandler>>) {
        self.error_handler = handler;
    }

    /// Prepares the decoder for a new run over the columns of `mapping`.
    pub fn start_run<F>(&mut self, settings: DecodeSettings, mapping: &ColumnMapping, is_expression: F)
    where
        F: Fn(&str) -> bool,
    {
        if self.blob_decoder.is_none() {
            self.blob_decoder = Some(Box::new(FileBlobDecoder::new(settings.base_dir.clone())));
        }
        self.settings = settings;
        self.plan = mapping
            .columns()
            .iter()
            .map(|column| match &column.target {
                Some(target) => ColumnDecoder::for_column(target, is_expression(&target.name)),
                None => ColumnDecoder::Character { large: false },
            })
            .collect();
        self.ignore_all_errors = false;
        self.required_fields = mapping.required_field_count();
        self.missing_fields_reported = false;
        self.field_errors = 0;
    }

    /// Decoder chosen for the column at `source_index`.
    pub fn plan(&self, source_index: usize) -> Option<ColumnDecoder> {
        self.plan.get(source_index).copied()
    }

    /// Field errors absorbed so far in this run.
    pub fn field_errors(&self) -> usize {
        self.field_errors
    }

    pub fn decode_row(
        &mut self,
        columns: &[ImportFileColumn],
        raw: &[Option<String>],
        line_number: usize,
        buffer: &mut RowBuffer,
        messages: &mut MessageLog,
    ) -> Result<RowOutcome> {
        buffer.clear();
        let row = RawRow::new(columns, raw);
        if raw.len() < self.required_fields {
            self.report_missing_fields(line_number, raw.len(), messages);
        }

        for column in columns {
            let Some(target_index) = column.target_index else {
                continue;
            };
            let Some(token) = raw.get(column.source_index) else {
                continue;
            };

            let mut value: Option<Cow<'_, str>> = token
                .as_deref()
                .filter(|current| !self.is_null_token(current))
                .map(Cow::Borrowed);

            let replaced = match (&self.modifier, value.as_deref()) {
                (Some(modifier), Some(current)) => modifier.modify_value(column, current, &row),
                _ => None,
            };
            if let Some(replaced) = replaced {
                value = Some(Cow::Owned(replaced));
            }

            if let Some(filter) = &self.filter
                && !filter.accepts(column, value.as_deref(), &row)
            {
                return Ok(RowOutcome::Filtered);
            }

            let decoder = self
                .plan
                .get(column.source_index)
                .copied()
                .unwrap_or(ColumnDecoder::Character { large: false });
            match self.decode_field(decoder, value.as_deref()) {
                Ok(decoded) => buffer.set(target_index, decoded),
                Err(err) => {
                    buffer.set(target_index, None);
                    self.handle_field_error(
                        line_number,
                        column,
                        value.as_deref().unwrap_or(""),
                        err,
                        messages,
                    )?;
                }
            }
        }

        if self.settings.ignore_all_null_rows && buffer.is_all_null() {
            return Ok(RowOutcome::AllNull);
        }
        Ok(RowOutcome::Ready)
    }

    fn is_null_token(&self, value: &str) -> bool {
        self.settings.null_string.as_deref() == Some(value)
            || (value.is_empty() && self.settings.empty_string_is_null)
    }

    fn decode_field(
        &self,
        decoder: ColumnDecoder,
        value: Option<&str>,
    ) -> std::result::Result<Option<Value>, ConversionError> {
        let Some(value) = value else {
            return Ok(None);
        };
        match decoder {
            ColumnDecoder::Expression => Ok(Some(Value::String(value.to_string()))),
            ColumnDecoder::Character { large } => {
                if large && self.settings.clob_as_file && !value.trim().is_empty() {
                    let text = read_clob_file(
                        value,
                        self.settings.base_dir.as_deref(),
                        self.settings.lob_encoding,
                    )?;
                    return Ok(Some(Value::String(text)));
                }
                let text = if self.settings.decode_unicode {
                    text::decode_escapes(value).into_owned()
                } else {
                    value.to_string()
                };
                Ok(Some(Value::String(text)))
            }
            ColumnDecoder::Blob => {
                if value.trim().is_empty() {
                    return Ok(None);
                }
                match &self.blob_decoder {
                    Some(decoder) => decoder
                        .decode_blob(value, self.settings.blob_mode)
                        .map(|bytes| Some(Value::Binary(bytes))),
                    None => FileBlobDecoder::new(self.settings.base_dir.clone())
                        .decode_blob(value, self.settings.blob_mode)
                        .map(|bytes| Some(Value::Binary(bytes))),
                }
            }
            ColumnDecoder::Typed(target) => self.converter.convert_value(value, target),
        }
    }

    fn handle_field_error(
        &mut self,
        line_number: usize,
        column: &ImportFileColumn,
        raw_value: &str,
        err: ConversionError,
        messages: &mut MessageLog,
    ) -> Result<()> {
        let text = format!(
            "Error in line {line_number}, column '{}': could not convert '{raw_value}': {err}",
            column.name
        );
        let abort = if self.settings.abort_on_error {
            true
        } else if self.ignore_all_errors {
            false
        } else if let Some(handler) = self.error_handler.as_mut() {
            match handler.action_on_error(
                line_number,
                Some(&column.name),
                raw_value,
                &err.to_string(),
            ) {
                ErrorAction::Abort => true,
                ErrorAction::Continue => false,
                ErrorAction::IgnoreAll => {
                    self.ignore_all_errors = true;
                    false
                }
            }
        } else {
            false
        };

        if abort {
            return Err(ImportError::Conversion {
                line: line_number,
                column: column.name.clone(),
                value: raw_value.to_string(),
                source: err,
            });
        }
        warn!("{text}");
        messages.warning(text);
        self.field_errors += 1;
        Ok(())
    }

    fn report_missing_fields(&mut self, line_number: usize, found: usize, messages: &mut MessageLog) {
        if self.missing_fields_reported {
            return;
        }
        self.missing_fields_reported = true;
        let text = format!(
            "Line {line_number} contains only {found} value(s), missing columns will be null. \
             Further lines with missing values are not reported"
        );
        warn!("{text}");
        messages.warning(text);
    }
}
