//! The import driver.
//!
//! [`TextFileParser`] streams one input through the line reader, tokenizer,
//! column mapping and decode pipeline, handing finished rows to a
//! [`RowSink`]. A run moves through
//! `Init -> Header -> Streaming -> {Cancelled | Completed | Failed}`.
//!
//! Cancellation is cooperative: a [`CancellationToken`] may be triggered
//! from any thread and is checked once per row boundary, so a partially
//! decoded row is never dispatched.

use std::{
    fmt,
    io::BufRead,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use itertools::Itertools;
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::{
    data::{DefaultValueConverter, ValueConverter},
    decode::{DecodeSettings, ErrorHandler, RowBuffer, RowDecoder, RowOutcome},
    error::{ImportError, Result},
    io_utils::{self, InputSource},
    lob::BlobDecoder,
    line_reader::{LineReader, LogicalLine},
    mapping::{ColumnMapping, MappingOptions, SourceColumn},
    messages::{MessageLevel, MessageLog},
    modifiers::{self, ColumnFilter, ColumnModifiers, RegexColumnFilter, ValueModifier},
    options::{ColumnWidth, ImportOptions},
    schema::SchemaProvider,
    sink::RowSink,
    text,
    tokenizer::{DelimitedTokenizer, FixedWidthTokenizer, Tokenizer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    Init,
    Header,
    Streaming,
    Cancelled,
    Completed,
    Failed,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportState::Init => "init",
            ImportState::Header => "header",
            ImportState::Streaming => "streaming",
            ImportState::Cancelled => "cancelled",
            ImportState::Completed => "completed",
            ImportState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Shared flag requesting a running import to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Reported to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportProgress {
    pub line_number: usize,
    pub rows_imported: usize,
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub source: String,
    pub table: String,
    pub state: ImportState,
    /// Physical lines consumed, header included.
    pub lines_read: usize,
    /// Logical data lines seen.
    pub records: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    pub rows_filtered: usize,
    pub rows_rejected: usize,
    pub field_errors: usize,
    pub warnings: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct RunCounters {
    lines_read: usize,
    records: usize,
    imported: usize,
    skipped: usize,
    filtered: usize,
    rejected: usize,
}

type ProgressCallback = Box<dyn FnMut(&ImportProgress)>;

/// Everything the header phase produces.
struct Prepared {
    tokenizer: Tokenizer,
    mapping: ColumnMapping,
    /// First data line, already read to count columns of a headerless input.
    pending: Option<LogicalLine>,
}

pub struct TextFileParser {
    options: ImportOptions,
    decoder: RowDecoder,
    custom_converter: bool,
    custom_modifier: bool,
    custom_filter: bool,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
    messages: MessageLog,
    state: ImportState,
    reader: Option<LineReader<Box<dyn BufRead>>>,
    mapping: Option<ColumnMapping>,
    raw_values: Vec<Option<String>>,
    counters: RunCounters,
    source_name: String,
    table_name: String,
}

impl Default for TextFileParser {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl TextFileParser {
    pub fn new(options: ImportOptions) -> Self {
        Self {
            options,
            decoder: RowDecoder::new(),
            custom_converter: false,
            custom_modifier: false,
            custom_filter: false,
            cancel: CancellationToken::new(),
            progress: None,
            messages: MessageLog::new(),
            state: ImportState::Init,
            reader: None,
            mapping: None,
            raw_values: Vec::new(),
            counters: RunCounters::default(),
            source_name: String::new(),
            table_name: String::new(),
        }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ImportOptions {
        &mut self.options
    }

    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        self.options.delimiter = delimiter.into();
    }

    /// Switches the run to fixed-width tokenizing; the delimiter is ignored.
    pub fn set_column_widths(&mut self, widths: Vec<ColumnWidth>) {
        self.options.column_widths = widths;
    }

    pub fn set_converter(&mut self, converter: Box<dyn ValueConverter>) {
        self.decoder.set_converter(converter);
        self.custom_converter = true;
    }

    pub fn set_blob_decoder(&mut self, decoder: Box<dyn BlobDecoder>) {
        self.decoder.set_blob_decoder(decoder);
    }

    /// Installs a modifier in place of the one built from the options.
    pub fn set_value_modifier(&mut self, modifier: Box<dyn ValueModifier>) {
        self.decoder.set_value_modifier(Some(modifier));
        self.custom_modifier = true;
    }

    /// Installs a filter in place of the one built from the options.
    pub fn set_column_filter(&mut self, filter: Box<dyn ColumnFilter>) {
        self.decoder.set_column_filter(Some(filter));
        self.custom_filter = true;
    }

    pub fn set_error_handler(&mut self, handler: Box<dyn ErrorHandler>) {
        self.decoder.set_error_handler(Some(handler));
    }

    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&ImportProgress) + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// Token that cancels the current run when triggered. Starting a run
    /// clears a previous cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> ImportState {
        self.state
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    /// Mapping of the current (or last) run.
    pub fn mapping(&self) -> Option<&ColumnMapping> {
        self.mapping.as_ref()
    }

    pub fn is_input_open(&self) -> bool {
        self.reader.is_some()
    }

    /// Raw token of the current line at `source_index`.
    pub fn raw_value(&self, source_index: usize) -> Option<&str> {
        self.raw_values.get(source_index).and_then(|v| v.as_deref())
    }

    /// Clears all state of a previous run.
    pub fn reset(&mut self) {
        self.cancel.reset();
        self.messages.clear();
        self.state = ImportState::Init;
        self.reader = None;
        self.mapping = None;
        self.raw_values.clear();
        self.counters = RunCounters::default();
        self.source_name.clear();
        self.table_name.clear();
    }

    pub fn summary(&self) -> ImportSummary {
        let lines_read = self
            .reader
            .as_ref()
            .map(LineReader::physical_lines_read)
            .unwrap_or(self.counters.lines_read);
        ImportSummary {
            source: self.source_name.clone(),
            table: self.table_name.clone(),
            state: self.state,
            lines_read,
            records: self.counters.records,
            rows_imported: self.counters.imported,
            rows_skipped: self.counters.skipped,
            rows_filtered: self.counters.filtered,
            rows_rejected: self.counters.rejected,
            field_errors: self.decoder.field_errors(),
            warnings: self.messages.count(MessageLevel::Warning),
            errors: self.messages.count(MessageLevel::Error),
        }
    }

    /// Reads only as far as needed to resolve the column mapping.
    pub fn resolve_columns(
        &mut self,
        source: &InputSource,
        schema: &dyn SchemaProvider,
    ) -> Result<ColumnMapping> {
        self.reset();
        let result = self.prepare(source, schema);
        self.release_input();
        match result {
            Ok(Some(prepared)) => Ok(prepared.mapping),
            Ok(None) => Err(ImportError::configuration(format!(
                "Input {} is empty, no columns to resolve",
                source.display_name()
            ))),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Imports `source` into `sink`.
    ///
    /// On failure the error is also recorded in [`Self::messages`] and
    /// [`Self::summary`] reports the counts reached.
    pub fn process(
        &mut self,
        source: &InputSource,
        schema: &dyn SchemaProvider,
        sink: &mut dyn RowSink,
    ) -> Result<ImportSummary> {
        self.reset();
        let result = self.run(source, schema, sink);
        self.release_input();
        match result {
            Ok(()) => {
                let summary = self.summary();
                info!(
                    "Import of {} {}: {} row(s) imported, {} skipped, {} filtered, {} rejected",
                    summary.source,
                    summary.state,
                    summary.rows_imported,
                    summary.rows_skipped,
                    summary.rows_filtered,
                    summary.rows_rejected
                );
                Ok(summary)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: ImportError) -> ImportError {
        self.state = ImportState::Failed;
        let text = error_chain(&err);
        error!("{text}");
        self.messages.error(text);
        err
    }

    fn release_input(&mut self) {
        if let Some(reader) = self.reader.take() {
            self.counters.lines_read = reader.physical_lines_read();
            debug!("Closed input {}", self.source_name);
        }
    }

    fn run(
        &mut self,
        source: &InputSource,
        schema: &dyn SchemaProvider,
        sink: &mut dyn RowSink,
    ) -> Result<()> {
        let Some(Prepared {
            tokenizer,
            mapping,
            mut pending,
        }) = self.prepare(source, schema)?
        else {
            self.state = ImportState::Completed;
            return Ok(());
        };

        let line_filter = self
            .options
            .line_filter
            .as_deref()
            .map(modifiers::compile)
            .transpose()?;
        sink.set_target_table(&self.table_name, &mapping.target_columns(), source.path())
            .map_err(|err| ImportError::sink("Preparing target table", err))?;
        self.configure_decoder(source, &mapping, &*sink)?;

        self.state = ImportState::Streaming;
        let mut buffer = RowBuffer::with_len(mapping.target_column_count());
        let interval = self.options.progress_interval.max(1);

        loop {
            if self.cancel.is_cancelled() {
                self.cancelled();
                return Ok(());
            }
            let line = match pending.take() {
                Some(line) => line,
                None => match self.next_line()? {
                    Some(line) => line,
                    None => break,
                },
            };
            self.counters.records += 1;

            if let Some(filter) = &line_filter
                && !filter.is_match(&line.text)
            {
                self.counters.filtered += 1;
                continue;
            }
            if !sink.should_process_next_row() {
                sink.next_row_skipped();
                self.counters.skipped += 1;
                continue;
            }

            if let Err(err) = tokenizer.tokenize(&line.text, &mut self.raw_values) {
                let err = ImportError::MalformedRecord {
                    line: line.line_number,
                    message: err.to_string(),
                };
                if self.options.abort_on_error {
                    return Err(err);
                }
                warn!("{err}");
                self.messages.warning(err.to_string());
                sink.record_rejected(&line.text, line.line_number, &err);
                self.counters.rejected += 1;
                continue;
            }

            let outcome = self.decoder.decode_row(
                mapping.columns(),
                &self.raw_values,
                line.line_number,
                &mut buffer,
                &mut self.messages,
            )?;
            match outcome {
                RowOutcome::Filtered => {
                    self.counters.filtered += 1;
                    continue;
                }
                RowOutcome::AllNull => {
                    self.counters.skipped += 1;
                    continue;
                }
                RowOutcome::Ready => {}
            }

            if let Err(err) = sink.process_row(buffer.values()) {
                if self.cancel.is_cancelled() {
                    debug!("Ignoring sink error after cancellation: {err:#}");
                    self.cancelled();
                    return Ok(());
                }
                return Err(ImportError::sink(
                    format!("Could not import line {}", line.line_number),
                    err,
                ));
            }
            self.counters.imported += 1;
            if self.counters.imported % interval == 0 {
                self.report_progress(line.line_number);
            }
        }

        sink.table_import_finished()
            .map_err(|err| ImportError::sink("Finishing table import", err))?;
        self.state = ImportState::Completed;
        let last_line = self.reader.as_ref().map_or(0, LineReader::physical_lines_read);
        self.report_progress(last_line);
        Ok(())
    }

    fn cancelled(&mut self) {
        self.state = ImportState::Cancelled;
        let text = format!(
            "Import of {} cancelled after {} row(s)",
            self.source_name, self.counters.imported
        );
        info!("{text}");
        self.messages.info(text);
    }

    fn report_progress(&mut self, line_number: usize) {
        let progress = ImportProgress {
            line_number,
            rows_imported: self.counters.imported,
        };
        debug!(
            "{}: line {}, {} row(s) imported",
            self.source_name, progress.line_number, progress.rows_imported
        );
        if let Some(callback) = self.progress.as_mut() {
            callback(&progress);
        }
    }

    fn next_line(&mut self) -> Result<Option<LogicalLine>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        reader
            .next_line()
            .map_err(|err| ImportError::io(format!("reading {}", self.source_name), err))
    }

    /// Init and Header phases. `None` means an empty input without any
    /// column declaration, which completes without importing anything.
    fn prepare(
        &mut self,
        source: &InputSource,
        schema: &dyn SchemaProvider,
    ) -> Result<Option<Prepared>> {
        self.state = ImportState::Init;
        self.source_name = source.display_name();
        self.table_name = schema.table_name().to_string();
        self.options.validate()?;
        let encoding = io_utils::resolve_encoding(self.options.encoding.as_deref())?;
        let tokenizer = self.build_tokenizer();
        let layout = match &tokenizer {
            Tokenizer::FixedWidth(t) => format!("fixed-width, {} column(s)", t.widths().len()),
            Tokenizer::Delimited(t) => {
                format!("delimiter '{}'", text::printable_delimiter(t.delimiter()))
            }
        };
        info!(
            "Importing {} into '{}' ({layout}, header: {})",
            self.source_name, self.table_name, self.options.contains_header
        );

        let line_ending = if self.options.multi_line {
            let probe = source.open(encoding)?;
            let detected = io_utils::detect_line_ending(probe).map_err(|err| {
                ImportError::io(format!("detecting line endings of {}", self.source_name), err)
            })?;
            if detected.is_none() {
                let text = format!(
                    "Could not detect the line ending of {}, multi-line records are disabled",
                    self.source_name
                );
                warn!("{text}");
                self.messages.warning(text);
            }
            detected
        } else {
            None
        };
        let input = source.open(encoding)?;
        self.reader = Some(
            LineReader::new(input, self.options.quote_rules())
                .with_multi_line(line_ending)
                .with_ignore_empty_lines(self.options.ignore_empty_lines),
        );

        self.state = ImportState::Header;
        let mut pending = None;
        let mut positional = false;
        let header = if self.options.contains_header {
            match self.next_line()? {
                Some(line) => Some(line),
                None => {
                    return Err(ImportError::MissingHeader {
                        source_name: self.source_name.clone(),
                    });
                }
            }
        } else {
            None
        };

        let source_columns = match (self.options.declared_source_columns(), header) {
            (Some(declared), _) => declared,
            (None, Some(header)) => self.header_columns(&header)?,
            (None, None) => {
                let Some(first) = self.next_line()? else {
                    let text = format!("Input {} is empty, nothing to import", self.source_name);
                    warn!("{text}");
                    self.messages.warning(text);
                    return Ok(None);
                };
                let count = match tokenizer.tokenize(&first.text, &mut self.raw_values) {
                    Ok(()) => self.raw_values.len(),
                    Err(err) => {
                        return Err(ImportError::MalformedRecord {
                            line: first.line_number,
                            message: err.to_string(),
                        });
                    }
                };
                pending = Some(first);
                positional = true;
                SourceColumn::synthesized(count)
            }
        };

        let destination = schema.columns().map_err(|err| {
            ImportError::sink(
                format!("Retrieving columns of table '{}'", self.table_name),
                err,
            )
        })?;
        let mapping = ColumnMapping::resolve(
            &source_columns,
            &destination,
            &self.table_name,
            &self.source_name,
            &MappingOptions {
                import_columns: self.options.import_columns.clone(),
                strict: self.options.strict_column_mapping,
                positional,
            },
        )?;
        for warning in mapping.warnings() {
            self.messages.warning(warning.clone());
        }
        debug!(
            "Mapped {} of {} column(s): {}",
            mapping.target_column_count(),
            source_columns.len(),
            mapping
                .imported()
                .map(|c| format!("{}->{}", c.name, c.target_index.unwrap_or_default()))
                .join(", ")
        );
        self.mapping = Some(mapping.clone());

        Ok(Some(Prepared {
            tokenizer,
            mapping,
            pending,
        }))
    }

    fn header_columns(&self, header: &LogicalLine) -> Result<Vec<SourceColumn>> {
        let tokenizer = DelimitedTokenizer::new(
            self.options.effective_delimiter(),
            self.options.quote_rules(),
        )
        .with_trim(true);
        let mut names = Vec::new();
        tokenizer
            .tokenize(&header.text, &mut names)
            .map_err(|err| ImportError::MalformedRecord {
                line: header.line_number,
                message: format!("invalid header: {err}"),
            })?;
        Ok(names
            .into_iter()
            .map(|name| SourceColumn::new(name.unwrap_or_default()))
            .collect())
    }

    fn build_tokenizer(&self) -> Tokenizer {
        if self.options.is_fixed_width() {
            let widths = self.options.column_widths.iter().map(|c| c.width).collect();
            Tokenizer::FixedWidth(
                FixedWidthTokenizer::new(widths).with_trim(self.options.trim_values),
            )
        } else {
            Tokenizer::Delimited(
                DelimitedTokenizer::new(
                    self.options.effective_delimiter(),
                    self.options.quote_rules(),
                )
                .with_trim(self.options.trim_values)
                .with_unquoted_empty_is_null(self.options.always_quoted),
            )
        }
    }

    fn configure_decoder(
        &mut self,
        source: &InputSource,
        mapping: &ColumnMapping,
        sink: &dyn RowSink,
    ) -> Result<()> {
        let options = &self.options;
        if !self.custom_converter {
            self.decoder.set_converter(Box::new(
                DefaultValueConverter::new()
                    .with_illegal_date_is_null(options.illegal_date_is_null)
                    .with_decimal_separator(options.decimal_separator),
            ));
        }
        if !self.custom_modifier {
            let modifier = ColumnModifiers::from_specs(&options.modifiers)?;
            self.decoder.set_value_modifier(
                (!modifier.is_empty()).then(|| Box::new(modifier) as Box<dyn ValueModifier>),
            );
        }
        if !self.custom_filter {
            let filter = RegexColumnFilter::from_map(&options.column_filters)?;
            self.decoder.set_column_filter(
                (!filter.is_empty()).then(|| Box::new(filter) as Box<dyn ColumnFilter>),
            );
        }
        let settings = DecodeSettings {
            null_string: options.null_string.clone(),
            empty_string_is_null: options.empty_string_is_null,
            decode_unicode: options.decode_unicode,
            clob_as_file: options.clob_as_file,
            blob_mode: options.blob_mode,
            abort_on_error: options.abort_on_error,
            ignore_all_null_rows: options.ignore_all_null_rows,
            lob_encoding: io_utils::resolve_encoding(options.encoding.as_deref())?,
            base_dir: source.base_dir(),
        };
        self.decoder
            .start_run(settings, mapping, |name| sink.is_column_expression(name));
        Ok(())
    }
}

/// An error and its causes on one line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        cause = inner.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::Value,
        schema::{ColumnType, TableDefinition, TargetColumn},
        sink::MemorySink,
    };
    use std::{cell::RefCell, rc::Rc};

    fn table(columns: &[(&str, ColumnType)]) -> TableDefinition {
        TableDefinition::new(
            "target",
            columns
                .iter()
                .map(|(name, ty)| TargetColumn::new(*name, *ty))
                .collect(),
        )
    }

    fn import(
        options: ImportOptions,
        input: &str,
        table: &TableDefinition,
    ) -> (TextFileParser, Result<ImportSummary>, MemorySink) {
        let mut parser = TextFileParser::new(options);
        let mut sink = MemorySink::new();
        let result = parser.process(&InputSource::text("input", input), table, &mut sink);
        (parser, result, sink)
    }

    #[test]
    fn imports_delimited_rows_with_header() {
        let table = table(&[("id", ColumnType::Integer), ("name", ColumnType::String)]);
        let (parser, result, sink) =
            import(ImportOptions::default(), "id,name\n1,Ann\n2,\"Bo, Jr\"\n", &table);
        let summary = result.unwrap();
        assert_eq!(summary.state, ImportState::Completed);
        assert_eq!(summary.rows_imported, 2);
        assert_eq!(summary.lines_read, 3);
        assert!(sink.finished);
        assert_eq!(
            sink.rows[1],
            vec![Some(Value::Integer(2)), Some(Value::String("Bo, Jr".into()))]
        );
        assert!(!parser.is_input_open());
    }

    #[test]
    fn missing_header_is_fatal() {
        let table = table(&[("id", ColumnType::Integer)]);
        let (parser, result, sink) = import(ImportOptions::default(), "", &table);
        assert!(matches!(result, Err(ImportError::MissingHeader { .. })));
        assert_eq!(parser.state(), ImportState::Failed);
        assert!(parser.messages().has_errors());
        assert!(sink.table.is_none());
    }

    #[test]
    fn headerless_input_binds_by_position() {
        let table = table(&[("id", ColumnType::Integer), ("name", ColumnType::String)]);
        let options = ImportOptions {
            contains_header: false,
            ..ImportOptions::default()
        };
        let (parser, result, sink) = import(options, "1,x\n2,y\n", &table);
        assert_eq!(result.unwrap().rows_imported, 2);
        assert_eq!(sink.column_names(), vec!["id", "name"]);
        assert_eq!(
            sink.rows[0],
            vec![Some(Value::Integer(1)), Some(Value::String("x".into()))]
        );
        let names: Vec<_> = parser
            .mapping()
            .unwrap()
            .columns()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["Column1", "Column2"]);
    }

    #[test]
    fn empty_headerless_input_completes_with_warning() {
        let table = table(&[("id", ColumnType::Integer)]);
        let options = ImportOptions {
            contains_header: false,
            ..ImportOptions::default()
        };
        let (parser, result, sink) = import(options, "\n\n", &table);
        let summary = result.unwrap();
        assert_eq!(summary.state, ImportState::Completed);
        assert_eq!(summary.rows_imported, 0);
        assert_eq!(parser.messages().count(MessageLevel::Warning), 1);
        assert!(!sink.finished);
    }

    #[test]
    fn line_filter_runs_before_decoding() {
        let table = table(&[("id", ColumnType::Integer), ("kind", ColumnType::String)]);
        let options = ImportOptions {
            line_filter: Some("^\\d+,keep".into()),
            ..ImportOptions::default()
        };
        let (_, result, sink) = import(options, "id,kind\n1,keep\nBAD,drop\n3,keep\n", &table);
        let summary = result.unwrap();
        assert_eq!(summary.rows_filtered, 1);
        assert_eq!(summary.records, 3);
        assert_eq!(sink.rows.len(), 2);
    }

    #[test]
    fn malformed_record_is_rejected_when_not_aborting() {
        let table = table(&[("id", ColumnType::Integer), ("name", ColumnType::String)]);
        let options = ImportOptions {
            abort_on_error: false,
            ..ImportOptions::default()
        };
        let (_, result, sink) = import(options, "id,name\n1,\"open\n2,b\n", &table);
        let summary = result.unwrap();
        assert_eq!(summary.rows_rejected, 1);
        assert_eq!(sink.rejected[0].line_number, 2);
        assert_eq!(sink.rows.len(), 1);

        let (_, result, _) = import(ImportOptions::default(), "id,name\n1,\"open\n", &table);
        assert!(matches!(result, Err(ImportError::MalformedRecord { line: 2, .. })));
    }

    #[test]
    fn sampling_sink_skips_rows() {
        let table = table(&[("id", ColumnType::Integer)]);
        let mut parser = TextFileParser::default();
        let mut sink = MemorySink::new().with_max_rows(Some(2));
        let summary = parser
            .process(&InputSource::text("in", "id\n1\n2\n3\n4\n"), &table, &mut sink)
            .unwrap();
        assert_eq!(summary.rows_imported, 2);
        assert_eq!(summary.rows_skipped, 2);
        assert_eq!(sink.skipped, 2);
    }

    #[test]
    fn progress_is_reported_per_interval_and_at_end() {
        let table = table(&[("id", ColumnType::Integer)]);
        let options = ImportOptions {
            progress_interval: 2,
            ..ImportOptions::default()
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut parser = TextFileParser::new(options);
        let recorder = Rc::clone(&seen);
        parser.set_progress_callback(move |p| recorder.borrow_mut().push(p.rows_imported));
        let mut sink = MemorySink::new();
        parser
            .process(&InputSource::text("in", "id\n1\n2\n3\n"), &table, &mut sink)
            .unwrap();
        assert_eq!(*seen.borrow(), vec![2, 3]);
    }

    #[test]
    fn fixed_width_skips_header_and_ignores_delimiter() {
        let table = table(&[("code", ColumnType::String), ("qty", ColumnType::Integer)]);
        let mut parser = TextFileParser::default();
        parser.set_delimiter(";");
        parser.set_column_widths(vec![
            ColumnWidth {
                name: "code".into(),
                width: 3,
            },
            ColumnWidth {
                name: "qty".into(),
                width: 4,
            },
        ]);
        parser.options_mut().trim_values = true;
        let mut sink = MemorySink::new();
        parser
            .process(
                &InputSource::text("in", "COD QTY\nA;1  12\n"),
                &table,
                &mut sink,
            )
            .unwrap();
        assert_eq!(
            sink.rows,
            vec![vec![Some(Value::String("A;1".into())), Some(Value::Integer(12))]]
        );
    }

    #[test]
    fn raw_values_of_last_line_are_accessible() {
        let table = table(&[("a", ColumnType::String), ("b", ColumnType::String)]);
        let (parser, result, _) = import(ImportOptions::default(), "a,b\nx,y\n", &table);
        result.unwrap();
        assert_eq!(parser.raw_value(1), Some("y"));
        assert_eq!(parser.raw_value(2), None);
    }

    #[test]
    fn error_chain_includes_causes() {
        let err = ImportError::Conversion {
            line: 2,
            column: "n".into(),
            value: "x".into(),
            source: crate::error::ConversionError::invalid("x", "integer"),
        };
        assert_eq!(
            error_chain(&err),
            "Line 2, column 'n': could not convert 'x': 'x' is not a valid integer"
        );
    }
}
