//! Receivers of decoded rows.
//!
//! A [`RowSink`] owns the destination side of an import: it is told which
//! table and columns to expect, receives each finished row, and is notified
//! of rejected records and of the end of the import. Two sinks are bundled:
//! [`MemorySink`] collects rows for inspection and previews, [`CsvSink`]
//! writes them as CSV.

use std::{
    collections::HashSet,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Serialize;

use crate::{data::Value, error::ImportError, schema::TargetColumn};

pub trait RowSink {
    /// Called once, after column mapping, before the first row.
    fn set_target_table(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        source: Option<&Path>,
    ) -> Result<()>;

    /// Asked before each data line; `false` skips the line without decoding it.
    fn should_process_next_row(&mut self) -> bool {
        true
    }

    fn next_row_skipped(&mut self) {}

    /// Whether the named destination column is computed by the target.
    fn is_column_expression(&self, _column: &str) -> bool {
        false
    }

    /// Receives one decoded row in target column order. The slice is only
    /// valid for the duration of the call.
    fn process_row(&mut self, row: &[Option<Value>]) -> Result<()>;

    fn record_rejected(&mut self, raw_line: &str, line_number: usize, cause: &ImportError);

    /// Only called when the run completed; never after cancellation or failure.
    fn table_import_finished(&mut self) -> Result<()>;
}

/// A line that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    pub line_number: usize,
    pub raw_line: String,
    pub cause: String,
}

/// Collects everything it receives.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub table: Option<String>,
    pub columns: Vec<TargetColumn>,
    pub source: Option<PathBuf>,
    pub rows: Vec<Vec<Option<Value>>>,
    pub rejected: Vec<RejectedRecord>,
    pub skipped: usize,
    pub finished: bool,
    expression_columns: HashSet<String>,
    max_rows: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops accepting rows once `limit` rows were collected.
    pub fn with_max_rows(mut self, limit: Option<usize>) -> Self {
        self.max_rows = limit;
        self
    }

    pub fn with_expression_column(mut self, column: impl Into<String>) -> Self {
        self.expression_columns.insert(column.into());
        self
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

impl RowSink for MemorySink {
    fn set_target_table(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        source: Option<&Path>,
    ) -> Result<()> {
        self.table = Some(table.to_string());
        self.columns = columns.to_vec();
        self.source = source.map(Path::to_path_buf);
        Ok(())
    }

    fn should_process_next_row(&mut self) -> bool {
        self.max_rows.is_none_or(|limit| self.rows.len() < limit)
    }

    fn next_row_skipped(&mut self) {
        self.skipped += 1;
    }

    fn is_column_expression(&self, column: &str) -> bool {
        self.expression_columns.contains(column)
    }

    fn process_row(&mut self, row: &[Option<Value>]) -> Result<()> {
        self.rows.push(row.to_vec());
        Ok(())
    }

    fn record_rejected(&mut self, raw_line: &str, line_number: usize, cause: &ImportError) {
        self.rejected.push(RejectedRecord {
            line_number,
            raw_line: raw_line.to_string(),
            cause: cause.to_string(),
        });
    }

    fn table_import_finished(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Writes decoded rows as CSV, header first.
///
/// Rejected records go to an optional second writer with the columns
/// `line`, `error`, `record`.
pub struct CsvSink {
    writer: csv::Writer<Box<dyn Write>>,
    rejected: Option<csv::Writer<Box<dyn Write>>>,
    null_marker: String,
    skip_rows: usize,
    max_rows: Option<usize>,
    seen: usize,
    written: usize,
    rejected_count: usize,
}

impl CsvSink {
    pub fn new(writer: csv::Writer<Box<dyn Write>>) -> Self {
        Self {
            writer,
            rejected: None,
            null_marker: String::new(),
            skip_rows: 0,
            max_rows: None,
            seen: 0,
            written: 0,
            rejected_count: 0,
        }
    }

    pub fn with_rejected_writer(mut self, writer: Option<csv::Writer<Box<dyn Write>>>) -> Self {
        self.rejected = writer;
        self
    }

    /// Text written for null values (empty by default).
    pub fn with_null_marker(mut self, marker: impl Into<String>) -> Self {
        self.null_marker = marker.into();
        self
    }

    /// Skips the first `skip` data lines and keeps at most `max` rows.
    pub fn with_window(mut self, skip: usize, max: Option<usize>) -> Self {
        self.skip_rows = skip;
        self.max_rows = max;
        self
    }

    pub fn rows_written(&self) -> usize {
        self.written
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected_count
    }
}

impl RowSink for CsvSink {
    fn set_target_table(
        &mut self,
        table: &str,
        columns: &[TargetColumn],
        source: Option<&Path>,
    ) -> Result<()> {
        debug!(
            "Writing {} column(s) of table '{table}' from {:?}",
            columns.len(),
            source
        );
        self.writer
            .write_record(columns.iter().map(|c| c.name.as_str()))
            .context("Writing output headers")?;
        if let Some(rejected) = self.rejected.as_mut() {
            rejected
                .write_record(["line", "error", "record"])
                .context("Writing rejected-record headers")?;
        }
        Ok(())
    }

    fn should_process_next_row(&mut self) -> bool {
        self.seen += 1;
        self.seen > self.skip_rows && self.max_rows.is_none_or(|max| self.written < max)
    }

    fn process_row(&mut self, row: &[Option<Value>]) -> Result<()> {
        let record = row.iter().map(|value| match value {
            Some(value) => value.as_display(),
            None => self.null_marker.clone(),
        });
        self.writer
            .write_record(record)
            .context("Writing output row")?;
        self.written += 1;
        Ok(())
    }

    fn record_rejected(&mut self, raw_line: &str, line_number: usize, cause: &ImportError) {
        self.rejected_count += 1;
        if let Some(rejected) = self.rejected.as_mut()
            && let Err(err) = rejected.write_record([
                line_number.to_string(),
                cause.to_string(),
                raw_line.to_string(),
            ])
        {
            warn!("Could not record rejected line {line_number}: {err}");
        }
    }

    fn table_import_finished(&mut self) -> Result<()> {
        self.writer.flush().context("Flushing output")?;
        if let Some(rejected) = self.rejected.as_mut() {
            rejected.flush().context("Flushing rejected records")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;
    use std::{cell::RefCell, io, rc::Rc};

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn writer(buffer: &SharedBuffer) -> csv::Writer<Box<dyn Write>> {
        csv::WriterBuilder::new().from_writer(Box::new(buffer.clone()) as Box<dyn Write>)
    }

    fn columns() -> Vec<TargetColumn> {
        vec![
            TargetColumn::new("id", ColumnType::Integer),
            TargetColumn::new("name", ColumnType::String),
        ]
    }

    #[test]
    fn csv_sink_writes_header_rows_and_nulls() {
        let out = SharedBuffer::default();
        let mut sink = CsvSink::new(writer(&out)).with_null_marker("NULL");
        sink.set_target_table("person", &columns(), None).unwrap();
        assert!(sink.should_process_next_row());
        sink.process_row(&[Some(Value::Integer(1)), None]).unwrap();
        sink.table_import_finished().unwrap();
        assert_eq!(out.text(), "id,name\n1,NULL\n");
        assert_eq!(sink.rows_written(), 1);
    }

    #[test]
    fn csv_sink_window_skips_and_limits() {
        let out = SharedBuffer::default();
        let mut sink = CsvSink::new(writer(&out)).with_window(1, Some(1));
        sink.set_target_table("person", &columns(), None).unwrap();
        assert!(!sink.should_process_next_row());
        assert!(sink.should_process_next_row());
        sink.process_row(&[Some(Value::Integer(2)), None]).unwrap();
        assert!(!sink.should_process_next_row());
    }

    #[test]
    fn csv_sink_records_rejected_lines() {
        let out = SharedBuffer::default();
        let rejected = SharedBuffer::default();
        let mut sink = CsvSink::new(writer(&out)).with_rejected_writer(Some(writer(&rejected)));
        sink.set_target_table("person", &columns(), None).unwrap();
        let cause = ImportError::MalformedRecord {
            line: 4,
            message: "unterminated quote".into(),
        };
        sink.record_rejected("1,\"open", 4, &cause);
        sink.table_import_finished().unwrap();
        let text = rejected.text();
        assert!(text.starts_with("line,error,record\n4,"));
        assert!(text.contains("unterminated quote"));
        assert_eq!(sink.rejected_count(), 1);
    }

    #[test]
    fn memory_sink_limits_rows() {
        let mut sink = MemorySink::new().with_max_rows(Some(1));
        sink.set_target_table("person", &columns(), Some(Path::new("in.csv")))
            .unwrap();
        assert!(sink.should_process_next_row());
        sink.process_row(&[None, None]).unwrap();
        assert!(!sink.should_process_next_row());
        assert_eq!(sink.column_names(), vec!["id", "name"]);
        assert_eq!(sink.source.as_deref(), Some(Path::new("in.csv")));
    }
}
