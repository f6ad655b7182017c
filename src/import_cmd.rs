use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::{info, warn};

use crate::{
    cli::{ImportArgs, ParseArgs},
    io_utils::{self, InputSource},
    options::{ImportOptions, parse_column_widths},
    parser::{ImportSummary, TextFileParser},
    schema::TableDefinition,
    sink::{CsvSink, MemorySink},
    table,
};

const DEFAULT_PREVIEW_ROWS: usize = 10;

pub fn execute(args: &ImportArgs) -> Result<()> {
    let mut options = build_options(&args.parse)?;
    apply_import_flags(&mut options, args);
    options
        .validate()
        .context("Validating import options")?;
    let definition = TableDefinition::load(&args.parse.table)?;
    let source = InputSource::file(&args.parse.input);
    let mut parser = TextFileParser::new(options);

    let outcome = if args.preview {
        let limit = args.limit.unwrap_or(DEFAULT_PREVIEW_ROWS);
        let mut sink = MemorySink::new().with_max_rows(Some(limit));
        let outcome = parser.process(&source, &definition, &mut sink);
        if outcome.is_ok() {
            table::print_rows(&sink.column_names(), &sink.rows);
        }
        outcome
    } else {
        let writer = io_utils::open_csv_writer(args.output.as_deref(), args.output_delimiter)
            .with_context(|| format!("Opening output {:?}", args.output))?;
        let rejected = args
            .rejected
            .as_deref()
            .map(|path| {
                io_utils::open_csv_writer(Some(path), args.output_delimiter)
                    .with_context(|| format!("Opening rejected-record file {path:?}"))
            })
            .transpose()?;
        let mut sink = CsvSink::new(writer)
            .with_rejected_writer(rejected)
            .with_null_marker(args.null_marker.clone())
            .with_window(args.skip, args.limit);
        parser.process(&source, &definition, &mut sink)
    };

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(path) = &args.summary
                && let Err(summary_err) = write_summary(path, &parser.summary())
            {
                warn!("{summary_err:#}");
            }
            return Err(err).with_context(|| format!("Importing {:?}", args.parse.input));
        }
    };

    if summary.rows_rejected > 0 {
        warn!(
            "{} line(s) of {:?} could not be imported",
            summary.rows_rejected, args.parse.input
        );
    }
    info!(
        "Imported {} row(s) from {:?} into '{}'",
        summary.rows_imported, args.parse.input, summary.table
    );
    if let Some(path) = &args.summary {
        write_summary(path, &summary)?;
    }
    Ok(())
}

/// Import options from the profile (if any) with the shared flags applied.
pub(crate) fn build_options(args: &ParseArgs) -> Result<ImportOptions> {
    let mut options = match &args.profile {
        Some(path) => ImportOptions::load(path)?,
        None => ImportOptions::default(),
    };
    if let Some(delimiter) = &args.delimiter {
        options.delimiter = delimiter.clone();
    }
    if args.no_quote {
        options.quote_char = None;
    } else if let Some(quote) = args.quote {
        options.quote_char = Some(quote);
    }
    if let Some(escaping) = args.quote_escaping {
        options.quote_escaping = escaping.into();
    }
    if args.no_header {
        options.contains_header = false;
    }
    if !args.columns.is_empty() {
        options.columns = args.columns.iter().map(|c| c.trim().to_string()).collect();
    }
    if let Some(widths) = &args.column_widths {
        options.column_widths = parse_column_widths(widths)?;
    }
    if args.strict {
        options.strict_column_mapping = true;
    }
    if let Some(encoding) = &args.input_encoding {
        options.encoding = Some(encoding.clone());
    }
    Ok(options)
}

fn apply_import_flags(options: &mut ImportOptions, args: &ImportArgs) {
    if !args.import_columns.is_empty() {
        options.import_columns = args.import_columns.clone();
    }
    if args.null_string.is_some() {
        options.null_string = args.null_string.clone();
    }
    if args.keep_empty_strings {
        options.empty_string_is_null = false;
    }
    if args.line_filter.is_some() {
        options.line_filter = args.line_filter.clone();
    }
    if args.continue_on_error {
        options.abort_on_error = false;
    }
    if let Some(mode) = args.blob_mode {
        options.blob_mode = mode.into();
    }
    options.always_quoted |= args.always_quoted;
    options.trim_values |= args.trim;
    options.decode_unicode |= args.decode_unicode;
    options.illegal_date_is_null |= args.illegal_date_is_null;
    options.multi_line |= args.multi_line;
    options.ignore_all_null_rows |= args.ignore_null_rows;
    options.clob_as_file |= args.clob_as_file;
    for (column, pattern) in &args.filters {
        options.column_filters.insert(column.clone(), pattern.clone());
    }
}

fn write_summary(path: &Path, summary: &ImportSummary) -> Result<()> {
    let mut writer: Box<dyn Write> = if io_utils::is_dash(path) {
        Box::new(io::stderr())
    } else {
        let file = File::create(path).with_context(|| format!("Creating summary file {path:?}"))?;
        Box::new(BufWriter::new(file))
    };
    serde_json::to_writer_pretty(&mut writer, summary)
        .with_context(|| format!("Writing summary to {path:?}"))?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
