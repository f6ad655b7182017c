use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{lob::BlobMode, tokenizer::QuoteEscaping};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Import delimited and fixed-width text files into typed rows",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a text file into a target table definition, writing typed rows as CSV
    Import(ImportArgs),
    /// Show how the columns of a text file map onto a target table
    Columns(ColumnsArgs),
}

/// Options shared by every command that reads an input file.
#[derive(Debug, Args)]
pub struct ParseArgs {
    /// Input text file
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML table definition describing the target columns
    #[arg(short = 't', long = "table")]
    pub table: PathBuf,
    /// YAML import profile; flags given on the command line take precedence
    #[arg(short = 'p', long = "profile")]
    pub profile: Option<PathBuf>,
    /// Field delimiter; may be several characters, escapes such as `\t` and the word `tab` are accepted
    #[arg(short = 'd', long)]
    pub delimiter: Option<String>,
    /// Quote character
    #[arg(long, conflicts_with = "no_quote")]
    pub quote: Option<char>,
    /// Treat quote characters as ordinary text
    #[arg(long = "no-quote")]
    pub no_quote: bool,
    /// How a quote character inside a quoted value is escaped
    #[arg(long = "quote-escaping", value_enum)]
    pub quote_escaping: Option<QuoteEscapingArg>,
    /// The first line holds data rather than column names
    #[arg(long = "no-header")]
    pub no_header: bool,
    /// Source column names in file order; overrides the header. Use `$skip$` to ignore a column
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Fixed-width layout such as `id=5,name=20`; disables the delimiter
    #[arg(long = "column-widths")]
    pub column_widths: Option<String>,
    /// Fail when a source column has no counterpart in the target table
    #[arg(long)]
    pub strict: bool,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub parse: ParseArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Delimiter of the output file
    #[arg(long = "output-delimiter", value_parser = parse_delimiter, default_value = ",")]
    pub output_delimiter: u8,
    /// Only import these source columns
    #[arg(long = "import-columns", value_delimiter = ',')]
    pub import_columns: Vec<String>,
    /// Raw value that is imported as NULL
    #[arg(long = "null-string")]
    pub null_string: Option<String>,
    /// Import empty values as empty strings instead of NULL
    #[arg(long = "keep-empty-strings")]
    pub keep_empty_strings: bool,
    /// Every value is quoted; an unquoted empty value is NULL
    #[arg(long = "always-quoted")]
    pub always_quoted: bool,
    /// Trim whitespace around unquoted values
    #[arg(long)]
    pub trim: bool,
    /// Decode `\uXXXX` and similar escapes in character columns
    #[arg(long = "decode-unicode")]
    pub decode_unicode: bool,
    /// Import unparseable dates as NULL instead of failing
    #[arg(long = "illegal-date-is-null")]
    pub illegal_date_is_null: bool,
    /// Only import lines matching this regular expression
    #[arg(long = "line-filter")]
    pub line_filter: Option<String>,
    /// Row filter of the form `column=regex`; repeat for several columns
    #[arg(long = "filter", action = clap::ArgAction::Append, value_parser = parse_column_filter)]
    pub filters: Vec<(String, String)>,
    /// Allow quoted values to span several lines
    #[arg(long = "multi-line")]
    pub multi_line: bool,
    /// Null invalid values and reject malformed lines instead of stopping
    #[arg(long = "continue-on-error")]
    pub continue_on_error: bool,
    /// Skip rows where every imported value is NULL
    #[arg(long = "ignore-null-rows")]
    pub ignore_null_rows: bool,
    /// Values of CLOB/XML columns are file names holding the text
    #[arg(long = "clob-as-file")]
    pub clob_as_file: bool,
    /// How BLOB values are written in the input
    #[arg(long = "blob-mode", value_enum)]
    pub blob_mode: Option<BlobModeArg>,
    /// Number of data lines to skip before importing
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
    /// Maximum number of rows to import
    #[arg(long)]
    pub limit: Option<usize>,
    /// Print the first rows as a table instead of writing CSV
    #[arg(long, conflicts_with = "output")]
    pub preview: bool,
    /// Text written for NULL values in the output
    #[arg(long = "null-marker", default_value = "")]
    pub null_marker: String,
    /// CSV file receiving lines that could not be imported
    #[arg(long = "rejected")]
    pub rejected: Option<PathBuf>,
    /// Write a JSON summary of the run to this file (`-` for stderr)
    #[arg(long = "summary")]
    pub summary: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    #[command(flatten)]
    pub parse: ParseArgs,
    /// Only import these source columns
    #[arg(long = "import-columns", value_delimiter = ',')]
    pub import_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum QuoteEscapingArg {
    /// Quotes cannot be escaped
    None,
    /// A backslash escapes the quote
    Escape,
    /// A doubled quote stands for one quote
    Duplicate,
}

impl From<QuoteEscapingArg> for QuoteEscaping {
    fn from(value: QuoteEscapingArg) -> Self {
        match value {
            QuoteEscapingArg::None => QuoteEscaping::None,
            QuoteEscapingArg::Escape => QuoteEscaping::Escape,
            QuoteEscapingArg::Duplicate => QuoteEscaping::Duplicate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BlobModeArg {
    /// The value names a file holding the bytes
    File,
    Base64,
    Hex,
}

impl From<BlobModeArg> for BlobMode {
    fn from(value: BlobModeArg) -> Self {
        match value {
            BlobModeArg::File => BlobMode::File,
            BlobModeArg::Base64 => BlobMode::Base64,
            BlobModeArg::Hex => BlobMode::Hex,
        }
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Output delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Output delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

pub fn parse_column_filter(value: &str) -> Result<(String, String), String> {
    let (column, pattern) = value
        .split_once('=')
        .ok_or_else(|| format!("Filter '{value}' must be written as column=regex"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("Filter '{value}' is missing a column name"));
    }
    Ok((column.to_string(), pattern.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_import_flags() {
        let cli = Cli::try_parse_from([
            "textfile-import",
            "import",
            "-i",
            "in.txt",
            "-t",
            "table.yml",
            "-d",
            "\\t",
            "--filter",
            "status=^open$",
            "--blob-mode",
            "hex",
        ])
        .unwrap();
        let Commands::Import(args) = cli.command else {
            panic!("expected import command");
        };
        assert_eq!(args.parse.delimiter.as_deref(), Some("\\t"));
        assert_eq!(args.filters, vec![("status".to_string(), "^open$".to_string())]);
        assert_eq!(args.blob_mode, Some(BlobModeArg::Hex));
        assert_eq!(args.output_delimiter, b',');
    }

    #[test]
    fn rejects_malformed_filters_and_delimiters() {
        assert!(parse_column_filter("no-equals").is_err());
        assert!(parse_column_filter("=x").is_err());
        assert_eq!(parse_delimiter("tab"), Ok(b'\t'));
        assert!(parse_delimiter("ab").is_err());
    }
}
