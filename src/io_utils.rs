//! Input and output plumbing: where text comes from, how it is decoded, and
//! where CSV output goes.
//!
//! - **Input sources**: an import reads either a file on disk or an in-memory
//!   string. Both can be opened more than once, which the driver relies on when
//!   it sniffs the line ending before streaming.
//! - **Encoding**: input bytes are transcoded to UTF-8 via `encoding_rs_io`,
//!   with BOM sniffing; labels resolve through `encoding_rs`.
//! - **Line endings**: [`detect_line_ending`] looks at the first chunk of the
//!   input to learn the terminator that multi-line records re-insert.
//! - **Output**: CSV writers always quote, mirroring how rows are re-read.

use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write},
    path::{Path, PathBuf},
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use encoding_rs_io::DecodeReaderBytesBuilder;

use crate::error::{ImportError, Result};

const LINE_ENDING_SAMPLE_BYTES: usize = 64 * 1024;

/// Where the text of one import comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    File(PathBuf),
    Text { name: String, content: String },
}

impl InputSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        InputSource::File(path.into())
    }

    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        InputSource::Text {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Human readable name used in logs and messages.
    pub fn display_name(&self) -> String {
        match self {
            InputSource::File(path) => path.display().to_string(),
            InputSource::Text { name, .. } => name.clone(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            InputSource::File(path) => Some(path),
            InputSource::Text { .. } => None,
        }
    }

    /// Directory used to resolve relative LOB file names.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.path()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
    }

    /// Opens a fresh, decoded, buffered reader positioned at the start.
    pub fn open(&self, encoding: &'static Encoding) -> Result<Box<dyn BufRead>> {
        match self {
            InputSource::File(path) => {
                let file = File::open(path).map_err(|err| {
                    ImportError::io(format!("opening input file {path:?}"), err)
                })?;
                Ok(decoded_reader(file, encoding))
            }
            // In-memory text is already UTF-8; the encoding only applies to bytes on disk.
            InputSource::Text { content, .. } => {
                Ok(Box::new(Cursor::new(content.clone().into_bytes())))
            }
        }
    }
}

fn decoded_reader<R>(reader: R, encoding: &'static Encoding) -> Box<dyn BufRead>
where
    R: Read + 'static,
{
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(encoding))
        .bom_override(true)
        .build(reader);
    Box::new(BufReader::new(decoder))
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label.map(str::trim).filter(|l| !l.is_empty()) {
        Some(value) => {
            Encoding::for_label(value.as_bytes()).ok_or_else(|| ImportError::UnknownEncoding {
                label: value.to_string(),
            })
        }
        None => Ok(UTF_8),
    }
}

/// Line terminator observed in an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// Reads the beginning of `reader` and reports the first line terminator found.
///
/// Returns `None` when the sample contains no terminator at all.
pub fn detect_line_ending<R: Read>(reader: R) -> io::Result<Option<LineEnding>> {
    let mut sample = Vec::with_capacity(4096);
    reader
        .take(LINE_ENDING_SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)?;
    Ok(line_ending_of(&sample))
}

fn line_ending_of(sample: &[u8]) -> Option<LineEnding> {
    let pos = sample.iter().position(|b| *b == b'\n' || *b == b'\r')?;
    if sample[pos] == b'\n' {
        return Some(LineEnding::Lf);
    }
    match sample.get(pos + 1) {
        Some(b'\n') => Some(LineEnding::CrLf),
        _ => Some(LineEnding::Cr),
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// Opens a CSV writer on `path` (stdout for `None` or `-`).
pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> io::Result<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(File::create(p)?)),
        _ => Box::new(io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(base))
}
