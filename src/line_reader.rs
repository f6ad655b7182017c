//! Produces logical lines from a character stream.
//!
//! A logical line is one record. With multi-line records enabled, a quoted
//! value left open at the end of a physical line pulls in the following
//! physical lines, joined by the input's own line terminator so embedded
//! newlines survive into the field content.
//!
//! Physical lines are split on `\n`, `\r\n` and bare `\r`.

use std::io::{self, BufRead};

use crate::{io_utils::LineEnding, tokenizer::QuoteRules};

/// One record as read from the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    /// 1-based physical line number where the record starts.
    pub line_number: usize,
    /// Number of physical lines the record spans.
    pub physical_lines: usize,
}

pub struct LineReader<R> {
    reader: R,
    quotes: QuoteRules,
    multi_line: Option<LineEnding>,
    ignore_empty_lines: bool,
    physical_line: usize,
    pending_lf: bool,
    bytes: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R, quotes: QuoteRules) -> Self {
        Self {
            reader,
            quotes,
            multi_line: None,
            ignore_empty_lines: true,
            physical_line: 0,
            pending_lf: false,
            bytes: Vec::new(),
        }
    }

    /// Enables multi-line records joined with `ending`.
    pub fn with_multi_line(mut self, ending: Option<LineEnding>) -> Self {
        self.multi_line = ending;
        self
    }

    pub fn with_ignore_empty_lines(mut self, ignore: bool) -> Self {
        self.ignore_empty_lines = ignore;
        self
    }

    /// Number of physical lines consumed so far.
    pub fn physical_lines_read(&self) -> usize {
        self.physical_line
    }

    /// Reads the next logical line; `Ok(None)` at end of input.
    pub fn next_line(&mut self) -> io::Result<Option<LogicalLine>> {
        let mut text = loop {
            match self.read_physical()? {
                None => return Ok(None),
                Some(line) if line.is_empty() && self.ignore_empty_lines => continue,
                Some(line) => break line,
            }
        };
        let line_number = self.physical_line;
        let mut physical_lines = 1;

        if let Some(ending) = self.multi_line {
            let mut open = self.quotes.scan(&text, false);
            while open {
                let Some(next) = self.read_physical()? else {
                    break;
                };
                text.push_str(ending.as_str());
                text.push_str(&next);
                physical_lines += 1;
                open = self.quotes.scan(&next, true);
            }
        }

        Ok(Some(LogicalLine {
            text,
            line_number,
            physical_lines,
        }))
    }

    fn read_physical(&mut self) -> io::Result<Option<String>> {
        self.bytes.clear();
        let mut read_any = false;
        loop {
            let available = self.reader.fill_buf()?;
            if available.is_empty() {
                break;
            }
            if self.pending_lf {
                self.pending_lf = false;
                if available[0] == b'\n' {
                    self.reader.consume(1);
                    continue;
                }
            }
            read_any = true;
            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    self.bytes.extend_from_slice(&available[..pos]);
                    self.pending_lf = available[pos] == b'\r';
                    self.reader.consume(pos + 1);
                    break;
                }
                None => {
                    let len = available.len();
                    self.bytes.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }
        if !read_any {
            return Ok(None);
        }
        self.physical_line += 1;
        let line = String::from_utf8(std::mem::take(&mut self.bytes))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        Ok(Some(line))
    }
}

impl<R: BufRead> Iterator for LineReader<R> {
    type Item = io::Result<LogicalLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
