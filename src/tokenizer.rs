//! Splits one logical line into raw field values.
//!
//! Exactly one strategy is active for a run: [`Tokenizer::Delimited`] splits on
//! an exact (possibly multi-character) delimiter while honoring quotes,
//! [`Tokenizer::FixedWidth`] cuts the line at predeclared character widths.
//! Tokenizers keep no state between lines; callers pass a reusable output
//! vector so no per-row allocation happens for the token list itself.
//!
//! A token of `None` means the tokenizer already classified the field as null
//! (an unquoted empty value when every real value is expected to be quoted).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a quote character is written inside a quoted value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEscaping {
    /// Quotes cannot appear inside values.
    None,
    /// A backslash precedes a literal quote: `\"`.
    Escape,
    /// A literal quote is written twice: `""`.
    #[default]
    Duplicate,
}

/// Quote character plus escaping convention, shared by the tokenizer and the
/// line reader so both agree on where a quoted value ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteRules {
    pub quote: Option<char>,
    pub escaping: QuoteEscaping,
}

impl QuoteRules {
    pub fn new(quote: Option<char>, escaping: QuoteEscaping) -> Self {
        Self { quote, escaping }
    }

    pub fn unquoted() -> Self {
        Self::new(None, QuoteEscaping::None)
    }

    /// Scans `text` starting in the given quote state and returns the state at
    /// the end of it.
    pub fn scan(&self, text: &str, mut open: bool) -> bool {
        let Some(quote) = self.quote else {
            return false;
        };
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if self.escaping == QuoteEscaping::Escape && ch == '\\' {
                if chars.peek() == Some(&quote) {
                    chars.next();
                }
                continue;
            }
            if ch == quote {
                if open && self.escaping == QuoteEscaping::Duplicate && chars.peek() == Some(&quote)
                {
                    chars.next();
                    continue;
                }
                open = !open;
            }
        }
        open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("quoted value starting in field {field} is not terminated")]
    UnterminatedQuote { field: usize },
}

/// Delimiter based (CSV-like) splitting.
#[derive(Debug, Clone)]
pub struct DelimitedTokenizer {
    delimiter: String,
    quotes: QuoteRules,
    trim: bool,
    unquoted_empty_is_null: bool,
}

impl DelimitedTokenizer {
    /// `delimiter` must not be empty; the caller validates configuration.
    pub fn new(delimiter: impl Into<String>, quotes: QuoteRules) -> Self {
        Self {
            delimiter: delimiter.into(),
            quotes,
            trim: false,
            unquoted_empty_is_null: false,
        }
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_unquoted_empty_is_null(mut self, enabled: bool) -> Self {
        self.unquoted_empty_is_null = enabled;
        self
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn tokenize(
        &self,
        line: &str,
        out: &mut Vec<Option<String>>,
    ) -> Result<(), TokenizeError> {
        out.clear();
        let quote = self.quotes.quote;
        let mut field = String::new();
        let mut in_quotes = false;
        let mut was_quoted = false;
        let mut rest = line;

        while let Some(ch) = rest.chars().next() {
            if !in_quotes && !self.delimiter.is_empty() && rest.starts_with(&self.delimiter) {
                out.push(self.finish_field(&mut field, was_quoted));
                was_quoted = false;
                rest = &rest[self.delimiter.len()..];
                continue;
            }
            let width = ch.len_utf8();
            if let Some(q) = quote {
                if self.quotes.escaping == QuoteEscaping::Escape
                    && ch == '\\'
                    && rest[width..].starts_with(q)
                {
                    field.push(q);
                    rest = &rest[width + q.len_utf8()..];
                    continue;
                }
                if ch == q {
                    if in_quotes
                        && self.quotes.escaping == QuoteEscaping::Duplicate
                        && rest[width..].starts_with(q)
                    {
                        field.push(q);
                        rest = &rest[width * 2..];
                        continue;
                    }
                    in_quotes = !in_quotes;
                    was_quoted = true;
                    rest = &rest[width..];
                    continue;
                }
            }
            field.push(ch);
            rest = &rest[width..];
        }

        if in_quotes {
            return Err(TokenizeError::UnterminatedQuote { field: out.len() + 1 });
        }
        out.push(self.finish_field(&mut field, was_quoted));
        Ok(())
    }

    fn finish_field(&self, field: &mut String, was_quoted: bool) -> Option<String> {
        let mut value = std::mem::take(field);
        if was_quoted {
            return Some(value);
        }
        if self.trim {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                value = trimmed.to_string();
            }
        }
        if value.is_empty() && self.unquoted_empty_is_null {
            None
        } else {
            Some(value)
        }
    }
}

/// Splits lines at fixed character widths, in source column order.
#[derive(Debug, Clone)]
pub struct FixedWidthTokenizer {
    widths: Vec<usize>,
    trim: bool,
}

impl FixedWidthTokenizer {
    pub fn new(widths: Vec<usize>) -> Self {
        Self {
            widths,
            trim: false,
        }
    }

    pub fn with_trim(mut self, trim: bool) -> Self {
        self.trim = trim;
        self
    }

    pub fn widths(&self) -> &[usize] {
        &self.widths
    }

    /// Lines shorter than the declared layout yield fewer tokens.
    pub fn tokenize(&self, line: &str, out: &mut Vec<Option<String>>) {
        out.clear();
        let mut rest = line;
        for width in &self.widths {
            if rest.is_empty() {
                break;
            }
            let end = rest
                .char_indices()
                .nth(*width)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let (value, tail) = rest.split_at(end);
            let value = if self.trim { value.trim() } else { value };
            out.push(Some(value.to_string()));
            rest = tail;
        }
    }
}

/// The active splitting strategy of a run.
#[derive(Debug, Clone)]
pub enum Tokenizer {
    Delimited(DelimitedTokenizer),
    FixedWidth(FixedWidthTokenizer),
}

impl Tokenizer {
    pub fn tokenize(
        &self,
        line: &str,
        out: &mut Vec<Option<String>>,
    ) -> Result<(), TokenizeError> {
        match self {
            Tokenizer::Delimited(tokenizer) => tokenizer.tokenize(line, out),
            Tokenizer::FixedWidth(tokenizer) => {
                tokenizer.tokenize(line, out);
                Ok(())
            }
        }
    }
}
