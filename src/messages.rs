//! Cumulative, human-readable log of one import run.
//!
//! This is the record shown to the user after an import; `log` output is for
//! operators. Both are written for every warning and error.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(MessageLevel::Info, text.into());
    }

    pub fn warning(&mut self, text: impl Into<String>) {
        self.push(MessageLevel::Warning, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(MessageLevel::Error, text.into());
    }

    fn push(&mut self, level: MessageLevel, text: String) {
        self.entries.push(Message { level, text });
    }

    pub fn entries(&self) -> &[Message] {
        &self.entries
    }

    pub fn count(&self, level: MessageLevel) -> usize {
        self.entries.iter().filter(|m| m.level == level).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(MessageLevel::Error) > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.count(MessageLevel::Warning) > 0
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|m| m.text.contains(needle))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Display for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let prefix = match entry.level {
                MessageLevel::Info => "",
                MessageLevel::Warning => "Warning: ",
                MessageLevel::Error => "Error: ",
            };
            writeln!(f, "{prefix}{}", entry.text)?;
        }
        Ok(())
    }
}
