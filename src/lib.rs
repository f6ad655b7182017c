//! Streaming import of delimited and fixed-width text files.
//!
//! A [`parser::TextFileParser`] reads an input line by line, resolves its
//! columns against a target table once, decodes every line into a row of
//! typed [`data::Value`]s and hands the rows to a [`sink::RowSink`].
//!
//! ```no_run
//! use textfile_import::{
//!     io_utils::InputSource, options::ImportOptions, parser::TextFileParser,
//!     schema::TableDefinition, sink::MemorySink,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let table = TableDefinition::load("person.yml".as_ref())?;
//! let mut parser = TextFileParser::new(ImportOptions::default());
//! let mut sink = MemorySink::new();
//! let summary = parser.process(&InputSource::file("person.csv"), &table, &mut sink)?;
//! println!("{} rows", summary.rows_imported);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod columns_cmd;
pub mod data;
pub mod decode;
pub mod error;
pub mod import_cmd;
pub mod io_utils;
pub mod line_reader;
pub mod lob;
pub mod mapping;
pub mod messages;
pub mod modifiers;
pub mod options;
pub mod parser;
pub mod schema;
pub mod sink;
pub mod table;
pub mod text;
pub mod tokenizer;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

pub use crate::error::{ImportError, Result as ImportResult};
pub use crate::parser::{CancellationToken, ImportState, ImportSummary, TextFileParser};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("textfile_import", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Import(args) => import_cmd::execute(&args),
        Commands::Columns(args) => columns_cmd::execute(&args),
    }
}
