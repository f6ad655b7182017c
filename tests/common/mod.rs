#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use textfile_import::schema::{ColumnType, TableDefinition, TargetColumn};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    /// Writes a YAML table definition and returns its path.
    pub fn write_table(&self, name: &str, table: &TableDefinition) -> PathBuf {
        let yaml = serde_yaml::to_string(table).expect("serialize table");
        self.write(name, &yaml)
    }
}

/// Builds a table definition from `(name, type)` pairs.
pub fn table(name: &str, columns: &[(&str, ColumnType)]) -> TableDefinition {
    TableDefinition::new(
        name,
        columns
            .iter()
            .map(|(column, datatype)| TargetColumn::new(*column, *datatype))
            .collect(),
    )
}

pub fn person_table() -> TableDefinition {
    table(
        "person",
        &[
            ("id", ColumnType::Integer),
            ("name", ColumnType::String),
            ("born", ColumnType::Date),
            ("score", ColumnType::Decimal),
        ],
    )
}
