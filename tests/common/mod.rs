#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv2pg::{
    coerce::Row,
    config::{FileConfig, LoadConfig},
    db::{Database, DbError},
    schema::SqlType,
    statements::InsertStatement,
};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Resolves a load configuration for `csv` with the given mode flags.
pub fn load_config(csv: &Path, configure: impl FnOnce(&mut FileConfig)) -> LoadConfig {
    let mut file_config = FileConfig::default();
    configure(&mut file_config);
    file_config.resolve(Some(csv), None).expect("resolve config")
}

/// Ten rows of `id,name`; row 5 has an empty name.
pub fn ten_rows_with_gap_at_five() -> String {
    let mut csv = String::from("id,name\n");
    for id in 1..=10 {
        if id == 5 {
            csv.push_str("5,\n");
        } else {
            csv.push_str(&format!("{id},name{id}\n"));
        }
    }
    csv
}

/// In-memory stand-in for a database connection.
///
/// Rows inserted inside a transaction stay pending until `COMMIT`; `ROLLBACK`
/// discards them. Columns listed in `not_null` reject null values, failing the
/// whole statement.
#[derive(Debug, Default)]
pub struct ScriptedDatabase {
    pub executed: Vec<String>,
    pub committed: Vec<Row>,
    pub bound_types: Vec<Vec<SqlType>>,
    pub insert_calls: usize,
    pub rows_attempted: usize,
    pending: Vec<Row>,
    not_null: Vec<usize>,
    failing_prefix: Option<String>,
}

impl ScriptedDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_not_null(mut self, column: usize) -> Self {
        self.not_null.push(column);
        self
    }

    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.failing_prefix = Some(prefix.to_string());
        self
    }

    pub fn pending_rows(&self) -> usize {
        self.pending.len()
    }

    pub fn saw(&self, statement: &str) -> bool {
        self.executed.iter().any(|s| s == statement)
    }
}

impl Database for ScriptedDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        self.executed.push(sql.to_string());
        if let Some(prefix) = &self.failing_prefix {
            if sql.starts_with(prefix.as_str()) {
                return Err(DbError::Rejected(format!("rejected: {prefix}")));
            }
        }
        match sql {
            "BEGIN" => self.pending.clear(),
            "COMMIT" => self.committed.append(&mut self.pending),
            "ROLLBACK" => self.pending.clear(),
            _ => {}
        }
        Ok(())
    }

    fn insert(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64, DbError> {
        self.executed.push(statement.sql.clone());
        self.bound_types.push(statement.column_types.clone());
        self.insert_calls += 1;
        self.rows_attempted += rows.len();
        for row in rows {
            if let Some(column) = self.not_null.iter().find(|&&c| row[c].is_null()) {
                return Err(DbError::Rejected(format!(
                    "null value in column {column} violates not-null constraint"
                )));
            }
        }
        self.pending.extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }
}
