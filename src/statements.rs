//! SQL text for the target table.
//!
//! Every statement lists columns in ordinal order, so the DDL and each INSERT
//! always agree on positions.

use std::{fmt, path::Path};

use itertools::Itertools;

use crate::{
    data::Value,
    schema::{Column, SqlType},
};

pub const DEFAULT_SCHEMA_NAME: &str = "public";

/// PostgreSQL accepts at most this many bind parameters per statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: String,
    pub name: String,
}

impl TableTarget {
    /// Resolves the target table.
    ///
    /// Configured names win. Otherwise the table is named after the input
    /// file's stem, with a `t` prefix when the stem starts with a digit.
    pub fn resolve(
        input: &Path,
        configured_schema: Option<&str>,
        configured_table: Option<&str>,
    ) -> Self {
        let schema = non_empty(configured_schema).unwrap_or(DEFAULT_SCHEMA_NAME);
        let name = match non_empty(configured_table) {
            Some(name) => name.to_string(),
            None => table_name_from_path(input),
        };
        Self {
            schema: schema.to_string(),
            name,
        }
    }

    /// Schema and table as quoted identifiers, safe for any file stem.
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}",
            quote_identifier(&self.schema),
            quote_identifier(&self.name)
        )
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Wraps `name` in double quotes, doubling any embedded quote.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn table_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    if stem.starts_with(|c: char| c.is_ascii_digit()) {
        format!("t{stem}")
    } else {
        stem
    }
}

/// A parameterized INSERT together with the column types of its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub sql: String,
    pub column_types: Vec<SqlType>,
    pub row_count: usize,
}

#[derive(Debug, Clone)]
pub struct StatementBuilder<'a> {
    target: &'a TableTarget,
    columns: &'a [Column],
}

impl<'a> StatementBuilder<'a> {
    pub fn new(target: &'a TableTarget, columns: &'a [Column]) -> Self {
        Self { target, columns }
    }

    pub fn columns(&self) -> &'a [Column] {
        self.columns
    }

    pub fn create_table(&self) -> String {
        let definitions = self
            .columns
            .iter()
            .map(|column| {
                format!(
                    "{} {}",
                    quote_identifier(&column.name),
                    column.sql_type.ddl_name()
                )
            })
            .join(",\n");
        format!(
            "CREATE TABLE {} (\n{});",
            self.target.qualified_name(),
            definitions
        )
    }

    pub fn delete_rows(&self) -> String {
        format!("DELETE FROM {};", self.target.qualified_name())
    }

    fn insert_prefix(&self) -> String {
        let column_list = self
            .columns
            .iter()
            .map(|column| quote_identifier(&column.name))
            .join(", ");
        format!(
            "INSERT INTO {} ({column_list}) VALUES ",
            self.target.qualified_name()
        )
    }

    pub fn insert_single(&self) -> InsertStatement {
        self.insert_many(1)
    }

    /// Multi-row insert with `$n` placeholders numbered row by row.
    pub fn insert_many(&self, row_count: usize) -> InsertStatement {
        let width = self.columns.len();
        let groups = (0..row_count)
            .map(|row| {
                let placeholders = (1..=width)
                    .map(|col| format!("${}", row * width + col))
                    .join(", ");
                format!("({placeholders})")
            })
            .join(", ");
        InsertStatement {
            sql: format!("{}{groups}", self.insert_prefix()),
            column_types: self.columns.iter().map(|c| c.sql_type).collect(),
            row_count,
        }
    }

    /// Largest number of rows one multi-row statement can carry.
    pub fn max_rows_per_statement(&self) -> usize {
        (MAX_BIND_PARAMETERS / self.columns.len().max(1)).max(1)
    }

    pub fn insert_literal(&self, row: &[Value]) -> String {
        let literals = row.iter().map(Value::to_sql_literal).join(", ");
        format!("{}({literals});", self.insert_prefix())
    }
}
