//! Literal SQL output for review instead of execution.
//!
//! Produces the same CREATE and DELETE text the loader would execute, then one
//! INSERT per row with values inlined as literals. No connection is opened.

use std::io::{self, Write};

use log::info;

use crate::{coerce::coerce_row, config::LoadConfig, statements::StatementBuilder};

/// Writes the statements for `records` to `out` and returns how many were written.
pub fn render<W: Write>(
    config: &LoadConfig,
    statements: &StatementBuilder<'_>,
    records: &[Vec<String>],
    out: &mut W,
) -> io::Result<usize> {
    let mut written = 0usize;
    if config.create_table {
        writeln!(out, "{}", statements.create_table())?;
        written += 1;
    }
    if config.delete_data {
        writeln!(out, "{}", statements.delete_rows())?;
        written += 1;
    }
    if config.insert_data {
        for raw in records {
            let row = coerce_row(raw, statements.columns());
            writeln!(out, "{}", statements.insert_literal(&row))?;
            written += 1;
        }
    }
    out.flush()?;
    info!("Rendered {written} statement(s) for {}", config.target);
    Ok(written)
}
