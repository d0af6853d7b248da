//! Transactional load of a prepared import.
//!
//! One run owns one transaction:
//!
//! ```text
//! Idle -> TransactionOpen -> TableCreated? -> TruncateConfirmed? -> RowsLoading -> Committed
//!                  \______________________________________________________________-> RolledBack
//! ```
//!
//! Any failure after `BEGIN` rolls the whole transaction back, including rows
//! that were inserted before the failing one. Errors are reported through
//! [`LoadOutcome::RolledBack`] rather than propagated, so a failed load still
//! ends the process normally.

use std::{
    fmt,
    io::{self, BufRead, Write},
    slice,
};

use log::{error, info, warn};

use crate::{
    coerce::{Row, coerce_row},
    config::LoadConfig,
    db::{Database, Transaction},
    error::{ImportError, ImportResult},
    statements::StatementBuilder,
};

const PROGRESS_SLOTS: usize = 10;

/// Asks for permission before the destructive `DELETE`.
pub trait Confirm {
    /// Returns true only when the operator agreed to run `statement`.
    fn confirm(&mut self, statement: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, statement: &str) -> bool {
        self(statement)
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

/// Asks on `output` and reads one answer line from `input`.
#[derive(Debug)]
pub struct PromptConfirm<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn prompt(&mut self, statement: &str) -> io::Result<()> {
        writeln!(self.output, "Really want to truncate the destination table?")?;
        writeln!(self.output, "{statement}")?;
        write!(self.output, "yes/no: ")?;
        self.output.flush()
    }
}

impl PromptConfirm<io::StdinLock<'static>, io::Stdout> {
    /// Prompts on stdout and reads from stdin.
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<R, W> {
    fn confirm(&mut self, statement: &str) -> bool {
        if let Err(err) = self.prompt(statement) {
            warn!("Could not write confirmation prompt: {err}");
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => is_affirmative(&answer),
            Err(err) => {
                warn!("Could not read confirmation: {err}");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    TransactionOpen,
    TableCreated,
    TruncateConfirmed,
    RowsLoading,
    Committing,
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadStage::TransactionOpen => "transaction open",
            LoadStage::TableCreated => "create table",
            LoadStage::TruncateConfirmed => "delete rows",
            LoadStage::RowsLoading => "insert rows",
            LoadStage::Committing => "commit",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TruncateOutcome {
    NotRequested,
    Declined,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub table_created: bool,
    pub truncate: TruncateOutcome,
    pub rows_inserted: u64,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Committed(LoadSummary),
    RolledBack { stage: LoadStage, error: ImportError },
}

impl LoadOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, LoadOutcome::Committed(_))
    }
}

/// Emits one marker for every tenth of the rows processed.
#[derive(Debug, Clone)]
pub struct ProgressMarker {
    total: usize,
    emitted: usize,
}

impl ProgressMarker {
    pub fn new(total: usize) -> Self {
        Self { total, emitted: 0 }
    }

    /// Returns how many new markers are due after `processed` rows.
    pub fn advance(&mut self, processed: usize) -> usize {
        if self.total == 0 {
            return 0;
        }
        let due = (processed.min(self.total) * PROGRESS_SLOTS) / self.total;
        let fresh = due.saturating_sub(self.emitted);
        self.emitted += fresh;
        fresh
    }
}

pub struct Loader<'a, D, C, W>
where
    D: Database + ?Sized,
    C: Confirm,
    W: Write,
{
    db: &'a mut D,
    config: &'a LoadConfig,
    statements: StatementBuilder<'a>,
    confirm: C,
    out: W,
}

impl<'a, D, C, W> Loader<'a, D, C, W>
where
    D: Database + ?Sized,
    C: Confirm,
    W: Write,
{
    pub fn new(
        db: &'a mut D,
        config: &'a LoadConfig,
        statements: StatementBuilder<'a>,
        confirm: C,
        out: W,
    ) -> Self {
        Self {
            db,
            config,
            statements,
            confirm,
            out,
        }
    }

    /// Runs the load for `records` (raw cells, in file order).
    pub fn run(mut self, records: &[Vec<String>]) -> LoadOutcome {
        let statements = self.statements.clone();
        let config = self.config;
        let mut stage = LoadStage::TransactionOpen;

        let mut tx = match Transaction::begin(&mut *self.db) {
            Ok(tx) => tx,
            Err(source) => {
                return report_failure(&mut self.out, stage, ImportError::Transaction(source));
            }
        };

        let result = load_steps(
            &mut tx,
            config,
            &statements,
            &mut self.confirm,
            &mut self.out,
            records,
            &mut stage,
        );

        match result {
            Ok(summary) => {
                stage = LoadStage::Committing;
                match tx.commit() {
                    Ok(()) => {
                        info!(
                            "Committed {} row(s) into {}",
                            summary.rows_inserted, config.target
                        );
                        let _ = writeln!(self.out, "Done");
                        LoadOutcome::Committed(summary)
                    }
                    Err(source) => {
                        report_failure(&mut self.out, stage, ImportError::Transaction(source))
                    }
                }
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {rollback_err}");
                }
                report_failure(&mut self.out, stage, err)
            }
        }
    }
}

fn report_failure<W: Write>(out: &mut W, stage: LoadStage, error: ImportError) -> LoadOutcome {
    error!("Load failed during {stage}: {error}");
    let _ = writeln!(out, "Error occurred during database operation: {error}");
    let _ = writeln!(out, "Transaction rolled back due to error.");
    LoadOutcome::RolledBack { stage, error }
}

fn load_steps<D, C, W>(
    tx: &mut Transaction<'_, D>,
    config: &LoadConfig,
    statements: &StatementBuilder<'_>,
    confirm: &mut C,
    out: &mut W,
    records: &[Vec<String>],
    stage: &mut LoadStage,
) -> ImportResult<LoadSummary>
where
    D: Database + ?Sized,
    C: Confirm,
    W: Write,
{
    let mut summary = LoadSummary {
        table_created: false,
        truncate: TruncateOutcome::NotRequested,
        rows_inserted: 0,
    };

    if config.create_table {
        *stage = LoadStage::TableCreated;
        tx.execute(&statements.create_table())
            .map_err(|source| ImportError::SchemaCreation {
                table: config.target.qualified_name(),
                source,
            })?;
        summary.table_created = true;
        info!("Created table {}", config.target);
    }

    if config.delete_data {
        *stage = LoadStage::TruncateConfirmed;
        let delete = statements.delete_rows();
        if confirm.confirm(&delete) {
            tx.execute(&delete).map_err(|source| ImportError::Delete {
                table: config.target.qualified_name(),
                source,
            })?;
            summary.truncate = TruncateOutcome::Deleted;
            info!("Deleted existing rows from {}", config.target);
        } else {
            summary.truncate = TruncateOutcome::Declined;
            info!("Delete declined; keeping existing rows in {}", config.target);
        }
    }

    if config.insert_data {
        *stage = LoadStage::RowsLoading;
        let _ = writeln!(out, "Inserting rows");
        summary.rows_inserted = if config.row_error_check {
            insert_row_checked(tx, statements, out, records)?
        } else {
            insert_batch(tx, statements, records)?
        };
    }

    Ok(summary)
}

/// Inserts rows one statement at a time; the first failure is terminal.
fn insert_row_checked<D, W>(
    tx: &mut Transaction<'_, D>,
    statements: &StatementBuilder<'_>,
    out: &mut W,
    records: &[Vec<String>],
) -> ImportResult<u64>
where
    D: Database + ?Sized,
    W: Write,
{
    let statement = statements.insert_single();
    let mut progress = ProgressMarker::new(records.len());
    let _ = write!(out, "[{}]\r[", " ".repeat(PROGRESS_SLOTS));
    let _ = out.flush();

    let mut inserted = 0u64;
    for (idx, raw) in records.iter().enumerate() {
        let row = coerce_row(raw, statements.columns());
        match tx.insert(&statement, slice::from_ref(&row)) {
            Ok(count) => inserted += count,
            Err(source) => {
                let _ = writeln!(out);
                return Err(ImportError::RowLoad {
                    row: idx + 1,
                    source,
                });
            }
        }
        let markers = progress.advance(idx + 1);
        if markers > 0 {
            let _ = write!(out, "{}", ".".repeat(markers));
            let _ = out.flush();
        }
    }
    let _ = writeln!(out, "]");
    Ok(inserted)
}

/// Buffers every coerced row, then submits them as one multi-row insert.
///
/// A row set larger than the bind-parameter limit is split into consecutive
/// statements inside the same transaction, so the load stays all-or-nothing.
fn insert_batch<D>(
    tx: &mut Transaction<'_, D>,
    statements: &StatementBuilder<'_>,
    records: &[Vec<String>],
) -> ImportResult<u64>
where
    D: Database + ?Sized,
{
    let rows: Vec<Row> = records
        .iter()
        .map(|raw| coerce_row(raw, statements.columns()))
        .collect();
    if rows.is_empty() {
        return Ok(0);
    }

    let mut inserted = 0u64;
    for chunk in rows.chunks(statements.max_rows_per_statement()) {
        let statement = statements.insert_many(chunk.len());
        inserted += tx
            .insert(&statement, chunk)
            .map_err(|source| ImportError::BatchLoad {
                rows: rows.len(),
                source,
            })?;
    }
    Ok(inserted)
}
