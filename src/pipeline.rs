use std::io;

use anyhow::{Context, Result};
use log::info;

use crate::{
    config::LoadConfig,
    db::PgDatabase,
    dry_run,
    error::ImportResult,
    io_utils::{self, RawTable},
    loader::{LoadOutcome, Loader, PromptConfirm},
    printable_delimiter,
    schema::{Column, infer_columns},
    statements::StatementBuilder,
};

/// Input read, headers normalized and types inferred; nothing executed yet.
#[derive(Debug, Clone)]
pub struct PreparedImport {
    pub table: RawTable,
    pub columns: Vec<Column>,
}

impl PreparedImport {
    pub fn statements<'a>(&'a self, config: &'a LoadConfig) -> StatementBuilder<'a> {
        StatementBuilder::new(&config.target, &self.columns)
    }
}

pub fn prepare(config: &LoadConfig) -> ImportResult<PreparedImport> {
    info!(
        "Reading '{}' (delimiter '{}', quote '{}')",
        config.csv_file.display(),
        printable_delimiter(config.delimiter),
        config.quote as char
    );
    let table = io_utils::read_table_from_path(
        &config.csv_file,
        config.delimiter,
        config.quote,
        config.encoding,
    )?;
    let sample = table.sample(config.effective_sample_size());
    let columns = infer_columns(&table.headers, sample)?;
    info!(
        "Inferred {} column(s) from {} sampled row(s) of {}",
        columns.len(),
        sample.len(),
        table.row_count()
    );
    Ok(PreparedImport { table, columns })
}

/// Runs one import end to end.
///
/// A load that fails inside the database is reported and rolled back, and
/// still returns `Ok`; only configuration, input and connection problems are
/// returned as errors.
pub fn execute(config: &LoadConfig) -> Result<()> {
    let prepared = prepare(config)
        .with_context(|| format!("Preparing import of {:?}", config.csv_file))?;
    let statements = prepared.statements(config);

    if !config.import_data {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        dry_run::render(config, &statements, &prepared.table.records, &mut out)
            .context("Writing SQL to stdout")?;
        return Ok(());
    }

    let db_config = config
        .database
        .as_ref()
        .context("import_data is set but no database settings were resolved")?;
    let mut db = PgDatabase::connect(db_config).with_context(|| {
        format!(
            "Connecting to {}:{}/{}",
            db_config.host, db_config.port, db_config.dbname
        )
    })?;

    let loader = Loader::new(
        &mut db,
        config,
        statements,
        PromptConfirm::stdin(),
        io::stdout(),
    );
    match loader.run(&prepared.table.records) {
        LoadOutcome::Committed(summary) => info!(
            "Import finished: {} row(s) inserted into {}",
            summary.rows_inserted, config.target
        ),
        LoadOutcome::RolledBack { stage, .. } => {
            info!("Import of {} rolled back during {stage}", config.target)
        }
    }
    Ok(())
}
