pub mod cli;
pub mod coerce;
pub mod config;
pub mod data;
pub mod db;
pub mod dry_run;
pub mod error;
pub mod identifier;
pub mod io_utils;
pub mod loader;
pub mod pipeline;
pub mod schema;
pub mod statements;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug};

use crate::{cli::Cli, config::FileConfig};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv2pg", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let file_config = FileConfig::load(&cli.config)
        .with_context(|| format!("Loading configuration from {:?}", cli.config))?;
    let config = file_config
        .resolve(cli.csv_file.as_deref(), cli.sample_size)
        .context("Resolving configuration")?;
    debug!(
        "Target {} (import_data={}, create_table={}, delete_data={}, insert_data={}, row_error_check={}, sample_size={})",
        config.target,
        config.import_data,
        config.create_table,
        config.delete_data,
        config.insert_data,
        config.row_error_check,
        config.sample_size
    );
    pipeline::execute(&config)
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
