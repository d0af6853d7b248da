use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer a PostgreSQL table from a CSV file and load it in one transaction",
    long_about = None
)]
pub struct Cli {
    /// JSON (or YAML) configuration file
    pub config: PathBuf,
    /// Input CSV file, used when the configuration does not name one
    #[arg(long = "csv-file", alias = "csv_file")]
    pub csv_file: Option<PathBuf>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long = "sample-size")]
    pub sample_size: Option<usize>,
}
