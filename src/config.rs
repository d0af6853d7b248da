//! Run configuration.
//!
//! [`FileConfig`] mirrors the JSON (or YAML) file as written, with defaults
//! for every missing key. [`FileConfig::resolve`] turns it into the immutable
//! [`LoadConfig`] that every pipeline stage borrows.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::{
    db::{DbConfig, postgres::DEFAULT_PORT},
    error::{ImportError, ImportResult},
    io_utils::{self, DEFAULT_CSV_DELIMITER, DEFAULT_CSV_QUOTE},
    schema::DEFAULT_SAMPLE_SIZE,
    statements::TableTarget,
};

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub dbhost: Option<String>,
    pub dbport: Option<u16>,
    pub dbname: Option<String>,
    pub dbuser: Option<String>,
    pub dbpass: Option<String>,
    pub db_schema_name: Option<String>,
    pub db_table_name: Option<String>,
    pub csv_file: Option<PathBuf>,
    pub csv_sep: String,
    pub csv_quote: String,
    pub csv_encoding: Option<String>,
    pub sample_size: usize,
    pub import_data: bool,
    pub insert_data: bool,
    pub create_table: bool,
    pub delete_data: bool,
    pub row_error_check: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dbhost: None,
            dbport: None,
            dbname: None,
            dbuser: None,
            dbpass: None,
            db_schema_name: None,
            db_table_name: None,
            csv_file: None,
            csv_sep: ",".to_string(),
            csv_quote: "\"".to_string(),
            csv_encoding: None,
            sample_size: DEFAULT_SAMPLE_SIZE,
            import_data: false,
            insert_data: false,
            create_table: true,
            delete_data: false,
            row_error_check: true,
        }
    }
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub csv_file: PathBuf,
    pub delimiter: u8,
    pub quote: u8,
    pub encoding: &'static Encoding,
    /// Rows used for inference; `0` samples the whole file.
    pub sample_size: usize,
    pub import_data: bool,
    pub insert_data: bool,
    pub create_table: bool,
    pub delete_data: bool,
    pub row_error_check: bool,
    pub target: TableTarget,
    pub database: Option<DbConfig>,
}

impl LoadConfig {
    pub fn effective_sample_size(&self) -> usize {
        if self.sample_size == 0 {
            usize::MAX
        } else {
            self.sample_size
        }
    }
}

impl FileConfig {
    /// Loads a configuration file; `.yml`/`.yaml` are read as YAML, anything else as JSON.
    pub fn load(path: &Path) -> ImportResult<Self> {
        let file = File::open(path).map_err(|err| {
            ImportError::Configuration(format!("Opening config file {}: {err}", path.display()))
        })?;
        let reader = BufReader::new(file);
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let parsed = if is_yaml {
            serde_yaml::from_reader(reader).map_err(|err| err.to_string())
        } else {
            serde_json::from_reader(reader).map_err(|err| err.to_string())
        };
        parsed.map_err(|err| {
            ImportError::Configuration(format!("Parsing config file {}: {err}", path.display()))
        })
    }

    /// Resolves the file settings into a [`LoadConfig`].
    ///
    /// `csv_file` in the config takes precedence over `cli_csv_file`;
    /// `sample_size_override` takes precedence over the config value.
    pub fn resolve(
        self,
        cli_csv_file: Option<&Path>,
        sample_size_override: Option<usize>,
    ) -> ImportResult<LoadConfig> {
        let csv_file = self
            .csv_file
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| cli_csv_file.map(Path::to_path_buf))
            .ok_or_else(|| {
                ImportError::Configuration(
                    "No input file: set csv_file in the config or pass --csv-file".to_string(),
                )
            })?;
        let delimiter = parse_delimiter(&self.csv_sep).map_err(ImportError::Configuration)?;
        let quote = parse_quote(&self.csv_quote).map_err(ImportError::Configuration)?;
        let encoding = io_utils::resolve_encoding(self.csv_encoding.as_deref())?;
        let target = TableTarget::resolve(
            &csv_file,
            self.db_schema_name.as_deref(),
            self.db_table_name.as_deref(),
        );
        let database = if self.import_data {
            Some(self.database_config()?)
        } else {
            None
        };

        Ok(LoadConfig {
            csv_file,
            delimiter,
            quote,
            encoding,
            sample_size: sample_size_override.unwrap_or(self.sample_size),
            import_data: self.import_data,
            insert_data: self.insert_data,
            create_table: self.create_table,
            delete_data: self.delete_data,
            row_error_check: self.row_error_check,
            target,
            database,
        })
    }

    fn database_config(&self) -> ImportResult<DbConfig> {
        let required = |value: &Option<String>, key: &str| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    ImportError::Configuration(format!("'{key}' is required when import_data is true"))
                })
        };
        Ok(DbConfig {
            host: self
                .dbhost
                .clone()
                .filter(|host| !host.trim().is_empty())
                .unwrap_or_else(|| "localhost".to_string()),
            port: self.dbport.unwrap_or(DEFAULT_PORT),
            dbname: required(&self.dbname, "dbname")?,
            user: required(&self.dbuser, "dbuser")?,
            password: self.dbpass.clone().filter(|pass| !pass.is_empty()),
        })
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        "" => Ok(DEFAULT_CSV_DELIMITER),
        other => single_ascii(other, "Delimiter"),
    }
}

pub fn parse_quote(value: &str) -> Result<u8, String> {
    match value {
        "" => Ok(DEFAULT_CSV_QUOTE),
        other => single_ascii(other, "Quote character"),
    }
}

fn single_ascii(value: &str, what: &str) -> Result<u8, String> {
    let mut chars = value.chars();
    let first = chars
        .next()
        .ok_or_else(|| format!("{what} cannot be empty"))?;
    if chars.next().is_some() {
        return Err(format!("{what} must be a single character"));
    }
    if !first.is_ascii() {
        return Err(format!("{what} must be ASCII"));
    }
    Ok(first as u8)
}
