//! Column model and sample-based type inference.
//!
//! [`infer_columns`] looks only at the leading sample of a file (4 000 rows by
//! default) and assigns each column the narrowest [`SqlType`] that every sampled
//! value satisfies. The type is fixed from then on. Rows past the sample are
//! never re-checked, so a value like `9999999999` appearing after an
//! all-`INTEGER` sample is sent to the database as-is and rejected there as an
//! ordinary load error.
//!
//! Decision order per column, first match wins:
//!
//! 1. no non-null values → `TEXT`
//! 2. every value integral → `INTEGER` within the signed 32-bit range, else `BIGINT`
//! 3. every value numeric → `NUMERIC` past 6 fractional digits, else `REAL`
//!    within single-precision range, else `DOUBLE PRECISION`
//! 4. every value `HH:MM[:SS]` → `TIME`
//! 5. every value a date or date-time → `TIMESTAMP` if any has a time of day, else `DATE`
//! 6. anything else → `TEXT`

use std::fmt;

use chrono::{NaiveTime, Timelike};
use log::debug;

use crate::{
    data::{
        fractional_digits, is_missing, parse_float, parse_integer, parse_temporal,
        parse_time_literal,
    },
    error::{ImportError, ImportResult},
    identifier::normalize_headers,
};

pub const DEFAULT_SAMPLE_SIZE: usize = 4000;

/// Fractional digits beyond which a float column becomes `NUMERIC`.
const MAX_FLOAT_FRACTION_DIGITS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Integer,
    BigInt,
    Real,
    Double,
    Numeric,
    Date,
    Time,
    Timestamp,
    Text,
}

impl SqlType {
    /// The type as written in `CREATE TABLE`.
    pub fn ddl_name(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP WITHOUT TIME ZONE",
            SqlType::Text => "TEXT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ddl_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ordinal: usize,
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, Default)]
struct TypeCandidate {
    non_null: usize,
    integer_matches: usize,
    integer_min: i64,
    integer_max: i64,
    float_matches: usize,
    float_max_abs: f64,
    float_max_fraction: usize,
    time_matches: usize,
    temporal_matches: usize,
    temporal_has_time: bool,
}

impl TypeCandidate {
    fn update(&mut self, value: &str) {
        if is_missing(value) {
            return;
        }
        self.non_null += 1;

        if let Some(parsed) = parse_integer(value) {
            if self.integer_matches == 0 {
                self.integer_min = parsed;
                self.integer_max = parsed;
            } else {
                self.integer_min = self.integer_min.min(parsed);
                self.integer_max = self.integer_max.max(parsed);
            }
            self.integer_matches += 1;
        }

        if let Some(parsed) = parse_float(value) {
            self.float_matches += 1;
            self.float_max_abs = self.float_max_abs.max(parsed.abs());
            self.float_max_fraction = self.float_max_fraction.max(fractional_digits(value));
        }

        if parse_time_literal(value).is_some() {
            self.time_matches += 1;
        } else if let Some(parsed) = parse_temporal(value) {
            self.temporal_matches += 1;
            if has_clock_component(&parsed.time()) {
                self.temporal_has_time = true;
            }
        }
    }

    fn all(&self, count: usize) -> bool {
        count == self.non_null
    }

    fn decide(&self) -> SqlType {
        if self.non_null == 0 {
            return SqlType::Text;
        }
        if self.all(self.integer_matches) {
            let fits_i32 = self.integer_min >= i64::from(i32::MIN)
                && self.integer_max <= i64::from(i32::MAX);
            return if fits_i32 {
                SqlType::Integer
            } else {
                SqlType::BigInt
            };
        }
        if self.all(self.float_matches) {
            return if self.float_max_fraction > MAX_FLOAT_FRACTION_DIGITS {
                SqlType::Numeric
            } else if self.float_max_abs <= f64::from(f32::MAX) {
                SqlType::Real
            } else {
                SqlType::Double
            };
        }
        if self.all(self.time_matches) {
            return SqlType::Time;
        }
        if self.all(self.temporal_matches) {
            return if self.temporal_has_time {
                SqlType::Timestamp
            } else {
                SqlType::Date
            };
        }
        SqlType::Text
    }
}

fn has_clock_component(time: &NaiveTime) -> bool {
    time.hour() != 0 || time.minute() != 0 || time.second() != 0
}

/// Infers one type from the sampled values of a single column.
pub fn infer_sql_type<'a, I>(values: I) -> SqlType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut candidate = TypeCandidate::default();
    for value in values {
        candidate.update(value);
    }
    candidate.decide()
}

/// Normalizes the headers and infers a type for every column from `sample`.
///
/// `sample` must already be cut to the configured sample size; every record is
/// expected to have been padded to the header width.
pub fn infer_columns(headers: &[String], sample: &[Vec<String>]) -> ImportResult<Vec<Column>> {
    let names = normalize_headers(headers)?;
    let mut candidates = vec![TypeCandidate::default(); names.len()];
    for (row_idx, record) in sample.iter().enumerate() {
        if record.len() != names.len() {
            return Err(ImportError::Input(format!(
                "sample row {} has {} field(s), expected {}",
                row_idx + 1,
                record.len(),
                names.len()
            )));
        }
        for (candidate, value) in candidates.iter_mut().zip(record) {
            candidate.update(value);
        }
    }

    let columns = names
        .into_iter()
        .zip(candidates)
        .enumerate()
        .map(|(ordinal, (name, candidate))| {
            let sql_type = candidate.decide();
            debug!(
                "Column {ordinal} '{name}' -> {sql_type} ({} non-null sampled)",
                candidate.non_null
            );
            Column {
                name,
                ordinal,
                sql_type,
            }
        })
        .collect();
    Ok(columns)
}
