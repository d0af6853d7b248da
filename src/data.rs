use std::{fmt, str::FromStr, sync::OnceLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use rust_decimal::Decimal;

/// Cell tokens treated as missing, alongside the empty string.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y.%m.%d",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
];

/// A single coerced cell.
///
/// The tag is chosen once, from the column's inferred type, and is never
/// reinterpreted afterwards. `Text` also carries values that failed to parse
/// as their column's type; the database rejects those at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Numeric(Decimal),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Numeric(d) => d.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Time(t) => format_time(t),
            Value::Timestamp(ts) => {
                if ts.nanosecond() == 0 {
                    ts.format("%Y-%m-%d %H:%M:%S").to_string()
                } else {
                    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
                }
            }
            Value::Text(s) => s.clone(),
        }
    }

    /// Renders the value as a SQL literal for statement text.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(_) | Value::Numeric(_) => self.as_display(),
            Value::Float(f) if f.is_finite() => self.as_display(),
            Value::Float(f) => quote_literal(&f.to_string()),
            Value::Date(_) | Value::Time(_) | Value::Timestamp(_) | Value::Text(_) => {
                quote_literal(&self.as_display())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

fn format_time(time: &NaiveTime) -> String {
    if time.nanosecond() == 0 {
        time.format("%H:%M:%S").to_string()
    } else {
        time.format("%H:%M:%S%.f").to_string()
    }
}

pub fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Returns true for cells that load as SQL `NULL`.
pub fn is_missing(value: &str) -> bool {
    value.is_empty() || MISSING_TOKENS.contains(&value)
}

pub fn parse_integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Parses a finite floating-point number. Spelled-out infinities are refused.
pub fn parse_float(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if !trimmed.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let trimmed = value.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok()
}

/// Counts the digits written after the decimal point, ignoring any exponent.
pub fn fractional_digits(value: &str) -> usize {
    let mantissa = value
        .trim()
        .split(['e', 'E'])
        .next()
        .unwrap_or_default();
    match mantissa.split_once('.') {
        Some((_, fraction)) => fraction.bytes().filter(u8::is_ascii_digit).count(),
        None => 0,
    }
}

fn time_literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<hour>\d{2}):(?P<minute>\d{2})(?::(?P<second>\d{2}))?$")
            .expect("time literal pattern is valid")
    })
}

/// Matches a time-only literal of the form `HH:MM` or `HH:MM:SS`.
pub fn parse_time_literal(value: &str) -> Option<NaiveTime> {
    let trimmed = value.trim();
    if !time_literal_pattern().is_match(trimmed) {
        return None;
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .ok()
}

/// True when the value is exactly `HH:MM` without a seconds component.
pub fn is_short_time_literal(value: &str) -> bool {
    time_literal_pattern()
        .captures(value)
        .is_some_and(|caps| caps.name("second").is_none())
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parses a date-time literal. Offsets are converted to UTC and dropped.
pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%#z") {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
}

/// Parses either a date-time or a bare date (taken as midnight).
pub fn parse_temporal(value: &str) -> Option<NaiveDateTime> {
    parse_naive_datetime(value).or_else(|| {
        parse_naive_date(value).and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}
