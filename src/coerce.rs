//! Per-row conversion from raw text cells to tagged [`Value`]s.
//!
//! Missing cells become [`Value::Null`]. A cell that does not parse as its
//! column's type is forwarded as [`Value::Text`] unchanged; no validation
//! happens here and the database reports the mismatch when the row is loaded.

use chrono::NaiveTime;

use crate::{
    data::{
        Value, is_missing, is_short_time_literal, parse_decimal, parse_float, parse_integer,
        parse_temporal, parse_time_literal,
    },
    schema::{Column, SqlType},
};

pub type Row = Vec<Value>;

pub fn coerce_value(raw: &str, sql_type: SqlType) -> Value {
    if is_missing(raw) {
        return Value::Null;
    }
    let parsed = match sql_type {
        SqlType::Integer | SqlType::BigInt => parse_integer(raw).map(Value::Integer),
        SqlType::Real | SqlType::Double => parse_float(raw).map(Value::Float),
        SqlType::Numeric => parse_decimal(raw).map(Value::Numeric),
        SqlType::Time => coerce_time(raw).map(Value::Time),
        SqlType::Date => parse_temporal(raw).map(|ts| Value::Date(ts.date())),
        SqlType::Timestamp => parse_temporal(raw).map(Value::Timestamp),
        SqlType::Text => None,
    };
    parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
}

/// `HH:MM` gains a `:00` seconds field; other time strings parse as written.
fn coerce_time(raw: &str) -> Option<NaiveTime> {
    if is_short_time_literal(raw) {
        let widened = format!("{raw}:00");
        return NaiveTime::parse_from_str(&widened, "%H:%M:%S").ok();
    }
    parse_time_literal(raw)
}

/// Coerces one record against the resolved column list.
///
/// The output always has one value per column; absent trailing cells are null.
pub fn coerce_row(raw: &[String], columns: &[Column]) -> Row {
    columns
        .iter()
        .map(|column| {
            let cell = raw.get(column.ordinal).map(String::as_str).unwrap_or("");
            coerce_value(cell, column.sql_type)
        })
        .collect()
}
