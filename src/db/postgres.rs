//! PostgreSQL implementation of [`Database`] on top of `tokio-postgres`.
//!
//! The pipeline is synchronous, so the client is driven by a private
//! current-thread runtime and every call blocks until its round-trip finishes.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, error};
use rust_decimal::Decimal;
use tokio::runtime::{Builder, Runtime};
use tokio_postgres::{
    Client, NoTls, Statement,
    types::{ToSql, Type},
};

use super::{Database, DbError};
use crate::{coerce::Row, data::Value, schema::SqlType, statements::InsertStatement};

pub const DEFAULT_PORT: u16 = 5432;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
}

pub struct PgDatabase {
    runtime: Runtime,
    client: Client,
    prepared: Option<(String, Statement)>,
}

impl PgDatabase {
    pub fn connect(config: &DbConfig) -> Result<Self, DbError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.dbname)
            .user(&config.user);
        if let Some(password) = &config.password {
            pg_config.password(password);
        }

        let (client, connection) = runtime.block_on(pg_config.connect(NoTls))?;
        runtime.spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {e}");
            }
        });
        debug!(
            "Connected to {}:{}/{} as {}",
            config.host, config.port, config.dbname, config.user
        );
        Ok(Self {
            runtime,
            client,
            prepared: None,
        })
    }

    /// Prepares `statement` with explicit parameter types, reusing the previous
    /// statement when the text is unchanged.
    ///
    /// Parameter types come from the inferred columns; the server casts them
    /// into the target table's column types.
    fn statement_for(&mut self, statement: &InsertStatement) -> Result<Statement, DbError> {
        if let Some((cached_sql, prepared)) = &self.prepared {
            if *cached_sql == statement.sql {
                return Ok(prepared.clone());
            }
        }
        let types = parameter_types(statement);
        let prepared = self
            .runtime
            .block_on(self.client.prepare_typed(&statement.sql, &types))?;
        self.prepared = Some((statement.sql.clone(), prepared.clone()));
        Ok(prepared)
    }
}

impl Database for PgDatabase {
    fn execute(&mut self, sql: &str) -> Result<(), DbError> {
        debug!("Executing: {sql}");
        self.runtime.block_on(self.client.batch_execute(sql))?;
        Ok(())
    }

    fn insert(&mut self, statement: &InsertStatement, rows: &[Row]) -> Result<u64, DbError> {
        let width = statement.column_types.len();
        if rows.len() != statement.row_count || rows.iter().any(|row| row.len() != width) {
            return Err(DbError::Rejected(format!(
                "statement expects {} row(s) of {} value(s)",
                statement.row_count, width
            )));
        }

        let params: Vec<Box<dyn ToSql + Sync + Send>> = rows
            .iter()
            .flat_map(|row| {
                row.iter()
                    .zip(&statement.column_types)
                    .map(|(value, sql_type)| value_to_param(value, *sql_type))
            })
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let prepared = self.statement_for(statement)?;
        let affected = self
            .runtime
            .block_on(self.client.execute(&prepared, &param_refs))?;
        Ok(affected)
    }
}

/// Wire type bound for each parameter of a column of `sql_type`.
pub fn parameter_type(sql_type: SqlType) -> Type {
    match sql_type {
        SqlType::Integer => Type::INT4,
        SqlType::BigInt => Type::INT8,
        SqlType::Real => Type::FLOAT4,
        SqlType::Double => Type::FLOAT8,
        SqlType::Numeric => Type::NUMERIC,
        SqlType::Date => Type::DATE,
        SqlType::Time => Type::TIME,
        SqlType::Timestamp => Type::TIMESTAMP,
        SqlType::Text => Type::TEXT,
    }
}

/// Parameter types for every placeholder of `statement`, row by row.
pub fn parameter_types(statement: &InsertStatement) -> Vec<Type> {
    let row: Vec<Type> = statement
        .column_types
        .iter()
        .map(|sql_type| parameter_type(*sql_type))
        .collect();
    row.iter()
        .cycle()
        .take(row.len() * statement.row_count)
        .cloned()
        .collect()
}

/// Boxes a value as the Rust type matching its column.
///
/// Values whose tag disagrees with the column (for example text that slipped
/// past a sample-inferred `INTEGER`) are boxed as-is and rejected by the
/// driver's type check when the statement runs.
fn value_to_param(value: &Value, sql_type: SqlType) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => null_param(sql_type),
        Value::Integer(v) => match sql_type {
            SqlType::Integer => match i32::try_from(*v) {
                Ok(narrow) => Box::new(narrow),
                Err(_) => Box::new(*v),
            },
            SqlType::Real => Box::new(*v as f32),
            SqlType::Double => Box::new(*v as f64),
            SqlType::Numeric => Box::new(Decimal::from(*v)),
            _ => Box::new(*v),
        },
        Value::Float(v) => match sql_type {
            SqlType::Real => Box::new(*v as f32),
            SqlType::Numeric => match Decimal::try_from(*v) {
                Ok(decimal) => Box::new(decimal),
                Err(_) => Box::new(*v),
            },
            _ => Box::new(*v),
        },
        Value::Numeric(d) => Box::new(*d),
        Value::Date(d) => match sql_type {
            SqlType::Timestamp => Box::new(d.and_time(NaiveTime::MIN)),
            _ => Box::new(*d),
        },
        Value::Time(t) => Box::new(*t),
        Value::Timestamp(ts) => match sql_type {
            SqlType::Date => Box::new(ts.date()),
            _ => Box::new(*ts),
        },
        Value::Text(s) => Box::new(s.clone()),
    }
}

fn null_param(sql_type: SqlType) -> Box<dyn ToSql + Sync + Send> {
    match sql_type {
        SqlType::Integer => Box::new(None::<i32>),
        SqlType::BigInt => Box::new(None::<i64>),
        SqlType::Real => Box::new(None::<f32>),
        SqlType::Double => Box::new(None::<f64>),
        SqlType::Numeric => Box::new(None::<Decimal>),
        SqlType::Date => Box::new(None::<NaiveDate>),
        SqlType::Time => Box::new(None::<NaiveTime>),
        SqlType::Timestamp => Box::new(None::<NaiveDateTime>),
        SqlType::Text => Box::new(None::<String>),
    }
}
