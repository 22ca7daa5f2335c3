//! PostgreSQL type conversion utilities.
//!
//! Results decode by column type name. Parameter encoding lives in
//! `params`, keyed on the statement's parameter types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgRow, PgSslMode};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use uuid::Uuid;

use crate::traits::{Cell, Row as TraitRow, SslConfig, SslVerification, Value};

/// Converter between PostgreSQL wire values and the unified types.
pub struct PgValueConverter;

impl PgValueConverter {
    /// Convert a PostgreSQL row to a trait Row.
    pub fn convert_row(pg_row: &PgRow) -> Result<TraitRow, sqlx::Error> {
        let cells = pg_row
            .columns()
            .iter()
            .map(|col| {
                let value = Self::extract_value(pg_row, col.ordinal(), col.type_info().name())?;
                Ok(Cell::new(col.name(), value))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(TraitRow::new(cells))
    }

    fn extract_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        Self::decode_by_type(row, index, type_name)
    }

    /// Decode a value based on its PostgreSQL type name.
    fn decode_by_type(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        let value = match type_name {
            "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),

            "INT2" | "SMALLINT" | "SMALLSERIAL" => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            "INT4" | "INT" | "INTEGER" | "SERIAL" => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
            "INT8" | "BIGINT" | "BIGSERIAL" => Value::Int(row.try_get::<i64, _>(index)?),

            "FLOAT4" | "REAL" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
            "FLOAT8" | "DOUBLE PRECISION" => Value::Float(row.try_get::<f64, _>(index)?),

            "NUMERIC" | "DECIMAL" => Value::Text(row.try_get::<Decimal, _>(index)?.to_string()),

            "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" => {
                Value::Text(row.try_get::<String, _>(index)?)
            }

            // Large objects are materialized in full
            "BYTEA" => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),

            "DATE" => Value::Text(row.try_get::<NaiveDate, _>(index)?.format("%Y-%m-%d").to_string()),
            "TIME" => Value::Text(row.try_get::<NaiveTime, _>(index)?.format("%H:%M:%S%.f").to_string()),
            "TIMESTAMP" => Value::Text(
                row.try_get::<NaiveDateTime, _>(index)?
                    .format("%Y-%m-%d %H:%M:%S%.f")
                    .to_string(),
            ),
            "TIMESTAMPTZ" => Value::Text(
                row.try_get::<DateTime<Utc>, _>(index)?
                    .format("%Y-%m-%d %H:%M:%S%.f%:z")
                    .to_string(),
            ),

            "UUID" => Value::Text(row.try_get::<Uuid, _>(index)?.to_string()),

            "JSON" | "JSONB" => Value::Text(row.try_get::<serde_json::Value, _>(index)?.to_string()),

            _ => Self::decode_fallback(row, index)?,
        };

        Ok(value)
    }

    /// Unknown types come back as text when they are valid UTF-8, bytes otherwise.
    fn decode_fallback(row: &PgRow, index: usize) -> Result<Value, sqlx::Error> {
        if let Ok(s) = row.try_get::<String, _>(index) {
            return Ok(Value::Text(s));
        }

        let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        })
    }

    /// Map the TLS bundle to a PostgreSQL SSL mode.
    pub fn map_ssl_mode(ssl: Option<&SslConfig>) -> PgSslMode {
        match ssl.map(|s| s.verification) {
            None => PgSslMode::Prefer,
            Some(SslVerification::None) => PgSslMode::Require,
            Some(SslVerification::Ca) => PgSslMode::VerifyCa,
            Some(SslVerification::CaAndHostname) => PgSslMode::VerifyFull,
        }
    }
}
