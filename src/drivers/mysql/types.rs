//! MySQL type conversion utilities.
//!
//! This module handles conversion between MySQL-specific types (from SQLx)
//! and the generic `Value` type, and binds `Param` lists onto queries.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::traits::{Cell, Param, Row as TraitRow, SslConfig, SslVerification, Value};

/// Converter between MySQL wire values and the unified types.
pub struct MySqlValueConverter;

impl MySqlValueConverter {
    /// Convert a MySQL row to a trait Row.
    pub fn convert_row(mysql_row: &MySqlRow) -> Result<TraitRow, sqlx::Error> {
        let cells = mysql_row
            .columns()
            .iter()
            .map(|col| {
                let value = Self::extract_value(mysql_row, col.ordinal(), col.type_info().name())?;
                Ok(Cell::new(col.name(), value))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(TraitRow::new(cells))
    }

    fn extract_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        Self::decode_by_type(row, index, type_name)
    }

    /// Decode a value based on its MySQL type name.
    fn decode_by_type(row: &MySqlRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
        let value = match type_name {
            // TINYINT(1)
            "BOOLEAN" | "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),

            "TINYINT" => Value::Int(i64::from(row.try_get::<i8, _>(index)?)),
            "SMALLINT" => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            "MEDIUMINT" | "INT" | "INTEGER" => Value::Int(i64::from(row.try_get::<i32, _>(index)?)),
            "BIGINT" => Value::Int(row.try_get::<i64, _>(index)?),

            "TINYINT UNSIGNED" => Value::UInt(u64::from(row.try_get::<u8, _>(index)?)),
            "SMALLINT UNSIGNED" => Value::UInt(u64::from(row.try_get::<u16, _>(index)?)),
            "MEDIUMINT UNSIGNED" | "INT UNSIGNED" | "INTEGER UNSIGNED" => {
                Value::UInt(u64::from(row.try_get::<u32, _>(index)?))
            }
            "BIGINT UNSIGNED" | "BIT" => Value::UInt(row.try_get::<u64, _>(index)?),

            "FLOAT" => Value::Float(f64::from(row.try_get::<f32, _>(index)?)),
            "DOUBLE" | "DOUBLE PRECISION" | "REAL" => Value::Float(row.try_get::<f64, _>(index)?),

            "DECIMAL" | "NUMERIC" | "DEC" | "FIXED" => {
                Value::Text(row.try_get::<Decimal, _>(index)?.to_string())
            }

            "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" => {
                Value::Text(row.try_get::<String, _>(index)?)
            }

            // Large objects are materialized in full
            "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                Value::Bytes(row.try_get::<Vec<u8>, _>(index)?)
            }

            "DATE" => Value::Text(row.try_get::<NaiveDate, _>(index)?.format("%Y-%m-%d").to_string()),
            "TIME" => Value::Text(row.try_get::<NaiveTime, _>(index)?.format("%H:%M:%S%.f").to_string()),
            "DATETIME" => Value::Text(
                row.try_get::<NaiveDateTime, _>(index)?
                    .format("%Y-%m-%d %H:%M:%S%.f")
                    .to_string(),
            ),
            "TIMESTAMP" => {
                let formatted = match row.try_get::<DateTime<Utc>, _>(index) {
                    Ok(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
                    Err(_) => row
                        .try_get::<NaiveDateTime, _>(index)?
                        .format("%Y-%m-%d %H:%M:%S%.f")
                        .to_string(),
                };
                Value::Text(formatted)
            }

            "YEAR" => match row.try_get::<u16, _>(index) {
                Ok(year) => Value::UInt(u64::from(year)),
                Err(_) => Value::Int(i64::from(row.try_get::<i16, _>(index)?)),
            },

            "JSON" => Value::Text(row.try_get::<serde_json::Value, _>(index)?.to_string()),

            _ if type_name.starts_with("ENUM") || type_name.starts_with("SET") => {
                Value::Text(row.try_get::<String, _>(index)?)
            }

            _ => Self::decode_fallback(row, index)?,
        };

        Ok(value)
    }

    /// Unknown types come back as text when they are valid UTF-8, bytes otherwise.
    fn decode_fallback(row: &MySqlRow, index: usize) -> Result<Value, sqlx::Error> {
        if let Ok(s) = row.try_get::<String, _>(index) {
            return Ok(Value::Text(s));
        }

        let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
        Ok(match String::from_utf8(bytes) {
            Ok(s) => Value::Text(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        })
    }

    /// Bind parameters positionally.
    ///
    /// MySQL has no boolean bind type, so booleans go over the wire as 0/1.
    pub fn bind_params<'q>(
        mut query: Query<'q, MySql, MySqlArguments>,
        params: &[Param],
    ) -> Query<'q, MySql, MySqlArguments> {
        for param in params {
            query = match param {
                Param::Null => query.bind(None::<String>),
                Param::Bool(b) => query.bind(Param::bool_as_int(*b)),
                Param::Int(v) => query.bind(*v),
                Param::Float(v) => query.bind(*v),
                Param::Text(s) => query.bind(s.clone()),
                Param::LargeObject(lob) => query.bind(lob.as_bytes().to_vec()),
            };
        }
        query
    }

    /// Map the TLS bundle to a MySQL SSL mode.
    pub fn map_ssl_mode(ssl: Option<&SslConfig>) -> MySqlSslMode {
        match ssl.map(|s| s.verification) {
            None => MySqlSslMode::Preferred,
            Some(SslVerification::None) => MySqlSslMode::Required,
            Some(SslVerification::Ca) => MySqlSslMode::VerifyCa,
            Some(SslVerification::CaAndHostname) => MySqlSslMode::VerifyIdentity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(MySqlValueConverter::map_ssl_mode(None), MySqlSslMode::Preferred));

        let ssl = SslConfig::new().with_verification(SslVerification::None);
        assert!(matches!(
            MySqlValueConverter::map_ssl_mode(Some(&ssl)),
            MySqlSslMode::Required
        ));

        let ssl = SslConfig::new().with_verification(SslVerification::Ca);
        assert!(matches!(
            MySqlValueConverter::map_ssl_mode(Some(&ssl)),
            MySqlSslMode::VerifyCa
        ));

        let ssl = SslConfig::new();
        assert!(matches!(
            MySqlValueConverter::map_ssl_mode(Some(&ssl)),
            MySqlSslMode::VerifyIdentity
        ));
    }
}
