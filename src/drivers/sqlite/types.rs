//! SQLite type conversion utilities.
//!
//! SQLite uses dynamic typing: the declared column type is only an affinity
//! and every stored value has one of five storage classes:
//! - INTEGER: 64-bit signed integer
//! - REAL: 64-bit floating point
//! - TEXT: UTF-8 string
//! - BLOB: Binary data
//! - NULL: Null value
//!
//! Values are therefore decoded by the storage class of the value itself.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::traits::{Cell, Param, Row as TraitRow, Value};

/// Converter between SQLite values and the unified types.
pub struct SqliteValueConverter;

impl SqliteValueConverter {
    /// Convert a SQLite row to a trait Row.
    pub fn convert_row(sqlite_row: &SqliteRow) -> Result<TraitRow, sqlx::Error> {
        let cells = sqlite_row
            .columns()
            .iter()
            .map(|col| {
                let value = Self::extract_value(sqlite_row, col.ordinal())?;
                Ok(Cell::new(col.name(), value))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(TraitRow::new(cells))
    }

    fn extract_value(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let storage_class = raw.type_info().name().to_string();
        Self::decode_by_storage_class(row, index, &storage_class)
    }

    fn decode_by_storage_class(
        row: &SqliteRow,
        index: usize,
        storage_class: &str,
    ) -> Result<Value, sqlx::Error> {
        let value = match storage_class {
            "INTEGER" => Value::Int(row.try_get_unchecked::<i64, _>(index)?),
            "REAL" => Value::Float(row.try_get_unchecked::<f64, _>(index)?),
            "TEXT" => Value::Text(row.try_get_unchecked::<String, _>(index)?),
            // Large objects are materialized in full
            "BLOB" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
            _ => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                match String::from_utf8(bytes) {
                    Ok(s) => Value::Text(s),
                    Err(e) => Value::Bytes(e.into_bytes()),
                }
            }
        };

        Ok(value)
    }

    /// Bind parameters positionally.
    ///
    /// SQLite has no boolean storage class, so booleans are stored as 0/1.
    pub fn bind_params<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        params: &[Param],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
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
}
