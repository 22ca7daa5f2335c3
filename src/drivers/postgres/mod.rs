//! PostgreSQL database driver implementation.
//!
//! This module provides a PostgreSQL driver that implements the
//! `DatabaseConnection` trait using SQLx, with errors classified by
//! `PostgresExceptionConverter`.
//!
//! # Example
//!
//! ```ignore
//! use sqlbridge::drivers::postgres::PostgresConnection;
//! use sqlbridge::traits::{DatabaseConnection, PgsqlConfig};
//!
//! let config = PgsqlConfig::new("localhost", "postgres", "password").with_dbname("mydb");
//! let mut conn = PostgresConnection::connect(config).await?;
//! conn.begin_transaction().await?;
//! ```

mod connection;
mod exception_converter;
mod params;
mod types;

pub use connection::PostgresConnection;
pub use exception_converter::PostgresExceptionConverter;
pub use types::PgValueConverter;
