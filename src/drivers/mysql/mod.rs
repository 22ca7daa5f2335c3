//! MySQL and MariaDB driver implementation.
//!
//! This module provides a MySQL driver that implements the `DatabaseConnection`
//! trait using SQLx, with errors classified by `MySqlExceptionConverter`.
//!
//! # Example
//!
//! ```ignore
//! use sqlbridge::drivers::mysql::MySqlConnection;
//! use sqlbridge::traits::{DatabaseConnection, MysqlConfig};
//!
//! let config = MysqlConfig::new("localhost", "user", "password").with_dbname("mydb");
//! let mut conn = MySqlConnection::connect(config).await?;
//! let id = conn.last_insert_id().await?;
//! ```

mod connection;
mod exception_converter;
mod types;

pub use connection::MySqlConnection;
pub use exception_converter::MySqlExceptionConverter;
pub use types::MySqlValueConverter;
