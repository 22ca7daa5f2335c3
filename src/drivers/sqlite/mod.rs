//! SQLite database driver implementation.
//!
//! This module provides a SQLite driver that implements the
//! `DatabaseConnection` trait using SQLx. SQLite errors carry no SQLSTATE,
//! so `SqliteExceptionConverter` classifies them by message.
//!
//! # Example
//!
//! ```ignore
//! use sqlbridge::drivers::sqlite::SqliteConnection;
//! use sqlbridge::traits::{DatabaseConnection, SqliteConfig};
//!
//! // File-based database
//! let mut conn = SqliteConnection::connect(SqliteConfig::file("/path/to/database.db")).await?;
//!
//! // In-memory database
//! let mut conn = SqliteConnection::connect(SqliteConfig::in_memory()).await?;
//! ```

mod connection;
mod exception_converter;
mod types;

pub use connection::SqliteConnection;
pub use exception_converter::SqliteExceptionConverter;
pub use types::SqliteValueConverter;
