//! Database driver implementations.
//!
//! This module contains driver implementations for different database types:
//!
//! - **PostgreSQL**: SQLSTATE-based error classification via SQLx
//! - **MySQL**: MySQL/MariaDB support, classified by server error number
//! - **SQLite**: Embedded SQLite support, classified by error message
//!
//! Each driver implements the `DatabaseConnection` trait and ships the
//! `ExceptionConverter` for its backend.

mod factory;

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use factory::{AnyConnection, ConnectionFactory};
