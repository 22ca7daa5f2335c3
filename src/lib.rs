//! Portable access to MySQL, PostgreSQL and SQLite.
//!
//! Every backend error is classified into one [`ErrorKind`] so callers can
//! react to "duplicate key" or "deadlock" without knowing which server they
//! talk to.

pub mod drivers;
pub mod traits;

pub use drivers::{AnyConnection, ConnectionFactory};
pub use traits::{
    Cell, Config, ConfigError, ConnectionState, DatabaseConnection, DatabaseType, DriverError,
    DriverResult, Error, ErrorKind, ExceptionConverter, LargeObject, MysqlConfig, NativeError,
    Param, PgsqlConfig, PreparedQuery, QueryOutcome, Result, Row, SqliteConfig, SslConfig,
    SslVerification, Value,
};
