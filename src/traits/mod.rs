//! Backend-independent traits and types.
//!
//! - **Types** (`types`): database type enum and connection configuration
//! - **Row/Value** (`row`): decoded values, result rows and bind parameters
//! - **Error** (`error`): portable error taxonomy
//! - **Converter** (`converter`): native error classification trait
//! - **Connection** (`connection`): connection trait and prepared query handle
//!
//! # Example
//!
//! ```ignore
//! use sqlbridge::traits::{Config, MysqlConfig, SslConfig, SslVerification};
//!
//! let config = Config::from(
//!     MysqlConfig::new("localhost", "app", "secret")
//!         .with_dbname("shop")
//!         .with_ssl(SslConfig::new().with_verification(SslVerification::Ca)),
//! );
//! ```

pub mod connection;
pub mod converter;
pub mod error;
pub mod row;
pub mod types;

pub use connection::{
    ConnectionState, DatabaseConnection, PreparedQuery, QueryOutcome, quote_identifier,
};

pub use converter::{ClientPhase, ExceptionConverter};

pub use error::{
    ConfigError, DriverError, DriverResult, Error, ErrorInfo, ErrorKind, NativeError, Result,
};

pub use row::{Cell, LargeObject, Param, Row, Value};

pub use types::{
    Config, DatabaseType, MysqlConfig, PgsqlConfig, SqliteConfig, SslConfig, SslVerification,
};
