//! Portable error taxonomy.
//!
//! This module contains:
//! - `ErrorKind` - The closed set of semantic error categories
//! - `NativeError` - A backend error as reported by the native client
//! - `DriverError` - A classified error surfaced to callers
//! - `ConfigError` / `Error` - Configuration problems and the crate-level error

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Result type for operations that talk to the native client.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Result type for entry points that validate configuration before connecting.
pub type Result<T> = std::result::Result<T, Error>;

/// Semantic error categories shared by every backend.
///
/// Kinds form a shallow hierarchy: `ErrorKind::parent` walks one level up and
/// `ErrorKind::is_a` checks ancestry, so callers can catch broad and handle
/// narrow. `Driver` is the root of every kind and also the fallback for
/// errors without a specific mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unclassified driver error
    Driver,

    /// Server unreachable or refused the connection
    ConnectionFailure,
    /// Connection severed while in use
    ConnectionLost,
    /// Bad credentials or missing privileges
    AuthorizationFailure,

    /// Error reported by the database server
    Server,
    SyntaxError,
    InvalidFieldName,
    NonUniqueFieldName,
    DatabaseDoesNotExist,
    SchemaDoesNotExist,
    /// No identity/sequence value available for the session
    NoIdentityValue,
    /// Write attempted on a read-only database
    ReadOnly,
    Deadlock,
    LockWaitTimeout,

    ConstraintViolation,
    UniqueViolation,
    NotNullViolation,
    ForeignKeyViolation,

    ObjectExists,
    TableExists,
    ObjectNotFound,
    TableNotFound,
}

impl ErrorKind {
    /// The direct supertype, or `None` for the root.
    pub fn parent(self) -> Option<ErrorKind> {
        use ErrorKind::*;
        match self {
            Driver => None,
            ConnectionFailure | AuthorizationFailure | Server => Some(Driver),
            ConnectionLost => Some(ConnectionFailure),
            SyntaxError | InvalidFieldName | NonUniqueFieldName | DatabaseDoesNotExist
            | SchemaDoesNotExist | NoIdentityValue | ReadOnly | Deadlock | LockWaitTimeout
            | ConstraintViolation | ObjectExists | ObjectNotFound => Some(Server),
            UniqueViolation | NotNullViolation | ForeignKeyViolation => Some(ConstraintViolation),
            TableExists => Some(ObjectExists),
            TableNotFound => Some(ObjectNotFound),
        }
    }

    /// Whether this kind equals `other` or descends from it.
    pub fn is_a(self, other: ErrorKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Deadlock | ErrorKind::LockWaitTimeout)
    }

    pub fn as_str(self) -> &'static str {
        use ErrorKind::*;
        match self {
            Driver => "driver",
            ConnectionFailure => "connection_failure",
            ConnectionLost => "connection_lost",
            AuthorizationFailure => "authorization_failure",
            Server => "server",
            SyntaxError => "syntax_error",
            InvalidFieldName => "invalid_field_name",
            NonUniqueFieldName => "non_unique_field_name",
            DatabaseDoesNotExist => "database_does_not_exist",
            SchemaDoesNotExist => "schema_does_not_exist",
            NoIdentityValue => "no_identity_value",
            ReadOnly => "read_only",
            Deadlock => "deadlock",
            LockWaitTimeout => "lock_wait_timeout",
            ConstraintViolation => "constraint_violation",
            UniqueViolation => "unique_violation",
            NotNullViolation => "not_null_violation",
            ForeignKeyViolation => "foreign_key_violation",
            ObjectExists => "object_exists",
            TableExists => "table_exists",
            ObjectNotFound => "object_not_found",
            TableNotFound => "table_not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error descriptor supplied by the native client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Five-character SQLSTATE, empty when the backend has none
    pub sql_state: String,
    /// Vendor error code (MySQL error number, SQLite result code)
    pub code: Option<i64>,
}

/// An error as the native client reported it, before classification.
#[derive(Debug, Clone)]
pub struct NativeError {
    message: String,
    info: Option<ErrorInfo>,
    code: Option<i64>,
    source: Option<Arc<sqlx::Error>>,
}

impl NativeError {
    /// Create an error that only carries a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            info: None,
            code: None,
            source: None,
        }
    }

    /// Attach the structured descriptor.
    pub fn with_info(mut self, sql_state: impl Into<String>, code: Option<i64>) -> Self {
        self.info = Some(ErrorInfo {
            sql_state: sql_state.into(),
            code,
        });
        self
    }

    /// Attach the error's own code, used when no descriptor is available.
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Keep the underlying client error as the source.
    pub fn with_source(mut self, source: sqlx::Error) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> Option<&ErrorInfo> {
        self.info.as_ref()
    }

    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// SQLSTATE from the descriptor, or an empty string.
    pub fn sql_state(&self) -> &str {
        self.info.as_ref().map(|i| i.sql_state.as_str()).unwrap_or("")
    }

    /// The underlying client error, if one was kept.
    pub fn native(&self) -> Option<&sqlx::Error> {
        self.source.as_deref()
    }
}

impl PartialEq for NativeError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message && self.info == other.info && self.code == other.code
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for NativeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// A classified driver error.
///
/// Built exactly once by an exception converter. Carries the kind, the
/// native SQLSTATE (possibly empty), the query that triggered it (absent for
/// errors outside query execution) and the native error as its source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DriverError {
    kind: ErrorKind,
    sql_state: String,
    query: Option<String>,
    message: String,
    #[source]
    native: NativeError,
}

impl DriverError {
    pub fn new(kind: ErrorKind, native: NativeError, query: Option<&str>) -> Self {
        let message = match query {
            Some(_) => format!(
                "An exception occurred while executing a query: {}",
                native.message()
            ),
            None => format!("An exception occurred in the driver: {}", native.message()),
        };

        Self {
            kind,
            sql_state: native.sql_state().to_string(),
            query: query.map(str::to_string),
            message,
            native,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether the error's kind is `kind` or one of its subtypes.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind.is_a(kind)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    pub fn sql_state(&self) -> &str {
        &self.sql_state
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn native(&self) -> &NativeError {
        &self.native
    }
}

/// Invalid or unsupported connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid database URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported database URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid value for {option}: {value}")]
    InvalidOption { option: String, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl From<url::ParseError> for ConfigError {
    fn from(e: url::ParseError) -> Self {
        ConfigError::InvalidUrl(e.to_string())
    }
}

/// Errors from entry points that both validate configuration and connect.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl Error {
    /// The classified driver error, if this is one.
    pub fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Error::Driver(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy_parents() {
        assert_eq!(ErrorKind::Driver.parent(), None);
        assert_eq!(ErrorKind::Server.parent(), Some(ErrorKind::Driver));
        assert_eq!(
            ErrorKind::UniqueViolation.parent(),
            Some(ErrorKind::ConstraintViolation)
        );
        assert_eq!(
            ErrorKind::ConstraintViolation.parent(),
            Some(ErrorKind::Server)
        );
        assert_eq!(ErrorKind::TableNotFound.parent(), Some(ErrorKind::ObjectNotFound));
        assert_eq!(ErrorKind::TableExists.parent(), Some(ErrorKind::ObjectExists));
        assert_eq!(
            ErrorKind::ConnectionLost.parent(),
            Some(ErrorKind::ConnectionFailure)
        );
    }

    #[test]
    fn test_is_a_walks_ancestry() {
        assert!(ErrorKind::ForeignKeyViolation.is_a(ErrorKind::ForeignKeyViolation));
        assert!(ErrorKind::ForeignKeyViolation.is_a(ErrorKind::ConstraintViolation));
        assert!(ErrorKind::ForeignKeyViolation.is_a(ErrorKind::Server));
        assert!(ErrorKind::ForeignKeyViolation.is_a(ErrorKind::Driver));
        assert!(!ErrorKind::ForeignKeyViolation.is_a(ErrorKind::UniqueViolation));
        assert!(!ErrorKind::ConstraintViolation.is_a(ErrorKind::UniqueViolation));
        assert!(!ErrorKind::AuthorizationFailure.is_a(ErrorKind::Server));
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ErrorKind::Deadlock.is_retryable());
        assert!(ErrorKind::LockWaitTimeout.is_retryable());
        assert!(!ErrorKind::Server.is_retryable());
        assert!(!ErrorKind::UniqueViolation.is_retryable());
        assert!(!ErrorKind::ConnectionLost.is_retryable());
    }

    #[test]
    fn test_driver_error_message_with_query() {
        let native = NativeError::new("boom").with_info("42S02", Some(1146));
        let error = DriverError::new(ErrorKind::TableNotFound, native, Some("SELECT 1"));

        assert_eq!(
            error.to_string(),
            "An exception occurred while executing a query: boom"
        );
        assert_eq!(error.sql_state(), "42S02");
        assert_eq!(error.query(), Some("SELECT 1"));
        assert!(error.is(ErrorKind::ObjectNotFound));
    }

    #[test]
    fn test_driver_error_message_without_query() {
        let error = DriverError::new(ErrorKind::ConnectionFailure, NativeError::new("refused"), None);

        assert_eq!(error.to_string(), "An exception occurred in the driver: refused");
        assert_eq!(error.sql_state(), "");
        assert_eq!(error.query(), None);
    }

    #[test]
    fn test_native_error_source_chain() {
        use std::error::Error as _;

        let native = NativeError::new("row not found").with_source(sqlx::Error::RowNotFound);
        assert!(native.source().is_some());

        let error = DriverError::new(ErrorKind::Driver, native, None);
        assert!(error.source().is_some());
    }
}
