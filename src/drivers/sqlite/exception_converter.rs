//! SQLite error classification.
//!
//! SQLite reports no SQLSTATE and its result codes are too coarse to tell
//! the interesting cases apart, so classification matches on the message.
//! The order of the checks matters: the first matching pattern wins.

use crate::traits::converter::warn_missing_info;
use crate::traits::{ClientPhase, DriverError, ErrorKind, ExceptionConverter, NativeError};

/// Message patterns in match order. Matching is case-sensitive.
const MESSAGE_PATTERNS: &[(&[&str], ErrorKind)] = &[
    (&["database is locked"], ErrorKind::LockWaitTimeout),
    (
        &[
            "must be unique",
            "is not unique",
            "are not unique",
            "UNIQUE constraint failed",
        ],
        ErrorKind::UniqueViolation,
    ),
    (
        &["may not be NULL", "NOT NULL constraint failed"],
        ErrorKind::NotNullViolation,
    ),
    (&["no such table:"], ErrorKind::TableNotFound),
    (&["already exists"], ErrorKind::TableExists),
    (&["has no column named"], ErrorKind::InvalidFieldName),
    (&["ambiguous column name"], ErrorKind::NonUniqueFieldName),
    (&["syntax error"], ErrorKind::SyntaxError),
    (&["attempt to write a readonly database"], ErrorKind::ReadOnly),
    (&["unable to open database file"], ErrorKind::ConnectionFailure),
    (&["FOREIGN KEY constraint failed"], ErrorKind::ForeignKeyViolation),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteExceptionConverter;

impl SqliteExceptionConverter {
    /// Kind for a SQLite error message
    pub fn kind_for_message(message: &str) -> ErrorKind {
        MESSAGE_PATTERNS
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|p| message.contains(p)))
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Driver)
    }

    /// Lift a sqlx error into the shape the classifier expects.
    ///
    /// Database errors keep the extended result code; SQLite has no SQLSTATE.
    pub fn native_error(error: sqlx::Error) -> NativeError {
        let message = error.to_string();
        match error {
            sqlx::Error::Database(db) => {
                let code = db.code().and_then(|c| c.parse::<i64>().ok());
                NativeError::new(message)
                    .with_info("", code)
                    .with_source(sqlx::Error::Database(db))
            }
            other => NativeError::new(message).with_source(other),
        }
    }

    /// Classify a sqlx error raised by the client.
    ///
    /// SQLite is in-process, so the phase never changes the outcome.
    pub fn convert_sqlx(
        &self,
        error: sqlx::Error,
        _phase: ClientPhase,
        query: Option<&str>,
    ) -> DriverError {
        self.convert(Self::native_error(error), query)
    }
}

impl ExceptionConverter for SqliteExceptionConverter {
    fn classify(&self, error: &NativeError) -> ErrorKind {
        if error.info().is_none() {
            warn_missing_info("SQLite", error);
        }

        Self::kind_for_message(error.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(message: &str) -> ErrorKind {
        let error = NativeError::new(message).with_info("", Some(1));
        SqliteExceptionConverter.classify(&error)
    }

    #[test]
    fn test_message_table() {
        let table = [
            ("database is locked", ErrorKind::LockWaitTimeout),
            ("column id must be unique", ErrorKind::UniqueViolation),
            ("column id is not unique", ErrorKind::UniqueViolation),
            ("columns a, b are not unique", ErrorKind::UniqueViolation),
            ("UNIQUE constraint failed: account.id", ErrorKind::UniqueViolation),
            ("account.username may not be NULL", ErrorKind::NotNullViolation),
            ("NOT NULL constraint failed: account.username", ErrorKind::NotNullViolation),
            ("no such table: nonexistent", ErrorKind::TableNotFound),
            ("table account already exists", ErrorKind::TableExists),
            ("table account has no column named foo", ErrorKind::InvalidFieldName),
            ("ambiguous column name: id", ErrorKind::NonUniqueFieldName),
            ("near \"nonsense\": syntax error", ErrorKind::SyntaxError),
            ("attempt to write a readonly database", ErrorKind::ReadOnly),
            ("unable to open database file", ErrorKind::ConnectionFailure),
            ("FOREIGN KEY constraint failed", ErrorKind::ForeignKeyViolation),
            ("disk I/O error", ErrorKind::Driver),
        ];

        for (message, kind) in table {
            assert_eq!(classify(message), kind, "message {:?}", message);
        }
    }

    #[test]
    fn test_earlier_pattern_wins() {
        assert_eq!(
            classify("syntax error: table t already exists"),
            ErrorKind::TableExists
        );
        assert_eq!(
            classify("database is locked while UNIQUE constraint failed"),
            ErrorKind::LockWaitTimeout
        );
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert_eq!(classify("SYNTAX ERROR"), ErrorKind::Driver);
        assert_eq!(classify("unique constraint failed"), ErrorKind::Driver);
    }

    #[test]
    fn test_sql_state_is_empty() {
        let error = NativeError::new("no such table: t").with_info("", Some(1));
        let converted = SqliteExceptionConverter.convert(error, Some("SELECT * FROM t"));

        assert_eq!(converted.kind(), ErrorKind::TableNotFound);
        assert_eq!(converted.sql_state(), "");
        assert_eq!(converted.query(), Some("SELECT * FROM t"));
    }

    #[test]
    fn test_missing_info_still_classifies_by_message() {
        let error = NativeError::new("There is already an active transaction");
        assert_eq!(SqliteExceptionConverter.classify(&error), ErrorKind::Driver);

        let error = NativeError::new("database is locked");
        assert_eq!(SqliteExceptionConverter.classify(&error), ErrorKind::LockWaitTimeout);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let error = NativeError::new("database is locked").with_info("", Some(5));
        let first = SqliteExceptionConverter.convert(error.clone(), None);
        let second = SqliteExceptionConverter.convert(error, None);
        assert_eq!(first, second);
        assert!(first.is_retryable());
    }
}
