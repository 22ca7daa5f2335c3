//! PostgreSQL error classification by SQLSTATE.

use crate::traits::converter::warn_missing_info;
use crate::traits::{ClientPhase, DriverError, ErrorKind, ExceptionConverter, NativeError};

/// SQLSTATE reported by libpq-style clients for a broken connection
const CONNECTION_FAILURE: &str = "08006";

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresExceptionConverter;

impl PostgresExceptionConverter {
    /// Kind for a SQLSTATE and message pair
    pub fn kind_for_state(sql_state: &str, message: &str) -> ErrorKind {
        // TRUNCATE of a table referenced by a foreign key
        if sql_state == "0A000" && message.contains("truncate") {
            return ErrorKind::ForeignKeyViolation;
        }

        match sql_state {
            "40001" | "40P01" => ErrorKind::Deadlock,
            "23502" => ErrorKind::NotNullViolation,
            "23503" => ErrorKind::ForeignKeyViolation,
            "23505" => ErrorKind::UniqueViolation,
            "3D000" => ErrorKind::DatabaseDoesNotExist,
            "3F000" => ErrorKind::SchemaDoesNotExist,
            "42601" => ErrorKind::SyntaxError,
            "42702" => ErrorKind::NonUniqueFieldName,
            "42703" => ErrorKind::InvalidFieldName,
            "42P01" => ErrorKind::TableNotFound,
            "42P07" => ErrorKind::TableExists,
            "08006" => ErrorKind::ConnectionFailure,
            "55000" => ErrorKind::NoIdentityValue,
            _ => ErrorKind::Driver,
        }
    }

    /// Lift a sqlx error into the shape the classifier expects.
    pub fn native_error(error: sqlx::Error) -> NativeError {
        let message = error.to_string();
        match error {
            sqlx::Error::Database(db) => {
                let sql_state = db.code().map(|c| c.into_owned()).unwrap_or_default();
                NativeError::new(message)
                    .with_info(sql_state, None)
                    .with_source(sqlx::Error::Database(db))
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => NativeError::new(message)
                .with_info(CONNECTION_FAILURE, None)
                .with_source(error),
            other => NativeError::new(message).with_source(other),
        }
    }

    /// Classify a sqlx error raised by the client.
    ///
    /// PostgreSQL reports transport failures the same way in every phase.
    pub fn convert_sqlx(
        &self,
        error: sqlx::Error,
        _phase: ClientPhase,
        query: Option<&str>,
    ) -> DriverError {
        self.convert(Self::native_error(error), query)
    }
}

impl ExceptionConverter for PostgresExceptionConverter {
    fn classify(&self, error: &NativeError) -> ErrorKind {
        if error.info().is_none() {
            warn_missing_info("PostgreSQL", error);
        }

        Self::kind_for_state(error.sql_state(), error.message())
    }
}
