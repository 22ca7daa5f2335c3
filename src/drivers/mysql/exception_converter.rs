//! MySQL/MariaDB error classification.
//!
//! MySQL reports a numeric error number next to the SQLSTATE; the number is
//! far more specific, so classification keys on it alone.

use sqlx::mysql::MySqlDatabaseError;

use crate::traits::converter::warn_missing_info;
use crate::traits::{ClientPhase, DriverError, ErrorKind, ExceptionConverter, NativeError};

/// Client error: can't connect to the server
const CR_CONNECTION_ERROR: i64 = 2002;
/// Client error: server has gone away
const CR_SERVER_GONE_ERROR: i64 = 2006;

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlExceptionConverter;

impl MySqlExceptionConverter {
    /// Kind for a MySQL server or client error number
    pub fn kind_for_code(code: i64) -> ErrorKind {
        match code {
            1008 | 1049 => ErrorKind::DatabaseDoesNotExist,
            1213 => ErrorKind::Deadlock,
            1205 => ErrorKind::LockWaitTimeout,
            1050 => ErrorKind::TableExists,
            1051 | 1146 => ErrorKind::TableNotFound,
            1216 | 1217 | 1451 | 1452 | 1701 => ErrorKind::ForeignKeyViolation,
            1062 | 1557 | 1569 | 1586 => ErrorKind::UniqueViolation,
            1054 | 1166 | 1611 => ErrorKind::InvalidFieldName,
            1052 | 1060 | 1110 => ErrorKind::NonUniqueFieldName,
            1064 | 1149 | 1287 | 1341 | 1342 | 1343 | 1344 | 1382 | 1479 | 1541 | 1554
            | 1626 => ErrorKind::SyntaxError,
            1044 | 1045 | 1129 | 1130 | 1133 => ErrorKind::AuthorizationFailure,
            1046 | 1095 | 1142 | 1143 | 1227 | 1370 | 1429 | 2002 | 2005 | 2054 | 3159 => {
                ErrorKind::ConnectionFailure
            }
            2006 => ErrorKind::ConnectionLost,
            1048 | 1121 | 1138 | 1171 | 1252 | 1263 | 1364 | 1566 => ErrorKind::NotNullViolation,
            _ => ErrorKind::Driver,
        }
    }

    /// Lift a sqlx error into the shape the classifier expects.
    pub fn native_error(error: sqlx::Error, phase: ClientPhase) -> NativeError {
        let message = error.to_string();
        match error {
            sqlx::Error::Database(db) => {
                let sql_state = db.code().map(|c| c.into_owned()).unwrap_or_default();
                let number = db
                    .try_downcast_ref::<MySqlDatabaseError>()
                    .map(|e| i64::from(e.number()));

                let mut native = NativeError::new(message).with_info(sql_state, number);
                if let Some(number) = number {
                    native = native.with_code(number);
                }
                native.with_source(sqlx::Error::Database(db))
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                let code = match phase {
                    ClientPhase::Connecting => CR_CONNECTION_ERROR,
                    ClientPhase::Connected => CR_SERVER_GONE_ERROR,
                };
                NativeError::new(message)
                    .with_info("HY000", Some(code))
                    .with_code(code)
                    .with_source(error)
            }
            other => NativeError::new(message).with_source(other),
        }
    }

    /// Classify a sqlx error raised by the client.
    pub fn convert_sqlx(
        &self,
        error: sqlx::Error,
        phase: ClientPhase,
        query: Option<&str>,
    ) -> DriverError {
        self.convert(Self::native_error(error, phase), query)
    }
}

impl ExceptionConverter for MySqlExceptionConverter {
    fn classify(&self, error: &NativeError) -> ErrorKind {
        let code = match error.info() {
            Some(info) => info.code.or(error.code()),
            None => {
                warn_missing_info("MySQL", error);
                error.code()
            }
        };

        code.map(Self::kind_for_code).unwrap_or(ErrorKind::Driver)
    }
}
