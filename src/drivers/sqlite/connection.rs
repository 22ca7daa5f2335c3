//! SQLite connection implementation.
//!
//! This module implements the `DatabaseConnection` trait for SQLite
//! on top of a single SQLx `SqliteConnection`.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection as SqlxConnection};
use sqlx::{Connection, Either, Executor, Statement};

use super::exception_converter::SqliteExceptionConverter;
use super::types::SqliteValueConverter;
use crate::traits::{
    ClientPhase, ConnectionState, DatabaseConnection, DatabaseType, DriverError, DriverResult,
    ExceptionConverter, NativeError, Param, PreparedQuery, SqliteConfig,
};

/// SQLite database connection.
pub struct SqliteConnection {
    config: SqliteConfig,
    converter: SqliteExceptionConverter,
    conn: SqlxConnection,
    state: ConnectionState,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("config", &self.config)
            .field("conn", &"<SqliteConnection>")
            .field("state", &self.state)
            .finish()
    }
}

impl SqliteConnection {
    /// Open the database described by `config`, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns a classified error (no query text) when the file cannot be
    /// opened or created.
    pub async fn connect(config: SqliteConfig) -> DriverResult<Self> {
        let converter = SqliteExceptionConverter;
        let conn = Self::establish(&config, &converter).await?;

        match &config.path {
            Some(path) => tracing::debug!("Opened SQLite database {}", path.display()),
            None => tracing::debug!("Opened in-memory SQLite database"),
        }

        Ok(Self {
            config,
            converter,
            conn,
            state: ConnectionState::Connected,
        })
    }

    /// Build SqliteConnectOptions from the configuration.
    fn build_connect_options(config: &SqliteConfig) -> Result<SqliteConnectOptions, sqlx::Error> {
        let options = match &config.path {
            Some(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
            None => SqliteConnectOptions::from_str(":memory:")?,
        };

        Ok(options.foreign_keys(true))
    }

    async fn establish(
        config: &SqliteConfig,
        converter: &SqliteExceptionConverter,
    ) -> DriverResult<SqlxConnection> {
        let options = Self::build_connect_options(config)
            .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connecting, None))?;

        SqlxConnection::connect_with(&options)
            .await
            .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connecting, None))
    }

    async fn execute_raw(&mut self, sql: &str) -> DriverResult<()> {
        self.conn
            .execute(sql)
            .await
            .map(|_| ())
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))
    }

    fn transaction_error(&self, message: &str) -> DriverError {
        self.converter.convert(NativeError::new(message), None)
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    type Backend = Sqlite;
    type Config = SqliteConfig;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn config(&self) -> &SqliteConfig {
        &self.config
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn begin_transaction(&mut self) -> DriverResult<()> {
        if self.state == ConnectionState::InTransaction {
            return Err(self.transaction_error("There is already an active transaction"));
        }

        self.execute_raw("BEGIN").await?;
        self.state = ConnectionState::InTransaction;
        tracing::debug!("SQLite transaction started");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("COMMIT").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("ROLLBACK").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }

    async fn prepare_query(&mut self, sql: &str) -> DriverResult<PreparedQuery<Sqlite>> {
        let statement = self
            .conn
            .prepare(sql)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?;

        Ok(PreparedQuery::new(Statement::to_owned(&statement), sql))
    }

    async fn execute_query(
        &mut self,
        query: &mut PreparedQuery<Sqlite>,
        params: &[Param],
    ) -> DriverResult<()> {
        query.store_results(Vec::new(), 0);

        let converter = self.converter;
        let mut rows = Vec::new();
        let mut rows_affected = 0;

        {
            let sql = query.query();
            let bound = SqliteValueConverter::bind_params(query.statement().query(), params);
            let mut stream = self.conn.fetch_many(bound);

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?
            {
                match item {
                    Either::Left(result) => rows_affected += result.rows_affected(),
                    Either::Right(row) => rows.push(
                        SqliteValueConverter::convert_row(&row).map_err(|e| {
                            converter.convert_sqlx(e, ClientPhase::Connected, Some(sql))
                        })?,
                    ),
                }
            }
        }

        query.store_results(rows, rows_affected);
        Ok(())
    }

    async fn last_insert_id(&mut self) -> DriverResult<String> {
        let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, None))?;

        Ok(id.to_string())
    }

    async fn reconnect(&mut self) -> DriverResult<()> {
        let fresh = Self::establish(&self.config, &self.converter).await?;
        let stale = std::mem::replace(&mut self.conn, fresh);

        if let Err(e) = stale.close().await {
            tracing::debug!("Closing replaced SQLite connection failed: {}", e);
        }

        self.state = ConnectionState::Connected;
        tracing::debug!("Reopened SQLite database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ErrorKind, Value};

    async fn open() -> SqliteConnection {
        SqliteConnection::connect(SqliteConfig::in_memory()).await.unwrap()
    }

    #[test]
    fn test_transaction_state_transitions() {
        smol::block_on(async {
            let mut conn = open().await;
            assert_eq!(conn.state(), ConnectionState::Connected);

            conn.begin_transaction().await.unwrap();
            assert_eq!(conn.state(), ConnectionState::InTransaction);

            let error = conn.begin_transaction().await.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Driver);
            assert!(error.message().ends_with("There is already an active transaction"));

            conn.commit_transaction().await.unwrap();
            assert_eq!(conn.state(), ConnectionState::Connected);

            let error = conn.rollback_transaction().await.unwrap_err();
            assert!(error.message().ends_with("There is no active transaction"));
            let error = conn.commit_transaction().await.unwrap_err();
            assert!(error.message().ends_with("There is no active transaction"));
        });
    }

    #[test]
    fn test_fetch_drains_buffer() {
        smol::block_on(async {
            let mut conn = open().await;
            let mut query = conn
                .prepare_and_execute_query("SELECT 1 AS a UNION ALL SELECT 2 UNION ALL SELECT 3", &[])
                .await
                .unwrap();

            assert_eq!(query.pending_rows(), 3);
            let first = conn.fetch_one(&mut query).unwrap();
            assert_eq!(first.get("a"), Some(&Value::Int(1)));

            let rest = conn.fetch_all(&mut query);
            assert_eq!(rest.len(), 2);
            assert!(conn.fetch_one(&mut query).is_none());
        });
    }

    #[test]
    fn test_free_results_discards_rows() {
        smol::block_on(async {
            let mut conn = open().await;
            let mut query = conn
                .prepare_and_execute_query("SELECT 'x' AS v UNION ALL SELECT 'y'", &[])
                .await
                .unwrap();

            conn.free_results(&mut query);
            assert!(conn.fetch_one(&mut query).is_none());
            assert_eq!(query.query(), "SELECT 'x' AS v UNION ALL SELECT 'y'");
        });
    }

    #[test]
    fn test_prepared_query_can_be_reexecuted() {
        smol::block_on(async {
            let mut conn = open().await;
            let mut query = conn.prepare_query("SELECT ? + 1 AS n").await.unwrap();

            conn.execute_query(&mut query, &[Param::from(1)]).await.unwrap();
            assert_eq!(conn.fetch_one(&mut query).unwrap().get("n"), Some(&Value::Int(2)));

            conn.execute_query(&mut query, &[Param::from(41)]).await.unwrap();
            assert_eq!(conn.fetch_one(&mut query).unwrap().get("n"), Some(&Value::Int(42)));
        });
    }

    #[test]
    fn test_failed_execute_clears_previous_results() {
        smol::block_on(async {
            let mut conn = open().await;
            conn.prepare_and_execute_query("CREATE TABLE t (id INTEGER PRIMARY KEY)", &[])
                .await
                .unwrap();

            let mut query = conn
                .prepare_query("INSERT INTO t (id) VALUES (?) RETURNING id")
                .await
                .unwrap();
            conn.execute_query(&mut query, &[Param::from(1)]).await.unwrap();
            assert_eq!(conn.row_count(&query), 1);
            assert_eq!(query.pending_rows(), 1);

            let error = conn
                .execute_query(&mut query, &[Param::from(1)])
                .await
                .unwrap_err();
            assert_eq!(error.kind(), ErrorKind::UniqueViolation);
            assert!(conn.fetch_one(&mut query).is_none());
            assert_eq!(conn.row_count(&query), 0);
        });
    }

    #[test]
    fn test_booleans_bind_as_integers() {
        smol::block_on(async {
            let mut conn = open().await;
            let outcome = conn
                .run_query("SELECT ? AS t, ? AS f", &[Param::from(true), Param::from(false)])
                .await
                .unwrap();

            let row = &outcome.rows[0];
            assert_eq!(row.get("t"), Some(&Value::Int(1)));
            assert_eq!(row.get("f"), Some(&Value::Int(0)));
        });
    }

    #[test]
    fn test_quote_identifier() {
        let conn = smol::block_on(open());
        assert_eq!(conn.quote_identifier("main.account"), "\"main\".\"account\"");
    }
}
