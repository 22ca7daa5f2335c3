//! PostgreSQL connection implementation.
//!
//! This module implements the `DatabaseConnection` trait for PostgreSQL
//! on top of a single SQLx `PgConnection`.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgTypeInfo, Postgres};
use sqlx::{Connection, Either, Executor, Statement};

use super::exception_converter::PostgresExceptionConverter;
use super::types::PgValueConverter;
use crate::traits::{
    ClientPhase, ConnectionState, DatabaseConnection, DatabaseType, DriverError, DriverResult,
    ExceptionConverter, NativeError, Param, PgsqlConfig, PreparedQuery,
};

/// PostgreSQL database connection.
pub struct PostgresConnection {
    config: PgsqlConfig,
    converter: PostgresExceptionConverter,
    conn: PgConnection,
    state: ConnectionState,
}

impl std::fmt::Debug for PostgresConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnection")
            .field("config", &self.config)
            .field("conn", &"<PgConnection>")
            .field("state", &self.state)
            .finish()
    }
}

impl PostgresConnection {
    /// Connect to the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a classified error (no query text) when the server cannot be
    /// reached, the database does not exist or the credentials are rejected.
    pub async fn connect(config: PgsqlConfig) -> DriverResult<Self> {
        let converter = PostgresExceptionConverter;
        let conn = Self::establish(&config, &converter).await?;

        tracing::debug!(
            "Connected to PostgreSQL at {}:{} as {}",
            config.host,
            config.port,
            config.user
        );

        Ok(Self {
            config,
            converter,
            conn,
            state: ConnectionState::Connected,
        })
    }

    /// Build PgConnectOptions from the configuration.
    fn build_connect_options(config: &PgsqlConfig) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .options([("client_encoding", config.charset.as_str())])
            .ssl_mode(PgValueConverter::map_ssl_mode(config.ssl.as_ref()));

        if let Some(dbname) = &config.dbname {
            options = options.database(dbname);
        }

        if let Some(ssl) = &config.ssl {
            if let Some(ca) = &ssl.root_certificate_path {
                options = options.ssl_root_cert(ca);
            }
            if let Some(cert) = &ssl.certificate_path {
                options = options.ssl_client_cert(cert);
            }
            if let Some(key) = &ssl.private_key_path {
                options = options.ssl_client_key(key);
            }
        }

        options
    }

    async fn establish(
        config: &PgsqlConfig,
        converter: &PostgresExceptionConverter,
    ) -> DriverResult<PgConnection> {
        let options = Self::build_connect_options(config);
        PgConnection::connect_with(&options)
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
impl DatabaseConnection for PostgresConnection {
    type Backend = Postgres;
    type Config = PgsqlConfig;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSQL
    }

    fn config(&self) -> &PgsqlConfig {
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
        tracing::debug!("PostgreSQL transaction started");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("COMMIT").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("PostgreSQL transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("ROLLBACK").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("PostgreSQL transaction rolled back");
        Ok(())
    }

    async fn prepare_query(&mut self, sql: &str) -> DriverResult<PreparedQuery<Postgres>> {
        let statement = self
            .conn
            .prepare(sql)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?;

        Ok(PreparedQuery::new(Statement::to_owned(&statement), sql))
    }

    async fn execute_query(
        &mut self,
        query: &mut PreparedQuery<Postgres>,
        params: &[Param],
    ) -> DriverResult<()> {
        query.store_results(Vec::new(), 0);

        let converter = self.converter;
        let mut rows = Vec::new();
        let mut rows_affected = 0;

        {
            let sql = query.query();
            let statement = query.statement();
            let types: &[PgTypeInfo] = match statement.parameters() {
                Some(Either::Left(types)) => types,
                _ => &[],
            };
            let bound = PgValueConverter::bind_params(statement.query(), params, types)
                .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?;
            let mut stream = self.conn.fetch_many(bound);

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?
            {
                match item {
                    Either::Left(result) => rows_affected += result.rows_affected(),
                    Either::Right(row) => rows.push(
                        PgValueConverter::convert_row(&row).map_err(|e| {
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
        let id: i64 = sqlx::query_scalar("SELECT LASTVAL()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, None))?;

        Ok(id.to_string())
    }

    async fn reconnect(&mut self) -> DriverResult<()> {
        let fresh = Self::establish(&self.config, &self.converter).await?;
        let stale = std::mem::replace(&mut self.conn, fresh);

        if let Err(e) = stale.close().await {
            tracing::debug!("Closing replaced PostgreSQL connection failed: {}", e);
        }

        self.state = ConnectionState::Connected;
        tracing::debug!(
            "Reconnected to PostgreSQL at {}:{}",
            self.config.host,
            self.config.port
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ErrorKind, SslConfig};

    #[test]
    fn test_build_connect_options() {
        let config = PgsqlConfig::new("pg.internal", "app", "secret")
            .with_dbname("ledger")
            .with_charset("LATIN1")
            .with_ssl(SslConfig::new().with_root_certificate("/etc/ssl/ca.pem"));

        let options = PostgresConnection::build_connect_options(&config);
        assert_eq!(options.get_host(), "pg.internal");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "app");
        assert_eq!(options.get_database(), Some("ledger"));
        assert!(matches!(
            options.get_ssl_mode(),
            sqlx::postgres::PgSslMode::VerifyFull
        ));
        assert!(
            options
                .get_options()
                .is_some_and(|o| o.contains("client_encoding=LATIN1"))
        );
    }

    #[test]
    fn test_unreachable_server_is_connection_failure() {
        let config = PgsqlConfig::new("127.0.0.1", "postgres", "").with_port(1);
        let error = smol::block_on(PostgresConnection::connect(config)).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ConnectionFailure);
        assert_eq!(error.sql_state(), "08006");
        assert_eq!(error.query(), None);
    }
}
