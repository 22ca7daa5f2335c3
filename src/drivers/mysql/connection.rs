//! MySQL connection implementation.
//!
//! This module implements the `DatabaseConnection` trait for MySQL and
//! MariaDB on top of a single SQLx `MySqlConnection`.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySql, MySqlConnectOptions, MySqlConnection as SqlxConnection};
use sqlx::{Connection, Either, Executor, Statement};

use super::exception_converter::MySqlExceptionConverter;
use super::types::MySqlValueConverter;
use crate::traits::{
    ClientPhase, ConnectionState, DatabaseConnection, DatabaseType, DriverError, DriverResult,
    ExceptionConverter, MysqlConfig, NativeError, Param, PreparedQuery,
};

/// MySQL/MariaDB database connection.
///
/// Owns exactly one native connection; there is no pooling.
pub struct MySqlConnection {
    config: MysqlConfig,
    converter: MySqlExceptionConverter,
    conn: SqlxConnection,
    state: ConnectionState,
}

impl std::fmt::Debug for MySqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlConnection")
            .field("config", &self.config)
            .field("conn", &"<MySqlConnection>")
            .field("state", &self.state)
            .finish()
    }
}

impl MySqlConnection {
    /// Connect to the server described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a classified error (no query text) when the server cannot be
    /// reached or rejects the credentials.
    pub async fn connect(config: MysqlConfig) -> DriverResult<Self> {
        let converter = MySqlExceptionConverter;
        let conn = Self::establish(&config, &converter).await?;

        tracing::debug!(
            "Connected to MySQL at {}:{} as {}",
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

    /// Build MySqlConnectOptions from the configuration.
    fn build_connect_options(config: &MysqlConfig) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .charset(&config.charset)
            .ssl_mode(MySqlValueConverter::map_ssl_mode(config.ssl.as_ref()));

        if let Some(dbname) = &config.dbname {
            options = options.database(dbname);
        }

        if let Some(ssl) = &config.ssl {
            if let Some(ca) = &ssl.root_certificate_path {
                options = options.ssl_ca(ca);
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
        config: &MysqlConfig,
        converter: &MySqlExceptionConverter,
    ) -> DriverResult<SqlxConnection> {
        let options = Self::build_connect_options(config);
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
impl DatabaseConnection for MySqlConnection {
    type Backend = MySql;
    type Config = MysqlConfig;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySQL
    }

    fn config(&self) -> &MysqlConfig {
        &self.config
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    async fn begin_transaction(&mut self) -> DriverResult<()> {
        if self.state == ConnectionState::InTransaction {
            return Err(self.transaction_error("There is already an active transaction"));
        }

        self.execute_raw("START TRANSACTION").await?;
        self.state = ConnectionState::InTransaction;
        tracing::debug!("MySQL transaction started");
        Ok(())
    }

    async fn commit_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("COMMIT").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("MySQL transaction committed");
        Ok(())
    }

    async fn rollback_transaction(&mut self) -> DriverResult<()> {
        if self.state != ConnectionState::InTransaction {
            return Err(self.transaction_error("There is no active transaction"));
        }

        self.execute_raw("ROLLBACK").await?;
        self.state = ConnectionState::Connected;
        tracing::debug!("MySQL transaction rolled back");
        Ok(())
    }

    async fn prepare_query(&mut self, sql: &str) -> DriverResult<PreparedQuery<MySql>> {
        let statement = self
            .conn
            .prepare(sql)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?;

        Ok(PreparedQuery::new(Statement::to_owned(&statement), sql))
    }

    async fn execute_query(
        &mut self,
        query: &mut PreparedQuery<MySql>,
        params: &[Param],
    ) -> DriverResult<()> {
        query.store_results(Vec::new(), 0);

        let converter = self.converter;
        let mut rows = Vec::new();
        let mut rows_affected = 0;

        {
            let sql = query.query();
            let bound = MySqlValueConverter::bind_params(query.statement().query(), params);
            let mut stream = self.conn.fetch_many(bound);

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|e| converter.convert_sqlx(e, ClientPhase::Connected, Some(sql)))?
            {
                match item {
                    Either::Left(result) => rows_affected += result.rows_affected(),
                    Either::Right(row) => rows.push(
                        MySqlValueConverter::convert_row(&row).map_err(|e| {
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
        let id: u64 = sqlx::query_scalar("SELECT LAST_INSERT_ID()")
            .fetch_one(&mut self.conn)
            .await
            .map_err(|e| self.converter.convert_sqlx(e, ClientPhase::Connected, None))?;

        Ok(id.to_string())
    }

    async fn reconnect(&mut self) -> DriverResult<()> {
        let fresh = Self::establish(&self.config, &self.converter).await?;
        let stale = std::mem::replace(&mut self.conn, fresh);

        if let Err(e) = stale.close().await {
            tracing::debug!("Closing replaced MySQL connection failed: {}", e);
        }

        self.state = ConnectionState::Connected;
        tracing::debug!("Reconnected to MySQL at {}:{}", self.config.host, self.config.port);
        Ok(())
    }
}
