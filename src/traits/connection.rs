//! Core database connection trait.
//!
//! This module defines the `DatabaseConnection` trait every driver implements,
//! the `PreparedQuery` handle it hands out, and the buffered result of a
//! one-shot query.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use async_trait::async_trait;

use super::error::DriverResult;
use super::row::{Param, Row};
use super::types::DatabaseType;

/// Transaction state of a live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connected,
    InTransaction,
}

/// A compiled statement together with the query text it came from.
///
/// The handle is typed by backend, so a statement prepared on one backend
/// cannot be executed on another. Each execution replaces the buffered
/// rows and the affected-row count held by the handle.
pub struct PreparedQuery<B: sqlx::Database> {
    statement: B::Statement<'static>,
    sql: String,
    rows: VecDeque<Row>,
    rows_affected: u64,
}

impl<B: sqlx::Database> PreparedQuery<B> {
    pub(crate) fn new(statement: B::Statement<'static>, sql: impl Into<String>) -> Self {
        Self {
            statement,
            sql: sql.into(),
            rows: VecDeque::new(),
            rows_affected: 0,
        }
    }

    pub(crate) fn statement(&self) -> &B::Statement<'static> {
        &self.statement
    }

    pub(crate) fn store_results(&mut self, rows: Vec<Row>, rows_affected: u64) {
        self.rows = rows.into();
        self.rows_affected = rows_affected;
    }

    /// The query text this handle was prepared from
    pub fn query(&self) -> &str {
        &self.sql
    }

    /// Rows affected by the latest execution
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    /// Rows not yet fetched
    pub fn pending_rows(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    pub(crate) fn take_rows(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.rows = VecDeque::new();
    }
}

impl<B: sqlx::Database> fmt::Debug for PreparedQuery<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedQuery")
            .field("backend", &B::NAME)
            .field("sql", &self.sql)
            .field("pending_rows", &self.rows.len())
            .field("rows_affected", &self.rows_affected)
            .finish()
    }
}

/// Everything a one-shot query produced
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Result rows, empty for statements that return none
    pub rows: Vec<Row>,
    /// Number of rows affected
    pub rows_affected: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u128,
    /// The original query that was executed
    pub original_query: String,
}

/// Core trait for all database connections.
///
/// Every failure reported by the native client is classified by the
/// backend's exception converter before it reaches the caller.
///
/// # Example
///
/// ```ignore
/// use sqlbridge::{DatabaseConnection, ErrorKind, Param};
///
/// async fn rename<C: DatabaseConnection>(conn: &mut C) -> sqlbridge::DriverResult<u64> {
///     let query = conn
///         .prepare_and_execute_query(
///             "UPDATE account SET username = ? WHERE id = ?",
///             &[Param::from("jane"), Param::from(1)],
///         )
///         .await?;
///     Ok(conn.row_count(&query))
/// }
/// ```
#[async_trait]
pub trait DatabaseConnection: Send {
    /// The sqlx backend this connection speaks
    type Backend: sqlx::Database;

    /// Configuration the connection was built from
    type Config: fmt::Debug;

    /// Get the database type for this connection
    fn database_type(&self) -> DatabaseType;

    fn config(&self) -> &Self::Config;

    fn state(&self) -> ConnectionState;

    /// Start a transaction.
    ///
    /// # Errors
    ///
    /// Fails if a transaction is already active or the server rejects it.
    async fn begin_transaction(&mut self) -> DriverResult<()>;

    /// Commit the active transaction.
    ///
    /// # Errors
    ///
    /// Fails if no transaction is active or the server rejects the commit.
    async fn commit_transaction(&mut self) -> DriverResult<()>;

    /// Roll back the active transaction.
    async fn rollback_transaction(&mut self) -> DriverResult<()>;

    /// Compile `sql` on the server and return a handle to it.
    async fn prepare_query(&mut self, sql: &str) -> DriverResult<PreparedQuery<Self::Backend>>;

    /// Execute a prepared query with positional parameters, buffering its
    /// rows and affected-row count in the handle.
    async fn execute_query(
        &mut self,
        query: &mut PreparedQuery<Self::Backend>,
        params: &[Param],
    ) -> DriverResult<()>;

    async fn prepare_and_execute_query(
        &mut self,
        sql: &str,
        params: &[Param],
    ) -> DriverResult<PreparedQuery<Self::Backend>> {
        let mut query = self.prepare_query(sql).await?;
        self.execute_query(&mut query, params).await?;
        Ok(query)
    }

    /// Next buffered row, or `None` once the result is exhausted
    fn fetch_one(&mut self, query: &mut PreparedQuery<Self::Backend>) -> Option<Row> {
        query.next_row()
    }

    /// All remaining buffered rows
    fn fetch_all(&mut self, query: &mut PreparedQuery<Self::Backend>) -> Vec<Row> {
        query.take_rows()
    }

    /// Discard the remaining rows of the latest execution
    fn free_results(&mut self, query: &mut PreparedQuery<Self::Backend>) {
        query.clear();
    }

    /// Rows affected by the latest execution of `query`
    fn row_count(&self, query: &PreparedQuery<Self::Backend>) -> u64 {
        query.rows_affected()
    }

    /// Id generated by the most recent insert in this session
    async fn last_insert_id(&mut self) -> DriverResult<String>;

    /// Replace the native handle with a fresh one.
    ///
    /// Prepared queries and any open transaction from before the call are
    /// no longer usable afterwards.
    async fn reconnect(&mut self) -> DriverResult<()>;

    fn quote_identifier(&self, identifier: &str) -> String {
        quote_identifier(self.database_type().quote_character(), identifier)
    }

    /// Prepare, execute and drain a query in one call
    async fn run_query(&mut self, sql: &str, params: &[Param]) -> DriverResult<QueryOutcome> {
        let start = Instant::now();
        let mut query = self.prepare_and_execute_query(sql, params).await?;
        let rows = self.fetch_all(&mut query);

        Ok(QueryOutcome {
            rows,
            rows_affected: self.row_count(&query),
            execution_time_ms: start.elapsed().as_millis(),
            original_query: sql.to_string(),
        })
    }
}

/// Quote each dot-separated part of `identifier`, doubling embedded quotes.
pub fn quote_identifier(quote: char, identifier: &str) -> String {
    let doubled = format!("{quote}{quote}");
    identifier
        .split('.')
        .map(|part| format!("{quote}{}{quote}", part.replace(quote, &doubled)))
        .collect::<Vec<_>>()
        .join(".")
}
