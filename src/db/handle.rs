//! Request-scoped operation handle over one pooled connection.

use std::collections::VecDeque;

use sqlx::pool::PoolConnection;
use sqlx::Postgres;

use super::params::SqlParam;
use super::pool::DbPool;
use super::{DbError, Row};

/// Binds one checked-out connection to a single logical unit of work.
///
/// A transaction is opened lazily at the first `execute` and closed by
/// `commit`; anything left open is rolled back at `close`. The rows of the
/// last statement are buffered for `fetch_one`/`fetch_all`.
///
/// Connectivity failures during `execute` and `commit` are recovered by
/// discarding the dead connection, re-acquiring through the pool's full
/// probed path, and retrying the operation exactly once; the second
/// attempt's outcome is what the caller observes. Statement failures are
/// rolled back and propagated unchanged, never retried.
///
/// `close` consumes the handle, so no operation can follow it; a handle
/// dropped without `close` still returns (or severs) its connection.
pub struct DbHandle {
    pool: DbPool,
    conn: Option<PoolConnection<Postgres>>,
    rows: VecDeque<Row>,
    in_tx: bool,
    broken: bool,
}

impl DbHandle {
    pub(crate) fn new(pool: DbPool, conn: PoolConnection<Postgres>) -> Self {
        Self {
            pool,
            conn: Some(conn),
            rows: VecDeque::new(),
            in_tx: false,
            broken: false,
        }
    }

    /// Run a parameterized statement and buffer its result rows.
    ///
    /// `params` bind positionally to `$1..$n` placeholders. This layer does
    /// no statement building; SQL text is the caller's responsibility.
    pub async fn execute(&mut self, statement: &str, params: &[SqlParam]) -> Result<(), DbError> {
        match self.try_execute(statement, params).await {
            Ok(rows) => {
                self.rows = rows.into();
                Ok(())
            }
            Err(err) if super::is_connectivity(&err) => {
                tracing::warn!(error = %err, "connection lost mid-statement, reconnecting");
                self.reconnect().await?;
                match self.try_execute(statement, params).await {
                    Ok(rows) => {
                        self.rows = rows.into();
                        Ok(())
                    }
                    Err(retry_err) => {
                        let classified = DbError::classify(retry_err);
                        if matches!(classified, DbError::Statement(_)) {
                            self.rollback_best_effort().await;
                        }
                        Err(classified)
                    }
                }
            }
            Err(err) => {
                self.rollback_best_effort().await;
                Err(DbError::Statement(err))
            }
        }
    }

    /// Next buffered row of the last executed statement, if any.
    pub fn fetch_one(&mut self) -> Option<Row> {
        self.rows.pop_front()
    }

    /// All remaining buffered rows of the last executed statement.
    pub fn fetch_all(&mut self) -> Vec<Row> {
        self.rows.drain(..).collect()
    }

    /// Commit the open transaction.
    pub async fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_tx {
            return Ok(());
        }
        match self.run_commit().await {
            Ok(()) => {
                self.in_tx = false;
                Ok(())
            }
            Err(err) if super::is_connectivity(&err) => {
                tracing::warn!(error = %err, "connection lost at commit, reconnecting");
                self.reconnect().await?;
                self.run_commit().await.map_err(DbError::classify)?;
                self.in_tx = false;
                Ok(())
            }
            Err(err) => {
                // The server ends the transaction itself when COMMIT fails.
                self.in_tx = false;
                Err(DbError::Statement(err))
            }
        }
    }

    /// Scoped release: roll back anything uncommitted, then hand the
    /// connection back to the pool (or discard it when it is known bad).
    ///
    /// Never fails from the caller's perspective; a release error degrades
    /// to a forced discard so the original operation's outcome is not
    /// masked.
    pub async fn close(mut self) {
        self.rollback_best_effort().await;
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, self.broken).await;
        }
    }

    async fn try_execute(
        &mut self,
        statement: &str,
        params: &[SqlParam],
    ) -> Result<Vec<Row>, sqlx::Error> {
        if !self.in_tx {
            let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
            sqlx::query("BEGIN").execute(&mut **conn).await?;
            self.in_tx = true;
        }
        let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        let mut query = sqlx::query(statement);
        for param in params {
            query = param.bind(query);
        }
        query.fetch_all(&mut **conn).await
    }

    async fn run_commit(&mut self) -> Result<(), sqlx::Error> {
        let conn = self.conn.as_mut().ok_or(sqlx::Error::PoolClosed)?;
        sqlx::query("COMMIT").execute(&mut **conn).await?;
        Ok(())
    }

    /// Drop the dead connection and obtain a probed replacement through the
    /// pool's full retry path. Any transaction in progress died with the
    /// old session.
    async fn reconnect(&mut self) -> Result<(), DbError> {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn, true).await;
        }
        self.in_tx = false;
        match self.pool.checkout().await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.broken = false;
                Ok(())
            }
            Err(err) => {
                self.broken = true;
                Err(err)
            }
        }
    }

    async fn rollback_best_effort(&mut self) {
        if !self.in_tx {
            return;
        }
        self.in_tx = false;
        if let Some(conn) = self.conn.as_mut() {
            if let Err(err) = sqlx::query("ROLLBACK").execute(&mut **conn).await {
                tracing::debug!(error = %err, "rollback failed, connection marked for discard");
                self.broken = true;
            }
        }
    }
}

impl Drop for DbHandle {
    fn drop(&mut self) {
        // Backstop for paths that never reach `close`. A connection with an
        // open transaction must not be recycled, and async cleanup is not
        // possible here, so it is severed instead.
        if let Some(conn) = self.conn.take() {
            if self.in_tx || self.broken {
                drop(conn.detach());
                tracing::debug!("handle dropped mid-transaction, connection severed");
            }
        }
    }
}
