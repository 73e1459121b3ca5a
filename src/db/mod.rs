//! Pooled data access layer.
//!
//! This module owns every physical database connection in the process:
//! - `DbPool`: bounded connection pool with probed checkout and
//!   self-healing reinitialization
//! - `DbHandle`: request-scoped wrapper binding one connection to a single
//!   logical unit of work, with transparent reconnect-and-retry-once
//! - `SqlParam`: positional statement parameters
//!
//! Route handlers never execute statements against the pool directly; all
//! database work flows through a `DbHandle`.

pub mod handle;
pub mod params;
pub mod pool;
pub mod rows;

pub use handle::DbHandle;
pub use params::SqlParam;
pub use pool::{DbPool, PoolSettings, RetryPolicy};

/// Result rows handed out by the data access layer.
///
/// Rows are always key-addressable: columns are read by name (or decoded
/// into a `FromRow` struct), never by positional tuple probing.
pub type Row = sqlx::postgres::PgRow;

/// Data-access errors, split by whether retrying could ever help.
///
/// Connectivity failures are recovered internally (bounded retry, pool
/// reinitialization); when one escapes this module the retry policy is
/// already exhausted. Statement failures are the caller's problem and are
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The backing store was unreachable while creating the pool.
    ///
    /// Fatal: the process cannot serve requests. Surfaced to startup,
    /// never swallowed.
    #[error("database unreachable at startup: {0}")]
    Startup(#[source] sqlx::Error),

    /// The transport/session is broken (dead socket, pool exhaustion,
    /// server shutdown).
    #[error("database connectivity failure: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// The statement itself failed (constraint violation, bad SQL).
    #[error("statement failed: {0}")]
    Statement(#[source] sqlx::Error),
}

impl DbError {
    /// Split a raw driver error into the retryable and non-retryable
    /// classes.
    pub(crate) fn classify(err: sqlx::Error) -> Self {
        if is_connectivity(&err) {
            DbError::Connectivity(err)
        } else {
            DbError::Statement(err)
        }
    }

    /// SQLSTATE of the underlying server error, when there is one.
    ///
    /// Lets callers react to specific conditions (e.g. `23505` unique
    /// violations) without parsing error text.
    pub fn sqlstate(&self) -> Option<String> {
        let source = match self {
            DbError::Startup(err) | DbError::Connectivity(err) | DbError::Statement(err) => err,
        };
        match source {
            sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
            _ => None,
        }
    }
}

/// Whether an error means the transport/session is broken, as opposed to
/// the statement being semantically invalid.
pub(crate) fn is_connectivity(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => match db.code() {
            // Class 08 = connection exception; 57P0x = server shutdown /
            // admin cancel, which managed providers use on idle timeout.
            Some(code) => code.starts_with("08") || code.starts_with("57P"),
            None => false,
        },
        _ => false,
    }
}

/// Decode a fixed-shape row into a typed struct.
pub fn decode_row<T>(row: &Row) -> Result<T, DbError>
where
    T: for<'r> sqlx::FromRow<'r, Row>,
{
    T::from_row(row).map_err(DbError::Statement)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_level_errors_are_connectivity() {
        assert!(is_connectivity(&sqlx::Error::PoolTimedOut));
        assert!(is_connectivity(&sqlx::Error::PoolClosed));
        assert!(is_connectivity(&sqlx::Error::WorkerCrashed));
        assert!(is_connectivity(&sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ))));
        assert!(is_connectivity(&sqlx::Error::Protocol(
            "unexpected message".into()
        )));
    }

    #[test]
    fn data_errors_are_not_connectivity() {
        assert!(!is_connectivity(&sqlx::Error::RowNotFound));
        assert!(!is_connectivity(&sqlx::Error::ColumnNotFound(
            "missing".into()
        )));
    }

    #[test]
    fn classify_splits_by_error_class() {
        assert!(matches!(
            DbError::classify(sqlx::Error::PoolTimedOut),
            DbError::Connectivity(_)
        ));
        assert!(matches!(
            DbError::classify(sqlx::Error::RowNotFound),
            DbError::Statement(_)
        ));
    }
}
