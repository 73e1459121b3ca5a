//! Connection pool lifecycle: probed checkout, bounded retry, and
//! whole-pool reinitialization when the pool itself goes bad.

use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Postgres};
use tokio::sync::RwLock;

use super::handle::DbHandle;
use super::DbError;

/// Bounds and target for the physical connection pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Full connection URL, TLS mode included.
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    /// How long a checkout may wait on an exhausted pool before it counts
    /// as a failed attempt.
    pub acquire_timeout: Duration,
}

/// How acquisition failures are retried before giving up.
///
/// `acquire_attempts` probed checkouts are made; if every one fails, the
/// pool is torn down and rebuilt exactly once, and a single final attempt
/// decides the outcome. The constant is configuration, not law.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub acquire_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            acquire_attempts: 3,
        }
    }
}

struct PoolInner {
    settings: PoolSettings,
    policy: RetryPolicy,
    pool: RwLock<PgPool>,
}

/// Process-wide database pool.
///
/// Cheap to clone; constructed once in `main` and carried in the
/// application state — consumers receive it explicitly, there is no
/// module-level singleton. The only mutations are checkout, release, and
/// the reinitialization swap, which sits behind a write lock.
#[derive(Clone)]
pub struct DbPool {
    inner: Arc<PoolInner>,
}

impl DbPool {
    /// Establish the pool.
    ///
    /// Fails when the backing store is unreachable; callers are expected to
    /// treat that as fatal and abort startup.
    pub async fn connect(settings: PoolSettings, policy: RetryPolicy) -> Result<Self, DbError> {
        let pool = Self::open(&settings).await.map_err(DbError::Startup)?;
        tracing::info!(
            min = settings.min_connections,
            max = settings.max_connections,
            "database pool established"
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                settings,
                policy,
                pool: RwLock::new(pool),
            }),
        })
    }

    async fn open(settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(settings.min_connections)
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout)
            .connect(&settings.url)
            .await?;

        // Probe before trusting the fresh pool with real work.
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(pool)
    }

    /// Check out a live, validated connection wrapped in a request-scoped
    /// handle.
    pub async fn acquire(&self) -> Result<DbHandle, DbError> {
        let conn = self.checkout().await?;
        Ok(DbHandle::new(self.clone(), conn))
    }

    /// Probed checkout with the configured retry policy.
    ///
    /// Also used by handles to replace a connection that died
    /// mid-operation, so the same escalation path applies there.
    pub(crate) async fn checkout(&self) -> Result<PoolConnection<Postgres>, DbError> {
        let attempts = self.inner.policy.acquire_attempts.max(1);
        for attempt in 1..=attempts {
            match self.try_checkout().await {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    tracing::warn!(attempt, attempts, error = %err, "connection checkout failed");
                }
            }
        }

        // Every attempt failed: assume the pool itself is broken, rebuild
        // it from scratch, and let one final attempt decide.
        tracing::warn!("reinitializing database pool after repeated checkout failures");
        self.reinitialize().await?;
        self.try_checkout().await.inspect_err(|err| {
            tracing::error!(error = %err, "checkout failed after pool reinitialization");
        })
    }

    async fn try_checkout(&self) -> Result<PoolConnection<Postgres>, DbError> {
        let pool = self.inner.pool.read().await.clone();
        let mut conn = pool.acquire().await.map_err(DbError::Connectivity)?;

        // Liveness probe: managed providers silently drop idle sessions, so
        // a pooled connection cannot be trusted until it answers.
        if let Err(err) = conn.ping().await {
            tracing::debug!(error = %err, "liveness probe failed, discarding connection");
            let _ = conn.detach().close().await;
            return Err(DbError::Connectivity(err));
        }

        Ok(conn)
    }

    /// Tear down and recreate the physical pool.
    async fn reinitialize(&self) -> Result<(), DbError> {
        let fresh = Self::open(&self.inner.settings)
            .await
            .map_err(DbError::Connectivity)?;
        let old = {
            let mut guard = self.inner.pool.write().await;
            std::mem::replace(&mut *guard, fresh)
        };
        // Drain the old pool in the background: connections still checked
        // out by in-flight requests close as they are returned.
        tokio::spawn(async move { old.close().await });
        tracing::info!("database pool reinitialized");
        Ok(())
    }

    /// Return a connection to the pool, or close it when it is known bad.
    ///
    /// Release failures never propagate; the worst case is a forced
    /// discard, never a masked operation outcome.
    pub(crate) async fn release(&self, conn: PoolConnection<Postgres>, discard: bool) {
        if discard {
            if let Err(err) = conn.detach().close().await {
                tracing::debug!(error = %err, "error closing discarded connection");
            }
        }
        // Dropping a healthy connection hands it back to the pool.
    }

    /// Close every pooled connection. The documented end of the pool
    /// lifecycle; pairs with `connect`.
    pub async fn shutdown(&self) {
        self.inner.pool.read().await.close().await;
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.inner.settings
    }
}
