//! Bounded-retry connection handling.

use crate::error::{MetadataError, MetadataResult};
use bitpres_core::config::ReconnectConfig;
use sqlx::pool::PoolConnection;
use sqlx::{Database, Pool};
use std::future::Future;
use std::time::Duration;

/// Owns the pool of one backing store and hands out connections.
///
/// Every checkout is retried up to `max_attempts` times with a fixed delay
/// between attempts. A unit of work run through [`ConnectionManager::run`] is
/// retried from the start, on a fresh connection, when it fails because the
/// connection broke. Exhausting the budget yields
/// [`MetadataError::StoreUnavailable`], which callers must not retry.
/// Connections go back to the pool when the returned guard drops.
pub struct ConnectionManager<DB: Database> {
    pool: Pool<DB>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<DB: Database> ConnectionManager<DB> {
    pub fn new(pool: Pool<DB>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn from_config(pool: Pool<DB>, config: &ReconnectConfig) -> Self {
        Self::new(pool, config.max_attempts, config.delay())
    }

    /// The underlying pool.
    pub fn pool(&self) -> &Pool<DB> {
        &self.pool
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Check out one connection. Any failure to connect counts against the
    /// retry budget.
    pub async fn acquire(&self) -> MetadataResult<PoolConnection<DB>> {
        let mut attempt = 1;
        loop {
            match self.pool.acquire().await {
                Ok(conn) => return Ok(conn),
                Err(e) => self.next_attempt("acquire", attempt, e).await?,
            }
            attempt += 1;
        }
    }

    /// Run one unit of work on a checked-out connection.
    ///
    /// Work that fails with a connection error is run again from the start on
    /// a fresh connection. Work that opens a transaction is rolled back when
    /// it fails, so a retried unit never applies twice. Other errors are
    /// returned as they are.
    pub async fn run<T, F, Fut>(&self, op: &'static str, mut work: F) -> MetadataResult<T>
    where
        F: FnMut(PoolConnection<DB>) -> Fut,
        Fut: Future<Output = Result<T, sqlx::Error>>,
    {
        let mut attempt = 1;
        loop {
            let conn = self.acquire().await?;
            match work(conn).await {
                Ok(value) => return Ok(value),
                Err(e) if is_connection_error(&e) => self.next_attempt(op, attempt, e).await?,
                Err(e) => return Err(e.into()),
            }
            attempt += 1;
        }
    }

    /// Close the pool. Outstanding connections are closed as they return.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Wait before the next attempt, or give up once the budget is spent.
    async fn next_attempt(&self, op: &str, attempt: u32, err: sqlx::Error) -> MetadataResult<()> {
        if attempt >= self.max_attempts {
            tracing::error!(
                op,
                attempts = attempt,
                error = %err,
                "Giving up on backing store connection"
            );
            return Err(MetadataError::StoreUnavailable {
                attempts: attempt,
                source: err,
            });
        }
        tracing::warn!(
            op,
            attempt,
            max_attempts = self.max_attempts,
            delay_ms = self.retry_delay.as_millis() as u64,
            error = %err,
            "Backing store connection failed, retrying"
        );
        tokio::time::sleep(self.retry_delay).await;
        Ok(())
    }
}

/// Errors that mean the connection itself broke, as opposed to the statement
/// being rejected.
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}
