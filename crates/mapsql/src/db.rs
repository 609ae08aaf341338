//! Database handles: [`Db`] for the pool, [`Tx`] for an open transaction.
//!
//! Both deref to [`Executor`], so repository code written against
//! `&Executor` runs unchanged with or without a transaction:
//!
//! ```ignore
//! use mapsql::{Executor, SqlResult, values, where_map};
//!
//! async fn rename(exec: &Executor, id: i64, name: &str) -> SqlResult<u64> {
//!     exec.update("users", &values! { "name" => name }, &mut where_map! { "id" => id })
//!         .await
//! }
//!
//! # async fn demo(db: mapsql::Db) -> SqlResult<()> {
//! rename(&db, 1, "alice").await?;
//!
//! let tx = db.begin().await?;
//! rename(&tx, 2, "bob").await?;
//! tx.commit().await?;
//! # Ok(()) }
//! ```
//!
//! `commit` and `rollback` consume the [`Tx`], so it cannot be used after it
//! completes:
//!
//! ```compile_fail
//! # async fn demo(db: mapsql::Db) -> mapsql::SqlResult<()> {
//! let tx = db.begin().await?;
//! tx.commit().await?;
//! tx.query("SELECT 1", &[]).await?;
//! # Ok(()) }
//! ```

use crate::context::Context;
use crate::error::{SqlError, SqlResult};
use crate::executor::{Executor, Shared, WaitStats};
use crate::monitor::{PoolStats, QueryMonitor, TracingMonitor, TxAction};
use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

/// Runs the given block inside a transaction.
///
/// - Begins a transaction via `$db.begin().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)` and returns the block's error, or
///   [`SqlError::Rollback`](crate::SqlError::Rollback) carrying both errors
///   when the rollback fails too.
///
/// The block must evaluate to `mapsql::SqlResult<T>`.
///
/// # Example
///
/// ```ignore
/// mapsql::transaction!(db, tx, {
///     tx.update("accounts", &values! { "balance" => 0 }, &mut where_map! { "id" => 1 }).await?;
///     tx.insert("audit", &values! { "account" => 1 }).await?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($db:expr, $tx:ident, $body:block) => {{
        let $tx = ($db).begin().await?;
        let __mapsql_tx_body_result = async { $body }.await;
        match __mapsql_tx_body_result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::SqlError::rollback_failed(error, rollback_err)),
            },
        }
    }};
}

/// Pool and execution settings for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbOptions {
    /// Pool size limit.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long `acquire` may wait for a free connection.
    pub acquire_timeout: Duration,
    /// Default statement timeout, used when the caller's context has no deadline.
    pub query_timeout: Option<Duration>,
    /// Statements at or above this duration are reported as slow.
    pub slow_query_threshold: Option<Duration>,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 16,
            min_connections: 0,
            acquire_timeout: Duration::from_secs(30),
            query_timeout: None,
            slow_query_threshold: None,
        }
    }
}

impl DbOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    fn pool_options(&self) -> AnyPoolOptions {
        AnyPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(self.acquire_timeout)
    }
}

/// A named database backed by a connection pool.
///
/// Cheap to clone; clones share the pool, the monitor and the wait counters.
pub struct Db {
    inner: Executor,
}

impl Db {
    /// Create the pool without opening a connection.
    ///
    /// The URL scheme selects the driver (`sqlite:`, `mysql:`). Connection
    /// errors surface on first use.
    pub fn connect_lazy(name: impl Into<String>, url: &str, options: DbOptions) -> SqlResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = options.pool_options().connect_lazy(url)?;
        Ok(Self::build(name.into(), driver_name(url), pool, &options))
    }

    /// Create the pool and open the first connection.
    pub async fn connect(name: impl Into<String>, url: &str, options: DbOptions) -> SqlResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = options.pool_options().connect(url).await?;
        Ok(Self::build(name.into(), driver_name(url), pool, &options))
    }

    /// Wrap an existing pool.
    pub fn from_pool(name: impl Into<String>, driver: impl Into<String>, pool: AnyPool) -> Self {
        Self::build(name.into(), driver.into(), pool, &DbOptions::default())
    }

    fn build(name: String, driver: String, pool: AnyPool, options: &DbOptions) -> Self {
        Self::from_shared(Shared {
            name,
            driver,
            pool,
            monitor: Arc::new(TracingMonitor::new()),
            query_timeout: options.query_timeout,
            slow_query_threshold: options.slow_query_threshold,
            waits: Arc::new(WaitStats::default()),
        })
    }

    fn from_shared(shared: Shared) -> Self {
        Self {
            inner: Executor::pooled(Arc::new(shared)),
        }
    }

    /// Replace the monitor (the default logs through `tracing`).
    pub fn with_monitor<M: QueryMonitor + 'static>(self, monitor: M) -> Self {
        self.with_monitor_arc(Arc::new(monitor))
    }

    /// Replace the monitor with an Arc-wrapped one.
    pub fn with_monitor_arc(self, monitor: Arc<dyn QueryMonitor>) -> Self {
        let shared = self.inner.shared();
        Self::from_shared(Shared {
            monitor,
            ..Shared::clone(shared)
        })
    }

    /// Change the default statement timeout.
    pub fn with_query_timeout(self, timeout: Option<Duration>) -> Self {
        let shared = self.inner.shared();
        Self::from_shared(Shared {
            query_timeout: timeout,
            ..Shared::clone(shared)
        })
    }

    /// Change the slow query threshold.
    pub fn with_slow_query_threshold(self, threshold: Option<Duration>) -> Self {
        let shared = self.inner.shared();
        Self::from_shared(Shared {
            slow_query_threshold: threshold,
            ..Shared::clone(shared)
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.inner.shared().pool
    }

    /// Current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.shared().pool_stats()
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        self.pool().close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.pool().is_closed()
    }

    /// Start a transaction.
    pub async fn begin(&self) -> SqlResult<Tx> {
        self.begin_ctx(&Context::background()).await
    }

    /// Start a transaction under a deadline / cancellation context.
    pub async fn begin_ctx(&self, ctx: &Context) -> SqlResult<Tx> {
        let shared = self.inner.shared();
        let result = ctx
            .run(shared.query_timeout, async {
                shared.pool.begin().await.map_err(SqlError::from)
            })
            .await;
        report_tx(shared, TxAction::Begin, result.as_ref().err());
        Ok(Tx {
            inner: Executor::transactional(shared.clone(), result?),
        })
    }
}

impl Clone for Db {
    fn clone(&self) -> Self {
        Self {
            inner: Executor::pooled(self.inner.shared().clone()),
        }
    }
}

impl Deref for Db {
    type Target = Executor;

    fn deref(&self) -> &Executor {
        &self.inner
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.name())
            .field("driver", &self.driver())
            .finish()
    }
}

/// An open transaction.
///
/// Dropping a `Tx` without committing rolls it back. Once a statement on it is
/// abandoned by its [`Context`], every later statement and `commit` fail with
/// [`SqlError::TxAborted`]; `rollback` still succeeds.
pub struct Tx {
    inner: Executor,
}

impl Tx {
    /// Commit the transaction. The driver's error is returned unchanged.
    pub async fn commit(self) -> SqlResult<()> {
        self.finish(End::Commit).await
    }

    /// Roll the transaction back. The driver's error is returned unchanged.
    pub async fn rollback(self) -> SqlResult<()> {
        self.finish(End::Rollback).await
    }

    async fn finish(self, end: End) -> SqlResult<()> {
        let shared = self.inner.shared().clone();
        // Tx is only ever built around a transactional executor
        let Some((tx, aborted)) = self.inner.into_transaction() else {
            return Ok(());
        };
        let result: SqlResult<()> = match (end, aborted) {
            // dropping the transaction queues its rollback behind the abandoned statement
            (End::Commit, true) => Err(SqlError::TxAborted),
            (End::Rollback, true) => Ok(()),
            (End::Commit, false) => tx.commit().await.map_err(Into::into),
            (End::Rollback, false) => tx.rollback().await.map_err(Into::into),
        };
        report_tx(&shared, end.action(), result.as_ref().err());
        result
    }
}

#[derive(Debug, Clone, Copy)]
enum End {
    Commit,
    Rollback,
}

impl End {
    fn action(self) -> TxAction {
        match self {
            End::Commit => TxAction::Commit,
            End::Rollback => TxAction::Rollback,
        }
    }
}

impl Deref for Tx {
    type Target = Executor;

    fn deref(&self) -> &Executor {
        &self.inner
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("name", &self.name())
            .field("driver", &self.driver())
            .finish()
    }
}

fn report_tx(shared: &Shared, action: TxAction, error: Option<&SqlError>) {
    let message = error.map(ToString::to_string);
    shared
        .monitor
        .on_transaction(&shared.name, &shared.driver, action, message.as_deref());
}

/// Driver name taken from the URL scheme.
pub(crate) fn driver_name(url: &str) -> String {
    url.split_once(':')
        .map(|(scheme, _)| scheme)
        .unwrap_or(url)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_from_scheme() {
        assert_eq!(driver_name("sqlite::memory:"), "sqlite");
        assert_eq!(driver_name("MySQL://root@localhost/app"), "mysql");
        assert_eq!(driver_name("nocolon"), "nocolon");
    }

    #[test]
    fn options_builder() {
        let opts = DbOptions::new()
            .max_connections(4)
            .query_timeout(Duration::from_secs(2))
            .slow_query_threshold(Duration::from_millis(200));
        assert_eq!(opts.max_connections, 4);
        assert_eq!(opts.min_connections, 0);
        assert_eq!(opts.query_timeout, Some(Duration::from_secs(2)));
        assert_eq!(opts.slow_query_threshold, Some(Duration::from_millis(200)));
    }

    #[test]
    fn end_maps_to_monitor_action() {
        assert_eq!(End::Commit.action(), TxAction::Commit);
        assert_eq!(End::Rollback.action(), TxAction::Rollback);
    }

    #[tokio::test]
    async fn lazy_pool_has_no_connections() {
        let db = Db::connect_lazy("main", "sqlite::memory:", DbOptions::new().max_connections(3))
            .unwrap();
        let stats = db.pool_stats();
        assert_eq!(stats.in_use, 0);
        assert_eq!(stats.max_open, 3);
        assert_eq!(stats.wait_count, 0);
        assert_eq!(db.name(), "main");
        assert_eq!(db.driver(), "sqlite");
        assert!(!db.is_transactional());
    }
}
