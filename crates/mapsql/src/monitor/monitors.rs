use super::truncate_sql_bytes;
use super::types::{QueryEvent, QueryMonitor, QueryResult, QueryType, TxAction};
use crate::builder::format_sql;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A no-op monitor that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMonitor;

impl QueryMonitor for NoopMonitor {
    fn on_query_complete(&self, _event: &QueryEvent<'_>) {}
}

/// Default monitor: one `tracing` event per statement.
///
/// Successful statements are logged at `info`, failures and slow statements
/// at `warn`, under the `mapsql.sql` target. Transaction steps go to
/// `mapsql.db`. Without a subscriber installed these are no-ops.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            max_sql_length: Some(2048),
        }
    }
}

impl TracingMonitor {
    /// Create a new monitor with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn render_sql(&self, event: &QueryEvent<'_>) -> String {
        let sql = format_sql(event.sql, event.args);
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(&sql, max)),
            _ => sql,
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_complete(&self, event: &QueryEvent<'_>) {
        let sql = self.render_sql(event);
        let pool = &event.pool;
        match event.result {
            QueryResult::Error(err) => tracing::warn!(
                target: "mapsql.sql",
                db = event.db,
                driver = event.driver,
                in_use = pool.in_use,
                idle = pool.idle,
                max_open = pool.max_open,
                wait_count = pool.wait_count,
                wait_us = pool.wait_duration.as_micros() as u64,
                elapsed_us = event.duration.as_micros() as u64,
                trans = event.transactional,
                sql = %sql,
                err = %err,
                "statement failed"
            ),
            result => tracing::info!(
                target: "mapsql.sql",
                db = event.db,
                driver = event.driver,
                in_use = pool.in_use,
                idle = pool.idle,
                max_open = pool.max_open,
                wait_count = pool.wait_count,
                wait_us = pool.wait_duration.as_micros() as u64,
                elapsed_us = event.duration.as_micros() as u64,
                trans = event.transactional,
                sql = %sql,
                result = %result,
                "statement"
            ),
        }
    }

    fn on_slow_query(&self, event: &QueryEvent<'_>) {
        tracing::warn!(
            target: "mapsql.sql",
            db = event.db,
            elapsed_us = event.duration.as_micros() as u64,
            query_type = ?event.query_type,
            sql = %self.render_sql(event),
            "slow statement"
        );
    }

    fn on_transaction(&self, db: &str, driver: &str, action: TxAction, error: Option<&str>) {
        match error {
            Some(err) => tracing::warn!(target: "mapsql.db", db, driver, action = %action, err, "transaction step failed"),
            None => tracing::info!(target: "mapsql.db", db, driver, action = %action, "transaction"),
        }
    }
}

/// A monitor that tracks query statistics.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    transactional_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    slow_queries: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

/// Collected query statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    /// Total number of statements executed.
    pub total_queries: u64,
    /// Total number of failed statements.
    pub failed_queries: u64,
    /// Statements that ran inside a transaction.
    pub transactional_queries: u64,
    /// Total execution time.
    pub total_duration: Duration,
    /// Number of SELECT queries.
    pub select_count: u64,
    /// Number of INSERT queries.
    pub insert_count: u64,
    /// Number of UPDATE queries.
    pub update_count: u64,
    /// Number of DELETE queries.
    pub delete_count: u64,
    /// Statements over the slow query threshold.
    pub slow_queries: u64,
    /// Successful commits.
    pub commits: u64,
    /// Successful rollbacks.
    pub rollbacks: u64,
    /// Slowest query duration.
    pub max_duration: Duration,
    /// Slowest query SQL.
    pub slowest_query: Option<String>,
}

impl StatsMonitor {
    /// Create a new stats monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            transactional_queries: self.transactional_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self
                .slowest_query
                .lock()
                .map(|q| q.clone())
                .unwrap_or_default(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.transactional_queries,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.slow_queries,
            &self.commits,
            &self.rollbacks,
            &self.max_duration_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut slowest) = self.slowest_query.lock() {
            *slowest = None;
        }
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, event: &QueryEvent<'_>) {
        let duration_nanos = u64::try_from(event.duration.as_nanos()).unwrap_or(u64::MAX);

        self.total_queries.fetch_add(1, Ordering::Relaxed);
        let prev_total = self
            .total_duration_nanos
            .fetch_add(duration_nanos, Ordering::Relaxed);
        if prev_total.checked_add(duration_nanos).is_none() {
            // Saturate instead of wrapping on overflow.
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        let counter = match event.query_type {
            QueryType::Select => Some(&self.select_count),
            QueryType::Insert => Some(&self.insert_count),
            QueryType::Update => Some(&self.update_count),
            QueryType::Delete => Some(&self.delete_count),
            QueryType::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        if event.result.is_error() {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }
        if event.transactional {
            self.transactional_queries.fetch_add(1, Ordering::Relaxed);
        }

        // Update max duration + slowest query only when we actually become the new max.
        let mut current_max = self.max_duration_nanos.load(Ordering::Relaxed);
        while duration_nanos > current_max {
            match self.max_duration_nanos.compare_exchange_weak(
                current_max,
                duration_nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    if let Ok(mut slowest) = self.slowest_query.lock() {
                        *slowest = Some(event.sql.to_string());
                    }
                    break;
                }
                Err(updated) => current_max = updated,
            }
        }
    }

    fn on_slow_query(&self, _event: &QueryEvent<'_>) {
        self.slow_queries.fetch_add(1, Ordering::Relaxed);
    }

    fn on_transaction(&self, _db: &str, _driver: &str, action: TxAction, error: Option<&str>) {
        if error.is_some() {
            return;
        }
        match action {
            TxAction::Commit => {
                self.commits.fetch_add(1, Ordering::Relaxed);
            }
            TxAction::Rollback => {
                self.rollbacks.fetch_add(1, Ordering::Relaxed);
            }
            TxAction::Begin => {}
        }
    }
}

/// A composite monitor that delegates to multiple monitors.
#[derive(Default)]
pub struct CompositeMonitor {
    monitors: Vec<Arc<dyn QueryMonitor>>,
}

impl CompositeMonitor {
    /// Create an empty composite monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a monitor.
    #[allow(clippy::should_implement_trait)]
    pub fn add<M: QueryMonitor + 'static>(mut self, monitor: M) -> Self {
        self.monitors.push(Arc::new(monitor));
        self
    }

    /// Add an Arc-wrapped monitor.
    pub fn add_arc(mut self, monitor: Arc<dyn QueryMonitor>) -> Self {
        self.monitors.push(monitor);
        self
    }
}

impl QueryMonitor for CompositeMonitor {
    fn on_query_complete(&self, event: &QueryEvent<'_>) {
        for monitor in &self.monitors {
            monitor.on_query_complete(event);
        }
    }

    fn on_slow_query(&self, event: &QueryEvent<'_>) {
        for monitor in &self.monitors {
            monitor.on_slow_query(event);
        }
    }

    fn on_transaction(&self, db: &str, driver: &str, action: TxAction, error: Option<&str>) {
        for monitor in &self.monitors {
            monitor.on_transaction(db, driver, action, error);
        }
    }
}
