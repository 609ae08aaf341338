//! Instrumentation for statement execution.
//!
//! Every statement dispatched by an [`Executor`](crate::Executor) produces a
//! [`QueryEvent`] carrying timing, outcome and pool statistics. The event is
//! handed to the database's [`QueryMonitor`]; the default is
//! [`TracingMonitor`], which emits one structured `tracing` event per
//! statement.
//!
//! # Example
//!
//! ```rust,ignore
//! use mapsql::monitor::{CompositeMonitor, StatsMonitor, TracingMonitor};
//! use std::sync::Arc;
//!
//! let stats = Arc::new(StatsMonitor::new());
//! let db = db.with_monitor(
//!     CompositeMonitor::new()
//!         .add(TracingMonitor::new())
//!         .add_arc(stats.clone()),
//! );
//! db.select("users", &mut where_map! { "id" => 1 }).await?;
//! assert_eq!(stats.stats().select_count, 1);
//! ```

mod monitors;
mod types;


pub use monitors::{CompositeMonitor, NoopMonitor, QueryStats, StatsMonitor, TracingMonitor};
pub use types::{PoolStats, QueryEvent, QueryMonitor, QueryResult, QueryType, TxAction};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
