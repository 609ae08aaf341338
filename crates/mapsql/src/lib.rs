//! # mapsql
//!
//! A small SQL layer that turns a declarative *where-map* into parameterized
//! SQL, plus an executor that runs the same CRUD calls on a pool or inside a
//! transaction.
//!
//! ## Features
//!
//! - **Map-driven statements**: keys are `"column"` or `"column op"`, values are bound as `?`
//! - **Directives**: `_field`, `_groupby`, `_having`, `_other` shape a SELECT
//! - **Transaction-transparent**: [`Db`] and [`Tx`] both deref to [`Executor`]
//! - **Type-safe mapping**: Row → Struct via the [`FromRow`] trait and derive
//! - **Query monitoring**: every statement is timed and reported with pool statistics
//! - **Deadlines and cancellation**: `*_ctx` variants take a [`Context`]
//!
//! ## Statement building
//!
//! ```
//! use mapsql::{builder, where_map};
//!
//! let mut filter = where_map! {
//!     "status" => "active",
//!     "id in" => vec![1, 2, 3],
//!     "_field" => "id, name",
//! };
//! let stmt = builder::select("users", &mut filter).unwrap();
//! assert_eq!(
//!     stmt.sql(),
//!     "SELECT id, name FROM `users` WHERE (`id` in (?,?,?)) and (`status` = ?)"
//! );
//! assert_eq!(stmt.args().len(), 4);
//! ```
//!
//! ## Executing
//!
//! ```ignore
//! use mapsql::{Db, DbOptions, values, where_map};
//!
//! let db = Db::connect("main", "sqlite::memory:", DbOptions::new()).await?;
//! db.insert("users", &values! { "name" => "alice", "age" => 30 }).await?;
//!
//! let tx = db.begin().await?;
//! tx.update("users", &values! { "age" => 31 }, &mut where_map! { "name" => "alice" }).await?;
//! tx.commit().await?;
//! ```

pub mod builder;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod registry;
pub mod row;
pub mod value;

pub use builder::{Statement, Values, Where, format_sql};
pub use config::{DatabaseConfig, RegistryConfig};
pub use context::{CancelHandle, Context};
pub use db::{Db, DbOptions, Tx};
pub use error::{BuildError, SqlError, SqlResult};
pub use executor::{ExecResult, Executor};
pub use monitor::{
    CompositeMonitor, NoopMonitor, PoolStats, QueryEvent, QueryMonitor, QueryResult, QueryStats,
    QueryType, StatsMonitor, TracingMonitor, TxAction,
};
pub use registry::{Registry, redact_url};
pub use row::{FromRow, Row, scan_row, scan_rows};
pub use value::{FromValue, Value};

#[cfg(feature = "derive")]
pub use mapsql_derive::FromRow;
