//! The transaction-transparent executor.
//!
//! An [`Executor`] runs statements either on a pooled connection or inside an
//! open transaction. Which one is decided once, at construction, by its
//! `Target`; every method below is written against `&mut AnyConnection`
//! and behaves identically on both paths. Callers normally reach it through
//! [`Db`](crate::Db) or [`Tx`](crate::Tx), both of which deref to it.
//!
//! A statement abandoned by its [`Context`] keeps running on the server. A
//! pooled connection left in that state is detached from the pool, which
//! opens a replacement; until the abandoned statement ends, the pool can
//! hold one connection more than its limit. A transaction left in that
//! state is marked aborted: later statements and `commit` fail with
//! [`SqlError::TxAborted`].

use crate::builder::{self, Statement, Values, Where};
use crate::context::Context;
use crate::error::{BuildError, SqlError, SqlResult};
use crate::monitor::{PoolStats, QueryEvent, QueryMonitor, QueryResult, QueryType};
use crate::row::{FromRow, Row, scan_row, scan_rows};
use crate::value::{TIMESTAMP_FORMAT, Value};
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Column as _, Row as _, Transaction};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

type AnyQuery<'q> = sqlx::query::Query<'q, Any, AnyArguments<'q>>;

/// Outcome of an `exec`-style statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Auto-increment id of the last inserted row, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// Where statements are sent.
pub(crate) enum Target {
    /// A connection is checked out of the pool per statement.
    Pooled(AnyPool),
    /// All statements share the one connection holding the transaction.
    Transactional {
        tx: Mutex<Transaction<'static, Any>>,
        /// Set once a statement on `tx` was abandoned before it finished.
        aborted: AtomicBool,
    },
}

/// Counters for pool acquisitions that had to wait for a free connection.
#[derive(Debug, Default)]
pub(crate) struct WaitStats {
    count: AtomicU64,
    nanos: AtomicU64,
}

impl WaitStats {
    fn record(&self, waited: Duration) {
        self.count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(waited.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::Relaxed);
    }
}

/// Per-database state shared by a `Db`, its clones and every `Tx` it opens.
#[derive(Clone)]
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) driver: String,
    pub(crate) pool: AnyPool,
    pub(crate) monitor: Arc<dyn QueryMonitor>,
    pub(crate) query_timeout: Option<Duration>,
    pub(crate) slow_query_threshold: Option<Duration>,
    pub(crate) waits: Arc<WaitStats>,
}

impl Shared {
    pub(crate) fn pool_stats(&self) -> PoolStats {
        let size = self.pool.size();
        let idle = u32::try_from(self.pool.num_idle()).unwrap_or(u32::MAX);
        PoolStats {
            in_use: size.saturating_sub(idle),
            idle,
            max_open: self.pool.options().get_max_connections(),
            wait_count: self.waits.count.load(Ordering::Relaxed),
            wait_duration: Duration::from_nanos(self.waits.nanos.load(Ordering::Relaxed)),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Fetch,
    FetchOne,
    Execute,
}

enum Outcome {
    Rows(Vec<Row>),
    Done(ExecResult),
}

impl Outcome {
    fn monitor_result(&self) -> QueryResult {
        match self {
            Outcome::Rows(rows) => QueryResult::Rows(rows.len()),
            Outcome::Done(done) => QueryResult::Affected(done.rows_affected),
        }
    }

    fn into_rows(self) -> Vec<Row> {
        match self {
            Outcome::Rows(rows) => rows,
            Outcome::Done(_) => Vec::new(),
        }
    }

    fn into_done(self) -> ExecResult {
        match self {
            Outcome::Done(done) => done,
            Outcome::Rows(rows) => ExecResult {
                rows_affected: rows.len() as u64,
                last_insert_id: None,
            },
        }
    }
}

/// Runs SQL against either a pool or a transaction.
///
/// The same calls (`select`, `insert`, `update`, `delete`, `exec`, `query`,
/// ...) are available on both, produce the same SQL and the same arguments,
/// and report to the same monitor; only [`is_transactional`] differs.
///
/// [`is_transactional`]: Executor::is_transactional
pub struct Executor {
    target: Target,
    shared: Arc<Shared>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("db", &self.shared.name)
            .field("driver", &self.shared.driver)
            .field("transactional", &self.is_transactional())
            .finish()
    }
}

impl Executor {
    pub(crate) fn pooled(shared: Arc<Shared>) -> Self {
        Self {
            target: Target::Pooled(shared.pool.clone()),
            shared,
        }
    }

    pub(crate) fn transactional(shared: Arc<Shared>, tx: Transaction<'static, Any>) -> Self {
        Self {
            target: Target::Transactional {
                tx: Mutex::new(tx),
                aborted: AtomicBool::new(false),
            },
            shared,
        }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Release the transaction held by a transactional executor, with its
    /// aborted flag.
    pub(crate) fn into_transaction(self) -> Option<(Transaction<'static, Any>, bool)> {
        match self.target {
            Target::Transactional { tx, aborted } => Some((tx.into_inner(), aborted.into_inner())),
            Target::Pooled(_) => None,
        }
    }

    /// Registry name of the database.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Driver behind the pool (`sqlite`, `mysql`).
    pub fn driver(&self) -> &str {
        &self.shared.driver
    }

    /// Whether statements run inside a transaction.
    pub fn is_transactional(&self) -> bool {
        matches!(self.target, Target::Transactional { .. })
    }

    // ---------------------------------------------------------------------
    // Raw SQL
    // ---------------------------------------------------------------------

    /// Execute a statement that returns no rows.
    pub async fn exec(&self, sql: &str, args: &[Value]) -> SqlResult<ExecResult> {
        self.exec_ctx(&Context::background(), sql, args).await
    }

    pub async fn exec_ctx(&self, ctx: &Context, sql: &str, args: &[Value]) -> SqlResult<ExecResult> {
        let outcome = self.dispatch(ctx, Mode::Execute, sql, args).await?;
        Ok(outcome.into_done())
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, args: &[Value]) -> SqlResult<Vec<Row>> {
        self.query_ctx(&Context::background(), sql, args).await
    }

    pub async fn query_ctx(&self, ctx: &Context, sql: &str, args: &[Value]) -> SqlResult<Vec<Row>> {
        let outcome = self.dispatch(ctx, Mode::Fetch, sql, args).await?;
        Ok(outcome.into_rows())
    }

    /// Execute a query and return the **first** row.
    ///
    /// Returns [`SqlError::NotFound`] when the query yields no rows; extra rows
    /// are ignored.
    pub async fn query_row(&self, sql: &str, args: &[Value]) -> SqlResult<Row> {
        self.query_row_ctx(&Context::background(), sql, args).await
    }

    pub async fn query_row_ctx(&self, ctx: &Context, sql: &str, args: &[Value]) -> SqlResult<Row> {
        let outcome = self.dispatch(ctx, Mode::FetchOne, sql, args).await?;
        outcome
            .into_rows()
            .into_iter()
            .next()
            .ok_or_else(|| SqlError::not_found("Expected one row, got none"))
    }

    // ---------------------------------------------------------------------
    // Where-map CRUD
    // ---------------------------------------------------------------------

    /// `SELECT` rows of `table` matching `filter`.
    ///
    /// Directive keys are removed from `filter`.
    pub async fn select(&self, table: &str, filter: &mut Where) -> SqlResult<Vec<Row>> {
        self.select_ctx(&Context::background(), table, filter).await
    }

    pub async fn select_ctx(&self, ctx: &Context, table: &str, filter: &mut Where) -> SqlResult<Vec<Row>> {
        let stmt = builder::select(table, filter)?;
        self.query_ctx(ctx, stmt.sql(), stmt.args()).await
    }

    /// `INSERT` one row into `table`.
    pub async fn insert(&self, table: &str, values: &Values) -> SqlResult<ExecResult> {
        self.insert_ctx(&Context::background(), table, values).await
    }

    pub async fn insert_ctx(&self, ctx: &Context, table: &str, values: &Values) -> SqlResult<ExecResult> {
        let stmt = builder::insert(table, values)?;
        self.run_statement(ctx, &stmt).await
    }

    /// `UPDATE` rows of `table` matching `filter`; returns rows affected.
    pub async fn update(&self, table: &str, values: &Values, filter: &mut Where) -> SqlResult<u64> {
        self.update_ctx(&Context::background(), table, values, filter)
            .await
    }

    pub async fn update_ctx(
        &self,
        ctx: &Context,
        table: &str,
        values: &Values,
        filter: &mut Where,
    ) -> SqlResult<u64> {
        let stmt = builder::update(table, values, filter)?;
        Ok(self.run_statement(ctx, &stmt).await?.rows_affected)
    }

    /// `DELETE` rows of `table` matching `filter`; returns rows affected.
    ///
    /// An empty filter deletes every row.
    pub async fn delete(&self, table: &str, filter: &mut Where) -> SqlResult<u64> {
        self.delete_ctx(&Context::background(), table, filter).await
    }

    pub async fn delete_ctx(&self, ctx: &Context, table: &str, filter: &mut Where) -> SqlResult<u64> {
        let stmt = builder::delete(table, filter)?;
        Ok(self.run_statement(ctx, &stmt).await?.rows_affected)
    }

    async fn run_statement(&self, ctx: &Context, stmt: &Statement) -> SqlResult<ExecResult> {
        self.exec_ctx(ctx, stmt.sql(), stmt.args()).await
    }

    // ---------------------------------------------------------------------
    // Struct scanning
    // ---------------------------------------------------------------------

    /// `SELECT` and map every row onto `T`.
    pub async fn select_scan<T: FromRow>(&self, table: &str, filter: &mut Where) -> SqlResult<Vec<T>> {
        self.select_scan_ctx(&Context::background(), table, filter)
            .await
    }

    pub async fn select_scan_ctx<T: FromRow>(
        &self,
        ctx: &Context,
        table: &str,
        filter: &mut Where,
    ) -> SqlResult<Vec<T>> {
        let rows = self.select_ctx(ctx, table, filter).await?;
        scan_rows(&rows)
    }

    /// `SELECT` and map the first row onto `T`.
    pub async fn select_scan_one<T: FromRow>(&self, table: &str, filter: &mut Where) -> SqlResult<T> {
        self.select_scan_one_ctx(&Context::background(), table, filter)
            .await
    }

    pub async fn select_scan_one_ctx<T: FromRow>(
        &self,
        ctx: &Context,
        table: &str,
        filter: &mut Where,
    ) -> SqlResult<T> {
        let stmt = builder::select(table, filter)?;
        let row = self.query_row_ctx(ctx, stmt.sql(), stmt.args()).await?;
        scan_row(&row)
    }

    /// Run raw SQL and map every row onto `T`.
    pub async fn query_scan<T: FromRow>(&self, sql: &str, args: &[Value]) -> SqlResult<Vec<T>> {
        self.query_scan_ctx(&Context::background(), sql, args).await
    }

    pub async fn query_scan_ctx<T: FromRow>(
        &self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> SqlResult<Vec<T>> {
        let rows = self.query_ctx(ctx, sql, args).await?;
        scan_rows(&rows)
    }

    /// Run raw SQL and map the first row onto `T`.
    pub async fn query_scan_one<T: FromRow>(&self, sql: &str, args: &[Value]) -> SqlResult<T> {
        self.query_scan_one_ctx(&Context::background(), sql, args)
            .await
    }

    pub async fn query_scan_one_ctx<T: FromRow>(
        &self,
        ctx: &Context,
        sql: &str,
        args: &[Value],
    ) -> SqlResult<T> {
        let row = self.query_row_ctx(ctx, sql, args).await?;
        scan_row(&row)
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    async fn dispatch(&self, ctx: &Context, mode: Mode, sql: &str, args: &[Value]) -> SqlResult<Outcome> {
        let start = Instant::now();
        let result = ctx
            .run(self.shared.query_timeout, self.drive(mode, sql, args))
            .await;
        self.report(sql, args, start.elapsed(), &result);
        result
    }

    async fn drive(&self, mode: Mode, sql: &str, args: &[Value]) -> SqlResult<Outcome> {
        let driver = self.shared.driver.as_str();
        match &self.target {
            Target::Pooled(pool) => {
                let conn = self.acquire(pool).await?;
                Checkout::new(conn).run(driver, mode, sql, args).await
            }
            Target::Transactional { tx, aborted } => {
                let mut tx = tx.lock().await;
                if aborted.load(Ordering::Acquire) {
                    return Err(SqlError::TxAborted);
                }
                let guard = AbortOnDrop::arm(aborted);
                let result = run_on(&mut **tx, driver, mode, sql, args).await;
                guard.disarm();
                result
            }
        }
    }

    async fn acquire(&self, pool: &AnyPool) -> SqlResult<PoolConnection<Any>> {
        let must_wait = pool.num_idle() == 0 && pool.size() >= pool.options().get_max_connections();
        let start = Instant::now();
        let conn = pool.acquire().await?;
        if must_wait {
            self.shared.waits.record(start.elapsed());
        }
        Ok(conn)
    }

    fn report(&self, sql: &str, args: &[Value], duration: Duration, result: &SqlResult<Outcome>) {
        let outcome = match result {
            Ok(outcome) => outcome.monitor_result(),
            Err(err) => QueryResult::error(err.to_string()),
        };
        let event = QueryEvent {
            db: &self.shared.name,
            driver: &self.shared.driver,
            transactional: self.is_transactional(),
            query_type: QueryType::from_sql(sql),
            sql,
            args,
            duration,
            pool: self.shared.pool_stats(),
            result: &outcome,
        };
        self.shared.monitor.on_query_complete(&event);
        if self
            .shared
            .slow_query_threshold
            .is_some_and(|threshold| duration >= threshold)
        {
            self.shared.monitor.on_slow_query(&event);
        }
    }
}

/// A pooled connection checked out for one statement.
///
/// Returned to the pool once the statement settles. If the future running it
/// is dropped first, the connection is detached instead, so the pool never
/// hands out a connection still busy with an abandoned statement.
struct Checkout {
    conn: Option<PoolConnection<Any>>,
    settled: bool,
}

impl Checkout {
    fn new(conn: PoolConnection<Any>) -> Self {
        Self {
            conn: Some(conn),
            settled: false,
        }
    }

    async fn run(mut self, driver: &str, mode: Mode, sql: &str, args: &[Value]) -> SqlResult<Outcome> {
        let Some(conn) = self.conn.as_deref_mut() else {
            return Err(sqlx::Error::PoolClosed.into());
        };
        let result = run_on(conn, driver, mode, sql, args).await;
        self.settled = true;
        result
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.settled {
            tracing::debug!(target: "mapsql.db", "detaching connection with an abandoned statement");
            drop(conn.detach());
        }
    }
}

/// Marks a transaction aborted unless disarmed before it is dropped.
struct AbortOnDrop<'a>(Option<&'a AtomicBool>);

impl<'a> AbortOnDrop<'a> {
    fn arm(flag: &'a AtomicBool) -> Self {
        Self(Some(flag))
    }

    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for AbortOnDrop<'_> {
    fn drop(&mut self) {
        if let Some(flag) = self.0 {
            flag.store(true, Ordering::Release);
        }
    }
}

async fn run_on(
    conn: &mut AnyConnection,
    driver: &str,
    mode: Mode,
    sql: &str,
    args: &[Value],
) -> SqlResult<Outcome> {
    let query = bind_all(sqlx::query(sql), args)?;
    match mode {
        Mode::Fetch => {
            let rows = query.fetch_all(&mut *conn).await?;
            Ok(Outcome::Rows(decode_rows(&rows)?))
        }
        Mode::FetchOne => {
            let row = query.fetch_optional(&mut *conn).await?;
            Ok(Outcome::Rows(decode_rows(row.as_slice())?))
        }
        Mode::Execute => {
            let done = query.execute(&mut *conn).await?;
            let mut last_insert_id = done.last_insert_id();
            // the sqlite backend of `Any` never fills the id in
            if last_insert_id.is_none()
                && done.rows_affected() > 0
                && driver == "sqlite"
                && QueryType::from_sql(sql) == QueryType::Insert
            {
                let id: i64 = sqlx::query_scalar("SELECT last_insert_rowid()")
                    .fetch_one(&mut *conn)
                    .await?;
                last_insert_id = Some(id);
            }
            Ok(Outcome::Done(ExecResult {
                rows_affected: done.rows_affected(),
                last_insert_id,
            }))
        }
    }
}

fn bind_all<'q>(mut query: AnyQuery<'q>, args: &[Value]) -> SqlResult<AnyQuery<'q>> {
    for (idx, value) in args.iter().enumerate() {
        query = match value {
            Value::Null => query.bind(None::<String>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Float(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
            Value::Bytes(b) => query.bind(b.clone()),
            Value::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
            Value::List(_) | Value::Where(_) => {
                return Err(BuildError::NotScalar {
                    column: format!("?{}", idx + 1),
                    got: value.kind_name(),
                }
                .into());
            }
        };
    }
    Ok(query)
}

fn decode_rows(rows: &[AnyRow]) -> SqlResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = columns
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    decode_column(row, idx).map_err(|e| SqlError::decode(name, e.to_string()))
                })
                .collect::<SqlResult<Vec<_>>>()?;
            Ok(Row::new(columns.clone(), values))
        })
        .collect()
}

/// The `Any` driver only exposes the column's runtime kind, so try the
/// supported Rust types in order until one accepts it.
fn decode_column(row: &AnyRow, idx: usize) -> Result<Value, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Int));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Float));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Text));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return Ok(v.map_or(Value::Null, Value::Bool));
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .map(|v| v.map_or(Value::Null, Value::Bytes))
}
