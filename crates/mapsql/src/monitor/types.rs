use crate::value::Value;
use std::fmt;
use std::time::Duration;

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    /// SELECT query
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// Other SQL (e.g., DDL, custom)
    Other,
}

impl QueryType {
    /// Detect query type from the leading keyword of a SQL string.
    pub fn from_sql(sql: &str) -> Self {
        let keyword = sql
            .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or("");

        if keyword.eq_ignore_ascii_case("SELECT") {
            QueryType::Select
        } else if keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE") {
            QueryType::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            QueryType::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

/// Connection-pool statistics sampled when a statement finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently checked out.
    pub in_use: u32,
    /// Connections idle in the pool.
    pub idle: u32,
    /// Pool size limit.
    pub max_open: u32,
    /// Acquisitions that found no idle connection and had to wait.
    pub wait_count: u64,
    /// Total time spent waiting in those acquisitions.
    pub wait_duration: Duration,
}

/// Maximum length for error messages in `QueryResult::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Result of a statement for monitoring purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Query returned rows.
    Rows(usize),
    /// Statement affected rows.
    Affected(u64),
    /// Statement failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryResult {
    /// Create an error result, truncating the message to avoid monitoring data explosion.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            Self::Error(format!("{}...", super::truncate_sql_bytes(&msg, MAX_ERROR_LEN)))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, QueryResult::Error(_))
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Rows(n) => write!(f, "{n} rows"),
            QueryResult::Affected(n) => write!(f, "{n} affected"),
            QueryResult::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Everything recorded about one dispatched statement.
#[derive(Debug, Clone)]
pub struct QueryEvent<'a> {
    /// Registry name of the database.
    pub db: &'a str,
    /// Driver name (`sqlite`, `mysql`).
    pub driver: &'a str,
    /// Whether the statement ran inside a transaction.
    pub transactional: bool,
    pub query_type: QueryType,
    pub sql: &'a str,
    pub args: &'a [Value],
    pub duration: Duration,
    pub pool: PoolStats,
    pub result: &'a QueryResult,
}

/// Transaction lifecycle step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAction {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TxAction::Begin => "begin",
            TxAction::Commit => "commit",
            TxAction::Rollback => "rollback",
        })
    }
}

/// Trait for observing statement execution.
///
/// Monitors are a side channel: they cannot change what the caller gets back.
pub trait QueryMonitor: Send + Sync {
    /// Called after every statement, successful or not.
    fn on_query_complete(&self, event: &QueryEvent<'_>);

    /// Called when a statement exceeds the database's slow query threshold.
    ///
    /// Default implementation does nothing.
    fn on_slow_query(&self, _event: &QueryEvent<'_>) {}

    /// Called after begin / commit / rollback, with the driver error if any.
    ///
    /// Default implementation does nothing.
    fn on_transaction(&self, _db: &str, _driver: &str, _action: TxAction, _error: Option<&str>) {}
}
