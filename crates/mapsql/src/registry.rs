//! Named databases, opened once from configuration.

use crate::config::RegistryConfig;
use crate::db::Db;
use crate::error::{SqlError, SqlResult};
use std::collections::BTreeMap;
use url::Url;

/// Owns every configured [`Db`], keyed by name.
///
/// Built once at startup and then shared by reference (or inside an `Arc`);
/// there is no process-wide instance.
///
/// ```ignore
/// let registry = Registry::install(&RegistryConfig::from_path("db.toml")?)?;
/// let main = registry.get("main")?;
/// let users = main.select("users", &mut where_map! {}).await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct Registry {
    databases: BTreeMap<String, Db>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lazy pool for every configured database.
    ///
    /// No connection is opened here; an unreachable server surfaces on first
    /// use. An invalid URL fails the whole install.
    pub fn install(config: &RegistryConfig) -> SqlResult<Self> {
        config.validate()?;
        let mut registry = Self::new();
        for (name, db_config) in &config.databases {
            let db = Db::connect_lazy(name.clone(), &db_config.url, db_config.options())?;
            tracing::info!(
                target: "mapsql.db",
                name = %name,
                driver = db.driver(),
                dsn = %redact_url(&db_config.url),
                max_connections = db_config.max_connections,
                "installed database"
            );
            registry.insert(db);
        }
        Ok(registry)
    }

    /// Add (or replace) a database under its own name.
    pub fn insert(&mut self, db: Db) -> Option<Db> {
        self.databases.insert(db.name().to_string(), db)
    }

    /// Look up a database by name.
    pub fn get(&self, name: &str) -> SqlResult<&Db> {
        self.databases.get(name).ok_or_else(|| {
            tracing::warn!(target: "mapsql.db", name, "unknown database");
            SqlError::UnknownDatabase(name.to_string())
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    /// Installed names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.databases.is_empty()
    }

    /// Close every pool.
    pub async fn close(&self) {
        for db in self.databases.values() {
            db.close().await;
        }
    }
}

/// Mask the password of a connection URL for logging.
pub fn redact_url(dsn: &str) -> String {
    if let Ok(mut url) = Url::parse(dsn)
        && !url.cannot_be_a_base()
    {
        if url.password().is_some() {
            let _ = url.set_password(Some("***"));
        }
        return url.to_string();
    }

    // not a URL: mask everything between the first ':' and the first '@'
    match (dsn.find(':'), dsn.find('@')) {
        (Some(start), Some(end)) if start < end => {
            format!("{}***{}", &dsn[..=start], &dsn[end..])
        }
        _ => dsn.to_string(),
    }
}
