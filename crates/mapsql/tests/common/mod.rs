//! Shared fixtures: an in-memory SQLite database with a `users` table.

#![allow(dead_code)]

use mapsql::{Db, DbOptions, QueryEvent, QueryMonitor, Value, values};
use std::sync::Mutex;

const SCHEMA: &[&str] = &[
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER,
        score REAL,
        created_at TEXT
    )",
    "CREATE TABLE audit (id INTEGER PRIMARY KEY AUTOINCREMENT, user_id INTEGER, action TEXT)",
];

/// One connection, so every statement sees the same in-memory database.
pub async fn memory_db() -> Db {
    let db = Db::connect("test", "sqlite::memory:", DbOptions::new().max_connections(1))
        .await
        .expect("open in-memory sqlite");
    for ddl in SCHEMA {
        db.exec(ddl, &[]).await.expect("create schema");
    }
    db
}

pub async fn seed_users(db: &Db) {
    for (name, age, score) in [("alice", 30, 1.5), ("bob", 25, 2.0), ("carol", 41, 3.25), ("dave", 25, 0.0)] {
        db.insert("users", &values! { "name" => name, "age" => age, "score" => score })
            .await
            .expect("seed user");
    }
}

/// A monitor that keeps every statement it sees.
#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Mutex<Vec<Recorded>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub args: Vec<Value>,
    pub transactional: bool,
    pub failed: bool,
}

impl Recorder {
    pub fn take(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl QueryMonitor for Recorder {
    fn on_query_complete(&self, event: &QueryEvent<'_>) {
        self.events.lock().unwrap().push(Recorded {
            sql: event.sql.to_string(),
            args: event.args.to_vec(),
            transactional: event.transactional,
            failed: event.result.is_error(),
        });
    }
}
