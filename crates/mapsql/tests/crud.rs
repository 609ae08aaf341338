//! Where-map CRUD against in-memory SQLite.

mod common;

use common::{memory_db, seed_users};
use mapsql::{SqlError, Value, values, where_map};

#[tokio::test]
async fn insert_then_select_round_trips() {
    let db = memory_db().await;

    let done = db
        .insert("users", &values! { "name" => "alice", "age" => 30, "score" => 1.5 })
        .await
        .unwrap();
    assert_eq!(done.rows_affected, 1);
    assert_eq!(done.last_insert_id, Some(1));

    let rows = db.select("users", &mut where_map! {}).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.get("name"), Some(&Value::Text("alice".into())));
    assert_eq!(row.get("age"), Some(&Value::Int(30)));
    assert_eq!(row.get("score"), Some(&Value::Float(1.5)));
    assert_eq!(row.get("created_at"), Some(&Value::Null));
    assert_eq!(row.try_get::<i64>("id").unwrap(), 1);
}

#[tokio::test]
async fn insert_reports_rowid_on_every_target() {
    let db = memory_db().await;
    seed_users(&db).await;

    let done = db.insert("users", &values! { "name" => "erin" }).await.unwrap();
    assert_eq!(done.last_insert_id, Some(5));

    let tx = db.begin().await.unwrap();
    let done = tx.insert("users", &values! { "name" => "finn" }).await.unwrap();
    assert_eq!(done.last_insert_id, Some(6));
    tx.commit().await.unwrap();

    // nothing inserted, nothing to report
    let done = db
        .exec("INSERT OR IGNORE INTO users (id, name) VALUES (?, ?)", &[1.into(), "dup".into()])
        .await
        .unwrap();
    assert_eq!(done.rows_affected, 0);
    assert_eq!(done.last_insert_id, None);
}

#[tokio::test]
async fn in_and_between_filters() {
    let db = memory_db().await;
    seed_users(&db).await;

    let rows = db
        .select("users", &mut where_map! { "id in" => vec![2, 3] })
        .await
        .unwrap();
    let names: Vec<String> = rows.iter().map(|r| r.try_get("name").unwrap()).collect();
    assert_eq!(names, vec!["bob", "carol"]);

    // the third element is dropped, so this is id between 2 and 3
    let rows = db
        .select("users", &mut where_map! { "id between" => vec![2, 3, 4] })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let rows = db
        .select("users", &mut where_map! { "id not in" => vec![1, 2] })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn comparison_and_null_filters() {
    let db = memory_db().await;
    seed_users(&db).await;

    let rows = db
        .select("users", &mut where_map! { "age >" => 26, "score <=" => 2.0 })
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].try_get::<String>("name").unwrap(), "alice");

    let rows = db
        .select("users", &mut where_map! { "created_at is" => Value::Null })
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn select_directives() {
    let db = memory_db().await;
    seed_users(&db).await;

    let mut filter = where_map! {
        "_field" => "age, count(*) AS n",
        "_groupby" => "age",
        "_having" => where_map! { "n >=" => 2 },
        "_other" => "ORDER BY age",
    };
    let rows = db.select("users", &mut filter).await.unwrap();
    assert!(filter.is_empty());
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].columns(), &["age".to_string(), "n".to_string()]);
    assert_eq!(rows[0].try_get::<i64>("age").unwrap(), 25);
    assert_eq!(rows[0].try_get::<i64>("n").unwrap(), 2);

    let rows = db
        .select("users", &mut where_map! { "_other" => "ORDER BY id DESC LIMIT 1" })
        .await
        .unwrap();
    assert_eq!(rows[0].try_get::<String>("name").unwrap(), "dave");
}

#[tokio::test]
async fn update_returns_rows_affected() {
    let db = memory_db().await;
    seed_users(&db).await;

    let n = db
        .update("users", &values! { "score" => 9.5 }, &mut where_map! { "age" => 25 })
        .await
        .unwrap();
    assert_eq!(n, 2);

    let rows = db
        .select("users", &mut where_map! { "score" => 9.5 })
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn delete_returns_rows_affected() {
    let db = memory_db().await;
    seed_users(&db).await;

    let n = db
        .delete("users", &mut where_map! { "name in" => vec!["alice", "bob"] })
        .await
        .unwrap();
    assert_eq!(n, 2);

    // an empty filter deletes everything left
    let n = db.delete("users", &mut where_map! {}).await.unwrap();
    assert_eq!(n, 2);
    assert!(db.select("users", &mut where_map! {}).await.unwrap().is_empty());
}

#[tokio::test]
async fn timestamps_are_stored_as_text() {
    let db = memory_db().await;
    let ts = chrono::NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(8, 30, 0)
        .unwrap();
    db.insert("users", &values! { "name" => "eve", "created_at" => ts })
        .await
        .unwrap();

    let row = db
        .query_row("SELECT created_at FROM users WHERE name = ?", &["eve".into()])
        .await
        .unwrap();
    assert_eq!(row.try_get::<chrono::NaiveDateTime>("created_at").unwrap(), ts);
}

#[tokio::test]
async fn build_errors_never_reach_the_driver() {
    let db = memory_db().await;

    let err = db
        .select("users", &mut where_map! { "id in" => Vec::<i64>::new() })
        .await
        .unwrap_err();
    assert!(err.is_build());

    let err = db.insert("users", &values! {}).await.unwrap_err();
    assert!(err.is_build());

    let err = db
        .delete("users", &mut where_map! { "_field" => "id" })
        .await
        .unwrap_err();
    assert!(err.is_build());
}

#[tokio::test]
async fn driver_errors_pass_through() {
    let db = memory_db().await;
    let err = db
        .select("missing_table", &mut where_map! {})
        .await
        .unwrap_err();
    assert!(err.is_driver());
    assert!(err.as_driver().is_some());
}

#[tokio::test]
async fn raw_sql_helpers() {
    let db = memory_db().await;
    seed_users(&db).await;

    let rows = db
        .query("SELECT name FROM users WHERE age = ? ORDER BY id", &[25.into()])
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);

    let row = db
        .query_row("SELECT count(*) AS n FROM users", &[])
        .await
        .unwrap();
    assert_eq!(row.try_get::<i64>("n").unwrap(), 4);

    let err = db
        .query_row("SELECT * FROM users WHERE id = ?", &[99.into()])
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let done = db
        .exec("UPDATE users SET age = age + 1 WHERE age < ?", &[30.into()])
        .await
        .unwrap();
    assert_eq!(done.rows_affected, 2);

    let err = db
        .exec("SELECT ?", &[Value::List(vec![1.into()])])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::Build(_)));
}

#[tokio::test]
async fn concurrent_calls_share_the_pool() {
    let db = memory_db().await;
    seed_users(&db).await;

    let calls = (1..=4).map(|id| {
        let db = db.clone();
        async move { db.select("users", &mut where_map! { "id" => id }).await }
    });
    let results = futures_util::future::join_all(calls).await;

    for (idx, rows) in results.into_iter().enumerate() {
        let rows = rows.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].try_get::<i64>("id").unwrap(), idx as i64 + 1);
    }
    assert_eq!(db.pool_stats().max_open, 1);
}
