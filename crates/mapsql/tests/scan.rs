//! Row-to-struct scanning with `#[derive(FromRow)]`.

mod common;

use common::{memory_db, seed_users};
use mapsql::{FromRow, SqlError, where_map};

#[derive(Debug, FromRow, PartialEq)]
struct User {
    id: i64,
    name: String,
    age: Option<i32>,
    score: Option<f64>,
    created_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, FromRow, PartialEq)]
struct NameOnly {
    #[orm(column = "name")]
    display_name: String,
    #[orm(skip)]
    visits: u32,
}

#[test]
fn derive_builds_the_column_table() {
    assert_eq!(User::COLUMNS, &["id", "name", "age", "score", "created_at"]);
    assert_eq!(NameOnly::COLUMNS, &["name"]);
}

#[tokio::test]
async fn select_scan_maps_all_rows() {
    let db = memory_db().await;
    seed_users(&db).await;

    let users: Vec<User> = db
        .select_scan("users", &mut where_map! { "age" => 25 })
        .await
        .unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].name, "bob");
    assert_eq!(users[0].age, Some(25));
    assert_eq!(users[1].score, Some(0.0));
    assert_eq!(users[1].created_at, None);
}

#[tokio::test]
async fn select_scan_one_takes_first_row() {
    let db = memory_db().await;
    seed_users(&db).await;

    let user: NameOnly = db
        .select_scan_one(
            "users",
            &mut where_map! { "_field" => "name", "_other" => "ORDER BY id DESC" },
        )
        .await
        .unwrap();
    assert_eq!(
        user,
        NameOnly {
            display_name: "dave".into(),
            visits: 0
        }
    );

    let err = db
        .select_scan_one::<User>("users", &mut where_map! { "id" => 42 })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn query_scan_raw_sql() {
    let db = memory_db().await;
    seed_users(&db).await;

    let names: Vec<NameOnly> = db
        .query_scan("SELECT name FROM users WHERE age > ? ORDER BY name", &[26.into()])
        .await
        .unwrap();
    let names: Vec<_> = names.into_iter().map(|n| n.display_name).collect();
    assert_eq!(names, vec!["alice", "carol"]);

    let user: User = db
        .query_scan_one("SELECT * FROM users WHERE name = ?", &["carol".into()])
        .await
        .unwrap();
    assert_eq!(user.id, 3);
    assert_eq!(user.score, Some(3.25));
}

#[tokio::test]
async fn unmatched_column_is_an_error() {
    let db = memory_db().await;
    seed_users(&db).await;

    // NameOnly has no field for `age`
    let err = db
        .select_scan::<NameOnly>("users", &mut where_map! { "_field" => "name, age" })
        .await
        .unwrap_err();
    match err {
        SqlError::UnmatchedColumn { column, target } => {
            assert_eq!(column, "age");
            assert!(target.ends_with("NameOnly"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn missing_and_mistyped_columns_fail_decoding() {
    let db = memory_db().await;
    seed_users(&db).await;

    // `score` is missing from the result set
    let err = db
        .query_scan_one::<User>("SELECT id, name, age, created_at FROM users", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::Decode { ref column, .. } if column == "score"));

    // `name` holds text, not an integer
    let err = db
        .query_scan_one::<User>(
            "SELECT name AS id, name, age, score, created_at FROM users",
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, SqlError::Decode { ref column, .. } if column == "id"));
}
