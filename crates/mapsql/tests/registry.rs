//! Registry built from a configuration file.

use mapsql::{Registry, RegistryConfig, SqlError, values, where_map};

fn write_config(name: &str, body: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("mapsql-{}-{name}", std::process::id()));
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn install_from_toml_and_run() {
    let path = write_config(
        "registry.toml",
        r#"
        [databases.main]
        url = "sqlite::memory:"
        max_connections = 1
        query_timeout_ms = 5000
        "#,
    );
    let config = RegistryConfig::from_path(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let registry = Registry::install(&config).unwrap();
    assert_eq!(registry.len(), 1);

    let db = registry.get("main").unwrap();
    db.exec("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)", &[])
        .await
        .unwrap();
    db.insert("kv", &values! { "k" => "a", "v" => "1" }).await.unwrap();
    let rows = db.select("kv", &mut where_map! { "k" => "a" }).await.unwrap();
    assert_eq!(rows[0].try_get::<String>("v").unwrap(), "1");

    registry.close().await;
}

#[tokio::test]
async fn install_from_json() {
    let path = write_config(
        "registry.json",
        r#"{"databases": {"a": {"url": "sqlite::memory:"}, "b": {"url": "sqlite::memory:"}}}"#,
    );
    let config = RegistryConfig::from_path(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let registry = Registry::install(&config).unwrap();
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
    assert!(matches!(
        registry.get("c"),
        Err(SqlError::UnknownDatabase(name)) if name == "c"
    ));
}

#[tokio::test]
async fn invalid_url_fails_install() {
    let config = RegistryConfig::from_toml_str(
        r#"
        [databases.main]
        url = "not a url"
        "#,
    )
    .unwrap();
    let err = Registry::install(&config).unwrap_err();
    assert!(err.is_driver());
}
