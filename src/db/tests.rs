use super::{
    delete_document, get_document, get_meta, list_documents, open_connection, set_meta,
    upsert_document, CURRENT_SCHEMA_VERSION,
};
use rusqlite::params;

fn unique_db_path() -> String {
    std::env::temp_dir()
        .join(format!("quorum-pragmas-{}.sqlite", uuid::Uuid::now_v7()))
        .display()
        .to_string()
}

fn cleanup_db_files(path: &str) {
    for suffix in ["", "-wal", "-shm"] {
        let candidate = format!("{path}{suffix}");
        let _ = std::fs::remove_file(candidate);
    }
}

fn table_exists(conn: &rusqlite::Connection, table_name: &str) -> bool {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
            params![table_name],
            |row| row.get(0),
        )
        .expect("table existence query should be readable");
    exists == 1
}

#[test]
fn configures_connection_pragmas() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    let journal_mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("journal_mode pragma should be readable");
    assert_eq!(journal_mode.to_uppercase(), "WAL");

    let busy_timeout: i64 = conn
        .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
        .expect("busy_timeout pragma should be readable");
    assert_eq!(busy_timeout, 5000);

    cleanup_db_files(&path);
}

#[test]
fn initializes_required_tables_and_schema_version() {
    let path = unique_db_path();
    let conn = open_connection(&path).expect("connection should open");

    for table in ["schema_migrations", "meta", "documents"] {
        assert!(
            table_exists(&conn, table),
            "expected table '{}' to exist",
            table
        );
    }

    let schema_version = get_meta(&conn, "schema_version")
        .expect("meta should be readable")
        .expect("schema version should be stored in meta table");
    assert_eq!(schema_version, CURRENT_SCHEMA_VERSION.to_string());

    cleanup_db_files(&path);
}

#[test]
fn reapplies_migrations_idempotently() {
    let path = unique_db_path();
    let conn_first = open_connection(&path).expect("first open should initialize schema");
    drop(conn_first);

    let conn_second = open_connection(&path).expect("second open should be idempotent");
    let applied_count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .expect("schema_migrations count should be queryable");
    assert_eq!(applied_count, CURRENT_SCHEMA_VERSION);

    cleanup_db_files(&path);
}

#[test]
fn upsert_keeps_created_at_and_moves_updated_at() {
    let conn = super::open_in_memory().expect("memory db should open");
    upsert_document(&conn, "members", "m1", "{}", "2026-01-01T00:00:00Z")
        .expect("insert should succeed");
    upsert_document(
        &conn,
        "members",
        "m1",
        r#"{"firstName":"Ana"}"#,
        "2026-02-01T00:00:00Z",
    )
    .expect("update should succeed");

    let row = get_document(&conn, "members", "m1")
        .expect("read should succeed")
        .expect("row should exist");
    assert_eq!(row.created_at, "2026-01-01T00:00:00Z");
    assert_eq!(row.updated_at, "2026-02-01T00:00:00Z");
    assert_eq!(row.data_json, r#"{"firstName":"Ana"}"#);

    delete_document(&conn, "members", "m1").expect("delete should succeed");
    assert!(list_documents(&conn, "members")
        .expect("list should succeed")
        .is_empty());
}

#[test]
fn meta_values_are_overwritten() {
    let conn = super::open_in_memory().expect("memory db should open");
    set_meta(&conn, "lastMinisteringReset", "a").expect("first write");
    set_meta(&conn, "lastMinisteringReset", "b").expect("second write");
    assert_eq!(
        get_meta(&conn, "lastMinisteringReset").expect("read"),
        Some("b".to_string())
    );
}
