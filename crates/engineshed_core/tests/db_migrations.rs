use engineshed_core::db::migrations::latest_version;
use engineshed_core::db::{
    open_db, open_db_in_memory, open_db_read_only, open_existing_db, DbError,
};
use engineshed_core::{
    CollectionKind, RepoError, SqliteCollectionRepository, SqliteInventoryRepository,
};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "purchases");
    assert_table_exists(&conn, "models");
    assert_table_exists(&conn, "trains");
    assert_table_exists(&conn, "train_members");
}

#[test]
fn opening_same_database_twice_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engineshed.db");

    let conn_first = open_db(&path).unwrap();
    let purchase = SqliteInventoryRepository::try_new(&conn_first)
        .unwrap()
        .create_purchase("Hornby", "R3421")
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let loaded = SqliteInventoryRepository::try_new(&conn_second)
        .unwrap()
        .get_purchase(purchase.uuid)
        .unwrap();
    assert_eq!(loaded, Some(purchase));
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn repositories_reject_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteCollectionRepository::try_new(&conn, CollectionKind::PurchaseModels)
        .err()
        .expect("unmigrated connection must be rejected");
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
    assert!(SqliteInventoryRepository::try_new(&conn).is_err());
}

#[test]
fn opening_missing_file_without_create_fails_and_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("typo.db");

    let err = open_db_read_only(&path).unwrap_err();
    assert!(matches!(err, DbError::DatabaseNotFound(ref missing) if missing == &path));
    let err = open_existing_db(&path).unwrap_err();
    assert!(matches!(err, DbError::DatabaseNotFound(_)));

    assert!(!path.exists());
}

#[test]
fn read_only_open_skips_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE legacy (id INTEGER PRIMARY KEY);")
        .unwrap();
    drop(conn);

    let conn = open_db_read_only(&path).unwrap();

    assert_eq!(schema_version(&conn), 0);
    assert!(matches!(
        SqliteInventoryRepository::try_new(&conn).err(),
        Some(RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));
}

#[test]
fn read_only_open_reads_but_rejects_writes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("engineshed.db");
    let purchase = SqliteInventoryRepository::try_new(&open_db(&path).unwrap())
        .unwrap()
        .create_purchase("Heljan", "2601")
        .unwrap();

    let conn = open_db_read_only(&path).unwrap();
    let inventory = SqliteInventoryRepository::try_new(&conn).unwrap();

    assert_eq!(inventory.get_purchase(purchase.uuid).unwrap(), Some(purchase));
    assert!(inventory.create_purchase("Heljan", "2602").is_err());
}

#[test]
fn open_existing_db_migrates_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");
    Connection::open(&path)
        .unwrap()
        .execute_batch("CREATE TABLE legacy (id INTEGER PRIMARY KEY);")
        .unwrap();

    let conn = open_existing_db(&path).unwrap();

    assert_eq!(schema_version(&conn), latest_version());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
