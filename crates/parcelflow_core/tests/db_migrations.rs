use parcelflow_core::db::migrations::{latest_version, schema_version};
use parcelflow_core::db::{open_db, open_db_in_memory, DbError};
use parcelflow_core::repo::actor_repo::{ActorRepository, SqliteActorRepository};
use parcelflow_core::{Actor, ActorRole};
use rusqlite::{params, Connection};
use uuid::Uuid;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "actors");
    assert_table_exists(&conn, "parcels");
    assert_table_exists(&conn, "status_history");
    assert_table_exists(&conn, "notifications");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("parcelflow.db");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    assert_table_exists(&conn_second, "parcels");
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
fn schema_guards_parcel_and_history_invariants() {
    let conn = open_db_in_memory().unwrap();
    let customer = Actor::new(ActorRole::Customer, "Carol");
    SqliteActorRepository::new(&conn)
        .register_actor(&customer)
        .unwrap();
    let parcel_id = Uuid::new_v4();
    insert_raw_parcel(&conn, parcel_id, customer.id, "PD-20240301-ABCDEF", "CREATED").unwrap();
    conn.execute(
        "INSERT INTO status_history (parcel_id, status, actor_id, note, timestamp)
         VALUES (?1, 'CREATED', ?2, 'Parcel created', 1000);",
        params![parcel_id.to_string(), customer.id.to_string()],
    )
    .unwrap();

    let unknown_status =
        insert_raw_parcel(&conn, Uuid::new_v4(), customer.id, "PD-20240301-000001", "LOST");
    assert!(unknown_status.is_err());

    let duplicate_code =
        insert_raw_parcel(&conn, Uuid::new_v4(), customer.id, "PD-20240301-ABCDEF", "CREATED");
    assert!(duplicate_code.is_err());

    let retag = conn.execute(
        "UPDATE parcels SET tracking_code = 'PD-20240301-FFFFFF' WHERE id = ?1;",
        [parcel_id.to_string()],
    );
    assert!(retag.is_err());

    let rewind = conn.execute(
        "UPDATE parcels SET updated_at = 10 WHERE id = ?1;",
        [parcel_id.to_string()],
    );
    assert!(rewind.is_err());

    let rewrite_history = conn.execute("UPDATE status_history SET note = 'edited';", []);
    assert!(rewrite_history.is_err());
}

#[test]
fn deleting_customer_cascades_to_parcels_and_history() {
    let conn = open_db_in_memory().unwrap();
    let customer = Actor::new(ActorRole::Customer, "Carol");
    SqliteActorRepository::new(&conn)
        .register_actor(&customer)
        .unwrap();
    let parcel_id = Uuid::new_v4();
    insert_raw_parcel(&conn, parcel_id, customer.id, "PD-20240301-ABCDEF", "CREATED").unwrap();
    conn.execute(
        "INSERT INTO status_history (parcel_id, status, actor_id, note, timestamp)
         VALUES (?1, 'CREATED', ?2, 'Parcel created', 1000);",
        params![parcel_id.to_string(), customer.id.to_string()],
    )
    .unwrap();

    conn.execute(
        "DELETE FROM actors WHERE id = ?1;",
        [customer.id.to_string()],
    )
    .unwrap();

    assert_eq!(count(&conn, "parcels"), 0);
    assert_eq!(count(&conn, "status_history"), 0);
}

fn insert_raw_parcel(
    conn: &Connection,
    id: Uuid,
    customer_id: Uuid,
    tracking_code: &str,
    status: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO parcels (
            id, tracking_code, status, customer_id, pickup_address_id,
            delivery_address_id, weight_kg, description, estimated_delivery_date,
            created_at, updated_at, version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 2.5, NULL, NULL, 1000, 1000, 1);",
        params![
            id.to_string(),
            tracking_code,
            status,
            customer_id.to_string(),
            Uuid::new_v4().to_string(),
            Uuid::new_v4().to_string(),
        ],
    )
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
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
