//! Status history repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append audit entries and read them back in trail order.
//!
//! # Invariants
//! - The contract has no update or delete operation.
//! - Trail order is `timestamp ASC, seq ASC`.

use crate::model::history::{NewHistoryEntry, StatusHistoryEntry};
use crate::model::parcel::{GeoPoint, ParcelId};
use crate::repo::parcel_repo::{parse_status, parse_uuid, RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const HISTORY_SELECT_SQL: &str = "SELECT
    seq,
    parcel_id,
    status,
    actor_id,
    note,
    location_lat,
    location_lng,
    timestamp
FROM status_history";

/// Repository interface for the append-only audit trail.
pub trait HistoryRepository {
    /// Appends one entry and returns the stored copy.
    fn append(&self, entry: &NewHistoryEntry) -> RepoResult<StatusHistoryEntry>;
    /// Lists a parcel's entries oldest first.
    fn list_for_parcel(&self, parcel_id: ParcelId) -> RepoResult<Vec<StatusHistoryEntry>>;
    /// Loads a parcel's most recent entry.
    fn latest_for_parcel(&self, parcel_id: ParcelId) -> RepoResult<Option<StatusHistoryEntry>>;
}

/// SQLite-backed audit trail repository.
pub struct SqliteHistoryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHistoryRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl HistoryRepository for SqliteHistoryRepository<'_> {
    fn append(&self, entry: &NewHistoryEntry) -> RepoResult<StatusHistoryEntry> {
        self.conn.execute(
            "INSERT INTO status_history (
                parcel_id,
                status,
                actor_id,
                note,
                location_lat,
                location_lng,
                timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                entry.parcel_id.to_string(),
                entry.status.as_str(),
                entry.actor_id.to_string(),
                entry.note.as_str(),
                entry.location.map(|point| point.lat),
                entry.location.map(|point| point.lng),
                entry.timestamp,
            ],
        )?;

        Ok(StatusHistoryEntry {
            seq: self.conn.last_insert_rowid(),
            parcel_id: entry.parcel_id,
            status: entry.status,
            actor_id: entry.actor_id,
            note: entry.note.clone(),
            location: entry.location,
            timestamp: entry.timestamp,
        })
    }

    fn list_for_parcel(&self, parcel_id: ParcelId) -> RepoResult<Vec<StatusHistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HISTORY_SELECT_SQL}
             WHERE parcel_id = ?1
             ORDER BY timestamp ASC, seq ASC;"
        ))?;
        let mut rows = stmt.query([parcel_id.to_string()])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_history_row(row)?);
        }
        Ok(entries)
    }

    fn latest_for_parcel(&self, parcel_id: ParcelId) -> RepoResult<Option<StatusHistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{HISTORY_SELECT_SQL}
             WHERE parcel_id = ?1
             ORDER BY timestamp DESC, seq DESC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([parcel_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_history_row(row)?));
        }
        Ok(None)
    }
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<StatusHistoryEntry> {
    let parcel_id: String = row.get("parcel_id")?;
    let status: String = row.get("status")?;
    let actor_id: String = row.get("actor_id")?;
    let lat: Option<f64> = row.get("location_lat")?;
    let lng: Option<f64> = row.get("location_lng")?;

    let location = match (lat, lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(
                "status_history location has only one coordinate".to_string(),
            ));
        }
    };

    Ok(StatusHistoryEntry {
        seq: row.get("seq")?,
        parcel_id: parse_uuid(&parcel_id, "status_history.parcel_id")?,
        status: parse_status(&status, "status_history.status")?,
        actor_id: parse_uuid(&actor_id, "status_history.actor_id")?,
        note: row.get("note")?,
        location,
        timestamp: row.get("timestamp")?,
    })
}
