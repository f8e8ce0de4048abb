//! Parcel repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/read/list APIs over canonical `parcels` storage.
//! - Apply status and detail changes as compare-and-set on `version`.
//!
//! # Invariants
//! - Writes never touch `tracking_code` after insert.
//! - Every successful update bumps `version` by exactly one.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::parcel::{AddressId, Parcel, ParcelId, ParcelStatus};
use rusqlite::types::Value;
use rusqlite::{ffi, params, params_from_iter, Connection, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const PARCEL_SELECT_SQL: &str = "SELECT
    id,
    tracking_code,
    status,
    customer_id,
    pickup_address_id,
    delivery_address_id,
    weight_kg,
    description,
    estimated_delivery_date,
    created_at,
    updated_at,
    version
FROM parcels";

const PARCELS_DEFAULT_LIMIT: u32 = 20;
const PARCELS_LIMIT_MAX: u32 = 100;
const DAY_MS: i64 = 86_400_000;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all parcelflow repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Tracking code collided with an existing parcel.
    DuplicateTrackingCode(String),
    /// Compare-and-set lost: the row moved past `expected_version`.
    StaleVersion {
        parcel_id: ParcelId,
        expected_version: i64,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::DuplicateTrackingCode(code) => {
                write!(f, "tracking code already assigned: {code}")
            }
            Self::StaleVersion {
                parcel_id,
                expected_version,
            } => write!(
                f,
                "parcel {parcel_id} is no longer at version {expected_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::DuplicateTrackingCode(_) => None,
            Self::StaleVersion { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

/// Query options for listing parcels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParcelListQuery {
    /// Restrict to one owner. `None` lists every parcel.
    pub customer_id: Option<Uuid>,
    pub status: Option<ParcelStatus>,
    /// Defaults to 20 and clamps to 100.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Mutable parcel fields written by one compare-and-set.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelUpdate {
    pub id: ParcelId,
    pub expected_version: i64,
    pub status: ParcelStatus,
    pub delivery_address_id: AddressId,
    pub estimated_delivery_date: Option<i64>,
    pub updated_at: i64,
}

impl ParcelUpdate {
    /// Update that keeps every field of `parcel` as-is.
    pub fn unchanged(parcel: &Parcel) -> Self {
        Self {
            id: parcel.id,
            expected_version: parcel.version,
            status: parcel.status,
            delivery_address_id: parcel.delivery_address_id,
            estimated_delivery_date: parcel.estimated_delivery_date,
            updated_at: parcel.updated_at,
        }
    }
}

/// Aggregate counters for the staff dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelStats {
    pub total_parcels: u64,
    /// Parcels not yet delivered or cancelled.
    pub active_parcels: u64,
    /// Delivered parcels whose last update falls on the current UTC day.
    pub delivered_today: u64,
    pub cancelled: u64,
    pub total_customers: u64,
}

/// Repository interface for parcel persistence.
pub trait ParcelRepository {
    fn insert_parcel(&self, parcel: &Parcel) -> RepoResult<()>;
    fn get_parcel(&self, id: ParcelId) -> RepoResult<Option<Parcel>>;
    fn get_by_tracking_code(&self, tracking_code: &str) -> RepoResult<Option<Parcel>>;
    fn list_parcels(&self, query: &ParcelListQuery) -> RepoResult<Vec<Parcel>>;
    /// Writes `update` only if the row is still at `expected_version`.
    fn compare_and_set(&self, update: &ParcelUpdate) -> RepoResult<Parcel>;
    fn stats(&self, now_ms: i64) -> RepoResult<ParcelStats>;
    /// Renders the `YYYYMMDD` UTC date of an epoch-ms timestamp.
    fn date_stamp(&self, epoch_ms: i64) -> RepoResult<String>;
}

/// SQLite-backed parcel repository.
pub struct SqliteParcelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteParcelRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl ParcelRepository for SqliteParcelRepository<'_> {
    fn insert_parcel(&self, parcel: &Parcel) -> RepoResult<()> {
        let result = self.conn.execute(
            "INSERT INTO parcels (
                id,
                tracking_code,
                status,
                customer_id,
                pickup_address_id,
                delivery_address_id,
                weight_kg,
                description,
                estimated_delivery_date,
                created_at,
                updated_at,
                version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                parcel.id.to_string(),
                parcel.tracking_code.as_str(),
                parcel.status.as_str(),
                parcel.customer_id.to_string(),
                parcel.pickup_address_id.to_string(),
                parcel.delivery_address_id.to_string(),
                parcel.weight_kg,
                parcel.description.as_deref(),
                parcel.estimated_delivery_date,
                parcel.created_at,
                parcel.updated_at,
                parcel.version,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_tracking_code_collision(&err) => Err(
                RepoError::DuplicateTrackingCode(parcel.tracking_code.clone()),
            ),
            Err(err) => Err(err.into()),
        }
    }

    fn get_parcel(&self, id: ParcelId) -> RepoResult<Option<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_parcel_row(row)?));
        }
        Ok(None)
    }

    fn get_by_tracking_code(&self, tracking_code: &str) -> RepoResult<Option<Parcel>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARCEL_SELECT_SQL} WHERE tracking_code = ?1;"))?;
        let mut rows = stmt.query([tracking_code])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_parcel_row(row)?));
        }
        Ok(None)
    }

    fn list_parcels(&self, query: &ParcelListQuery) -> RepoResult<Vec<Parcel>> {
        let mut sql = format!("{PARCEL_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(customer_id) = query.customer_id {
            sql.push_str(" AND customer_id = ?");
            bind_values.push(Value::Text(customer_id.to_string()));
        }

        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_parcel_limit(
            query.limit,
        ))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut parcels = Vec::new();
        while let Some(row) = rows.next()? {
            parcels.push(parse_parcel_row(row)?);
        }
        Ok(parcels)
    }

    fn compare_and_set(&self, update: &ParcelUpdate) -> RepoResult<Parcel> {
        let changed = self.conn.execute(
            "UPDATE parcels
             SET
                status = ?3,
                delivery_address_id = ?4,
                estimated_delivery_date = ?5,
                updated_at = ?6,
                version = version + 1
             WHERE id = ?1
               AND version = ?2;",
            params![
                update.id.to_string(),
                update.expected_version,
                update.status.as_str(),
                update.delivery_address_id.to_string(),
                update.estimated_delivery_date,
                update.updated_at,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::StaleVersion {
                parcel_id: update.id,
                expected_version: update.expected_version,
            });
        }

        self.get_parcel(update.id)?.ok_or_else(|| {
            RepoError::InvalidData(format!("parcel {} vanished after update", update.id))
        })
    }

    fn stats(&self, now_ms: i64) -> RepoResult<ParcelStats> {
        let day_start = now_ms - now_ms.rem_euclid(DAY_MS);
        let (total, active, delivered_today, cancelled): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(status NOT IN ('DELIVERED', 'CANCELLED')), 0),
                    COALESCE(SUM(status = 'DELIVERED' AND updated_at >= ?1 AND updated_at < ?2), 0),
                    COALESCE(SUM(status = 'CANCELLED'), 0)
                 FROM parcels;",
                params![day_start, day_start + DAY_MS],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let customers: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM actors WHERE role = 'CUSTOMER';",
            [],
            |row| row.get(0),
        )?;

        Ok(ParcelStats {
            total_parcels: to_count(total)?,
            active_parcels: to_count(active)?,
            delivered_today: to_count(delivered_today)?,
            cancelled: to_count(cancelled)?,
            total_customers: to_count(customers)?,
        })
    }

    fn date_stamp(&self, epoch_ms: i64) -> RepoResult<String> {
        let stamp: Option<String> = self.conn.query_row(
            "SELECT strftime('%Y%m%d', ?1 / 1000, 'unixepoch');",
            [epoch_ms],
            |row| row.get(0),
        )?;
        stamp.ok_or_else(|| RepoError::InvalidData(format!("cannot format timestamp {epoch_ms}")))
    }
}

/// Normalizes list limit according to the parcel list contract.
pub fn normalize_parcel_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => PARCELS_DEFAULT_LIMIT,
        Some(value) if value > PARCELS_LIMIT_MAX => PARCELS_LIMIT_MAX,
        Some(value) => value,
    }
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_status(value: &str, column: &str) -> RepoResult<ParcelStatus> {
    ParcelStatus::parse(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid status `{value}` in {column}")))
}

fn parse_parcel_row(row: &Row<'_>) -> RepoResult<Parcel> {
    let id: String = row.get("id")?;
    let status: String = row.get("status")?;
    let customer_id: String = row.get("customer_id")?;
    let pickup_address_id: String = row.get("pickup_address_id")?;
    let delivery_address_id: String = row.get("delivery_address_id")?;

    Ok(Parcel {
        id: parse_uuid(&id, "parcels.id")?,
        tracking_code: row.get("tracking_code")?,
        status: parse_status(&status, "parcels.status")?,
        customer_id: parse_uuid(&customer_id, "parcels.customer_id")?,
        pickup_address_id: parse_uuid(&pickup_address_id, "parcels.pickup_address_id")?,
        delivery_address_id: parse_uuid(&delivery_address_id, "parcels.delivery_address_id")?,
        weight_kg: row.get("weight_kg")?,
        description: row.get("description")?,
        estimated_delivery_date: row.get("estimated_delivery_date")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        version: row.get("version")?,
    })
}

fn is_tracking_code_collision(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                && message
                    .as_deref()
                    .is_some_and(|text| text.contains("parcels.tracking_code"))
        }
        _ => false,
    }
}

fn to_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count {value}")))
}

#[cfg(test)]
mod tests {
    use super::normalize_parcel_limit;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(normalize_parcel_limit(None), 20);
        assert_eq!(normalize_parcel_limit(Some(0)), 20);
        assert_eq!(normalize_parcel_limit(Some(7)), 7);
        assert_eq!(normalize_parcel_limit(Some(1_000)), 100);
    }
}
