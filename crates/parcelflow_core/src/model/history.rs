//! Status history (audit trail) records.
//!
//! # Invariants
//! - Entries are append-only; there is no API that edits one.
//! - Per parcel, entries are ordered by `(timestamp, seq)`.
//! - The last entry's `status` equals the parcel's current status.

use crate::model::actor::ActorId;
use crate::model::parcel::{GeoPoint, ParcelId, ParcelStatus};
use serde::{Deserialize, Serialize};

/// One persisted audit trail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    /// Storage-assigned, strictly increasing across the whole table.
    pub seq: i64,
    pub parcel_id: ParcelId,
    pub status: ParcelStatus,
    pub actor_id: ActorId,
    pub note: String,
    pub location: Option<GeoPoint>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Input for one audit append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub parcel_id: ParcelId,
    pub status: ParcelStatus,
    pub actor_id: ActorId,
    pub note: String,
    pub location: Option<GeoPoint>,
    pub timestamp: i64,
}
