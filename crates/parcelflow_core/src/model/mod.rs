//! Domain model for parcels, their audit trail and notifications.
//!
//! # Responsibility
//! - Define canonical data structures used by the lifecycle engine.
//! - Own the single canonical `ParcelStatus` enum and its string form.
//!
//! # Invariants
//! - Every parcel is identified by a stable `ParcelId` and a separate,
//!   immutable tracking code.
//! - History entries and notifications are plain values; mutation goes
//!   through repositories only.

pub mod actor;
pub mod history;
pub mod notification;
pub mod parcel;
