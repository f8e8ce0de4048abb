//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Repositories never open or commit transactions themselves; the caller's
//!   unit of work decides the boundary.
//! - Repository APIs return semantic errors (`StaleVersion`,
//!   `DuplicateTrackingCode`) in addition to DB transport errors.

pub mod actor_repo;
pub mod history_repo;
pub mod notification_repo;
pub mod parcel_repo;
