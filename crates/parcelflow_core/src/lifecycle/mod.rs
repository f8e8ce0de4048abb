//! Parcel lifecycle: transition policy, audit trail, notification fan-out
//! and the engine that ties them into one unit of work.
//!
//! # Responsibility
//! - Decide which status changes are legal and who may request them.
//! - Apply accepted changes atomically with their audit entry.
//!
//! # Invariants
//! - `policy` and `dispatcher` are pure; only `engine` and `audit` write.

pub mod audit;
pub mod clock;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod policy;

pub use audit::{AuditError, AuditTrailWriter};
pub use clock::{Clock, FixedClock, SystemClock};
pub use dispatcher::NotificationDispatcher;
pub use engine::{
    AddressChangeRequest, LifecycleEngine, NewParcel, RescheduleRequest, TransitionReceipt,
    TransitionRequest,
};
pub use error::{LifecycleError, LifecycleResult, NotFoundTarget};
