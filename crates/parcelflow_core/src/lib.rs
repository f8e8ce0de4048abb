//! Core domain logic for parcelflow.
//! This crate is the single source of truth for parcel lifecycle invariants.

pub mod config;
pub mod db;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_busy_timeout, DbError, UnitOfWork};
pub use lifecycle::{
    LifecycleEngine, LifecycleError, LifecycleResult, NewParcel, TransitionReceipt,
    TransitionRequest,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::actor::{Actor, ActorId, ActorRef, ActorRole};
pub use model::parcel::{Parcel, ParcelId, ParcelStatus};
pub use repo::parcel_repo::{RepoError, RepoResult};
pub use service::notification_service::{NotificationService, NotificationServiceError};
pub use service::parcel_service::{ParcelService, ParcelView};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
