//! Lifecycle error taxonomy.
//!
//! Every rejection maps to one variant with a stable machine code so the
//! HTTP layer can translate without string matching.

use crate::db::DbError;
use crate::lifecycle::audit::AuditError;
use crate::model::parcel::{ParcelStatus, UnknownStatusError};
use crate::repo::parcel_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Kind of record a `NotFound` refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundTarget {
    Parcel(Uuid),
    Actor(Uuid),
    Notification(Uuid),
    TrackingCode(String),
}

impl Display for NotFoundTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parcel(id) => write!(f, "parcel {id}"),
            Self::Actor(id) => write!(f, "actor {id}"),
            Self::Notification(id) => write!(f, "notification {id}"),
            Self::TrackingCode(code) => write!(f, "tracking code {code}"),
        }
    }
}

/// Error returned by lifecycle and service operations.
#[derive(Debug)]
pub enum LifecycleError {
    NotFound(NotFoundTarget),
    /// Actor lacks the role or ownership for the operation.
    Forbidden(String),
    UnknownStatus(String),
    InvalidTransition {
        current: ParcelStatus,
        requested: ParcelStatus,
    },
    /// Parcel is DELIVERED or CANCELLED.
    TerminalStateViolation(ParcelStatus),
    /// Concurrent modification or lock timeout; retry from a fresh read.
    Conflict(String),
    InvalidInput(String),
    /// Delivery address can no longer change in this status.
    AddressLocked(ParcelStatus),
    /// Post-write check failed; the unit of work was rolled back.
    InconsistentState(String),
    Repo(RepoError),
}

impl LifecycleError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::UnknownStatus(_) => "unknown_status",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::TerminalStateViolation(_) => "terminal_state_violation",
            Self::Conflict(_) => "conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::AddressLocked(_) => "address_locked",
            Self::InconsistentState(_) => "inconsistent_state",
            Self::Repo(_) => "storage",
        }
    }
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(target) => write!(f, "{target} not found"),
            Self::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            Self::UnknownStatus(raw) => write!(f, "unknown parcel status `{raw}`"),
            Self::InvalidTransition { current, requested } => {
                write!(f, "transition {current} -> {requested} is not allowed")
            }
            Self::TerminalStateViolation(status) => {
                write!(f, "parcel is in terminal status {status}")
            }
            Self::Conflict(details) => write!(f, "conflict: {details}"),
            Self::InvalidInput(details) => write!(f, "invalid input: {details}"),
            Self::AddressLocked(status) => {
                write!(f, "delivery address cannot change while {status}")
            }
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::StaleVersion {
                parcel_id,
                expected_version,
            } => Self::Conflict(format!(
                "parcel {parcel_id} changed after version {expected_version}"
            )),
            RepoError::Db(err) if err.is_busy() => Self::Conflict(err.to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for LifecycleError {
    fn from(value: DbError) -> Self {
        Self::from(RepoError::from(value))
    }
}

impl From<AuditError> for LifecycleError {
    fn from(value: AuditError) -> Self {
        match value {
            AuditError::Repo(err) => Self::from(err),
            mismatch @ AuditError::TailMismatch { .. } => {
                Self::InconsistentState(mismatch.to_string())
            }
        }
    }
}

impl From<UnknownStatusError> for LifecycleError {
    fn from(value: UnknownStatusError) -> Self {
        Self::UnknownStatus(value.0)
    }
}
