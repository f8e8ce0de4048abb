//! Audit trail writer.
//!
//! # Responsibility
//! - Append status history entries inside the caller's unit of work.
//! - Check that a parcel's trail ends at its current status before commit.
//!
//! # Invariants
//! - Only appends; never edits or removes entries.
//! - Returned entries are owned copies, detached from storage.

use crate::model::actor::ActorId;
use crate::model::history::{NewHistoryEntry, StatusHistoryEntry};
use crate::model::parcel::{GeoPoint, Parcel, ParcelId, ParcelStatus};
use crate::repo::history_repo::HistoryRepository;
use crate::repo::parcel_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum AuditError {
    /// The trail's last entry does not mirror the parcel status.
    TailMismatch {
        parcel_id: ParcelId,
        parcel_status: ParcelStatus,
        tail_status: Option<ParcelStatus>,
    },
    Repo(RepoError),
}

impl Display for AuditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TailMismatch {
                parcel_id,
                parcel_status,
                tail_status: Some(tail),
            } => write!(
                f,
                "history of parcel {parcel_id} ends at {tail} but parcel is {parcel_status}"
            ),
            Self::TailMismatch {
                parcel_id,
                parcel_status,
                tail_status: None,
            } => write!(
                f,
                "parcel {parcel_id} is {parcel_status} but has no history"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AuditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::TailMismatch { .. } => None,
        }
    }
}

impl From<RepoError> for AuditError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Append-only writer over a history repository.
pub struct AuditTrailWriter<R: HistoryRepository> {
    repo: R,
}

impl<R: HistoryRepository> AuditTrailWriter<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Appends one entry and returns the stored copy.
    pub fn append(
        &self,
        parcel_id: ParcelId,
        status: ParcelStatus,
        actor_id: ActorId,
        note: impl Into<String>,
        location: Option<GeoPoint>,
        timestamp: i64,
    ) -> Result<StatusHistoryEntry, AuditError> {
        let entry = NewHistoryEntry {
            parcel_id,
            status,
            actor_id,
            note: note.into(),
            location,
            timestamp,
        };
        Ok(self.repo.append(&entry)?)
    }

    /// Fails unless the parcel's latest entry carries `parcel.status`.
    pub fn verify_tail(&self, parcel: &Parcel) -> Result<(), AuditError> {
        let tail_status = self
            .repo
            .latest_for_parcel(parcel.id)?
            .map(|entry| entry.status);
        if tail_status == Some(parcel.status) {
            return Ok(());
        }
        Err(AuditError::TailMismatch {
            parcel_id: parcel.id,
            parcel_status: parcel.status,
            tail_status,
        })
    }
}
