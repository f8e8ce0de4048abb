//! Recipient inbox service.
//!
//! # Responsibility
//! - Serve list/count/read/delete operations on one recipient's
//!   notifications.
//!
//! # Invariants
//! - A notification addressed to someone else is reported as not found.
//! - Message content is never modified here; only the read flag changes.

use crate::model::actor::ActorId;
use crate::model::notification::{Notification, NotificationId};
use crate::repo::notification_repo::{
    normalize_notification_limit, NotificationListQuery, NotificationRepository,
};
use crate::repo::parcel_repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for inbox use-cases.
#[derive(Debug)]
pub enum NotificationServiceError {
    /// Notification is absent or belongs to another recipient.
    NotFound(NotificationId),
    Repo(RepoError),
}

impl NotificationServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Repo(_) => "storage",
        }
    }
}

impl Display for NotificationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "notification {id} not found"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotificationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<RepoError> for NotificationServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Inbox envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxPage {
    /// Newest first.
    pub items: Vec<Notification>,
    /// Unread count over the whole inbox, not only this page.
    pub unread_count: u64,
    pub applied_limit: u32,
}

/// Inbox service facade over a notification repository.
pub struct NotificationService<R: NotificationRepository> {
    repo: R,
}

impl<R: NotificationRepository> NotificationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Lists the recipient's notifications newest first.
    pub fn list(
        &self,
        recipient_id: ActorId,
        unread_only: bool,
        limit: Option<u32>,
    ) -> Result<InboxPage, NotificationServiceError> {
        let applied_limit = normalize_notification_limit(limit);
        let items = self.repo.list_for_recipient(
            recipient_id,
            &NotificationListQuery {
                unread_only,
                parcel_id: None,
                limit: Some(applied_limit),
            },
        )?;
        let unread_count = self.repo.unread_count(recipient_id)?;
        Ok(InboxPage {
            items,
            unread_count,
            applied_limit,
        })
    }

    pub fn unread_count(&self, recipient_id: ActorId) -> Result<u64, NotificationServiceError> {
        Ok(self.repo.unread_count(recipient_id)?)
    }

    /// Marks one notification read. Marking an already-read one succeeds.
    pub fn mark_read(
        &self,
        id: NotificationId,
        recipient_id: ActorId,
    ) -> Result<(), NotificationServiceError> {
        if !self.repo.mark_read(id, recipient_id)? {
            return Err(NotificationServiceError::NotFound(id));
        }
        Ok(())
    }

    /// Returns how many notifications flipped to read.
    pub fn mark_all_read(&self, recipient_id: ActorId) -> Result<u64, NotificationServiceError> {
        let changed = self.repo.mark_all_read(recipient_id)?;
        info!("event=notification_mark_all_read module=service status=ok changed={changed}");
        Ok(changed)
    }

    pub fn delete(
        &self,
        id: NotificationId,
        recipient_id: ActorId,
    ) -> Result<(), NotificationServiceError> {
        if !self.repo.delete(id, recipient_id)? {
            return Err(NotificationServiceError::NotFound(id));
        }
        Ok(())
    }

    /// Returns how many notifications were removed.
    pub fn delete_all(&self, recipient_id: ActorId) -> Result<u64, NotificationServiceError> {
        let removed = self.repo.delete_all(recipient_id)?;
        info!("event=notification_delete_all module=service status=ok removed={removed}");
        Ok(removed)
    }
}
