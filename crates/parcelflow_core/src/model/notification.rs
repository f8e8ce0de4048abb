//! Notification records and drafts.
//!
//! Drafts are pure data produced by the dispatcher; they become
//! `Notification` rows once persisted. After creation a notification only
//! changes when its recipient marks it read.

use crate::model::actor::ActorId;
use crate::model::parcel::ParcelId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NotificationId = Uuid;

/// Notification category, ordered roughly by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
    /// Lower-priority informational message.
    Info,
    /// Needs staff attention.
    Alert,
    /// Customer-facing parcel progress update.
    ParcelUpdate,
}

impl NotificationCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Alert => "ALERT",
            Self::ParcelUpdate => "PARCEL_UPDATE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(Self::Info),
            "ALERT" => Some(Self::Alert),
            "PARCEL_UPDATE" => Some(Self::ParcelUpdate),
            _ => None,
        }
    }
}

/// Notification content not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub recipient_id: ActorId,
    pub parcel_id: Option<ParcelId>,
    pub category: NotificationCategory,
    pub message: String,
}

/// Persisted notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub recipient_id: ActorId,
    pub parcel_id: Option<ParcelId>,
    pub category: NotificationCategory,
    pub message: String,
    pub is_read: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl Notification {
    /// Materializes a draft with a fresh id and unread state.
    pub fn from_draft(draft: NotificationDraft, created_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: draft.recipient_id,
            parcel_id: draft.parcel_id,
            category: draft.category,
            message: draft.message,
            is_read: false,
            created_at,
        }
    }
}
