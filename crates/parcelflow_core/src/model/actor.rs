//! Actor identities used for authorization and audit attribution.
//!
//! Actors are registered by the external identity subsystem. Core only reads
//! them back to verify claimed roles and to enumerate staff recipients.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a customer or staff member.
pub type ActorId = Uuid;

/// Role an actor holds in the delivery system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    /// Owns parcels; limited self-service transitions.
    Customer,
    /// Operations/admin personnel; may drive any forward transition.
    Staff,
}

impl ActorRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "CUSTOMER",
            Self::Staff => "STAFF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CUSTOMER" => Some(Self::Customer),
            "STAFF" => Some(Self::Staff),
            _ => None,
        }
    }
}

impl Display for ActorRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory record for one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub role: ActorRole,
    /// Human-readable name used in staff alert messages.
    pub display_name: String,
}

impl Actor {
    pub fn new(role: ActorRole, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            display_name: display_name.into(),
        }
    }

    /// Authenticated reference for this actor.
    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            id: self.id,
            role: self.role,
        }
    }
}

/// Already-authenticated identity plus role, as supplied by the caller.
///
/// Core trusts the pairing only after checking it against the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorRef {
    pub id: ActorId,
    pub role: ActorRole,
}

impl ActorRef {
    pub fn customer(id: ActorId) -> Self {
        Self {
            id,
            role: ActorRole::Customer,
        }
    }

    pub fn staff(id: ActorId) -> Self {
        Self {
            id,
            role: ActorRole::Staff,
        }
    }

    pub fn is_staff(&self) -> bool {
        self.role == ActorRole::Staff
    }
}
