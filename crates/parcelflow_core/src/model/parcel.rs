//! Parcel domain model.
//!
//! # Responsibility
//! - Define the parcel record and its lifecycle status enum.
//! - Provide the one canonical parser for status strings.
//!
//! # Invariants
//! - `status` is always one of the six `ParcelStatus` values.
//! - `tracking_code` never changes once assigned.
//! - `updated_at` never moves backwards.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Internal storage key of a parcel.
pub type ParcelId = Uuid;

/// Opaque reference to an address owned by the address subsystem.
pub type AddressId = Uuid;

static TRACKING_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z0-9]{1,8}-[0-9]{8}-[0-9A-F]{6}$").expect("valid tracking code regex")
});

/// Lifecycle status of a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParcelStatus {
    Created,
    PickedUp,
    InTransit,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl ParcelStatus {
    /// Every status in pipeline order.
    pub const ALL: [ParcelStatus; 6] = [
        Self::Created,
        Self::PickedUp,
        Self::InTransit,
        Self::OutForDelivery,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Stable string form used in storage and at external boundaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::PickedUp => "PICKED_UP",
            Self::InTransit => "IN_TRANSIT",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a status string.
    ///
    /// Input is trimmed and matched ASCII case-insensitively against the
    /// canonical upper-snake names. Anything else is rejected.
    pub fn parse(value: &str) -> Result<Self, UnknownStatusError> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatusError(value.to_string()))
    }

    /// Whether no outgoing transition exists from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParcelStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Raised when a status string is not part of `ParcelStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatusError(pub String);

impl Display for UnknownStatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown parcel status `{}`", self.0)
    }
}

impl Error for UnknownStatusError {}

/// Point location attached to a status change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Whether both coordinates are finite and inside WGS84 bounds.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Canonical parcel record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parcel {
    pub id: ParcelId,
    /// External identifier shown to customers, e.g. `PD-20240131-1A2B3C`.
    pub tracking_code: String,
    pub status: ParcelStatus,
    pub customer_id: Uuid,
    pub pickup_address_id: AddressId,
    pub delivery_address_id: AddressId,
    pub weight_kg: f64,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub estimated_delivery_date: Option<i64>,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds. Never earlier than the previous value.
    pub updated_at: i64,
    /// Bumped on every committed mutation; used for compare-and-set updates.
    pub version: i64,
}

impl Parcel {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Returns whether `value` matches the tracking code layout
/// `<PREFIX>-<YYYYMMDD>-<6 hex>`.
pub fn is_valid_tracking_code(value: &str) -> bool {
    TRACKING_CODE_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::{is_valid_tracking_code, GeoPoint, ParcelStatus};

    #[test]
    fn parse_accepts_canonical_names_case_insensitively() {
        assert_eq!(
            ParcelStatus::parse("picked_up").unwrap(),
            ParcelStatus::PickedUp
        );
        assert_eq!(
            ParcelStatus::parse("  OUT_FOR_DELIVERY ").unwrap(),
            ParcelStatus::OutForDelivery
        );
        for status in ParcelStatus::ALL {
            assert_eq!(ParcelStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = ParcelStatus::parse("LOST").unwrap_err();
        assert_eq!(err.0, "LOST");
        assert!(ParcelStatus::parse("").is_err());
        assert!(ParcelStatus::parse("picked up").is_err());
    }

    #[test]
    fn only_delivered_and_cancelled_are_terminal() {
        let terminal: Vec<_> = ParcelStatus::ALL
            .into_iter()
            .filter(|status| status.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![ParcelStatus::Delivered, ParcelStatus::Cancelled]
        );
    }

    #[test]
    fn tracking_code_layout_is_checked() {
        assert!(is_valid_tracking_code("PD-20240131-0A1B2C"));
        assert!(!is_valid_tracking_code("PD-2024013-0A1B2C"));
        assert!(!is_valid_tracking_code("pd-20240131-0a1b2c"));
        assert!(!is_valid_tracking_code("PD-20240131-0A1B2C-extra"));
    }

    #[test]
    fn geo_point_bounds() {
        assert!(GeoPoint { lat: -1.28, lng: 36.82 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint {
            lat: f64::NAN,
            lng: 0.0
        }
        .is_valid());
    }
}
