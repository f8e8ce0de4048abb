//! Status transition policy.
//!
//! # Responsibility
//! - Hold the transition table as data and answer allow/deny questions.
//! - Hold the narrower table of transitions customers may request for
//!   their own parcels.
//! - Hold the staff cancellation override: staff may cancel any parcel that
//!   is not yet terminal, even where the table has no CANCELLED edge.
//!
//! # Invariants
//! - Pure: no storage, clock or logging access.
//! - Every edge moves forward in the pipeline; cancellation is reachable
//!   from CREATED and PICKED_UP only; terminal states have no edges.

use crate::model::parcel::ParcelStatus;

/// Directed edges keyed by source status.
const TRANSITIONS: &[(ParcelStatus, &[ParcelStatus])] = &[
    (
        ParcelStatus::Created,
        &[ParcelStatus::PickedUp, ParcelStatus::Cancelled],
    ),
    (
        ParcelStatus::PickedUp,
        &[ParcelStatus::InTransit, ParcelStatus::Cancelled],
    ),
    (ParcelStatus::InTransit, &[ParcelStatus::OutForDelivery]),
    (ParcelStatus::OutForDelivery, &[ParcelStatus::Delivered]),
    (ParcelStatus::Delivered, &[]),
    (ParcelStatus::Cancelled, &[]),
];

/// Edges a customer may request on a parcel they own.
const CUSTOMER_SELF_SERVICE: &[(ParcelStatus, ParcelStatus)] = &[
    (ParcelStatus::Created, ParcelStatus::Cancelled),
    (ParcelStatus::PickedUp, ParcelStatus::Cancelled),
];

/// Statuses whose delivery address may still change.
const ADDRESS_EDITABLE: &[ParcelStatus] = &[ParcelStatus::Created, ParcelStatus::PickedUp];

/// Returns the statuses reachable from `current` in one step.
pub fn allowed_targets(current: ParcelStatus) -> &'static [ParcelStatus] {
    TRANSITIONS
        .iter()
        .find(|(from, _)| *from == current)
        .map_or(&[], |(_, targets)| *targets)
}

/// Returns whether `current -> target` is an edge of the table.
pub fn is_transition_allowed(current: ParcelStatus, target: ParcelStatus) -> bool {
    allowed_targets(current).contains(&target)
}

/// Returns whether `status` has no outgoing edge.
pub fn is_terminal(status: ParcelStatus) -> bool {
    allowed_targets(status).is_empty()
}

/// Returns whether a customer may request `current -> target` themselves.
pub fn is_self_service_allowed(current: ParcelStatus, target: ParcelStatus) -> bool {
    CUSTOMER_SELF_SERVICE.contains(&(current, target))
}

/// Returns whether a staff member may force `current -> target` outside the
/// table. Only cancellation of a non-terminal parcel qualifies.
pub fn is_staff_override(current: ParcelStatus, target: ParcelStatus) -> bool {
    target == ParcelStatus::Cancelled && !is_terminal(current)
}

/// Returns whether the delivery address may change while in `status`.
pub fn is_address_editable(status: ParcelStatus) -> bool {
    ADDRESS_EDITABLE.contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ParcelStatus::*;

    #[test]
    fn table_matches_the_pipeline() {
        let expected = [
            (Created, PickedUp),
            (Created, Cancelled),
            (PickedUp, InTransit),
            (PickedUp, Cancelled),
            (InTransit, OutForDelivery),
            (OutForDelivery, Delivered),
        ];

        for from in ParcelStatus::ALL {
            for to in ParcelStatus::ALL {
                assert_eq!(
                    is_transition_allowed(from, to),
                    expected.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn no_self_loops() {
        for status in ParcelStatus::ALL {
            assert!(!is_transition_allowed(status, status));
        }
    }

    #[test]
    fn terminal_states_agree_with_model() {
        for status in ParcelStatus::ALL {
            assert_eq!(is_terminal(status), status.is_terminal());
        }
    }

    #[test]
    fn self_service_is_a_subset_of_the_table() {
        for from in ParcelStatus::ALL {
            for to in ParcelStatus::ALL {
                if is_self_service_allowed(from, to) {
                    assert!(is_transition_allowed(from, to));
                    assert_eq!(to, Cancelled);
                }
            }
        }
        assert!(!is_self_service_allowed(InTransit, Cancelled));
        assert!(!is_self_service_allowed(Created, PickedUp));
    }

    #[test]
    fn staff_override_only_cancels_live_parcels() {
        assert!(is_staff_override(InTransit, Cancelled));
        assert!(is_staff_override(OutForDelivery, Cancelled));
        assert!(is_staff_override(Created, Cancelled));
        assert!(!is_staff_override(Delivered, Cancelled));
        assert!(!is_staff_override(Cancelled, Cancelled));
        assert!(!is_staff_override(InTransit, Delivered));
    }

    #[test]
    fn address_is_editable_only_before_transit() {
        assert!(is_address_editable(Created));
        assert!(is_address_editable(PickedUp));
        assert!(!is_address_editable(InTransit));
        assert!(!is_address_editable(Delivered));
    }
}
