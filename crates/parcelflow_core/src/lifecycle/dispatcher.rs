//! Notification fan-out rules.
//!
//! # Responsibility
//! - Turn lifecycle events into notification drafts for affected actors.
//!
//! # Invariants
//! - Pure: builds drafts only. Persistence and delivery belong to callers.
//! - The owning customer receives exactly one draft per event.
//! - Staff drafts are ordered like the `staff` slice passed in.

use crate::model::actor::{Actor, ActorRole};
use crate::model::notification::{NotificationCategory, NotificationDraft};
use crate::model::parcel::{Parcel, ParcelStatus};

/// Builds notification drafts for parcel events.
#[derive(Debug, Clone, Copy)]
pub struct NotificationDispatcher {
    alert_staff_on_create: bool,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NotificationDispatcher {
    pub fn new(alert_staff_on_create: bool) -> Self {
        Self {
            alert_staff_on_create,
        }
    }

    /// Drafts for a status change.
    ///
    /// Staff are alerted when the parcel is cancelled or a staff member
    /// drove the change.
    pub fn on_transition(
        &self,
        parcel: &Parcel,
        previous: ParcelStatus,
        new: ParcelStatus,
        actor: &Actor,
        staff: &[Actor],
    ) -> Vec<NotificationDraft> {
        let mut drafts = vec![customer_draft(
            parcel,
            NotificationCategory::ParcelUpdate,
            format!("Your parcel {} is now {new}.", parcel.tracking_code),
        )];

        if new == ParcelStatus::Cancelled || actor.role == ActorRole::Staff {
            let message = format!(
                "Parcel {} moved from {previous} to {new} by {} ({}).",
                parcel.tracking_code, actor.display_name, actor.role
            );
            drafts.extend(staff_alerts(parcel, staff, &message));
        }
        drafts
    }

    /// Drafts for a freshly created parcel.
    pub fn on_created(
        &self,
        parcel: &Parcel,
        creator: &Actor,
        staff: &[Actor],
    ) -> Vec<NotificationDraft> {
        let mut drafts = vec![customer_draft(
            parcel,
            NotificationCategory::ParcelUpdate,
            format!(
                "Your parcel {} has been created successfully.",
                parcel.tracking_code
            ),
        )];

        if self.alert_staff_on_create {
            let message = format!(
                "New parcel {} created by customer {}.",
                parcel.tracking_code, creator.display_name
            );
            drafts.extend(staff_alerts(parcel, staff, &message));
        }
        drafts
    }

    /// Drafts for a delivery address change. Staff are alerted with the
    /// name of the actor who moved the destination.
    pub fn on_delivery_address_changed(
        &self,
        parcel: &Parcel,
        actor: &Actor,
        staff: &[Actor],
    ) -> Vec<NotificationDraft> {
        let mut drafts = vec![customer_draft(
            parcel,
            NotificationCategory::Info,
            format!(
                "The delivery address of your parcel {} has been updated.",
                parcel.tracking_code
            ),
        )];

        let message = format!(
            "Parcel {} destination updated by {} ({}).",
            parcel.tracking_code, actor.display_name, actor.role
        );
        drafts.extend(staff_alerts(parcel, staff, &message));
        drafts
    }

    /// Drafts for a new estimated delivery date.
    pub fn on_delivery_rescheduled(&self, parcel: &Parcel) -> Vec<NotificationDraft> {
        vec![customer_draft(
            parcel,
            NotificationCategory::Info,
            format!(
                "Estimated delivery for your parcel {} has been updated.",
                parcel.tracking_code
            ),
        )]
    }
}

fn customer_draft(
    parcel: &Parcel,
    category: NotificationCategory,
    message: String,
) -> NotificationDraft {
    NotificationDraft {
        recipient_id: parcel.customer_id,
        parcel_id: Some(parcel.id),
        category,
        message,
    }
}

fn staff_alerts<'a>(
    parcel: &'a Parcel,
    staff: &'a [Actor],
    message: &'a str,
) -> impl Iterator<Item = NotificationDraft> + 'a {
    staff
        .iter()
        .filter(|member| member.role == ActorRole::Staff)
        .map(move |member| NotificationDraft {
            recipient_id: member.id,
            parcel_id: Some(parcel.id),
            category: NotificationCategory::Alert,
            message: message.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn parcel_for(customer: &Actor, status: ParcelStatus) -> Parcel {
        Parcel {
            id: Uuid::new_v4(),
            tracking_code: "PD-20240301-00AB12".to_string(),
            status,
            customer_id: customer.id,
            pickup_address_id: Uuid::new_v4(),
            delivery_address_id: Uuid::new_v4(),
            weight_kg: 1.5,
            description: None,
            estimated_delivery_date: None,
            created_at: 1_000,
            updated_at: 1_000,
            version: 1,
        }
    }

    fn staff_pair() -> Vec<Actor> {
        vec![
            Actor::new(ActorRole::Staff, "Ada"),
            Actor::new(ActorRole::Staff, "Grace"),
        ]
    }

    #[test]
    fn staff_transition_notifies_customer_and_all_staff() {
        let customer = Actor::new(ActorRole::Customer, "Carol");
        let staff = staff_pair();
        let parcel = parcel_for(&customer, ParcelStatus::PickedUp);

        let drafts = NotificationDispatcher::default().on_transition(
            &parcel,
            ParcelStatus::Created,
            ParcelStatus::PickedUp,
            &staff[0],
            &staff,
        );

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].recipient_id, customer.id);
        assert_eq!(drafts[0].category, NotificationCategory::ParcelUpdate);
        assert_eq!(
            drafts[0].message,
            "Your parcel PD-20240301-00AB12 is now PICKED_UP."
        );
        assert_eq!(drafts[1].recipient_id, staff[0].id);
        assert_eq!(drafts[2].recipient_id, staff[1].id);
        assert!(drafts[1..]
            .iter()
            .all(|draft| draft.category == NotificationCategory::Alert
                && draft.message.contains("by Ada (STAFF)")));
    }

    #[test]
    fn customer_cancellation_alerts_staff() {
        let customer = Actor::new(ActorRole::Customer, "Carol");
        let staff = staff_pair();
        let parcel = parcel_for(&customer, ParcelStatus::Cancelled);

        let drafts = NotificationDispatcher::default().on_transition(
            &parcel,
            ParcelStatus::Created,
            ParcelStatus::Cancelled,
            &customer,
            &staff,
        );

        assert_eq!(drafts.len(), 3);
        assert!(drafts[1].message.contains("CREATED to CANCELLED by Carol (CUSTOMER)"));
    }

    #[test]
    fn creation_alert_can_be_disabled() {
        let customer = Actor::new(ActorRole::Customer, "Carol");
        let staff = staff_pair();
        let parcel = parcel_for(&customer, ParcelStatus::Created);

        let with_alerts = NotificationDispatcher::new(true).on_created(&parcel, &customer, &staff);
        let without = NotificationDispatcher::new(false).on_created(&parcel, &customer, &staff);

        assert_eq!(with_alerts.len(), 3);
        assert_eq!(
            with_alerts[1].message,
            "New parcel PD-20240301-00AB12 created by customer Carol."
        );
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].recipient_id, customer.id);
    }

    #[test]
    fn address_change_informs_customer_and_alerts_staff() {
        let customer = Actor::new(ActorRole::Customer, "Carol");
        let staff = staff_pair();
        let parcel = parcel_for(&customer, ParcelStatus::Created);

        let drafts = NotificationDispatcher::default()
            .on_delivery_address_changed(&parcel, &customer, &staff);

        assert_eq!(drafts.len(), 3);
        assert_eq!(drafts[0].recipient_id, customer.id);
        assert_eq!(drafts[0].category, NotificationCategory::Info);
        assert_eq!(drafts[0].parcel_id, Some(parcel.id));
        let alerts = drafts
            .iter()
            .filter(|draft| draft.category == NotificationCategory::Alert)
            .collect::<Vec<_>>();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].recipient_id, staff[0].id);
        assert_eq!(
            alerts[1].message,
            "Parcel PD-20240301-00AB12 destination updated by Carol (CUSTOMER)."
        );
    }

    #[test]
    fn reschedule_only_informs_customer() {
        let customer = Actor::new(ActorRole::Customer, "Carol");
        let parcel = parcel_for(&customer, ParcelStatus::InTransit);

        let drafts = NotificationDispatcher::default().on_delivery_rescheduled(&parcel);

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].recipient_id, customer.id);
        assert_eq!(drafts[0].category, NotificationCategory::Info);
    }
}
