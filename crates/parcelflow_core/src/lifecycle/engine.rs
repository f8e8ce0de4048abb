//! Parcel lifecycle engine.
//!
//! # Responsibility
//! - Validate and apply parcel creation, status transitions and delivery
//!   detail changes.
//! - Keep parcel row, audit trail and notifications consistent inside one
//!   unit of work.
//!
//! # Invariants
//! - Every mutation appends exactly one history entry and bumps `version`.
//! - A rejected request writes nothing: the unit of work is dropped.
//! - The audit tail is verified before every commit.
//! - Notification persistence failures never fail the operation; the drafts
//!   come back as `undelivered`.
//! - `updated_at` never moves backwards, even if the clock does.

use crate::config::EngineConfig;
use crate::db::UnitOfWork;
use crate::lifecycle::audit::AuditTrailWriter;
use crate::lifecycle::clock::{Clock, SystemClock};
use crate::lifecycle::dispatcher::NotificationDispatcher;
use crate::lifecycle::error::{LifecycleError, LifecycleResult, NotFoundTarget};
use crate::lifecycle::policy;
use crate::model::actor::{Actor, ActorRef, ActorRole};
use crate::model::history::StatusHistoryEntry;
use crate::model::notification::{Notification, NotificationDraft};
use crate::model::parcel::{AddressId, GeoPoint, Parcel, ParcelId, ParcelStatus};
use crate::repo::actor_repo::ActorRepository;
use crate::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use crate::repo::parcel_repo::{ParcelRepository, ParcelUpdate, RepoError, RepoResult};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

const TRACKING_CODE_ATTEMPTS: usize = 5;
const CREATED_NOTE: &str = "created";
const ADDRESS_UPDATED_NOTE: &str = "Delivery address updated";
const RESCHEDULED_NOTE: &str = "Estimated delivery rescheduled";

/// Input for parcel creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewParcel {
    pub customer_id: Uuid,
    pub pickup_address_id: AddressId,
    pub delivery_address_id: AddressId,
    pub weight_kg: f64,
    pub description: Option<String>,
}

/// Status change request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub parcel_id: ParcelId,
    pub target: ParcelStatus,
    pub actor: ActorRef,
    /// Defaults to `Status changed to <STATUS>` when absent or blank.
    pub note: Option<String>,
    pub location: Option<GeoPoint>,
    /// Version the caller last saw. A mismatch fails with `Conflict`.
    pub expected_version: Option<i64>,
}

impl TransitionRequest {
    pub fn new(parcel_id: ParcelId, target: ParcelStatus, actor: ActorRef) -> Self {
        Self {
            parcel_id,
            target,
            actor,
            note: None,
            location: None,
            expected_version: None,
        }
    }
}

/// Delivery address change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChangeRequest {
    pub parcel_id: ParcelId,
    pub delivery_address_id: AddressId,
    pub actor: ActorRef,
    pub expected_version: Option<i64>,
}

/// Estimated delivery date change request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleRequest {
    pub parcel_id: ParcelId,
    /// Epoch milliseconds.
    pub estimated_delivery_date: i64,
    pub actor: ActorRef,
    pub expected_version: Option<i64>,
}

/// Committed outcome of one lifecycle mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionReceipt {
    pub parcel: Parcel,
    pub entry: StatusHistoryEntry,
    /// Notifications persisted with the change.
    pub notifications: Vec<Notification>,
    /// Drafts whose persistence failed; the caller should hand them to the
    /// delivery subsystem for retry.
    pub undelivered: Vec<NotificationDraft>,
}

/// Orchestrates policy, persistence, audit and notification fan-out.
pub struct LifecycleEngine {
    config: EngineConfig,
    dispatcher: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl LifecycleEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            dispatcher: NotificationDispatcher::new(config.alert_staff_on_create),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Creates a parcel in CREATED with its first history entry.
    ///
    /// # Errors
    /// - `Forbidden` unless a registered customer creates for themselves.
    /// - `InvalidInput` for non-positive weight or pickup == delivery.
    pub fn create_parcel(
        &self,
        uow: UnitOfWork<'_>,
        actor: ActorRef,
        input: NewParcel,
    ) -> LifecycleResult<TransitionReceipt> {
        let started_at = Instant::now();
        info!(
            "event=parcel_create module=lifecycle status=start actor_role={}",
            actor.role
        );
        let result = self.create_parcel_inner(uow, actor, input);
        log_outcome("parcel_create", started_at, &result);
        result
    }

    /// Moves a parcel to `request.target`.
    ///
    /// Checks run in order: parcel and actor exist, expected version,
    /// ownership, terminal status, customer self-service rules, transition
    /// table. The first failing check decides the error. Staff may cancel
    /// any non-terminal parcel.
    pub fn request_transition(
        &self,
        uow: UnitOfWork<'_>,
        request: TransitionRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        let started_at = Instant::now();
        info!(
            "event=parcel_transition module=lifecycle status=start parcel_id={} target={} actor_role={}",
            request.parcel_id, request.target, request.actor.role
        );
        let result = self.request_transition_inner(uow, request);
        log_outcome("parcel_transition", started_at, &result);
        result
    }

    /// Points the parcel at a new delivery address.
    ///
    /// Allowed for the owner and staff while the parcel is CREATED or
    /// PICKED_UP.
    pub fn update_delivery_address(
        &self,
        uow: UnitOfWork<'_>,
        request: AddressChangeRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        let started_at = Instant::now();
        info!(
            "event=parcel_address_update module=lifecycle status=start parcel_id={} actor_role={}",
            request.parcel_id, request.actor.role
        );
        let result = self.update_delivery_address_inner(uow, request);
        log_outcome("parcel_address_update", started_at, &result);
        result
    }

    /// Sets a new estimated delivery date. Staff only.
    pub fn reschedule_delivery(
        &self,
        uow: UnitOfWork<'_>,
        request: RescheduleRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        let started_at = Instant::now();
        info!(
            "event=parcel_reschedule module=lifecycle status=start parcel_id={} actor_role={}",
            request.parcel_id, request.actor.role
        );
        let result = self.reschedule_delivery_inner(uow, request);
        log_outcome("parcel_reschedule", started_at, &result);
        result
    }

    fn create_parcel_inner(
        &self,
        mut uow: UnitOfWork<'_>,
        actor: ActorRef,
        input: NewParcel,
    ) -> LifecycleResult<TransitionReceipt> {
        let creator = resolve_actor(&uow.actors(), actor)?;
        if creator.role != ActorRole::Customer {
            return Err(LifecycleError::Forbidden(
                "only customers create parcels".to_string(),
            ));
        }
        if input.customer_id != creator.id {
            return Err(LifecycleError::Forbidden(
                "customers create parcels for themselves only".to_string(),
            ));
        }
        if !input.weight_kg.is_finite() || input.weight_kg <= 0.0 {
            return Err(LifecycleError::InvalidInput(
                "weight_kg must be a positive number".to_string(),
            ));
        }
        if input.pickup_address_id == input.delivery_address_id {
            return Err(LifecycleError::InvalidInput(
                "pickup and delivery address must differ".to_string(),
            ));
        }

        let now = self.clock.now_ms();
        let parcel = self.insert_with_tracking_code(&uow, &input, now)?;

        let entry = AuditTrailWriter::new(uow.history()).append(
            parcel.id,
            ParcelStatus::Created,
            creator.id,
            CREATED_NOTE,
            None,
            now,
        )?;

        let staff = uow.actors().list_staff()?;
        let drafts = self.dispatcher.on_created(&parcel, &creator, &staff);
        let (notifications, undelivered) = self.finish(&mut uow, &parcel, drafts, now)?;
        uow.commit()?;

        Ok(TransitionReceipt {
            parcel,
            entry,
            notifications,
            undelivered,
        })
    }

    fn insert_with_tracking_code(
        &self,
        uow: &UnitOfWork<'_>,
        input: &NewParcel,
        now: i64,
    ) -> LifecycleResult<Parcel> {
        let parcels = uow.parcels();
        let date = parcels.date_stamp(now)?;
        let description = input
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        for attempt in 1..=TRACKING_CODE_ATTEMPTS {
            let parcel = Parcel {
                id: Uuid::new_v4(),
                tracking_code: generate_tracking_code(&self.config.tracking_code_prefix, &date),
                status: ParcelStatus::Created,
                customer_id: input.customer_id,
                pickup_address_id: input.pickup_address_id,
                delivery_address_id: input.delivery_address_id,
                weight_kg: input.weight_kg,
                description: description.clone(),
                estimated_delivery_date: Some(now + self.config.estimated_delivery_offset_ms()),
                created_at: now,
                updated_at: now,
                version: 1,
            };
            match parcels.insert_parcel(&parcel) {
                Ok(()) => return Ok(parcel),
                Err(RepoError::DuplicateTrackingCode(_)) => {
                    warn!(
                        "event=tracking_code_collision module=lifecycle status=retry attempt={attempt}"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(LifecycleError::Conflict(format!(
            "no unique tracking code after {TRACKING_CODE_ATTEMPTS} attempts"
        )))
    }

    fn request_transition_inner(
        &self,
        mut uow: UnitOfWork<'_>,
        request: TransitionRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        if let Some(location) = request.location {
            if !location.is_valid() {
                return Err(LifecycleError::InvalidInput(
                    "location is outside WGS84 bounds".to_string(),
                ));
            }
        }

        let parcel = load_parcel(&uow, request.parcel_id)?;
        let actor = resolve_actor(&uow.actors(), request.actor)?;
        check_expected_version(&parcel, request.expected_version)?;
        authorize_access(&actor, &parcel)?;

        let current = parcel.status;
        let target = request.target;
        if policy::is_terminal(current) {
            return Err(LifecycleError::TerminalStateViolation(current));
        }
        if actor.role == ActorRole::Customer && !policy::is_self_service_allowed(current, target)
        {
            return Err(LifecycleError::Forbidden(format!(
                "customers cannot move a parcel from {current} to {target}"
            )));
        }
        let staff_override =
            actor.role == ActorRole::Staff && policy::is_staff_override(current, target);
        if !policy::is_transition_allowed(current, target) && !staff_override {
            return Err(LifecycleError::InvalidTransition {
                current,
                requested: target,
            });
        }

        let timestamp = self.clock.now_ms().max(parcel.updated_at);
        let updated = uow.parcels().compare_and_set(&ParcelUpdate {
            status: target,
            updated_at: timestamp,
            ..ParcelUpdate::unchanged(&parcel)
        })?;

        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Status changed to {target}"));
        let entry = AuditTrailWriter::new(uow.history()).append(
            updated.id,
            target,
            actor.id,
            note,
            request.location,
            timestamp,
        )?;

        let staff = uow.actors().list_staff()?;
        let drafts = self
            .dispatcher
            .on_transition(&updated, current, target, &actor, &staff);
        let (notifications, undelivered) = self.finish(&mut uow, &updated, drafts, timestamp)?;
        uow.commit()?;

        Ok(TransitionReceipt {
            parcel: updated,
            entry,
            notifications,
            undelivered,
        })
    }

    fn update_delivery_address_inner(
        &self,
        mut uow: UnitOfWork<'_>,
        request: AddressChangeRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        let parcel = load_parcel(&uow, request.parcel_id)?;
        let actor = resolve_actor(&uow.actors(), request.actor)?;
        check_expected_version(&parcel, request.expected_version)?;
        authorize_access(&actor, &parcel)?;

        if policy::is_terminal(parcel.status) {
            return Err(LifecycleError::TerminalStateViolation(parcel.status));
        }
        if !policy::is_address_editable(parcel.status) {
            return Err(LifecycleError::AddressLocked(parcel.status));
        }
        if request.delivery_address_id == parcel.pickup_address_id {
            return Err(LifecycleError::InvalidInput(
                "delivery address must differ from pickup address".to_string(),
            ));
        }
        if request.delivery_address_id == parcel.delivery_address_id {
            return Err(LifecycleError::InvalidInput(
                "parcel already ships to this delivery address".to_string(),
            ));
        }

        let timestamp = self.clock.now_ms().max(parcel.updated_at);
        let updated = uow.parcels().compare_and_set(&ParcelUpdate {
            delivery_address_id: request.delivery_address_id,
            updated_at: timestamp,
            ..ParcelUpdate::unchanged(&parcel)
        })?;
        let entry = AuditTrailWriter::new(uow.history()).append(
            updated.id,
            updated.status,
            actor.id,
            ADDRESS_UPDATED_NOTE,
            None,
            timestamp,
        )?;

        let staff = uow.actors().list_staff()?;
        let drafts = self
            .dispatcher
            .on_delivery_address_changed(&updated, &actor, &staff);
        let (notifications, undelivered) = self.finish(&mut uow, &updated, drafts, timestamp)?;
        uow.commit()?;

        Ok(TransitionReceipt {
            parcel: updated,
            entry,
            notifications,
            undelivered,
        })
    }

    fn reschedule_delivery_inner(
        &self,
        mut uow: UnitOfWork<'_>,
        request: RescheduleRequest,
    ) -> LifecycleResult<TransitionReceipt> {
        let parcel = load_parcel(&uow, request.parcel_id)?;
        let actor = resolve_actor(&uow.actors(), request.actor)?;
        check_expected_version(&parcel, request.expected_version)?;

        if actor.role != ActorRole::Staff {
            return Err(LifecycleError::Forbidden(
                "only staff reschedule deliveries".to_string(),
            ));
        }
        if policy::is_terminal(parcel.status) {
            return Err(LifecycleError::TerminalStateViolation(parcel.status));
        }
        if request.estimated_delivery_date < parcel.created_at {
            return Err(LifecycleError::InvalidInput(
                "estimated delivery date precedes parcel creation".to_string(),
            ));
        }

        let timestamp = self.clock.now_ms().max(parcel.updated_at);
        let updated = uow.parcels().compare_and_set(&ParcelUpdate {
            estimated_delivery_date: Some(request.estimated_delivery_date),
            updated_at: timestamp,
            ..ParcelUpdate::unchanged(&parcel)
        })?;
        let entry = AuditTrailWriter::new(uow.history()).append(
            updated.id,
            updated.status,
            actor.id,
            RESCHEDULED_NOTE,
            None,
            timestamp,
        )?;

        let drafts = self.dispatcher.on_delivery_rescheduled(&updated);
        let (notifications, undelivered) = self.finish(&mut uow, &updated, drafts, timestamp)?;
        uow.commit()?;

        Ok(TransitionReceipt {
            parcel: updated,
            entry,
            notifications,
            undelivered,
        })
    }

    /// Verifies the audit tail and persists drafts. Returns persisted
    /// notifications and the drafts that could not be stored.
    fn finish(
        &self,
        uow: &mut UnitOfWork<'_>,
        parcel: &Parcel,
        drafts: Vec<NotificationDraft>,
        created_at: i64,
    ) -> LifecycleResult<(Vec<Notification>, Vec<NotificationDraft>)> {
        AuditTrailWriter::new(uow.history()).verify_tail(parcel)?;

        if drafts.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let notifications = drafts
            .iter()
            .cloned()
            .map(|draft| Notification::from_draft(draft, created_at))
            .collect::<Vec<_>>();

        match persist_notifications(uow, &notifications) {
            Ok(()) => Ok((notifications, Vec::new())),
            Err(err) => {
                warn!(
                    "event=notification_persist module=lifecycle status=error parcel_id={} drafts={} error={}",
                    parcel.id,
                    drafts.len(),
                    err
                );
                Ok((Vec::new(), drafts))
            }
        }
    }
}

fn persist_notifications(
    uow: &mut UnitOfWork<'_>,
    notifications: &[Notification],
) -> RepoResult<()> {
    let savepoint = uow.savepoint()?;
    {
        let repo = SqliteNotificationRepository::new(&savepoint);
        for notification in notifications {
            repo.insert_notification(notification)?;
        }
    }
    savepoint.commit()?;
    Ok(())
}

fn load_parcel(uow: &UnitOfWork<'_>, parcel_id: ParcelId) -> LifecycleResult<Parcel> {
    uow.parcels()
        .get_parcel(parcel_id)?
        .ok_or(LifecycleError::NotFound(NotFoundTarget::Parcel(parcel_id)))
}

/// Loads the directory record and checks the claimed role against it.
pub(crate) fn resolve_actor<A: ActorRepository>(
    actors: &A,
    actor: ActorRef,
) -> LifecycleResult<Actor> {
    let record = actors
        .get_actor(actor.id)?
        .ok_or(LifecycleError::NotFound(NotFoundTarget::Actor(actor.id)))?;
    if record.role != actor.role {
        return Err(LifecycleError::Forbidden(format!(
            "actor is registered as {}, not {}",
            record.role, actor.role
        )));
    }
    Ok(record)
}

/// Customers may only touch parcels they own; staff may touch any.
pub(crate) fn authorize_access(actor: &Actor, parcel: &Parcel) -> LifecycleResult<()> {
    if actor.role == ActorRole::Customer && parcel.customer_id != actor.id {
        return Err(LifecycleError::Forbidden(
            "parcel belongs to another customer".to_string(),
        ));
    }
    Ok(())
}

fn check_expected_version(parcel: &Parcel, expected: Option<i64>) -> LifecycleResult<()> {
    match expected {
        Some(version) if version != parcel.version => Err(LifecycleError::Conflict(format!(
            "parcel {} is at version {}, caller expected {version}",
            parcel.id, parcel.version
        ))),
        _ => Ok(()),
    }
}

/// `<prefix>-<YYYYMMDD>-<6 upper hex>`.
fn generate_tracking_code(prefix: &str, date: &str) -> String {
    let random = Uuid::new_v4();
    let bytes = random.as_bytes();
    format!(
        "{prefix}-{date}-{:02X}{:02X}{:02X}",
        bytes[0], bytes[1], bytes[2]
    )
}

fn log_outcome(event: &str, started_at: Instant, result: &LifecycleResult<TransitionReceipt>) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(receipt) => info!(
            "event={event} module=lifecycle status=ok parcel_id={} parcel_status={} version={} notifications={} undelivered={} duration_ms={duration_ms}",
            receipt.parcel.id,
            receipt.parcel.status,
            receipt.parcel.version,
            receipt.notifications.len(),
            receipt.undelivered.len()
        ),
        Err(err @ (LifecycleError::Repo(_) | LifecycleError::InconsistentState(_))) => error!(
            "event={event} module=lifecycle status=error error_code={} duration_ms={duration_ms} error={err}",
            err.code()
        ),
        Err(err) => info!(
            "event={event} module=lifecycle status=rejected error_code={} duration_ms={duration_ms}",
            err.code()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::generate_tracking_code;
    use crate::model::parcel::is_valid_tracking_code;

    #[test]
    fn generated_codes_match_the_public_format() {
        for _ in 0..32 {
            let code = generate_tracking_code("PD", "20240301");
            assert!(code.starts_with("PD-20240301-"));
            assert!(is_valid_tracking_code(&code), "{code}");
        }
    }
}
