//! Parcel use-case service.
//!
//! # Responsibility
//! - Expose the parcel operations an HTTP layer calls.
//! - Parse boundary input (status strings, tracking codes) once.
//! - Project parcels into `ParcelView` with history and the caller's recent
//!   notifications.
//!
//! # Invariants
//! - Every mutation runs in its own `UnitOfWork`.
//! - Multi-statement reads run in one snapshot.
//! - Customers only ever see their own parcels.

use crate::config::EngineConfig;
use crate::db::{read_snapshot, UnitOfWork};
use crate::lifecycle::engine::{authorize_access, resolve_actor};
use crate::lifecycle::{
    AddressChangeRequest, LifecycleEngine, LifecycleError, LifecycleResult, NewParcel,
    NotFoundTarget, RescheduleRequest, TransitionReceipt, TransitionRequest,
};
use crate::model::actor::{ActorId, ActorRef, ActorRole};
use crate::model::history::StatusHistoryEntry;
use crate::model::notification::Notification;
use crate::model::parcel::{
    is_valid_tracking_code, AddressId, GeoPoint, Parcel, ParcelId, ParcelStatus,
};
use crate::repo::actor_repo::SqliteActorRepository;
use crate::repo::history_repo::{HistoryRepository, SqliteHistoryRepository};
use crate::repo::notification_repo::{
    NotificationListQuery, NotificationRepository, SqliteNotificationRepository,
};
use crate::repo::parcel_repo::{
    ParcelListQuery, ParcelRepository, ParcelStats, SqliteParcelRepository,
};
use rusqlite::Connection;
use serde::Serialize;

/// Outward parcel shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelView {
    #[serde(flatten)]
    pub parcel: Parcel,
    /// Oldest first.
    pub status_history: Vec<StatusHistoryEntry>,
    /// The requesting actor's notifications for this parcel, newest first.
    pub recent_notifications: Vec<Notification>,
}

/// Parcel service over one connection.
pub struct ParcelService<'conn> {
    conn: &'conn mut Connection,
    engine: LifecycleEngine,
}

impl<'conn> ParcelService<'conn> {
    pub fn new(conn: &'conn mut Connection, config: EngineConfig) -> Self {
        Self::with_engine(conn, LifecycleEngine::new(config))
    }

    pub fn with_engine(conn: &'conn mut Connection, engine: LifecycleEngine) -> Self {
        Self { conn, engine }
    }

    pub fn engine(&self) -> &LifecycleEngine {
        &self.engine
    }

    /// Creates a parcel owned by the calling customer.
    pub fn create(&mut self, actor: ActorRef, input: NewParcel) -> LifecycleResult<ParcelView> {
        let uow = UnitOfWork::begin(self.conn)?;
        let receipt = self.engine.create_parcel(uow, actor, input)?;
        self.view_of(receipt, actor.id)
    }

    /// Requests a status change. `status` is parsed case-insensitively.
    pub fn transition(
        &mut self,
        parcel_id: ParcelId,
        status: &str,
        actor: ActorRef,
        note: Option<String>,
        location: Option<GeoPoint>,
        expected_version: Option<i64>,
    ) -> LifecycleResult<ParcelView> {
        let target = ParcelStatus::parse(status)?;
        let uow = UnitOfWork::begin(self.conn)?;
        let receipt = self.engine.request_transition(
            uow,
            TransitionRequest {
                parcel_id,
                target,
                actor,
                note,
                location,
                expected_version,
            },
        )?;
        self.view_of(receipt, actor.id)
    }

    pub fn update_delivery_address(
        &mut self,
        parcel_id: ParcelId,
        delivery_address_id: AddressId,
        actor: ActorRef,
    ) -> LifecycleResult<ParcelView> {
        let uow = UnitOfWork::begin(self.conn)?;
        let receipt = self.engine.update_delivery_address(
            uow,
            AddressChangeRequest {
                parcel_id,
                delivery_address_id,
                actor,
                expected_version: None,
            },
        )?;
        self.view_of(receipt, actor.id)
    }

    pub fn reschedule_delivery(
        &mut self,
        parcel_id: ParcelId,
        estimated_delivery_date: i64,
        actor: ActorRef,
    ) -> LifecycleResult<ParcelView> {
        let uow = UnitOfWork::begin(self.conn)?;
        let receipt = self.engine.reschedule_delivery(
            uow,
            RescheduleRequest {
                parcel_id,
                estimated_delivery_date,
                actor,
                expected_version: None,
            },
        )?;
        self.view_of(receipt, actor.id)
    }

    /// Loads one parcel the actor may see.
    pub fn get(&self, parcel_id: ParcelId, actor: ActorRef) -> LifecycleResult<ParcelView> {
        let snapshot = read_snapshot(&*self.conn)?;
        let parcel = SqliteParcelRepository::new(&snapshot)
            .get_parcel(parcel_id)?
            .ok_or(LifecycleError::NotFound(NotFoundTarget::Parcel(parcel_id)))?;
        self.authorized_view(&snapshot, parcel, actor)
    }

    /// Loads a parcel by its public tracking code.
    pub fn get_by_tracking_code(
        &self,
        tracking_code: &str,
        actor: ActorRef,
    ) -> LifecycleResult<ParcelView> {
        let code = tracking_code.trim().to_ascii_uppercase();
        if !is_valid_tracking_code(&code) {
            return Err(LifecycleError::InvalidInput(format!(
                "malformed tracking code `{}`",
                tracking_code.trim()
            )));
        }

        let snapshot = read_snapshot(&*self.conn)?;
        let parcel = SqliteParcelRepository::new(&snapshot)
            .get_by_tracking_code(&code)?
            .ok_or(LifecycleError::NotFound(NotFoundTarget::TrackingCode(code)))?;
        self.authorized_view(&snapshot, parcel, actor)
    }

    /// Lists parcels newest first. Customers are scoped to their own.
    pub fn list(
        &self,
        actor: ActorRef,
        mut query: ParcelListQuery,
    ) -> LifecycleResult<Vec<Parcel>> {
        let snapshot = read_snapshot(&*self.conn)?;
        let actor = resolve_actor(&SqliteActorRepository::new(&snapshot), actor)?;
        if actor.role == ActorRole::Customer {
            if query.customer_id.is_some_and(|owner| owner != actor.id) {
                return Err(LifecycleError::Forbidden(
                    "customers can only list their own parcels".to_string(),
                ));
            }
            query.customer_id = Some(actor.id);
        }
        Ok(SqliteParcelRepository::new(&snapshot).list_parcels(&query)?)
    }

    /// Dashboard counters. Staff only.
    pub fn stats(&self, actor: ActorRef) -> LifecycleResult<ParcelStats> {
        let snapshot = read_snapshot(&*self.conn)?;
        let actor = resolve_actor(&SqliteActorRepository::new(&snapshot), actor)?;
        if actor.role != ActorRole::Staff {
            return Err(LifecycleError::Forbidden(
                "only staff can read parcel statistics".to_string(),
            ));
        }
        Ok(SqliteParcelRepository::new(&snapshot).stats(self.engine.now_ms())?)
    }

    fn authorized_view(
        &self,
        conn: &Connection,
        parcel: Parcel,
        actor: ActorRef,
    ) -> LifecycleResult<ParcelView> {
        let actor = resolve_actor(&SqliteActorRepository::new(conn), actor)?;
        authorize_access(&actor, &parcel)?;
        self.project(conn, parcel, actor.id)
    }

    /// Projects the committed parcel. The row is reloaded inside the same
    /// snapshot as its history so a later writer cannot split the view.
    fn view_of(&self, receipt: TransitionReceipt, viewer: ActorId) -> LifecycleResult<ParcelView> {
        let parcel_id = receipt.parcel.id;
        let snapshot = read_snapshot(&*self.conn)?;
        let parcel = SqliteParcelRepository::new(&snapshot)
            .get_parcel(parcel_id)?
            .ok_or(LifecycleError::NotFound(NotFoundTarget::Parcel(parcel_id)))?;
        self.project(&snapshot, parcel, viewer)
    }

    fn project(
        &self,
        conn: &Connection,
        parcel: Parcel,
        viewer: ActorId,
    ) -> LifecycleResult<ParcelView> {
        let status_history = SqliteHistoryRepository::new(conn).list_for_parcel(parcel.id)?;

        let limit = self.engine.config().recent_notifications_limit;
        let recent_notifications = if limit == 0 {
            Vec::new()
        } else {
            SqliteNotificationRepository::new(conn).list_for_recipient(
                viewer,
                &NotificationListQuery {
                    unread_only: false,
                    parcel_id: Some(parcel.id),
                    limit: Some(limit),
                },
            )?
        };

        Ok(ParcelView {
            parcel,
            status_history,
            recent_notifications,
        })
    }
}
