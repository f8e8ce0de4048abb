use parcelflow_core::db::open_db_in_memory;
use parcelflow_core::lifecycle::{FixedClock, LifecycleEngine, LifecycleError, NewParcel};
use parcelflow_core::repo::actor_repo::{ActorRepository, SqliteActorRepository};
use parcelflow_core::repo::parcel_repo::ParcelListQuery;
use parcelflow_core::{Actor, ActorRole, EngineConfig, ParcelService, ParcelStatus};
use rusqlite::Connection;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

const T0: i64 = 1_709_251_200_000; // 2024-03-01T00:00:00Z

struct Directory {
    alice: Actor,
    bob: Actor,
    ada: Actor,
}

fn setup() -> (Connection, Directory, Arc<FixedClock>) {
    let conn = open_db_in_memory().unwrap();
    let directory = Directory {
        alice: Actor::new(ActorRole::Customer, "Alice"),
        bob: Actor::new(ActorRole::Customer, "Bob"),
        ada: Actor::new(ActorRole::Staff, "Ada"),
    };
    {
        let actors = SqliteActorRepository::new(&conn);
        for actor in [&directory.alice, &directory.bob, &directory.ada] {
            actors.register_actor(actor).unwrap();
        }
    }
    (conn, directory, Arc::new(FixedClock::new(T0)))
}

fn service<'conn>(conn: &'conn mut Connection, clock: &Arc<FixedClock>) -> ParcelService<'conn> {
    service_with(conn, clock, EngineConfig::default())
}

fn service_with<'conn>(
    conn: &'conn mut Connection,
    clock: &Arc<FixedClock>,
    config: EngineConfig,
) -> ParcelService<'conn> {
    ParcelService::with_engine(conn, LifecycleEngine::with_clock(config, clock.clone()))
}

fn new_parcel(customer: &Actor) -> NewParcel {
    NewParcel {
        customer_id: customer.id,
        pickup_address_id: Uuid::new_v4(),
        delivery_address_id: Uuid::new_v4(),
        weight_kg: 3.2,
        description: None,
    }
}

#[test]
fn create_returns_full_view() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);

    let view = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();

    assert_eq!(view.parcel.status, ParcelStatus::Created);
    assert_eq!(view.status_history.len(), 1);
    assert_eq!(view.recent_notifications.len(), 1);
    assert_eq!(view.recent_notifications[0].recipient_id, dir.alice.id);
}

#[test]
fn view_serializes_in_camel_case() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);
    let view = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();

    let json = serde_json::to_value(&view).unwrap();
    let object = json.as_object().unwrap();
    for key in [
        "id",
        "trackingCode",
        "status",
        "customerId",
        "pickupAddressId",
        "deliveryAddressId",
        "weightKg",
        "description",
        "estimatedDeliveryDate",
        "createdAt",
        "updatedAt",
        "version",
        "statusHistory",
        "recentNotifications",
    ] {
        assert!(object.contains_key(key), "missing {key}");
    }
    assert_eq!(json["status"], Value::from("CREATED"));
    assert_eq!(json["statusHistory"][0]["status"], Value::from("CREATED"));
    assert_eq!(
        json["recentNotifications"][0]["category"],
        Value::from("PARCEL_UPDATE")
    );
    assert_eq!(json["recentNotifications"][0]["isRead"], Value::from(false));
}

#[test]
fn transition_parses_status_case_insensitively() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);
    let created = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();

    let view = service
        .transition(
            created.parcel.id,
            "  picked_up ",
            dir.ada.actor_ref(),
            None,
            None,
            Some(created.parcel.version),
        )
        .unwrap();
    assert_eq!(view.parcel.status, ParcelStatus::PickedUp);
    assert_eq!(view.status_history.len(), 2);

    let err = service
        .transition(
            created.parcel.id,
            "LOST_AT_SEA",
            dir.ada.actor_ref(),
            None,
            None,
            None,
        )
        .unwrap_err();
    assert!(matches!(&err, LifecycleError::UnknownStatus(raw) if raw == "LOST_AT_SEA"));
}

#[test]
fn recent_notifications_belong_to_the_viewer_and_are_bounded() {
    let (mut conn, dir, clock) = setup();
    let config = EngineConfig {
        recent_notifications_limit: 2,
        ..EngineConfig::default()
    };
    let mut service = service_with(&mut conn, &clock, config);
    let created = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();
    let id = created.parcel.id;

    for status in ["PICKED_UP", "IN_TRANSIT", "OUT_FOR_DELIVERY"] {
        clock.advance(1_000);
        service
            .transition(id, status, dir.ada.actor_ref(), None, None, None)
            .unwrap();
    }

    let customer_view = service.get(id, dir.alice.actor_ref()).unwrap();
    assert_eq!(customer_view.recent_notifications.len(), 2);
    assert!(customer_view
        .recent_notifications
        .iter()
        .all(|notification| notification.recipient_id == dir.alice.id));
    assert!(customer_view.recent_notifications[0]
        .message
        .contains("OUT_FOR_DELIVERY"));

    let staff_view = service.get(id, dir.ada.actor_ref()).unwrap();
    assert!(staff_view
        .recent_notifications
        .iter()
        .all(|notification| notification.recipient_id == dir.ada.id));
    assert_eq!(staff_view.status_history.len(), 4);
}

#[test]
fn get_is_forbidden_for_other_customers() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);
    let created = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();

    let err = service
        .get(created.parcel.id, dir.bob.actor_ref())
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let err = service
        .get(Uuid::new_v4(), dir.ada.actor_ref())
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn lookup_by_tracking_code_validates_format() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);
    let created = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();
    let code = created.parcel.tracking_code.clone();

    let view = service
        .get_by_tracking_code(&code.to_ascii_lowercase(), dir.alice.actor_ref())
        .unwrap();
    assert_eq!(view.parcel.id, created.parcel.id);

    let err = service
        .get_by_tracking_code("not-a-code", dir.alice.actor_ref())
        .unwrap_err();
    assert_eq!(err.code(), "invalid_input");

    let err = service
        .get_by_tracking_code("PD-20240301-000000", dir.alice.actor_ref())
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[test]
fn list_scopes_customers_and_orders_newest_first() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);

    let mut alice_ids = Vec::new();
    for _ in 0..3 {
        clock.advance(1_000);
        let view = service
            .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
            .unwrap();
        alice_ids.push(view.parcel.id);
    }
    clock.advance(1_000);
    service
        .create(dir.bob.actor_ref(), new_parcel(&dir.bob))
        .unwrap();

    let alice_list = service
        .list(dir.alice.actor_ref(), ParcelListQuery::default())
        .unwrap();
    let listed = alice_list.iter().map(|parcel| parcel.id).collect::<Vec<_>>();
    alice_ids.reverse();
    assert_eq!(listed, alice_ids);

    let err = service
        .list(
            dir.alice.actor_ref(),
            ParcelListQuery {
                customer_id: Some(dir.bob.id),
                ..ParcelListQuery::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let everything = service
        .list(dir.ada.actor_ref(), ParcelListQuery::default())
        .unwrap();
    assert_eq!(everything.len(), 4);

    let bobs = service
        .list(
            dir.ada.actor_ref(),
            ParcelListQuery {
                customer_id: Some(dir.bob.id),
                ..ParcelListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(bobs.len(), 1);

    let page = service
        .list(
            dir.ada.actor_ref(),
            ParcelListQuery {
                limit: Some(2),
                offset: 1,
                ..ParcelListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, alice_ids[0]);
}

#[test]
fn stats_are_staff_only_and_count_by_status() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);

    let first = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();
    let second = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();
    service
        .create(dir.bob.actor_ref(), new_parcel(&dir.bob))
        .unwrap();

    for status in ["PICKED_UP", "IN_TRANSIT", "OUT_FOR_DELIVERY", "DELIVERED"] {
        service
            .transition(first.parcel.id, status, dir.ada.actor_ref(), None, None, None)
            .unwrap();
    }
    service
        .transition(
            second.parcel.id,
            "cancelled",
            dir.alice.actor_ref(),
            Some("changed my mind".to_string()),
            None,
            None,
        )
        .unwrap();

    let err = service.stats(dir.alice.actor_ref()).unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let stats = service.stats(dir.ada.actor_ref()).unwrap();
    assert_eq!(stats.total_parcels, 3);
    assert_eq!(stats.active_parcels, 1);
    assert_eq!(stats.delivered_today, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.total_customers, 2);
}

#[test]
fn address_and_schedule_changes_flow_through_views() {
    let (mut conn, dir, clock) = setup();
    let mut service = service(&mut conn, &clock);
    let created = service
        .create(dir.alice.actor_ref(), new_parcel(&dir.alice))
        .unwrap();
    let id = created.parcel.id;
    let new_address = Uuid::new_v4();

    let view = service
        .update_delivery_address(id, new_address, dir.alice.actor_ref())
        .unwrap();
    assert_eq!(view.parcel.delivery_address_id, new_address);
    assert_eq!(
        view.status_history.last().map(|entry| entry.note.as_str()),
        Some("Delivery address updated")
    );

    let date = T0 + 10 * 86_400_000;
    let view = service
        .reschedule_delivery(id, date, dir.ada.actor_ref())
        .unwrap();
    assert_eq!(view.parcel.estimated_delivery_date, Some(date));
    assert_eq!(view.parcel.version, 3);
    assert_eq!(view.status_history.len(), 3);
    assert!(view
        .status_history
        .iter()
        .all(|entry| entry.status == ParcelStatus::Created));
}
