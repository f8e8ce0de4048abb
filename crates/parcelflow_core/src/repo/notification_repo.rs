//! Notification repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notifications and serve recipient inbox queries.
//!
//! # Invariants
//! - Every recipient-scoped mutation filters on `recipient_id`; one
//!   recipient can never touch another's rows.
//! - Inbox order is newest first (`created_at DESC`, then insertion order).

use crate::model::actor::ActorId;
use crate::model::notification::{Notification, NotificationCategory, NotificationId};
use crate::model::parcel::ParcelId;
use crate::repo::parcel_repo::{parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    recipient_id,
    parcel_id,
    category,
    message,
    is_read,
    created_at
FROM notifications";

const NOTIFICATIONS_DEFAULT_LIMIT: u32 = 50;
const NOTIFICATIONS_LIMIT_MAX: u32 = 200;

/// Query options for listing one recipient's notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationListQuery {
    pub unread_only: bool,
    pub parcel_id: Option<ParcelId>,
    /// Defaults to 50 and clamps to 200.
    pub limit: Option<u32>,
}

/// Repository interface for notification persistence.
pub trait NotificationRepository {
    fn insert_notification(&self, notification: &Notification) -> RepoResult<()>;
    fn list_for_recipient(
        &self,
        recipient_id: ActorId,
        query: &NotificationListQuery,
    ) -> RepoResult<Vec<Notification>>;
    fn unread_count(&self, recipient_id: ActorId) -> RepoResult<u64>;
    /// Returns `false` when the notification does not belong to `recipient_id`.
    fn mark_read(&self, id: NotificationId, recipient_id: ActorId) -> RepoResult<bool>;
    fn mark_all_read(&self, recipient_id: ActorId) -> RepoResult<u64>;
    /// Returns `false` when the notification does not belong to `recipient_id`.
    fn delete(&self, id: NotificationId, recipient_id: ActorId) -> RepoResult<bool>;
    fn delete_all(&self, recipient_id: ActorId) -> RepoResult<u64>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotificationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NotificationRepository for SqliteNotificationRepository<'_> {
    fn insert_notification(&self, notification: &Notification) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO notifications (
                id,
                recipient_id,
                parcel_id,
                category,
                message,
                is_read,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                notification.id.to_string(),
                notification.recipient_id.to_string(),
                notification.parcel_id.map(|id| id.to_string()),
                notification.category.as_str(),
                notification.message.as_str(),
                i64::from(notification.is_read),
                notification.created_at,
            ],
        )?;
        Ok(())
    }

    fn list_for_recipient(
        &self,
        recipient_id: ActorId,
        query: &NotificationListQuery,
    ) -> RepoResult<Vec<Notification>> {
        let mut sql = format!("{NOTIFICATION_SELECT_SQL} WHERE recipient_id = ?");
        let mut bind_values = vec![Value::Text(recipient_id.to_string())];

        if query.unread_only {
            sql.push_str(" AND is_read = 0");
        }
        if let Some(parcel_id) = query.parcel_id {
            sql.push_str(" AND parcel_id = ?");
            bind_values.push(Value::Text(parcel_id.to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_notification_limit(
            query.limit,
        ))));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_notification_row(row)?);
        }
        Ok(items)
    }

    fn unread_count(&self, recipient_id: ActorId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0;",
            [recipient_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn mark_read(&self, id: NotificationId, recipient_id: ActorId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE id = ?1
               AND recipient_id = ?2;",
            params![id.to_string(), recipient_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn mark_all_read(&self, recipient_id: ActorId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "UPDATE notifications
             SET is_read = 1
             WHERE recipient_id = ?1
               AND is_read = 0;",
            [recipient_id.to_string()],
        )?;
        Ok(changed as u64)
    }

    fn delete(&self, id: NotificationId, recipient_id: ActorId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND recipient_id = ?2;",
            params![id.to_string(), recipient_id.to_string()],
        )?;
        Ok(changed > 0)
    }

    fn delete_all(&self, recipient_id: ActorId) -> RepoResult<u64> {
        let changed = self.conn.execute(
            "DELETE FROM notifications WHERE recipient_id = ?1;",
            [recipient_id.to_string()],
        )?;
        Ok(changed as u64)
    }
}

/// Normalizes list limit according to the inbox contract.
pub fn normalize_notification_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => NOTIFICATIONS_DEFAULT_LIMIT,
        Some(value) if value > NOTIFICATIONS_LIMIT_MAX => NOTIFICATIONS_LIMIT_MAX,
        Some(value) => value,
    }
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id: String = row.get("id")?;
    let recipient_id: String = row.get("recipient_id")?;
    let parcel_id: Option<String> = row.get("parcel_id")?;
    let category: String = row.get("category")?;

    let category = NotificationCategory::parse(&category).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid category `{category}` in notifications.category"
        ))
    })?;

    let is_read = match row.get::<_, i64>("is_read")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_read value `{other}` in notifications.is_read"
            )));
        }
    };

    Ok(Notification {
        id: parse_uuid(&id, "notifications.id")?,
        recipient_id: parse_uuid(&recipient_id, "notifications.recipient_id")?,
        parcel_id: parcel_id
            .map(|value| parse_uuid(&value, "notifications.parcel_id"))
            .transpose()?,
        category,
        message: row.get("message")?,
        is_read,
        created_at: row.get("created_at")?,
    })
}
