//! Persistence seams for the dispatcher and their Postgres implementations.

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{NewNotification, Notification, NotificationPreference};
use crate::Result;

/// Read-only access to user notification preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Every stored preference record.
    async fn list(&self) -> Result<Vec<NotificationPreference>>;

    /// The record for one user, if any. Stores with an index should override
    /// the default scan.
    async fn find_by_user_email(&self, user_email: &str) -> Result<Option<NotificationPreference>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|pref| pref.user_email == user_email))
    }
}

/// Append-only notification writes.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> Result<Notification>;
}

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    user_email: String,
    flags: Json<Map<String, Value>>,
}

impl From<PreferenceRow> for NotificationPreference {
    fn from(row: PreferenceRow) -> Self {
        Self {
            user_email: row.user_email,
            flags: row.flags.0,
        }
    }
}

/// Preferences in the `notification_preferences` table.
#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merge `flags` into the user's record, creating it when missing.
    pub async fn upsert(
        &self,
        user_email: &str,
        flags: Map<String, Value>,
    ) -> Result<NotificationPreference> {
        let row: PreferenceRow = sqlx::query_as(
            r#"
            INSERT INTO notification_preferences (user_email, flags, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_email) DO UPDATE
            SET flags = notification_preferences.flags || EXCLUDED.flags,
                updated_at = NOW()
            RETURNING user_email, flags
            "#,
        )
        .bind(user_email)
        .bind(Json(flags))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn list(&self) -> Result<Vec<NotificationPreference>> {
        let rows: Vec<PreferenceRow> =
            sqlx::query_as("SELECT user_email, flags FROM notification_preferences")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_user_email(&self, user_email: &str) -> Result<Option<NotificationPreference>> {
        let row: Option<PreferenceRow> = sqlx::query_as(
            "SELECT user_email, flags FROM notification_preferences WHERE user_email = $1",
        )
        .bind(user_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }
}

/// Columns of `notifications` in `schema.sql`; `id`, `read` and `created_at`
/// are filled by column defaults on insert.
const NOTIFICATION_COLUMNS: &str =
    "id, user_email, notification_type, title, message, link, related_id, read, created_at";

/// Notifications in the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A user's notifications, newest first.
    pub async fn list_for_user(
        &self,
        user_email: &str,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Notification>> {
        let query = format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_email = $1 AND ($2 = FALSE OR read = FALSE)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
            NOTIFICATION_COLUMNS
        );

        let notifications = sqlx::query_as::<_, Notification>(&query)
            .bind(user_email)
            .bind(unread_only)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(notifications)
    }

    pub async fn count_unread(&self, user_email: &str) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_email = $1 AND read = FALSE",
        )
        .bind(user_email)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Mark one of the user's notifications read. `None` when it is not theirs.
    pub async fn mark_read(&self, user_email: &str, id: Uuid) -> Result<Option<Notification>> {
        let query = format!(
            r#"
            UPDATE notifications
            SET read = TRUE
            WHERE id = $1 AND user_email = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        let notification = sqlx::query_as::<_, Notification>(&query)
            .bind(id)
            .bind(user_email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_email: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE WHERE user_email = $1 AND read = FALSE",
        )
        .bind(user_email)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: NewNotification) -> Result<Notification> {
        let query = format!(
            r#"
            INSERT INTO notifications (
                user_email, notification_type, title, message,
                link, related_id, read
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        );

        let created = sqlx::query_as::<_, Notification>(&query)
            .bind(&notification.user_email)
            .bind(&notification.notification_type)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(&notification.link)
            .bind(&notification.related_id)
            .bind(notification.read)
            .fetch_one(&self.pool)
            .await?;

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_defines_notification_columns() {
        assert!(crate::schema_columns_missing("notifications", NOTIFICATION_COLUMNS).is_empty());
        assert!(
            crate::schema_columns_missing("notification_preferences", "user_email, flags, updated_at")
                .is_empty()
        );

        let read_column = crate::SCHEMA
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with("read "))
            .unwrap();
        assert!(read_column.contains("DEFAULT FALSE"));
    }
}
