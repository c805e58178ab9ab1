//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

/// Suffix appended to a notification type to form its preference flag name.
pub const GATING_SUFFIX: &str = "_notifications";

/// Preference flag name for a notification type, e.g. `booking_notifications`.
pub fn gating_key(notification_type: &str) -> String {
    format!("{}{}", notification_type, GATING_SUFFIX)
}

/// Per-user notification opt-outs.
///
/// Flags are kept as raw JSON so that a record written by the settings UI
/// round-trips untouched, including keys this service does not know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreference {
    pub user_email: String,
    #[serde(flatten)]
    pub flags: Map<String, Value>,
}

impl NotificationPreference {
    pub fn new(user_email: impl Into<String>) -> Self {
        Self {
            user_email: user_email.into(),
            flags: Map::new(),
        }
    }

    pub fn with_flag(mut self, key: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(key.into(), Value::Bool(enabled));
        self
    }

    /// Delivery is opt-out: only an explicit boolean `false` disables a type.
    pub fn allows(&self, notification_type: &str) -> bool {
        !matches!(
            self.flags.get(&gating_key(notification_type)),
            Some(Value::Bool(false))
        )
    }
}

/// A request to notify a user, as produced by booking/messaging flows.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[validate(length(min = 1, message = "userEmail is required"))]
    pub user_email: String,
    #[serde(rename = "type")]
    #[validate(length(min = 1, message = "type is required"))]
    pub notification_type: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "message is required"))]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl DispatchRequest {
    pub fn new(
        user_email: impl Into<String>,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_email: user_email.into(),
            notification_type: notification_type.into(),
            title: title.into(),
            message: message.into(),
            link: None,
            related_id: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_related_id(mut self, related_id: impl Into<String>) -> Self {
        self.related_id = Some(related_id.into());
        self
    }
}

/// Fields of a notification about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_email: String,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub related_id: Option<String>,
    pub read: bool,
}

impl From<&DispatchRequest> for NewNotification {
    fn from(request: &DispatchRequest) -> Self {
        Self {
            user_email: request.user_email.clone(),
            notification_type: request.notification_type.clone(),
            title: request.title.clone(),
            message: request.message.clone(),
            link: request.link.clone(),
            related_id: request.related_id.clone(),
            read: false,
        }
    }
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_email: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub related_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Materialize a new record with a fresh id, as a store would.
    pub fn from_new(new: NewNotification) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_email: new.user_email,
            notification_type: new.notification_type,
            title: new.title,
            message: new.message,
            link: new.link,
            related_id: new.related_id,
            read: new.read,
            created_at: Utc::now(),
        }
    }
}

/// Booking lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

/// A reserved facility slot.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BookingRow {
    pub id: Uuid,
    pub user_email: String,
    pub facility: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Booking API response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    pub id: String,
    pub facility: String,
    pub starts_at: String,
    pub ends_at: String,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BookingRow> for BookingResponse {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id.to_string(),
            facility: row.facility,
            starts_at: row.starts_at.to_rfc3339(),
            ends_at: row.ends_at.to_rfc3339(),
            notes: row.notes,
            status: row.status,
            created_at: row.created_at.to_rfc3339(),
            updated_at: row.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gating_key() {
        assert_eq!(gating_key("booking"), "booking_notifications");
    }

    #[test]
    fn test_preference_parses_flat_record() {
        let pref: NotificationPreference = serde_json::from_str(
            r#"{"userEmail":"a@x.com","booking_notifications":false,"message_notifications":true}"#,
        )
        .unwrap();

        assert_eq!(pref.user_email, "a@x.com");
        assert!(!pref.allows("booking"));
        assert!(pref.allows("message"));
        assert!(pref.allows("match"));
    }

    #[test]
    fn test_only_boolean_false_suppresses() {
        let mut pref = NotificationPreference::new("a@x.com");
        pref.flags.insert(gating_key("booking"), Value::String("false".into()));
        pref.flags.insert(gating_key("message"), Value::Null);
        pref.flags.insert(gating_key("match"), Value::from(0));

        assert!(pref.allows("booking"));
        assert!(pref.allows("message"));
        assert!(pref.allows("match"));
    }

    #[test]
    fn test_dispatch_request_wire_format() {
        let request: DispatchRequest = serde_json::from_str(
            r#"{"userEmail":"a@x.com","type":"booking","title":"T","message":"M","relatedId":"42"}"#,
        )
        .unwrap();

        assert_eq!(request.notification_type, "booking");
        assert_eq!(request.related_id.as_deref(), Some("42"));
        assert!(request.link.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_dispatch_request_requires_fields() {
        let request = DispatchRequest::new("", "booking", "T", "");
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("user_email"));
        assert!(fields.contains_key("message"));
        assert!(!fields.contains_key("title"));
    }

    #[test]
    fn test_new_notification_starts_unread() {
        let request = DispatchRequest::new("a@x.com", "message", "T", "M").with_link("/inbox");
        let new = NewNotification::from(&request);
        assert!(!new.read);
        assert_eq!(new.link.as_deref(), Some("/inbox"));
    }
}
