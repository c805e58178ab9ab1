//! Notifications API Lambda - the caller's inbox and opt-out settings.
//!
//! Endpoints:
//! - GET /notifications - List notifications (`unread`, `limit`, `offset`)
//! - POST /notifications/{id}/read - Mark one notification read
//! - POST /notifications/read-all - Mark every notification read
//! - GET /notification-preferences - Get the caller's preference flags
//! - PUT /notification-preferences - Merge boolean flags into the caller's preferences

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use shared::http::{authenticated_user, error_response, json_response, query_param, response_for, route_path};
use shared::models::GATING_SUFFIX;
use shared::notifications::{PgNotificationStore, PgPreferenceStore, PreferenceStore};
use shared::{parse_body, ApiResponse, Config};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Update preferences request
#[derive(Debug, Deserialize)]
struct UpdatePreferencesRequest {
    #[serde(flatten)]
    flags: Map<String, Value>,
}

/// Application state
struct AppState {
    notifications: PgNotificationStore,
    preferences: PgPreferenceStore,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let pool = shared::db::connect(&config).await?;

        Ok(Self {
            notifications: PgNotificationStore::new(pool.clone()),
            preferences: PgPreferenceStore::new(pool),
        })
    }
}

/// Keep only well-formed boolean opt-out flags.
fn validate_flags(flags: Map<String, Value>) -> Result<Map<String, Value>, String> {
    if flags.is_empty() {
        return Err("No preferences to update".to_string());
    }

    for (key, value) in &flags {
        let kind = key.strip_suffix(GATING_SUFFIX).unwrap_or_default();
        if kind.is_empty() {
            return Err(format!(
                "Invalid preference key '{}': must be '<type>{}'",
                key, GATING_SUFFIX
            ));
        }
        if !value.is_boolean() {
            return Err(format!("Preference '{}' must be true or false", key));
        }
    }

    Ok(flags)
}

/// `unread`, `limit` and `offset` with defaults applied and bounds enforced.
fn list_params(event: &Request) -> shared::Result<(bool, i64, i64)> {
    let unread_only = query_param::<bool>(event, "unread")?.unwrap_or(false);
    let limit = query_param::<i64>(event, "limit")?
        .unwrap_or(DEFAULT_LIMIT)
        .clamp(1, MAX_LIMIT);
    let offset = query_param::<i64>(event, "offset")?.unwrap_or(0).max(0);

    Ok((unread_only, limit, offset))
}

/// Extract `{id}` from `/notifications/{id}/read`.
fn notification_id(path: &str) -> Option<Uuid> {
    path.strip_prefix("/notifications/")
        .and_then(|rest| rest.strip_suffix("/read"))
        .and_then(|id| Uuid::parse_str(id).ok())
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = route_path(event.uri().path());

    info!("Notifications request: {} {}", method, path);

    let user = match authenticated_user(&event) {
        Ok(user) => user,
        Err(e) => return response_for(&e),
    };
    let user_email = match user.require_email() {
        Ok(email) => email,
        Err(e) => return response_for(&e),
    };

    match (method, path) {
        ("GET", "/notifications") => {
            let (unread_only, limit, offset) = match list_params(&event) {
                Ok(params) => params,
                Err(e) => return response_for(&e),
            };

            let notifications = state
                .notifications
                .list_for_user(user_email, unread_only, limit, offset)
                .await?;
            let unread = state.notifications.count_unread(user_email).await?;

            json_response(
                200,
                &ApiResponse::success(serde_json::json!({
                    "notifications": notifications,
                    "unread": unread,
                    "limit": limit,
                    "offset": offset,
                })),
            )
        }

        ("POST", "/notifications/read-all") => {
            let updated = state.notifications.mark_all_read(user_email).await?;
            info!(user_email, updated, "Marked all notifications read");

            json_response(200, &ApiResponse::success(serde_json::json!({ "updated": updated })))
        }

        ("POST", _) if path.starts_with("/notifications/") && path.ends_with("/read") => {
            let Some(id) = notification_id(path) else {
                return error_response(400, "Invalid notification ID");
            };

            match state.notifications.mark_read(user_email, id).await? {
                Some(notification) => json_response(200, &ApiResponse::success(notification)),
                None => error_response(404, "Notification not found"),
            }
        }

        ("GET", "/notification-preferences") => {
            let flags = state
                .preferences
                .find_by_user_email(user_email)
                .await?
                .map(|pref| pref.flags)
                .unwrap_or_default();

            json_response(200, &ApiResponse::success(flags))
        }

        ("PUT", "/notification-preferences") => {
            let request: UpdatePreferencesRequest = parse_body!(event.body());

            let flags = match validate_flags(request.flags) {
                Ok(flags) => flags,
                Err(message) => return error_response(400, message),
            };

            let preference = state.preferences.upsert(user_email, flags).await?;
            info!(user_email, "Updated notification preferences");

            json_response(200, &ApiResponse::success(preference.flags))
        }

        _ => error_response(404, "Not found"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambda_http::RequestExt;
    use std::collections::HashMap;

    #[test]
    fn test_validate_flags() {
        let ok = serde_json::json!({"booking_notifications": false, "message_notifications": true});
        let ok = ok.as_object().cloned().unwrap();
        assert_eq!(validate_flags(ok).unwrap().len(), 2);

        let bad_key = serde_json::json!({"booking": false}).as_object().cloned().unwrap();
        assert!(validate_flags(bad_key).is_err());

        let bare_suffix = serde_json::json!({"_notifications": false}).as_object().cloned().unwrap();
        assert!(validate_flags(bare_suffix).is_err());

        let not_bool = serde_json::json!({"booking_notifications": "off"}).as_object().cloned().unwrap();
        assert!(validate_flags(not_bool).is_err());

        assert!(validate_flags(Map::new()).is_err());
    }

    #[test]
    fn test_list_params() {
        let defaults = list_params(&Request::new(Body::Empty)).unwrap();
        assert_eq!(defaults, (false, DEFAULT_LIMIT, 0));

        let params: HashMap<String, String> = [("unread", "true"), ("limit", "5000"), ("offset", "-3")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let event = Request::new(Body::Empty).with_query_string_parameters(params);
        assert_eq!(list_params(&event).unwrap(), (true, MAX_LIMIT, 0));

        let params: HashMap<String, String> =
            HashMap::from([("unread".to_string(), "1".to_string())]);
        let event = Request::new(Body::Empty).with_query_string_parameters(params);
        assert_eq!(list_params(&event).unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_notification_id() {
        let id = Uuid::new_v4();
        assert_eq!(notification_id(&format!("/notifications/{}/read", id)), Some(id));
        assert_eq!(notification_id("/notifications/abc/read"), None);
        assert_eq!(notification_id("/notifications/read-all"), None);
    }
}
