//! Best-effort notification creation gated by user preferences.
//!
//! Notifications are a side channel of some primary action (a booking, a
//! message). [`NotificationDispatcher::dispatch`] therefore never fails: a
//! missing preference record means every type is enabled, an explicit
//! `false` flag suppresses the write, and store failures are logged and
//! dropped. There is no retry and no deduplication.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};
use validator::Validate;

use super::store::{NotificationStore, PreferenceStore};
use crate::models::{gating_key, DispatchRequest, NewNotification, Notification};

/// Why a dispatch did not produce a notification.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Preference lookup or notification write failed
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] crate::Error),

    /// Required request fields missing
    #[error("Malformed request: {0}")]
    MalformedRequest(#[from] validator::ValidationErrors),
}

/// What happened to a dispatched request. Informational only.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Created(Notification),
    /// The recipient opted out of this notification type
    Suppressed,
    /// The request was invalid or a store call failed
    Dropped,
}

impl DispatchOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, DispatchOutcome::Created(_))
    }
}

/// Creates notifications for users who have not opted out of their type.
#[derive(Clone)]
pub struct NotificationDispatcher {
    preferences: Arc<dyn PreferenceStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationDispatcher {
    pub fn new(
        preferences: Arc<dyn PreferenceStore>,
        notifications: Arc<dyn NotificationStore>,
    ) -> Self {
        Self {
            preferences,
            notifications,
        }
    }

    /// Dispatch a notification, swallowing every failure.
    pub async fn dispatch(&self, request: &DispatchRequest) -> DispatchOutcome {
        match self.try_dispatch(request).await {
            Ok(Some(notification)) => {
                info!(
                    notification_id = %notification.id,
                    user_email = %request.user_email,
                    notification_type = %request.notification_type,
                    "Notification created"
                );
                DispatchOutcome::Created(notification)
            }
            Ok(None) => {
                info!(
                    user_email = %request.user_email,
                    notification_type = %request.notification_type,
                    "Notification suppressed by user preference"
                );
                DispatchOutcome::Suppressed
            }
            Err(DispatchError::MalformedRequest(e)) => {
                warn!(error = %e, "Dropping malformed notification request");
                DispatchOutcome::Dropped
            }
            Err(e) => {
                error!(
                    user_email = %request.user_email,
                    notification_type = %request.notification_type,
                    error = %e,
                    "Failed to create notification"
                );
                DispatchOutcome::Dropped
            }
        }
    }

    /// The fallible core of [`dispatch`](Self::dispatch).
    ///
    /// Returns `Ok(None)` when the recipient has the type disabled.
    pub async fn try_dispatch(
        &self,
        request: &DispatchRequest,
    ) -> Result<Option<Notification>, DispatchError> {
        request.validate()?;

        let preference = self
            .preferences
            .find_by_user_email(&request.user_email)
            .await
            .map_err(DispatchError::StoreUnavailable)?;

        if let Some(preference) = preference {
            if !preference.allows(&request.notification_type) {
                debug!(
                    gating_key = %gating_key(&request.notification_type),
                    "Preference flag is false"
                );
                return Ok(None);
            }
        }

        let created = self
            .notifications
            .create(NewNotification::from(request))
            .await
            .map_err(DispatchError::StoreUnavailable)?;

        Ok(Some(created))
    }
}
