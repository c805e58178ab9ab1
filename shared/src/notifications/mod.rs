//! In-app notifications: preference-gated creation and persistence.

mod dispatcher;
mod store;

pub use dispatcher::{DispatchError, DispatchOutcome, NotificationDispatcher};
pub use store::{NotificationStore, PgNotificationStore, PgPreferenceStore, PreferenceStore};
