//! Notification Dispatcher Lambda - Creates in-app notifications from events.
//!
//! This Lambda is triggered by SNS and:
//! 1. Parses a dispatch request from each SNS message
//! 2. Checks the recipient's notification preferences
//! 3. Stores the notification unless the recipient opted out of its type
//!
//! Every record is handled independently and failures are only counted, so
//! one bad message never causes SNS to redeliver the whole batch.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use shared::notifications::{PgNotificationStore, PgPreferenceStore};
use shared::{Config, DispatchOutcome, DispatchRequest, NotificationDispatcher};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// SNS Event wrapper
#[derive(Debug, Deserialize)]
struct SnsEvent {
    #[serde(rename = "Records")]
    records: Vec<SnsRecord>,
}

#[derive(Debug, Deserialize)]
struct SnsRecord {
    #[serde(rename = "Sns")]
    sns: SnsMessage,
}

#[derive(Debug, Deserialize)]
struct SnsMessage {
    #[serde(rename = "MessageId", default)]
    message_id: String,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Default, PartialEq, Serialize)]
struct DispatcherResponse {
    created: u32,
    suppressed: u32,
    dropped: u32,
    errors: u32,
}

impl DispatcherResponse {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Created(_) => self.created += 1,
            DispatchOutcome::Suppressed => self.suppressed += 1,
            DispatchOutcome::Dropped => self.dropped += 1,
        }
    }
}

async fn handler(
    dispatcher: Arc<NotificationDispatcher>,
    event: LambdaEvent<SnsEvent>,
) -> Result<DispatcherResponse, Error> {
    info!(records = event.payload.records.len(), "Processing notification dispatch event");

    let mut response = DispatcherResponse::default();

    for record in &event.payload.records {
        let request: DispatchRequest = match serde_json::from_str(&record.sns.message) {
            Ok(r) => r,
            Err(e) => {
                error!(message_id = %record.sns.message_id, error = %e, "Failed to parse SNS message");
                response.errors += 1;
                continue;
            }
        };

        let outcome = dispatcher.dispatch(&request).await;
        response.record(&outcome);
    }

    info!(
        created = response.created,
        suppressed = response.suppressed,
        dropped = response.dropped,
        errors = response.errors,
        "Notification dispatch complete"
    );

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = Config::from_env()?;
    let pool = shared::db::connect(&config).await?;

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(PgPreferenceStore::new(pool.clone())),
        Arc::new(PgNotificationStore::new(pool)),
    ));

    run(service_fn(move |event| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { handler(dispatcher, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sns_event() {
        let raw = r#"{
            "Records": [
                {"Sns": {"MessageId": "m-1", "Message": "{\"userEmail\":\"a@x.com\",\"type\":\"message\",\"title\":\"New message\",\"message\":\"Practice moved to 6pm\"}"}},
                {"Sns": {"Message": "not json"}}
            ]
        }"#;

        let event: SnsEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.records.len(), 2);
        assert_eq!(event.records[0].sns.message_id, "m-1");

        let request: DispatchRequest = serde_json::from_str(&event.records[0].sns.message).unwrap();
        assert_eq!(request.notification_type, "message");
        assert!(serde_json::from_str::<DispatchRequest>(&event.records[1].sns.message).is_err());
    }

    #[test]
    fn test_response_tallies_outcomes() {
        let mut response = DispatcherResponse::default();
        response.record(&DispatchOutcome::Suppressed);
        response.record(&DispatchOutcome::Dropped);
        response.record(&DispatchOutcome::Suppressed);

        assert_eq!(
            response,
            DispatcherResponse {
                created: 0,
                suppressed: 2,
                dropped: 1,
                errors: 0,
            }
        );
    }
}
