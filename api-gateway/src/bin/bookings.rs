//! Bookings API Lambda - reserve and cancel facility time slots.
//!
//! Endpoints:
//! - POST /bookings - Book a slot
//! - GET /bookings - List the caller's bookings (`facility`, `from`, `to`)
//! - DELETE /bookings/{id} - Cancel a booking
//!
//! Confirmations and cancellations notify the caller through the
//! notification dispatcher; a failed notification never fails the booking.

use chrono::{DateTime, Utc};
use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde::Deserialize;
use shared::http::{authenticated_user, error_response, json_response, query_param, response_for, route_path};
use shared::models::{BookingResponse, BookingRow};
use shared::notifications::{PgNotificationStore, PgPreferenceStore};
use shared::{parse_body, ApiResponse, Config, DispatchRequest, NotificationDispatcher, PgBookingStore, TimeSlot};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use validator::Validate;

/// Notification type used for booking events.
const BOOKING_NOTIFICATION: &str = "booking";

/// Create booking request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    #[validate(length(min = 1, max = 120, message = "facility is required"))]
    facility: String,
    starts_at: String, // ISO 8601 datetime
    ends_at: String,
    #[validate(length(max = 1000))]
    notes: Option<String>,
}

impl CreateBookingRequest {
    /// Trim free-text fields so that validation sees what gets stored.
    fn normalized(mut self) -> Self {
        self.facility = self.facility.trim().to_string();
        self.notes = self
            .notes
            .map(|notes| notes.trim().to_string())
            .filter(|notes| !notes.is_empty());
        self
    }
}

/// Application state
struct AppState {
    bookings: PgBookingStore,
    dispatcher: NotificationDispatcher,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let pool = shared::db::connect(&config).await?;

        let dispatcher = NotificationDispatcher::new(
            Arc::new(PgPreferenceStore::new(pool.clone())),
            Arc::new(PgNotificationStore::new(pool.clone())),
        );

        Ok(Self {
            bookings: PgBookingStore::new(pool),
            dispatcher,
        })
    }
}

fn describe_slot(booking: &BookingRow) -> String {
    format!(
        "{} on {} from {} to {} UTC",
        booking.facility,
        booking.starts_at.format("%a %d %b"),
        booking.starts_at.format("%H:%M"),
        booking.ends_at.format("%H:%M"),
    )
}

fn confirmation(booking: &BookingRow) -> DispatchRequest {
    DispatchRequest::new(
        &booking.user_email,
        BOOKING_NOTIFICATION,
        "Booking confirmed",
        format!("You're booked: {}.", describe_slot(booking)),
    )
    .with_link(format!("/bookings/{}", booking.id))
    .with_related_id(booking.id.to_string())
}

fn cancellation(booking: &BookingRow) -> DispatchRequest {
    DispatchRequest::new(
        &booking.user_email,
        BOOKING_NOTIFICATION,
        "Booking cancelled",
        format!("Your booking for {} was cancelled.", describe_slot(booking)),
    )
    .with_link("/bookings")
    .with_related_id(booking.id.to_string())
}

/// `facility`, `from` and `to` filters for listing bookings.
fn list_filters(
    event: &Request,
) -> shared::Result<(Option<String>, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let facility = query_param::<String>(event, "facility")?
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    let from = query_param(event, "from")?;
    let to = query_param(event, "to")?;

    Ok((facility, from, to))
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str();
    let path = route_path(event.uri().path());

    info!("Bookings request: {} {}", method, path);

    let user = match authenticated_user(&event) {
        Ok(user) => user,
        Err(e) => return response_for(&e),
    };
    let user_email = match user.require_email() {
        Ok(email) => email,
        Err(e) => return response_for(&e),
    };

    match (method, path) {
        ("POST", "/bookings") => {
            let request: CreateBookingRequest = parse_body!(event.body());
            let request = request.normalized();

            if let Err(e) = request.validate() {
                return response_for(&shared::Error::from(e));
            }
            let slot = match TimeSlot::parse(&request.starts_at, &request.ends_at) {
                Ok(slot) => slot,
                Err(e) => return response_for(&e),
            };

            let booking = match state
                .bookings
                .reserve(user_email, &request.facility, slot, request.notes.as_deref())
                .await
            {
                Ok(booking) => booking,
                Err(e) => return response_for(&e),
            };

            info!(booking_id = %booking.id, facility = %booking.facility, "Booking confirmed");
            state.dispatcher.dispatch(&confirmation(&booking)).await;

            json_response(201, &ApiResponse::success(BookingResponse::from(booking)))
        }

        ("GET", "/bookings") => {
            let (facility, from, to) = match list_filters(&event) {
                Ok(filters) => filters,
                Err(e) => return response_for(&e),
            };

            let bookings = state
                .bookings
                .list_for_user(user_email, facility.as_deref(), from, to)
                .await?;

            let responses: Vec<BookingResponse> =
                bookings.into_iter().map(BookingResponse::from).collect();

            json_response(
                200,
                &ApiResponse::success(serde_json::json!({
                    "bookings": responses,
                    "total": responses.len(),
                })),
            )
        }

        ("DELETE", _) if path.starts_with("/bookings/") => {
            let booking_id = path.trim_start_matches("/bookings/");
            let Ok(booking_uuid) = Uuid::parse_str(booking_id) else {
                return error_response(400, "Invalid booking ID");
            };

            match state.bookings.cancel(user_email, booking_uuid).await? {
                Some(booking) => {
                    info!(booking_id = %booking.id, "Booking cancelled");
                    state.dispatcher.dispatch(&cancellation(&booking)).await;

                    json_response(200, &ApiResponse::success(BookingResponse::from(booking)))
                }
                None => error_response(404, "Booking not found"),
            }
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
    use chrono::TimeZone;
    use lambda_http::RequestExt;
    use std::collections::HashMap;

    fn booking() -> BookingRow {
        let start = Utc.with_ymd_and_hms(2026, 3, 14, 18, 0, 0).unwrap();
        BookingRow {
            id: Uuid::nil(),
            user_email: "coach@example.com".to_string(),
            facility: "Pitch 2".to_string(),
            starts_at: start,
            ends_at: start + chrono::Duration::minutes(90),
            notes: None,
            status: "confirmed".to_string(),
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_confirmation_request() {
        let request = confirmation(&booking());
        assert_eq!(request.user_email, "coach@example.com");
        assert_eq!(request.notification_type, "booking");
        assert_eq!(request.message, "You're booked: Pitch 2 on Sat 14 Mar from 18:00 to 19:30 UTC.");
        assert_eq!(request.link.as_deref(), Some("/bookings/00000000-0000-0000-0000-000000000000"));
        assert_eq!(request.related_id.as_deref(), Some("00000000-0000-0000-0000-000000000000"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_cancellation_request() {
        let request = cancellation(&booking());
        assert_eq!(request.title, "Booking cancelled");
        assert_eq!(request.link.as_deref(), Some("/bookings"));
    }

    fn create_request(facility: &str) -> CreateBookingRequest {
        let body = serde_json::json!({
            "facility": facility,
            "startsAt": "2026-03-14T18:00:00Z",
            "endsAt": "2026-03-14T19:00:00Z",
            "notes": "  ",
        });
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_create_request_validation() {
        assert!(create_request("").normalized().validate().is_err());
        assert!(create_request("   ").normalized().validate().is_err());

        let request = create_request("  Pitch 2 ").normalized();
        assert!(request.validate().is_ok());
        assert_eq!(request.facility, "Pitch 2");
        assert!(request.notes.is_none());
    }

    #[test]
    fn test_list_filters_reject_bad_timestamps() {
        let params: HashMap<String, String> =
            HashMap::from([("from".to_string(), "garbage".to_string())]);
        let event = Request::new(Body::Empty).with_query_string_parameters(params);
        assert_eq!(list_filters(&event).unwrap_err().status_code(), 400);

        let params: HashMap<String, String> = HashMap::from([
            ("facility".to_string(), " Pitch 2 ".to_string()),
            ("from".to_string(), "2026-03-14T00:00:00Z".to_string()),
        ]);
        let event = Request::new(Body::Empty).with_query_string_parameters(params);
        let (facility, from, to) = list_filters(&event).unwrap();
        assert_eq!(facility.as_deref(), Some("Pitch 2"));
        assert_eq!(from, Some(Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()));
        assert!(to.is_none());
    }
}
