//! Facility time-slot bookings.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{BookingRow, BookingStatus};
use crate::{Error, Result};

/// A half-open interval `[starts_at, ends_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl TimeSlot {
    pub fn new(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> Result<Self> {
        if ends_at <= starts_at {
            return Err(Error::Validation(
                "endsAt must be after startsAt".to_string(),
            ));
        }
        Ok(Self { starts_at, ends_at })
    }

    /// Parse a slot from two RFC 3339 timestamps.
    pub fn parse(starts_at: &str, ends_at: &str) -> Result<Self> {
        let parse = |field: &str, value: &str| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| Error::Validation(format!("Invalid {} datetime", field)))
        };
        Self::new(parse("startsAt", starts_at)?, parse("endsAt", ends_at)?)
    }

    /// Back-to-back slots do not overlap.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }
}

/// Columns of `bookings` in `schema.sql`; `id`, `created_at` and `updated_at`
/// are filled by column defaults on insert.
const BOOKING_COLUMNS: &str =
    "id, user_email, facility, starts_at, ends_at, notes, status, created_at, updated_at";

/// Bookings in the `bookings` table.
#[derive(Clone)]
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reserve a slot, failing with [`Error::Conflict`] when a confirmed
    /// booking on the same facility overlaps it.
    ///
    /// An advisory lock on the facility name serialises concurrent reservations.
    pub async fn reserve(
        &self,
        user_email: &str,
        facility: &str,
        slot: TimeSlot,
        notes: Option<&str>,
    ) -> Result<BookingRow> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(facility)
            .execute(&mut *tx)
            .await?;

        let clash: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM bookings
            WHERE facility = $1
              AND status = $2
              AND starts_at < $4
              AND ends_at > $3
            LIMIT 1
            "#,
        )
        .bind(facility)
        .bind(BookingStatus::Confirmed.as_str())
        .bind(slot.starts_at)
        .bind(slot.ends_at)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(existing) = clash {
            return Err(Error::Conflict(format!(
                "{} is already booked in that slot (booking {})",
                facility, existing
            )));
        }

        let query = format!(
            r#"
            INSERT INTO bookings (user_email, facility, starts_at, ends_at, notes, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let booking = sqlx::query_as::<_, BookingRow>(&query)
            .bind(user_email)
            .bind(facility)
            .bind(slot.starts_at)
            .bind(slot.ends_at)
            .bind(notes)
            .bind(BookingStatus::Confirmed.as_str())
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(booking)
    }

    /// A user's bookings ordered by start, optionally narrowed to a facility
    /// and a time window.
    pub async fn list_for_user(
        &self,
        user_email: &str,
        facility: Option<&str>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<BookingRow>> {
        let query = format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE user_email = $1
              AND ($2::text IS NULL OR facility = $2)
              AND ($3::timestamptz IS NULL OR ends_at > $3)
              AND ($4::timestamptz IS NULL OR starts_at < $4)
            ORDER BY starts_at ASC
            "#,
            BOOKING_COLUMNS
        );

        let bookings = sqlx::query_as::<_, BookingRow>(&query)
            .bind(user_email)
            .bind(facility)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(bookings)
    }

    /// Cancel one of the user's confirmed bookings. `None` when it does not
    /// exist, belongs to someone else, or is already cancelled.
    pub async fn cancel(&self, user_email: &str, id: Uuid) -> Result<Option<BookingRow>> {
        let query = format!(
            r#"
            UPDATE bookings
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND user_email = $2 AND status = $4
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let booking = sqlx::query_as::<_, BookingRow>(&query)
            .bind(id)
            .bind(user_email)
            .bind(BookingStatus::Cancelled.as_str())
            .bind(BookingStatus::Confirmed.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(booking)
    }
}
