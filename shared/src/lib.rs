//! Shared library for Clubhouse Lambda functions.
//!
//! This crate provides common utilities, types, and clients used across all Lambda functions.

pub mod auth;
pub mod bookings;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod models;
pub mod notifications;
pub mod secrets;

/// DDL for every table the stores read and write.
pub const SCHEMA: &str = include_str!("../schema.sql");

pub use auth::{extract_user_from_context, AuthenticatedUser};
pub use bookings::{PgBookingStore, TimeSlot};
pub use config::Config;
pub use error::{Error, Result};
pub use http::ApiResponse;
pub use models::{DispatchRequest, Notification, NotificationPreference};
pub use notifications::{DispatchOutcome, NotificationDispatcher};
pub use secrets::{get_database_credentials, get_secret, DatabaseCredentials};

/// Columns from a comma separated list that `table` in [`SCHEMA`] lacks.
#[cfg(test)]
pub(crate) fn schema_columns_missing(table: &str, columns: &str) -> Vec<String> {
    let header = format!("CREATE TABLE IF NOT EXISTS {} (", table);
    let Some(start) = SCHEMA.find(&header) else {
        return columns.split(',').map(|c| c.trim().to_string()).collect();
    };
    let body = &SCHEMA[start..];
    let body = &body[..body.find(");").unwrap_or(body.len())];

    columns
        .split(',')
        .map(str::trim)
        .filter(|column| {
            !body
                .lines()
                .any(|line| line.trim_start().starts_with(&format!("{} ", column)))
        })
        .map(String::from)
        .collect()
}
