//! Caller identity from the API Gateway Cognito authorizer.
//!
//! Tokens are verified by the authorizer before a request reaches a Lambda,
//! so the claims it forwards in the request context are the only identity
//! source. Raw `Authorization` headers are never decoded here.

use crate::{Error, Result};

/// Decoded user information from authorizer claims.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// User's Cognito subject (UUID)
    pub user_id: String,
    /// User's email
    pub email: Option<String>,
    /// User's team IDs (parsed from custom claim)
    pub team_ids: Vec<String>,
}

impl AuthenticatedUser {
    /// The email address notifications and bookings are keyed by.
    pub fn require_email(&self) -> Result<&str> {
        self.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| Error::Auth("Token carries no email".to_string()))
    }
}

fn split_team_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Extract user from API Gateway request context.
///
/// When using Cognito authorizer, user info is in requestContext.authorizer.claims
pub fn extract_user_from_context(claims: &serde_json::Value) -> Result<AuthenticatedUser> {
    let sub = claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Auth("Missing sub claim".to_string()))?;

    let email = claims
        .get("email")
        .or_else(|| claims.get("cognito:username"))
        .and_then(|v| v.as_str())
        .map(String::from);

    let team_ids = claims
        .get("custom:team_ids")
        .and_then(|v| v.as_str())
        .map(split_team_ids)
        .unwrap_or_default();

    Ok(AuthenticatedUser {
        user_id: sub.to_string(),
        email,
        team_ids,
    })
}
