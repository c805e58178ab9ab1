//! HTTP helpers for Lambda functions.

use lambda_http::{Body, Request, RequestExt, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::str::FromStr;
use tracing::error;

use crate::auth::{extract_user_from_context, AuthenticatedUser};
use crate::Error;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: u16, data: &T) -> Result<Response<Body>, lambda_http::Error> {
    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .header("access-control-allow-origin", "*")
        .body(Body::from(serde_json::to_string(data)?))?)
}

/// Create an error response with the given status code and message.
pub fn error_response(status: u16, message: impl Into<String>) -> Result<Response<Body>, lambda_http::Error> {
    json_response(status, &ApiResponse::<()>::error(message))
}

/// Turn a library error into a response.
///
/// Client errors keep their message; server errors are logged and replaced
/// with a generic message.
pub fn response_for(err: &Error) -> Result<Response<Body>, lambda_http::Error> {
    if err.is_client_error() {
        error_response(err.status_code(), err.to_string())
    } else {
        error!(error = %err, "Request failed");
        error_response(err.status_code(), "Internal server error")
    }
}

/// Parse request body as JSON, returning a 400 response on failure.
///
/// Returns `Ok(Ok(T))` on successful parse, `Ok(Err(Response))` on parse error (400),
/// or `Err(lambda_http::Error)` on serialization failure.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<Result<T, Response<Body>>, lambda_http::Error> {
    match serde_json::from_slice(body.as_ref()) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => {
            let response = error_response(400, format!("Invalid request body: {}", e))?;
            Ok(Err(response))
        }
    }
}

/// Macro to parse request body, returning early with 400 on parse error.
///
/// Usage:
/// ```ignore
/// let request: MyRequest = parse_body!(event.body());
/// ```
#[macro_export]
macro_rules! parse_body {
    ($body:expr) => {
        match shared::http::parse_json_body($body)? {
            Ok(parsed) => parsed,
            Err(response) => return Ok(response),
        }
    };
}

/// Strip the API Gateway stage prefix from a request path.
pub fn route_path(raw_path: &str) -> &str {
    raw_path.strip_prefix("/api").unwrap_or(raw_path)
}

/// Read and parse a query string parameter.
///
/// An absent parameter is `Ok(None)`; one that is present but does not parse
/// is a validation error so callers answer 400 instead of ignoring the filter.
pub fn query_param<T: FromStr>(event: &Request, name: &str) -> crate::Result<Option<T>> {
    let Some(raw) = event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
    else {
        return Ok(None);
    };

    raw.parse()
        .map(Some)
        .map_err(|_| Error::Validation(format!("Invalid value for '{}': {}", name, raw)))
}

/// Resolve the calling user from the Cognito authorizer claims.
///
/// Requests without authorizer claims are rejected, whatever headers they carry.
pub fn authenticated_user(event: &Request) -> crate::Result<AuthenticatedUser> {
    let claims = event
        .request_context_ref()
        .and_then(|context| context.authorizer())
        .and_then(|authorizer| authorizer.fields.get("claims"))
        .ok_or_else(|| Error::Auth("Missing authorizer claims".to_string()))?;

    extract_user_from_context(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;

    #[test]
    fn test_route_path_strips_stage() {
        assert_eq!(route_path("/api/bookings"), "/bookings");
        assert_eq!(route_path("/bookings"), "/bookings");
    }

    #[test]
    fn test_error_envelope_shape() {
        let body = serde_json::to_value(ApiResponse::<()>::error("nope")).unwrap();
        assert_eq!(body, serde_json::json!({"success": false, "error": "nope"}));
    }

    #[test]
    fn test_response_for_hides_server_errors() {
        let response = response_for(&Error::Internal("db password leaked".into())).unwrap();
        assert_eq!(response.status(), 500);
        let body = std::str::from_utf8(response.body().as_ref()).unwrap().to_string();
        assert!(!body.contains("password"));

        let response = response_for(&Error::Conflict("slot taken".into())).unwrap();
        assert_eq!(response.status(), 409);
    }

    #[test]
    fn test_parse_json_body_rejects_garbage() {
        let parsed: Result<serde_json::Value, _> =
            parse_json_body(&Body::from("{not json")).unwrap();
        assert_eq!(parsed.unwrap_err().status(), 400);
    }

    #[test]
    fn test_missing_credentials() {
        let event = Request::new(Body::Empty);
        let err = authenticated_user(&event).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_bearer_header_without_authorizer_is_rejected() {
        // HS256 token signed with an arbitrary key, claiming someone else's email.
        let self_signed = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.\
            eyJzdWIiOiJhdHRhY2tlciIsImVtYWlsIjoidmljdGltQGNsdWIuY29tIiwiaXNzIjoiaHR0cHM6Ly9jb2duaXRvLWlkcC51cy1lYXN0LTEuYW1hem9uYXdzLmNvbS9wb29sLWlkIn0.\
            oiVQLDyyz_W60veGhLBm1KVbJVDhf-M-oL2jrQ77y94";

        let mut event = Request::new(Body::Empty);
        event.headers_mut().insert(
            "authorization",
            format!("Bearer {}", self_signed).parse().unwrap(),
        );

        let err = authenticated_user(&event).unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    fn with_query(pairs: &[(&str, &str)]) -> Request {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Request::new(Body::Empty).with_query_string_parameters(params)
    }

    #[test]
    fn test_query_param_absent_and_valid() {
        let event = with_query(&[("limit", "20"), ("unread", "true")]);
        assert_eq!(query_param::<i64>(&event, "limit").unwrap(), Some(20));
        assert_eq!(query_param::<bool>(&event, "unread").unwrap(), Some(true));
        assert_eq!(query_param::<i64>(&event, "offset").unwrap(), None);
        assert_eq!(query_param::<i64>(&Request::new(Body::Empty), "limit").unwrap(), None);
    }

    #[test]
    fn test_query_param_malformed_is_validation_error() {
        let event = with_query(&[("from", "garbage"), ("unread", "1")]);

        let err = query_param::<DateTime<Utc>>(&event, "from").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(query_param::<bool>(&event, "unread").is_err());
    }
}
