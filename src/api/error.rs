//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::error;

/// Extension trait for concise error mapping on Results.
pub trait ResultExt<T> {
    fn db_err(self, msg: &str) -> Result<T, ApiError>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn db_err(self, msg: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::db_error(msg, e))
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    /// Well-formed JSON with values of the wrong shape
    Unprocessable(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self::Unprocessable(msg.into())
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::ServiceUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Storage format for dates and datetimes.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a date or datetime and return it in storage format.
/// Accepts `2024-06-01`, `2024-06-01T08:30:00[.fff]`, `2024-06-01 08:30:00` and
/// RFC 3339 with an offset (converted to UTC).
pub fn normalize_datetime(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    let parsed = if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        dt.naive_utc()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        dt
    } else if let Some(dt) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        dt
    } else {
        return Err(ApiError::bad_request(format!("Invalid date for {}", field)));
    };
    Ok(parsed.format(DATETIME_FORMAT).to_string())
}

/// Normalize an optional date field in place.
pub fn normalize_optional_datetime(
    field: &str,
    value: &mut Option<String>,
) -> Result<(), ApiError> {
    if let Some(v) = value.as_deref() {
        if v.trim().is_empty() {
            *value = None;
        } else {
            *value = Some(normalize_datetime(field, v)?);
        }
    }
    Ok(())
}

/// Reject an end date before the start date. Both must be normalized.
pub fn validate_date_range(start: &str, end: Option<&str>) -> Result<(), ApiError> {
    match end {
        // Same format, so lexical order is chronological
        Some(end) if end < start => Err(ApiError::bad_request(
            "End date must not be before start date",
        )),
        _ => Ok(()),
    }
}

/// Validate that a required text field is present.
pub fn validate_required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_datetime_formats() {
        let expected = "2024-06-01T08:30:00";
        assert_eq!(normalize_datetime("d", "2024-06-01T08:30:00").unwrap(), expected);
        assert_eq!(normalize_datetime("d", "2024-06-01T08:30:00.123").unwrap(), expected);
        assert_eq!(normalize_datetime("d", "2024-06-01 08:30:00").unwrap(), expected);
        assert_eq!(normalize_datetime("d", "2024-06-01T08:30").unwrap(), expected);
        assert_eq!(normalize_datetime("d", "2024-06-01T10:30:00+02:00").unwrap(), expected);
        assert_eq!(
            normalize_datetime("d", "2024-06-01").unwrap(),
            "2024-06-01T00:00:00"
        );
    }

    #[test]
    fn test_normalize_datetime_rejects_garbage() {
        assert!(matches!(
            normalize_datetime("start_date", "next tuesday"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(normalize_datetime("start_date", "2024-13-01").is_err());
    }

    #[test]
    fn test_optional_datetime() {
        let mut empty = Some("  ".to_string());
        normalize_optional_datetime("end_date", &mut empty).unwrap();
        assert!(empty.is_none());

        let mut date = Some("2024-06-02".to_string());
        normalize_optional_datetime("end_date", &mut date).unwrap();
        assert_eq!(date.as_deref(), Some("2024-06-02T00:00:00"));
    }

    #[test]
    fn test_date_range() {
        assert!(validate_date_range("2024-06-01T00:00:00", Some("2024-06-05T00:00:00")).is_ok());
        assert!(validate_date_range("2024-06-01T00:00:00", None).is_ok());
        assert!(validate_date_range("2024-06-05T00:00:00", Some("2024-06-01T00:00:00")).is_err());
    }
}
