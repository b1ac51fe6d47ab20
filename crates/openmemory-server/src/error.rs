//! Error-to-response mapping: every non-2xx body is
//! `{err, message, details?}`.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use openmemory_core::OmError;

pub struct ApiError(pub OmError);

impl From<OmError> for ApiError {
    fn from(e: OmError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let details = match &self.0 {
            OmError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after": retry_after_secs }))
            }
            OmError::FileTooLarge { size, limit } => {
                Some(serde_json::json!({ "size": size, "limit": limit }))
            }
            OmError::UnsupportedContentType { content_type } => {
                Some(serde_json::json!({ "content_type": content_type }))
            }
            _ => None,
        };

        let message = match &self.0 {
            // Internal details stay in the logs, not on the wire.
            OmError::Storage { .. } | OmError::Internal { .. } => {
                tracing::error!(error = %self.0, "internal error");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({
            "err": self.0.code(),
            "message": message,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        let mut response = (status, Json(body)).into_response();
        if let OmError::RateLimited { retry_after_secs } = &self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
