//! JSON error responses and request ids.
//!
//! Handlers return [`ApiError`]; the [`request_id`] middleware turns it into
//! `{error, status, requestId}` and stamps `X-Request-Id` on every response.

use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection, Request},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::FormError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// HTTP status for each error kind.
pub fn status_for(err: &FormError) -> StatusCode {
    match err {
        FormError::NotFound(_) => StatusCode::NOT_FOUND,
        FormError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        FormError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        FormError::EmptyParseResult | FormError::ParseFailure(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FormError::Io(_) | FormError::Storage(_) | FormError::Yaml(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        FormError::Json(_)
        | FormError::MissingFile
        | FormError::MissingRequiredField(_)
        | FormError::InvalidKeysPayload(_)
        | FormError::InvalidKey(_)
        | FormError::UnknownOrgUnit(_) => StatusCode::BAD_REQUEST,
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        Self::new(status_for(&err), err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status.into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub status: u16,
    pub request_id: String,
}

/// Reuse the caller's `X-Request-Id` or mint one, then render any
/// [`ApiError`] left in the response.
pub async fn request_id(req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = next.run(req).await;

    if let Some(err) = response.extensions_mut().remove::<ApiError>() {
        if err.status.is_server_error() {
            error!(request_id = %id, %method, %path, status = err.status.as_u16(), "{}", err.message);
        } else {
            debug!(request_id = %id, %method, %path, status = err.status.as_u16(), "{}", err.message);
        }
        let body = ErrorBody {
            error: err.message,
            status: err.status.as_u16(),
            request_id: id.clone(),
        };
        response = (err.status, Json(body)).into_response();
    }

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Not Found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&FormError::NotFound("k".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&FormError::FileTooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&FormError::UnsupportedFileType("x".to_string())),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            status_for(&FormError::EmptyParseResult),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(&FormError::MissingFile), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&FormError::Storage("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_from_form_error() {
        let err = ApiError::from(FormError::MissingRequiredField("branchId".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "branchId is required");
    }

    #[test]
    fn test_error_body_is_camel_case() {
        let body = ErrorBody {
            error: "Not Found".to_string(),
            status: 404,
            request_id: "abc".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestId"], "abc");
        assert_eq!(json["status"], 404);
    }
}
