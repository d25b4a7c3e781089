use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::core::auth::AuthError;
use crate::gallery::store::StoreError;
use crate::realtime::hub::HubError;

#[derive(Debug, Clone)]
pub enum Error {
    // Auth Errors
    LoginFail,
    AuthFailNoToken,
    AuthFailTokenWrongFormat,
    AuthFailCtxNotInRequestExt,
    Forbidden,

    // Request Errors
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    PayloadTooLarge { limit_bytes: usize },

    // Server Errors
    ServiceUnavailable(String),
    Persistence(String),
    Internal(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            Error::LoginFail => (StatusCode::UNAUTHORIZED, "Login failed".to_string()),
            Error::AuthFailNoToken => (StatusCode::UNAUTHORIZED, "No auth token found".to_string()),
            Error::AuthFailTokenWrongFormat => (
                StatusCode::UNAUTHORIZED,
                "Auth token wrong format".to_string(),
            ),
            Error::AuthFailCtxNotInRequestExt => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Auth context missing".to_string(),
            ),
            Error::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Error::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Error::PayloadTooLarge { limit_bytes } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Payload exceeds {} bytes", limit_bytes),
            ),
            Error::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Error::Persistence(msg) => {
                error!("Persistence error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Storage unavailable".to_string(),
                )
            }
            Error::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": {
                "message": error_message
            }
        }));

        (status, body).into_response()
    }
}

impl From<HubError> for Error {
    fn from(err: HubError) -> Self {
        match err {
            HubError::ResourceExhausted { .. } => Error::ServiceUnavailable(err.to_string()),
            HubError::ArtworkNotFound(_) => Error::NotFound(err.to_string()),
            HubError::AlreadyLiked { .. } => Error::Conflict(err.to_string()),
            HubError::Persistence(msg) => Error::Persistence(msg),
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Error::NotFound(err.to_string()),
            StoreError::NotOwner { .. } => Error::Forbidden,
            StoreError::AlreadyLiked { .. } => Error::Conflict(err.to_string()),
            StoreError::Database(e) => Error::Persistence(e.to_string()),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::EmailTaken => Error::Conflict(err.to_string()),
            AuthError::InvalidCredentials | AuthError::SessionInvalid => Error::LoginFail,
            AuthError::Validation(msg) => Error::BadRequest(msg),
            AuthError::Hash(e) => Error::Internal(e.to_string()),
            AuthError::Database(e) => Error::Persistence(e.to_string()),
        }
    }
}

impl From<gallery_images::ImageError> for Error {
    fn from(err: gallery_images::ImageError) -> Self {
        match err {
            gallery_images::ImageError::InvalidHash(_) => Error::BadRequest(err.to_string()),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (Error::LoginFail, StatusCode::UNAUTHORIZED),
            (Error::Forbidden, StatusCode::FORBIDDEN),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("x".into()), StatusCode::CONFLICT),
            (
                Error::ServiceUnavailable("full".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                Error::Persistence("db down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_hub_errors_convert() {
        let err: Error = HubError::ResourceExhausted { capacity: 2 }.into();
        assert!(matches!(err, Error::ServiceUnavailable(_)));

        let err: Error = HubError::Persistence("locked".into()).into();
        assert!(matches!(err, Error::Persistence(_)));
    }
}
