use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

use tenantnotes_api::{MessageResponse, ServiceError};

/// Unified API error type.
///
/// Produces `{"message": "<message>"}` JSON responses, the shape the web
/// client reads for every failed request.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
}

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Build a closure that logs a DB/IO error and returns `500 Internal Server Error`.
    pub fn from_db<E: fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| {
            tracing::error!("{context}: {e}");
            Self::internal("Internal server error")
        }
    }
}

impl From<ServiceError> for ApiErr {
    fn from(e: ServiceError) -> Self {
        if let ServiceError::Internal(detail) = &e {
            tracing::error!("internal error: {detail}");
            return Self::internal("Internal server error");
        }
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.message())
    }
}

/// Malformed or mistyped request bodies are a 400 in the usual `{message}` shape.
impl From<JsonRejection> for ApiErr {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("rejected request body: {rejection}");
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (self.status, Json(MessageResponse::new(self.message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::rejection::MissingJsonContentType;

    #[test]
    fn service_errors_keep_status_and_message() {
        let err = ApiErr::from(ServiceError::Forbidden("Admin role required".into()));
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Admin role required");
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiErr::from(ServiceError::Internal("RNG failure: boom".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Internal server error");
    }

    #[test]
    fn json_rejections_become_bad_requests() {
        let rejection = MissingJsonContentType::default();
        let err = ApiErr::from(JsonRejection::from(rejection));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("application/json"), "{}", err.message);
    }

    #[test]
    fn from_db_maps_to_500() {
        let err = ApiErr::from_db("load note")("disk I/O error");
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
