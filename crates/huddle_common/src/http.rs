use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{HttpStatusCode, HuddleError};

/// Extension trait for HuddleError to convert it to an Axum HTTP response.
pub trait IntoHttpResponse {
    /// Converts the error into an Axum HTTP response.
    fn into_http_response(self) -> Response;
}

impl IntoHttpResponse for HuddleError {
    fn into_http_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut error = json!({
            "message": self.to_string(),
            "code": status_code.as_u16(),
        });

        // Per-item outcomes and consent hints are part of the contract for callers
        match &self {
            HuddleError::PartialFailure { succeeded, failed } => {
                error["succeeded"] = json!(succeeded);
                error["failed"] = json!(failed);
            }
            HuddleError::AuthorizationRequired { service_type, .. }
            | HuddleError::ReauthorizationRequired { service_type, .. } => {
                error["consent_required"] = json!(service_type.as_str());
            }
            _ => {}
        }

        (status_code, Json(json!({ "error": error }))).into_response()
    }
}

/// Implement IntoResponse for HuddleError to make it easier to use in Axum handlers.
impl IntoResponse for HuddleError {
    fn into_response(self) -> Response {
        self.into_http_response()
    }
}
