use crate::utils::error::HubError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

impl HubError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            HubError::Forbidden { .. } | HubError::SignatureError { .. } => StatusCode::FORBIDDEN,
            HubError::NotFound { .. } => StatusCode::NOT_FOUND,
            HubError::ValidationError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            HubError::BusinessRuleError { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {} (Severity: {:?})", self, self.severity());
        } else {
            tracing::warn!("⚠️ Request rejected ({}): {}", status.as_u16(), self);
        }

        let mut body = json!({
            "success": false,
            "message": self.user_friendly_message(),
        });
        if let HubError::ValidationError { errors, .. } = &self {
            if !errors.is_empty() {
                body["errors"] = json!(errors);
            }
        }

        (status, Json(body)).into_response()
    }
}

/// serde_json messages quote the offending value. The full text goes only to
/// the response `errors` list; the logged message carries the category.
pub fn invalid_payload(what: &str, e: &serde_json::Error) -> HubError {
    HubError::ValidationError {
        message: format!("invalid {} ({:?} error)", what, e.classify()),
        errors: vec![e.to_string()],
    }
}

/// `{"success": true, "data": ...}`
pub fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({ "success": true, "data": data }))
}
