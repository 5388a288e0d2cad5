//! Mapping of [`RelayError`] onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

use lineuprelay_shared::RelayError;

/// A handler error plus whether debug detail may be exposed.
#[derive(Debug)]
pub struct ApiError {
    pub error: RelayError,
    pub development: bool,
    /// Set for extractor rejections, whose status axum has already chosen.
    pub status_override: Option<StatusCode>,
}

impl ApiError {
    pub fn new(error: RelayError, development: bool) -> Self {
        Self {
            error,
            development,
            status_override: None,
        }
    }

    /// A rejected query string or request body, keeping axum's status.
    pub fn rejected(
        status: StatusCode,
        message: &str,
        details: impl Into<String>,
        development: bool,
    ) -> Self {
        Self {
            error: RelayError::validation_with(message, details),
            development,
            status_override: Some(status),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status_override
            .unwrap_or_else(|| status_for(&self.error))
    }
}

/// HTTP status for each error kind.
pub fn status_for(error: &RelayError) -> StatusCode {
    match error {
        RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
        RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
        RelayError::Upstream { .. }
        | RelayError::InvalidUpstream { .. }
        | RelayError::Network(_) => StatusCode::BAD_GATEWAY,
        RelayError::Config { .. } | RelayError::Io { .. } | RelayError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub ok: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl ErrorBody {
    pub fn message(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
            details: None,
            upstream_status: None,
            raw_response: None,
            debug: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(%status, error = %self.error, "request failed");
        } else {
            tracing::warn!(%status, error = %self.error, "request rejected");
        }

        let mut body = ErrorBody::message(self.error.message());
        match &self.error {
            RelayError::Validation { details, .. } => body.details = details.clone(),
            RelayError::Upstream {
                status: upstream,
                body: raw,
                ..
            } => {
                body.upstream_status = Some(*upstream);
                body.raw_response = raw.clone();
            }
            RelayError::InvalidUpstream { preview, .. } => {
                body.raw_response = Some(Value::String(preview.clone()));
            }
            _ => {}
        }
        if self.development {
            body.debug = Some(format!("{:?}", self.error));
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_statuses() {
        assert_eq!(
            status_for(&RelayError::validation("Missing csv")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&RelayError::not_found("Job not found")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&RelayError::config("Missing SWARMNODE_API_KEY")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&RelayError::Network("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&RelayError::InvalidUpstream {
                message: "html".into(),
                preview: "<html>".into(),
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    async fn body_of(error: ApiError) -> Value {
        let bytes = axum::body::to_bytes(error.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn debug_field_only_in_development() {
        let prod = body_of(ApiError::new(RelayError::Internal("x".into()), false)).await;
        assert!(prod.get("debug").is_none());

        let dev = body_of(ApiError::new(RelayError::Internal("x".into()), true)).await;
        assert!(dev["debug"].as_str().unwrap().contains("Internal"));
    }

    #[tokio::test]
    async fn rejections_keep_their_status() {
        let error = ApiError::rejected(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Unreadable request body",
            "length limit exceeded",
            false,
        );
        assert_eq!(error.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body = body_of(error).await;
        assert_eq!(body["ok"], Value::Bool(false));
        assert_eq!(body["error"], "Unreadable request body");
        assert_eq!(body["details"], "length limit exceeded");
    }

    #[tokio::test]
    async fn upstream_errors_carry_status_and_body() {
        let body = body_of(ApiError::new(
            RelayError::Upstream {
                status: 403,
                message: "Invalid token".into(),
                body: Some(serde_json::json!({"detail": "Invalid token"})),
            },
            false,
        ))
        .await;
        assert_eq!(body["ok"], Value::Bool(false));
        assert_eq!(body["error"], "Invalid token");
        assert_eq!(body["upstream_status"], 403);
        assert_eq!(body["raw_response"]["detail"], "Invalid token");
    }
}
