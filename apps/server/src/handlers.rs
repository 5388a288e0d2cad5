//! Request handlers. Each decodes the body or query, delegates to
//! [`Relay`](lineuprelay_core::Relay), and wraps the result as JSON.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use lineuprelay_core::feedback::FeedbackResponse;
use lineuprelay_core::learner::LearnerReport;
use lineuprelay_core::poll::{FetchLineupResponse, ResultsResponse};
use lineuprelay_core::request::str_field;
use lineuprelay_core::submit::SubmitResponse;
use lineuprelay_core::tracker::{DashboardSummary, TrackerResponse};
use lineuprelay_core::{SubmitRoute, parse_body};
use lineuprelay_shared::RelayError;

use crate::error::{ApiError, ErrorBody};
use crate::routes::AppState;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Extractors taken as `Result` so their rejections are answered as JSON.
type RawBody = std::result::Result<Bytes, BytesRejection>;
type JobParams = std::result::Result<Query<JobQuery>, QueryRejection>;

/// `?job_id=` on polling endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct JobQuery {
    pub job_id: Option<String>,
}

impl AppState {
    fn development(&self) -> bool {
        self.relay.settings().development
    }

    fn reject(&self, error: RelayError) -> ApiError {
        ApiError::new(error, self.development())
    }

    fn body(&self, bytes: RawBody) -> Result<Map<String, Value>, ApiError> {
        let bytes = bytes.map_err(|r| {
            ApiError::rejected(r.status(), "Unreadable request body", r.body_text(), self.development())
        })?;
        parse_body(&bytes).map_err(|e| self.reject(e))
    }

    fn query(&self, params: JobParams) -> Result<JobQuery, ApiError> {
        params.map(|Query(query)| query).map_err(|r| {
            ApiError::rejected(r.status(), "Invalid query string", r.body_text(), self.development())
        })
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

async fn submit(state: AppState, bytes: RawBody, route: SubmitRoute) -> ApiResult<SubmitResponse> {
    let body = state.body(bytes)?;
    let response = state
        .relay
        .submit(&body, route)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

pub async fn optimize(State(state): State<AppState>, bytes: RawBody) -> ApiResult<SubmitResponse> {
    submit(state, bytes, SubmitRoute::Optimize).await
}

pub async fn upload(State(state): State<AppState>, bytes: RawBody) -> ApiResult<SubmitResponse> {
    submit(state, bytes, SubmitRoute::Upload).await
}

pub async fn upload_nfl(State(state): State<AppState>, bytes: RawBody) -> ApiResult<SubmitResponse> {
    submit(state, bytes, SubmitRoute::UploadNfl).await
}

// ---------------------------------------------------------------------------
// Poll
// ---------------------------------------------------------------------------

pub async fn results_get(
    State(state): State<AppState>,
    params: JobParams,
) -> ApiResult<ResultsResponse> {
    let query = state.query(params)?;
    let response = state
        .relay
        .results(query.job_id.as_deref())
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

/// The body's `job_id` wins over the query string.
pub async fn results_post(
    State(state): State<AppState>,
    params: JobParams,
    bytes: RawBody,
) -> ApiResult<ResultsResponse> {
    let query = state.query(params)?;
    let body = state.body(bytes)?;
    let job_id = str_field(&body, &["job_id"]).or(query.job_id);
    let response = state
        .relay
        .results(job_id.as_deref())
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

pub async fn fetch_lineup(
    State(state): State<AppState>,
    params: JobParams,
) -> ApiResult<FetchLineupResponse> {
    let query = state.query(params)?;
    let response = state
        .relay
        .fetch_lineup(query.job_id.as_deref())
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// Compare / learn
// ---------------------------------------------------------------------------

pub async fn tracker(State(state): State<AppState>, bytes: RawBody) -> ApiResult<TrackerResponse> {
    let body = state.body(bytes)?;
    let response = state.relay.tracker(&body).await.map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

pub async fn learner(State(state): State<AppState>, bytes: RawBody) -> ApiResult<LearnerReport> {
    let body = state.body(bytes)?;
    let response = state.relay.learner(&body).await.map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

pub async fn feedback(State(state): State<AppState>, bytes: RawBody) -> ApiResult<FeedbackResponse> {
    let body = state.body(bytes)?;
    let response = state.relay.feedback(&body).await.map_err(|e| state.reject(e))?;
    Ok(Json(response))
}

pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardSummary> {
    Json(state.relay.dashboard().await)
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "version": env!("CARGO_PKG_VERSION") }))
}

/// Bare `OPTIONS` (no CORS preflight headers).
pub async fn options() -> StatusCode {
    StatusCode::OK
}

pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::message("Method not allowed")),
    )
        .into_response()
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody::message("Not found"))).into_response()
}
