//! Post-slate feedback: compare locally, then hand the result to the learner
//! agent and wait a bounded time for its answer.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use lineuprelay_shared::{ActualResult, LineupPlayer, Result};
use lineuprelay_swarm::{JobRecord, SwarmClient};

use crate::compare::{Comparison, WinnerAnalysis, compare_lineup, compare_winner, recommend};
use crate::csv::parse_points_csv;
use crate::request::{require_str, str_field};

/// A validated feedback submission.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRequest {
    pub optimizer_job_id: String,
    pub slate_date: Option<String>,
    pub my_lineup: Vec<ActualResult>,
    pub winning_lineup: Vec<ActualResult>,
    /// Projected lineup supplied inline; otherwise fetched from the job.
    pub lineup: Option<Vec<LineupPlayer>>,
}

impl FeedbackRequest {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self> {
        let optimizer_job_id = require_str(body, "optimizer_job_id")?;
        Ok(Self {
            optimizer_job_id,
            slate_date: str_field(body, &["slate_date"]),
            my_lineup: parse_points_csv(text_field(body, "my_lineup_csv")),
            winning_lineup: parse_points_csv(text_field(body, "winning_lineup_csv")),
            lineup: inline_lineup(body),
        })
    }
}

fn text_field<'a>(body: &'a Map<String, Value>, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// A non-empty `lineup` array from a request body, normalized.
pub fn inline_lineup(body: &Map<String, Value>) -> Option<Vec<LineupPlayer>> {
    let players: Vec<LineupPlayer> = body
        .get("lineup")?
        .as_array()?
        .iter()
        .filter_map(LineupPlayer::from_value)
        .collect();
    (!players.is_empty()).then_some(players)
}

/// Local analysis computed before the learner agent is called.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeedbackAnalysis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_analysis: Option<WinnerAnalysis>,
}

impl FeedbackAnalysis {
    pub fn compute(request: &FeedbackRequest, projected: &[LineupPlayer]) -> Self {
        let comparison = (!projected.is_empty() && !request.my_lineup.is_empty())
            .then(|| compare_lineup(projected, &request.my_lineup));
        let winner_analysis = (!request.winning_lineup.is_empty())
            .then(|| compare_winner(&request.my_lineup, &request.winning_lineup));

        Self {
            recommendations: comparison.as_ref().map(recommend),
            comparison,
            winner_analysis,
        }
    }

    /// Payload handed to the learner agent.
    pub fn learner_payload(&self, request: &FeedbackRequest) -> Value {
        json!({
            "optimizer_job_id": request.optimizer_job_id,
            "slate_date": request.slate_date,
            "my_lineup": request.my_lineup,
            "winning_lineup": request.winning_lineup,
            "comparison": self.comparison,
            "winner_analysis": self.winner_analysis,
        })
    }
}

// ---------------------------------------------------------------------------
// Learner polling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerStatus {
    Completed,
    Processing,
    Failed,
}

/// What became of the learner agent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearnerOutcome {
    pub learner_status: LearnerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learner_error: Option<String>,
    /// Status fetches made after the execute call.
    pub polls: u32,
}

impl LearnerOutcome {
    /// Failure and in-flight statuses win over any payload already attached.
    fn settled(job: &JobRecord, polls: u32) -> Option<Self> {
        let base = Self {
            learner_status: LearnerStatus::Completed,
            learner_job_id: job.id.clone(),
            learner_result: None,
            learner_error: None,
            polls,
        };

        if job.status.is_failure() {
            return Some(Self {
                learner_status: LearnerStatus::Failed,
                learner_error: Some(job.error.clone().unwrap_or_else(|| "Learner job failed".into())),
                ..base
            });
        }
        if job.status.is_in_flight() {
            return None;
        }
        if let Some(payload) = job.payload() {
            return Some(Self {
                learner_result: Some(Value::Object(payload)),
                ..base
            });
        }
        job.status.is_success().then_some(base)
    }

    /// The execute call itself failed.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            learner_status: LearnerStatus::Failed,
            learner_job_id: None,
            learner_result: None,
            learner_error: Some(error.into()),
            polls: 0,
        }
    }
}

/// Poll the job spawned by an execute call until it settles.
///
/// At most `attempts` status fetches are made, `interval` apart. Fetch errors
/// use up an attempt but do not end the loop.
#[instrument(skip(client, started), fields(job_id = started.id.as_deref().unwrap_or("-")))]
pub async fn await_job_payload(
    client: &SwarmClient,
    started: JobRecord,
    attempts: u32,
    interval: Duration,
) -> LearnerOutcome {
    if let Some(outcome) = LearnerOutcome::settled(&started, 0) {
        return outcome;
    }

    let Some(job_id) = started.id.clone() else {
        // Nothing to poll; report the execute response as-is.
        return LearnerOutcome {
            learner_status: LearnerStatus::Completed,
            learner_job_id: None,
            learner_result: Some(started.raw),
            learner_error: None,
            polls: 0,
        };
    };

    for attempt in 1..=attempts {
        tokio::time::sleep(interval).await;

        match client.get_job(&job_id).await {
            Ok(job) => {
                debug!(attempt, status = %job.status, "learner job polled");
                if let Some(outcome) = LearnerOutcome::settled(&job, attempt) {
                    info!(attempt, status = ?outcome.learner_status, "learner job settled");
                    return outcome;
                }
            }
            Err(e) => warn!(attempt, error = %e, "learner job poll failed"),
        }
    }

    LearnerOutcome {
        learner_status: LearnerStatus::Processing,
        learner_job_id: Some(job_id),
        learner_result: None,
        learner_error: None,
        polls: attempts,
    }
}

/// Body of a `feedback` response.
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub ok: bool,
    pub optimizer_job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slate_date: Option<String>,
    pub my_lineup: Vec<ActualResult>,
    pub winning_lineup: Vec<ActualResult>,
    #[serde(flatten)]
    pub analysis: FeedbackAnalysis,
    #[serde(flatten)]
    pub learner: LearnerOutcome,
}
