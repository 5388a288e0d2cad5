//! [`Relay`]: the endpoint operations, bound to configuration, one pooled
//! HTTP client and the performance log.
//!
//! Each method takes the decoded request and returns the response body or a
//! [`RelayError`]; HTTP framing lives in the server app.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use lineuprelay_shared::{AgentRole, LineupPlayer, RelayError, RelaySettings, Result};
use lineuprelay_swarm::{SwarmClient, build_http_client};

use crate::compare::{compare_lineup, recommend};
use crate::csv::parse_points_csv;
use crate::feedback::{
    FeedbackAnalysis, FeedbackRequest, FeedbackResponse, LearnerOutcome, await_job_payload,
    inline_lineup,
};
use crate::learner::LearnerReport;
use crate::poll::{FetchLineupResponse, ResultsResponse, fetch_lineup, lineup_for_job, resolve_results};
use crate::request::{require_str, str_field};
use crate::submit::{SubmitRequest, SubmitResponse, SubmitRoute, submit_slate};
use crate::tracker::{DashboardSummary, PerformanceLog, PerformanceRecord, TrackerResponse};

/// Shared service state. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Relay {
    settings: RelaySettings,
    http: Client,
    log: PerformanceLog,
}

impl Relay {
    pub fn new(settings: RelaySettings) -> Result<Self> {
        let http = build_http_client(settings.swarm.request_timeout)?;
        let log = PerformanceLog::new(settings.tracking.performance_log_capacity);
        Ok(Self {
            settings,
            http,
            log,
        })
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn performance_log(&self) -> &PerformanceLog {
        &self.log
    }

    /// An authenticated upstream client; fails when no API key is set.
    fn swarm(&self) -> Result<SwarmClient> {
        SwarmClient::from_settings(self.http.clone(), &self.settings.swarm)
    }

    // -----------------------------------------------------------------------
    // Submit
    // -----------------------------------------------------------------------

    /// `optimize`, `upload` and `upload-nfl`.
    pub async fn submit(
        &self,
        body: &Map<String, Value>,
        route: SubmitRoute,
    ) -> Result<SubmitResponse> {
        let client = self.swarm()?;
        let request = SubmitRequest::from_body(body, route)?;
        submit_slate(&client, &self.settings, request).await
    }

    // -----------------------------------------------------------------------
    // Poll
    // -----------------------------------------------------------------------

    pub async fn results(&self, job_id: Option<&str>) -> Result<ResultsResponse> {
        let client = self.swarm()?;
        resolve_results(&client, &self.settings, job_id).await
    }

    pub async fn fetch_lineup(&self, job_id: Option<&str>) -> Result<FetchLineupResponse> {
        let job_id = job_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RelayError::validation("Missing job_id"))?;
        let client = self.swarm()?;
        fetch_lineup(&client, job_id).await
    }

    // -----------------------------------------------------------------------
    // Compare / learn
    // -----------------------------------------------------------------------

    /// `tracker`: acknowledge a slate, or score it when actuals are attached.
    #[instrument(skip_all)]
    pub async fn tracker(&self, body: &Map<String, Value>) -> Result<TrackerResponse> {
        let optimizer_job_id = require_str(body, "optimizer_job_id")?;
        let slate_date = require_str(body, "slate_date")?;

        let actuals_csv = str_field(body, &["actuals_csv"]);
        let Some(actuals_csv) = actuals_csv else {
            info!(%optimizer_job_id, %slate_date, "tracker acknowledged slate");
            return Ok(TrackerResponse {
                ok: true,
                message: "Tracker received optimizer job + slate date successfully".into(),
                optimizer_job_id,
                slate_date,
                comparison: None,
                recommendations: None,
            });
        };

        let lineup = match inline_lineup(body) {
            Some(lineup) => lineup,
            None => lineup_for_job(&self.swarm()?, &optimizer_job_id).await?,
        };
        let comparison = compare_lineup(&lineup, &parse_points_csv(&actuals_csv));

        let message = if comparison.matched == 0 {
            warn!(%optimizer_job_id, "no lineup or matching players; slate not tracked");
            "No lineup or matching players available; slate not tracked".to_string()
        } else {
            self.log
                .record(PerformanceRecord::from_comparison(
                    optimizer_job_id.clone(),
                    Some(slate_date.clone()),
                    &comparison,
                ))
                .await;
            info!(%optimizer_job_id, matched = comparison.matched, mae = comparison.mae, "slate tracked");
            format!("Tracked {} matched players", comparison.matched)
        };

        Ok(TrackerResponse {
            ok: true,
            message,
            optimizer_job_id,
            slate_date,
            recommendations: Some(recommend(&comparison)),
            comparison: Some(comparison),
        })
    }

    /// `learner`: the static weight report, with a comparison when the body
    /// carries actuals and a lineup (inline or by job id).
    #[instrument(skip_all)]
    pub async fn learner(&self, body: &Map<String, Value>) -> Result<LearnerReport> {
        let Some(actuals_csv) = str_field(body, &["actuals_csv"]) else {
            return Ok(LearnerReport::new(None));
        };

        let lineup = match (inline_lineup(body), str_field(body, &["optimizer_job_id"])) {
            (Some(lineup), _) => lineup,
            (None, Some(job_id)) => lineup_for_job(&self.swarm()?, &job_id).await?,
            (None, None) => return Ok(LearnerReport::new(None)),
        };

        let comparison = compare_lineup(&lineup, &parse_points_csv(&actuals_csv));
        Ok(LearnerReport::new(Some(comparison)))
    }

    /// `feedback`: local analysis plus a bounded wait on the learner agent.
    #[instrument(skip_all)]
    pub async fn feedback(&self, body: &Map<String, Value>) -> Result<FeedbackResponse> {
        let request = FeedbackRequest::from_body(body)?;
        let client = self.swarm()?;
        let learner_agent = self.settings.require_agent(AgentRole::Learner)?;

        let projected = match &request.lineup {
            Some(lineup) => lineup.clone(),
            None => self.fetch_projected(&client, &request.optimizer_job_id).await,
        };

        let analysis = FeedbackAnalysis::compute(&request, &projected);
        if let Some(comparison) = analysis.comparison.as_ref().filter(|c| c.matched > 0) {
            self.log
                .record(PerformanceRecord::from_comparison(
                    request.optimizer_job_id.clone(),
                    request.slate_date.clone(),
                    comparison,
                ))
                .await;
        }

        let learner = match client
            .execute_agent(learner_agent, analysis.learner_payload(&request))
            .await
        {
            Ok(started) => {
                let polling = &self.settings.polling;
                await_job_payload(
                    &client,
                    started,
                    polling.feedback_poll_attempts,
                    Duration::from_millis(polling.feedback_poll_interval_ms),
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, "learner agent execution failed");
                LearnerOutcome::failed(e.message())
            }
        };

        info!(
            optimizer_job_id = %request.optimizer_job_id,
            learner_status = ?learner.learner_status,
            "feedback processed"
        );

        Ok(FeedbackResponse {
            ok: true,
            optimizer_job_id: request.optimizer_job_id,
            slate_date: request.slate_date,
            my_lineup: request.my_lineup,
            winning_lineup: request.winning_lineup,
            analysis,
            learner,
        })
    }

    /// A failed fetch leaves the projected lineup empty.
    async fn fetch_projected(&self, client: &SwarmClient, job_id: &str) -> Vec<LineupPlayer> {
        match lineup_for_job(client, job_id).await {
            Ok(lineup) => lineup,
            Err(e) => {
                warn!(%job_id, error = %e, "could not fetch optimizer lineup");
                Vec::new()
            }
        }
    }

    pub async fn dashboard(&self) -> DashboardSummary {
        self.log.summary().await
    }
}

#[cfg(test)]
mod tests {
    use lineuprelay_shared::AppConfig;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::feedback::LearnerStatus;

    fn relay_for(server: &MockServer, learner: Option<&str>) -> Relay {
        let mut config = AppConfig::default();
        config.agents.learner = learner.map(String::from);
        config.polling.feedback_poll_attempts = 2;
        config.polling.feedback_poll_interval_ms = 1;
        let uri = server.uri();
        let settings = RelaySettings::from_config_with_env(&config, move |key| match key {
            "SWARMNODE_API_KEY" => Some("k".into()),
            "SWARMNODE_BASE" => Some(uri.clone()),
            _ => None,
        })
        .unwrap();
        Relay::new(settings).unwrap()
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("../../../fixtures/{name}"))
            .unwrap_or_else(|_| panic!("missing fixture: {name}"))
    }

    async fn mount_optimizer_job(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/agent-executor-jobs/opt-job-001/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(fixture("swarmnode/job_return_value.json")),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn tracker_requires_job_and_date() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);

        let err = relay.tracker(&body(json!({"slate_date": "2025-11-02"}))).await.unwrap_err();
        assert_eq!(err.message(), "Missing optimizer_job_id");

        let err = relay
            .tracker(&body(json!({"optimizer_job_id": "  ", "slate_date": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "Missing optimizer_job_id");

        let err = relay.tracker(&body(json!({"optimizer_job_id": "j"}))).await.unwrap_err();
        assert_eq!(err.message(), "Missing slate_date");
    }

    #[tokio::test]
    async fn tracker_acknowledges_without_actuals() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);

        let resp = relay
            .tracker(&body(json!({"optimizer_job_id": "j", "slate_date": "2025-11-02"})))
            .await
            .unwrap();
        assert!(resp.comparison.is_none());
        assert!(relay.performance_log().is_empty().await);
    }

    #[tokio::test]
    async fn tracker_scores_and_records_slate() {
        let server = MockServer::start().await;
        mount_optimizer_job(&server).await;
        let relay = relay_for(&server, None);

        let resp = relay
            .tracker(&body(json!({
                "optimizer_job_id": "opt-job-001",
                "slate_date": "2025-11-02",
                "actuals_csv": fixture("csv/actuals.csv"),
            })))
            .await
            .unwrap();

        let comparison = resp.comparison.unwrap();
        assert_eq!(comparison.matched, 2);
        assert_eq!(comparison.players[0].name, "Nikola Jokic");

        let dashboard = relay.dashboard().await;
        assert_eq!(dashboard.total_slates, 1);
        assert_eq!(dashboard.performance[0].optimizer_job_id, "opt-job-001");
    }

    #[tokio::test]
    async fn tracker_skips_slates_without_matches() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);

        let resp = relay
            .tracker(&body(json!({
                "optimizer_job_id": "opt-job-001",
                "slate_date": "2025-11-02",
                "lineup": [{"name": "Alpha", "projection": 20}],
                "actuals_csv": "Zeta,30",
            })))
            .await
            .unwrap();

        assert!(resp.ok);
        assert!(resp.message.contains("No lineup or matching players"));
        assert_eq!(resp.comparison.map(|c| c.matched), Some(0));
        assert_eq!(relay.dashboard().await.total_slates, 0);
    }

    #[tokio::test]
    async fn learner_compares_inline_lineup() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);

        let bare = relay.learner(&Map::new()).await.unwrap();
        assert!(bare.comparison.is_none());

        let report = relay
            .learner(&body(json!({
                "lineup": [{"name": "A", "projection": 10}, {"name": "B", "projection": 20}],
                "actuals_csv": "A,12\nB,17",
            })))
            .await
            .unwrap();
        let comparison = report.comparison.unwrap();
        assert!((comparison.mae - 2.5).abs() < 1e-9);
        assert!(report.recommendations.is_some());
    }

    #[tokio::test]
    async fn feedback_requires_learner_agent() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);

        let err = relay.feedback(&Map::new()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));

        let err = relay
            .feedback(&body(json!({"optimizer_job_id": "opt-job-001"})))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[tokio::test]
    async fn feedback_runs_learner_and_polls() {
        let server = MockServer::start().await;
        mount_optimizer_job(&server).await;

        Mock::given(method("POST"))
            .and(path("/v1/agents/learner-agent/execute/"))
            .and(body_partial_json(json!({
                "optimizer_job_id": "opt-job-001",
                "winning_lineup": [{"name": "Star", "actual_points": 70.0}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "learn-1", "status": "pending"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/agent-executor-jobs/learn-1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "learn-1", "status": "completed", "return_value": {"accepted": true}
            })))
            .mount(&server)
            .await;

        let relay = relay_for(&server, Some("learner-agent"));
        let resp = relay
            .feedback(&body(json!({
                "optimizer_job_id": "opt-job-001",
                "slate_date": "2025-11-02",
                "my_lineup_csv": "Steph Curry,52.25\nNikola Jokic,41",
                "winning_lineup_csv": "Star,70",
            })))
            .await
            .unwrap();

        assert_eq!(resp.learner.learner_status, LearnerStatus::Completed);
        assert_eq!(resp.learner.learner_result, Some(json!({"accepted": true})));
        assert_eq!(resp.analysis.comparison.map(|c| c.matched), Some(2));
        assert_eq!(relay.performance_log().len().await, 1);
    }

    #[tokio::test]
    async fn feedback_folds_learner_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/agents/learner-agent/execute/"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let relay = relay_for(&server, Some("learner-agent"));
        let resp = relay
            .feedback(&body(json!({
                "optimizer_job_id": "opt-x",
                "lineup": [{"name": "A", "projection": 10}],
                "my_lineup_csv": "A,11",
            })))
            .await
            .unwrap();

        assert!(resp.ok);
        assert_eq!(resp.learner.learner_status, LearnerStatus::Failed);
        assert_eq!(resp.learner.learner_error.as_deref(), Some("boom"));
        assert_eq!(relay.performance_log().len().await, 1);

        relay
            .feedback(&body(json!({
                "optimizer_job_id": "opt-y",
                "lineup": [{"name": "A", "projection": 10}],
                "my_lineup_csv": "Z,11",
            })))
            .await
            .unwrap();
        assert_eq!(relay.performance_log().len().await, 1);
    }

    #[tokio::test]
    async fn fetch_lineup_requires_job_id() {
        let server = MockServer::start().await;
        let relay = relay_for(&server, None);
        let err = relay.fetch_lineup(Some("  ")).await.unwrap_err();
        assert_eq!(err.message(), "Missing job_id");
    }
}
