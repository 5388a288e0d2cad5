//! Typed HTTP client for the SwarmNode agent-execution platform.
//!
//! Every upstream call goes through [`SwarmClient`], which attaches the
//! bearer credential, decodes JSON, and turns non-2xx answers, HTML error
//! pages and unparseable bodies into [`RelayError`] variants. The shape of
//! the returned jobs is handled by the [`job`] adapter.

pub mod job;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use lineuprelay_shared::{RelayError, Result, SwarmSettings, value_to_string};

pub use job::{CreatedJob, JobRecord, extract_job_id, parse_job_list};

/// User-Agent string for upstream requests.
const USER_AGENT: &str = concat!("LineupRelay/", env!("CARGO_PKG_VERSION"));

/// Characters of an undecodable body kept for diagnostics.
const PREVIEW_CHARS: usize = 500;

/// Build the pooled reqwest client shared by every request handler.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| RelayError::Network(format!("failed to build HTTP client: {e}")))
}

// ---------------------------------------------------------------------------
// SwarmClient
// ---------------------------------------------------------------------------

/// Authenticated handle to the SwarmNode REST API.
#[derive(Debug, Clone)]
pub struct SwarmClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl SwarmClient {
    /// Bind a pooled HTTP client to the configured base URL and credential.
    ///
    /// Fails with a config error when no API key is configured.
    pub fn from_settings(http: Client, settings: &SwarmSettings) -> Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /v1/agent-executor-jobs/create/`
    #[instrument(skip(self, payload), fields(agent_id = %agent_id))]
    pub async fn create_job(&self, agent_id: &str, payload: Value) -> Result<CreatedJob> {
        let url = format!("{}/v1/agent-executor-jobs/create/", self.base_url);
        let body = json!({ "agent_id": agent_id, "payload": payload });

        let raw = self
            .exchange(self.http.post(&url).json(&body), "create job", false)
            .await?;

        let job_id = extract_job_id(&raw).ok_or_else(|| RelayError::Upstream {
            status: 200,
            message: "Missing job ID in SwarmNode response".into(),
            body: Some(raw.clone()),
        })?;

        debug!(%job_id, "executor job created");

        Ok(CreatedJob {
            job_id,
            agent_id: raw.get("agent_id").and_then(value_to_string),
            execution_address: raw.get("execution_address").and_then(value_to_string),
            raw,
        })
    }

    /// `GET /v1/agent-executor-jobs/{id}/`
    ///
    /// An upstream 404 becomes [`RelayError::NotFound`].
    #[instrument(skip(self))]
    pub async fn get_job(&self, job_id: &str) -> Result<JobRecord> {
        let job_id = path_id("job_id", job_id)?;
        let url = format!("{}/v1/agent-executor-jobs/{job_id}/", self.base_url);
        let raw = self.exchange(self.http.get(&url), "fetch job", true).await?;
        Ok(JobRecord::from_value(raw))
    }

    /// Most recent jobs of one agent, newest first.
    #[instrument(skip(self))]
    pub async fn list_agent_jobs(&self, agent_id: &str, limit: u32) -> Result<Vec<JobRecord>> {
        let url = format!("{}/v1/agent-executor-jobs/", self.base_url);
        let limit = limit.to_string();
        let request = self.http.get(&url).query(&[
            ("agent_id", agent_id),
            ("ordering", "-created_at"),
            ("limit", limit.as_str()),
        ]);

        let raw = self.exchange(request, "list jobs", false).await?;
        Ok(parse_job_list(raw))
    }

    /// `POST /v1/agents/{id}/execute/`
    ///
    /// The response is adapted as a job: it carries the spawned job's id and,
    /// for fast agents, the return value itself.
    #[instrument(skip(self, payload), fields(agent_id = %agent_id))]
    pub async fn execute_agent(&self, agent_id: &str, payload: Value) -> Result<JobRecord> {
        let agent_id = path_id("agent_id", agent_id)?;
        let url = format!("{}/v1/agents/{agent_id}/execute/", self.base_url);
        let raw = self
            .exchange(self.http.post(&url).json(&payload), "execute agent", false)
            .await?;
        Ok(JobRecord::from_value(raw))
    }

    /// Send an authenticated request and decode its JSON body.
    async fn exchange(
        &self,
        request: RequestBuilder,
        what: &str,
        missing_is_not_found: bool,
    ) -> Result<Value> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| RelayError::Network(format!("{what}: {e}")))?;

        let status = response.status();
        debug!(%status, what, "SwarmNode responded");

        if missing_is_not_found && status == StatusCode::NOT_FOUND {
            return Err(RelayError::not_found("Job not found"));
        }

        let text = response
            .text()
            .await
            .map_err(|e| RelayError::Network(format!("{what}: failed to read body: {e}")))?;

        let body = decode_body(&text)?;

        if !status.is_success() {
            warn!(%status, what, "SwarmNode returned an error status");
            return Err(RelayError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body)
                    .unwrap_or_else(|| format!("SwarmNode API error during {what}")),
                body: Some(body),
            });
        }

        Ok(body)
    }
}

/// Check an id spliced into an upstream path: ASCII letters, digits, `-`
/// and `_` only.
fn path_id<'a>(field: &str, id: &'a str) -> Result<&'a str> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(RelayError::validation_with(
            format!("Invalid {field}"),
            "Only letters, digits, '-' and '_' are allowed",
        ))
    }
}

/// Decode a response body as JSON, recognizing HTML error pages.
fn decode_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        let lowered = text.to_ascii_lowercase();
        if lowered.contains("<!doctype") || lowered.contains("<html") {
            RelayError::InvalidUpstream {
                message: "SwarmNode API returned HTML instead of JSON".into(),
                preview,
            }
        } else {
            RelayError::InvalidUpstream {
                message: format!("Invalid response from SwarmNode: {e}"),
                preview,
            }
        }
    })
}

/// Pull a human-readable message out of an upstream error body.
fn upstream_message(body: &Value) -> Option<String> {
    ["message", "detail", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(value_to_string))
}

#[cfg(test)]
mod tests {
    use lineuprelay_shared::JobStatus;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer) -> SwarmClient {
        let settings = SwarmSettings {
            base_url: server.uri(),
            api_key: Some("test-key".into()),
            api_key_env: "SWARMNODE_API_KEY".into(),
            request_timeout: Duration::from_secs(5),
        };
        let http = build_http_client(settings.request_timeout).unwrap();
        SwarmClient::from_settings(http, &settings).unwrap()
    }

    #[test]
    fn requires_api_key() {
        let settings = SwarmSettings {
            base_url: "http://localhost".into(),
            api_key: None,
            api_key_env: "SWARMNODE_API_KEY".into(),
            request_timeout: Duration::from_secs(5),
        };
        let http = build_http_client(settings.request_timeout).unwrap();
        let err = SwarmClient::from_settings(http, &settings).unwrap_err();
        assert!(matches!(err, RelayError::Config { .. }));
    }

    #[tokio::test]
    async fn create_job_sends_bearer_and_reads_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/agent-executor-jobs/create/"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"agent_id": "ingest-1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "job-123",
                "agent_id": "ingest-1",
                "execution_address": "exec-addr"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let created = client_for(&server)
            .create_job("ingest-1", json!({"csv": "name,salary"}))
            .await
            .unwrap();

        assert_eq!(created.job_id, "job-123");
        assert_eq!(created.execution_address.as_deref(), Some("exec-addr"));
    }

    #[tokio::test]
    async fn create_job_without_id_is_upstream_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/agent-executor-jobs/create/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queued": true})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_job("ingest-1", json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Missing job ID"));
    }

    #[tokio::test]
    async fn html_body_is_reported_as_invalid_upstream() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/agent-executor-jobs/create/"))
            .respond_with(
                ResponseTemplate::new(502)
                    .set_body_string("<!DOCTYPE html><html><body>Bad Gateway</body></html>"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_job("ingest-1", json!({}))
            .await
            .unwrap_err();

        match err {
            RelayError::InvalidUpstream { message, preview } => {
                assert!(message.contains("HTML instead of JSON"));
                assert!(preview.contains("Bad Gateway"));
            }
            other => panic!("expected InvalidUpstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_success_json_keeps_status_and_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/agent-executor-jobs/create/"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"detail": "Invalid token."})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_job("ingest-1", json!({}))
            .await
            .unwrap_err();

        match err {
            RelayError::Upstream { status, message, .. } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Invalid token.");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn get_job_maps_404_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/agent-executor-jobs/missing/"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_job("missing").await.unwrap_err();
        assert!(matches!(err, RelayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn path_ids_are_validated_before_sending() {
        let server = MockServer::start().await;

        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for id in ["../agents", "a/b", "job?x=1", "job#frag", ""] {
            let err = client.get_job(id).await.unwrap_err();
            assert_eq!(err.message(), "Invalid job_id", "id {id:?}");
        }

        let err = client.execute_agent("../x", json!({})).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[tokio::test]
    async fn get_job_adapts_payload() {
        let server = MockServer::start().await;
        let fixture = std::fs::read_to_string("../../../fixtures/swarmnode/job_return_value.json")
            .expect("read job fixture");

        Mock::given(method("GET"))
            .and(path("/v1/agent-executor-jobs/opt-job-001/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(fixture))
            .mount(&server)
            .await;

        let job = client_for(&server).get_job("opt-job-001").await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.lineup().map(|l| l.len()), Some(2));
    }

    #[tokio::test]
    async fn list_agent_jobs_passes_ordering() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/agent-executor-jobs/"))
            .and(query_param("agent_id", "opt-1"))
            .and(query_param("ordering", "-created_at"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"id": "latest", "status": "running"}]
            })))
            .mount(&server)
            .await;

        let jobs = client_for(&server).list_agent_jobs("opt-1", 1).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Running);
    }

    #[tokio::test]
    async fn execute_agent_returns_spawned_job() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/agents/learner-1/execute/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "learn-job-1",
                "status": "pending"
            })))
            .mount(&server)
            .await;

        let job = client_for(&server)
            .execute_agent("learner-1", json!({"optimizer_job_id": "o"}))
            .await
            .unwrap();
        assert_eq!(job.id.as_deref(), Some("learn-job-1"));
        assert!(job.status.is_in_flight());
    }
}
