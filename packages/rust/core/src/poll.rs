//! Job polling: the `results` chain resolver and single-job `fetch-lineup`.
//!
//! A submitted ingest job spawns downstream jobs (projection, optimizer, ...).
//! The resolver walks that graph breadth-first, bounded in depth and in the
//! number of fetches, until some job's payload carries a lineup.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use lineuprelay_shared::{
    AgentRole, JobStatus, LineupPlayer, PollingConfig, RelayError, RelaySettings, Result,
};
use lineuprelay_swarm::{JobRecord, SwarmClient};

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Status reported to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Processing,
    Failed,
    /// The optimizer finished but produced no lineup.
    EmptyLineup,
    /// No job id was given and the optimizer has never run.
    NoJobs,
}

/// Body of a `results` response.
#[derive(Debug, Clone, Serialize)]
pub struct ResultsResponse {
    pub ok: bool,
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineup: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_player_used: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineup_export: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimizer_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingest_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs_checked: Option<usize>,
}

impl ResultsResponse {
    fn bare(ok: bool, status: ResultStatus) -> Self {
        Self {
            ok,
            status,
            lineup: None,
            stats: None,
            recommendations: None,
            locked_player_used: None,
            lineup_export: None,
            optimizer_job_id: None,
            ingest_job_id: None,
            note: None,
            message: None,
            error: None,
            jobs_checked: None,
        }
    }

    /// A lineup was found; it is passed through unchanged.
    fn completed(job: &JobRecord, lineup: Vec<Value>) -> Self {
        let payload = job.payload().unwrap_or_default();
        let field = |key: &str| payload.get(key).filter(|v| !v.is_null()).cloned();

        Self {
            lineup: Some(lineup),
            stats: Some(field("stats").unwrap_or_else(|| Value::Object(Map::new()))),
            recommendations: Some(field("recommendations").unwrap_or_else(|| Value::Array(vec![]))),
            locked_player_used: field("locked_player_used"),
            lineup_export: field("lineup_export"),
            optimizer_job_id: job.id.clone(),
            ..Self::bare(true, ResultStatus::Completed)
        }
    }

    fn processing(message: impl Into<String>, jobs_checked: Option<usize>) -> Self {
        Self {
            message: Some(message.into()),
            jobs_checked,
            ..Self::bare(true, ResultStatus::Processing)
        }
    }

    fn failed(error: Option<String>) -> Self {
        Self {
            error: Some(error.unwrap_or_else(|| "Pipeline job failed".into())),
            ..Self::bare(false, ResultStatus::Failed)
        }
    }

    fn empty_lineup(job_id: Option<String>) -> Self {
        Self {
            error: Some("Optimizer completed without a lineup".into()),
            optimizer_job_id: job_id,
            ..Self::bare(false, ResultStatus::EmptyLineup)
        }
    }
}

// ---------------------------------------------------------------------------
// Chain following
// ---------------------------------------------------------------------------

/// Bounds on one chain walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLimits {
    /// Jobs deeper than this many `spawned_jobs` hops are not expanded.
    pub max_depth: u32,
    /// Total job fetches allowed, the root included.
    pub max_jobs: usize,
}

impl From<&PollingConfig> for ChainLimits {
    fn from(polling: &PollingConfig) -> Self {
        Self {
            max_depth: polling.max_chain_depth,
            max_jobs: polling.max_chain_jobs.max(1),
        }
    }
}

/// How a chain walk ended.
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    /// Some job in the chain carries a lineup.
    Lineup { job: JobRecord, lineup: Vec<Value> },
    /// Some job in the chain failed.
    Failed { job_id: Option<String>, error: Option<String> },
    /// The walk ran out of jobs or budget without a lineup.
    Exhausted {
        jobs_checked: usize,
        /// A visited job is still pending/queued/running.
        in_flight: bool,
        /// An optimizer-agent job completed with no lineup.
        empty_optimizer_job: Option<String>,
    },
}

/// Walk the spawned-job graph from `root_id` until a lineup is found.
///
/// Root fetch errors propagate; downstream fetch errors are skipped. Each
/// job is fetched at most once, so cyclic graphs terminate.
#[instrument(skip(client, optimizer_agent))]
pub async fn follow_chain(
    client: &SwarmClient,
    root_id: &str,
    limits: ChainLimits,
    optimizer_agent: Option<&str>,
) -> Result<ChainOutcome> {
    let mut prefetched = Some(client.get_job(root_id).await?);
    let mut jobs_checked = 1;

    let mut visited = HashSet::from([root_id.to_string()]);
    let mut queue = VecDeque::from([(root_id.to_string(), 0u32)]);
    let mut in_flight = false;
    let mut empty_optimizer_job = None;

    while let Some((job_id, depth)) = queue.pop_front() {
        let job = match prefetched.take() {
            Some(job) => job,
            None => {
                if jobs_checked >= limits.max_jobs {
                    debug!(jobs_checked, "chain fetch budget exhausted");
                    break;
                }
                jobs_checked += 1;
                match client.get_job(&job_id).await {
                    Ok(job) => job,
                    Err(e) => {
                        warn!(%job_id, error = %e, "skipping unreadable chain job");
                        continue;
                    }
                }
            }
        };

        debug!(
            %job_id,
            depth,
            status = %job.status,
            agent_id = job.agent_id.as_deref().unwrap_or("-"),
            "inspecting chain job"
        );

        if let Some(lineup) = job.lineup() {
            info!(%job_id, players = lineup.len(), "found optimizer lineup");
            return Ok(ChainOutcome::Lineup { job, lineup });
        }

        if job.status.is_failure() {
            warn!(%job_id, error = job.error.as_deref().unwrap_or("unknown"), "pipeline job failed");
            return Ok(ChainOutcome::Failed {
                job_id: job.id.clone(),
                error: job.error.clone(),
            });
        }

        in_flight |= job.status.is_in_flight();

        let is_optimizer = optimizer_agent.is_some() && job.agent_id.as_deref() == optimizer_agent;
        if is_optimizer && job.is_completed_without_lineup() {
            empty_optimizer_job = job.id.clone().or(Some(job_id.clone()));
        }

        if depth < limits.max_depth {
            for child in &job.spawned_jobs {
                if visited.insert(child.clone()) {
                    queue.push_back((child.clone(), depth + 1));
                }
            }
        }
    }

    Ok(ChainOutcome::Exhausted {
        jobs_checked,
        in_flight,
        empty_optimizer_job,
    })
}

// ---------------------------------------------------------------------------
// results
// ---------------------------------------------------------------------------

/// Resolve the `results` endpoint.
///
/// With a job id the spawned-job chain is followed; without one the most
/// recent optimizer job is inspected.
pub async fn resolve_results(
    client: &SwarmClient,
    settings: &RelaySettings,
    job_id: Option<&str>,
) -> Result<ResultsResponse> {
    match job_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(job_id) => resolve_chain(client, settings, job_id).await,
        None => resolve_latest(client, settings).await,
    }
}

#[instrument(skip(client, settings))]
async fn resolve_chain(
    client: &SwarmClient,
    settings: &RelaySettings,
    ingest_job_id: &str,
) -> Result<ResultsResponse> {
    let optimizer_agent = settings.agents.optimizer.as_deref();
    let limits = ChainLimits::from(&settings.polling);

    match follow_chain(client, ingest_job_id, limits, optimizer_agent).await? {
        ChainOutcome::Lineup { job, lineup } => Ok(ResultsResponse {
            ingest_job_id: Some(ingest_job_id.to_string()),
            ..ResultsResponse::completed(&job, lineup)
        }),
        ChainOutcome::Failed { error, .. } => Ok(ResultsResponse::failed(error)),
        ChainOutcome::Exhausted {
            jobs_checked,
            in_flight,
            empty_optimizer_job,
        } => {
            if let Some(found) = recent_optimizer_lineup(client, settings).await {
                return Ok(found);
            }

            if !in_flight && empty_optimizer_job.is_some() {
                return Ok(ResultsResponse::empty_lineup(empty_optimizer_job));
            }

            Ok(ResultsResponse::processing(
                "Pipeline still processing... This can take 20-40 seconds.",
                Some(jobs_checked),
            ))
        }
    }
}

/// Last resort: the optimizer agent's most recent completed lineup.
async fn recent_optimizer_lineup(
    client: &SwarmClient,
    settings: &RelaySettings,
) -> Option<ResultsResponse> {
    if !settings.polling.recent_jobs_fallback {
        return None;
    }
    let optimizer = settings.agents.optimizer.as_deref()?;

    let jobs = match client
        .list_agent_jobs(optimizer, settings.polling.recent_jobs_limit)
        .await
    {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(error = %e, "failed to list recent optimizer jobs");
            return None;
        }
    };

    jobs.into_iter()
        .filter(|job| job.status.is_success())
        .find_map(|job| job.lineup().map(|lineup| (job, lineup)))
        .map(|(job, lineup)| {
            info!(job_id = job.id.as_deref().unwrap_or("-"), "using recent optimizer job");
            ResultsResponse {
                note: Some("found via recent jobs list".into()),
                ..ResultsResponse::completed(&job, lineup)
            }
        })
}

#[instrument(skip_all)]
async fn resolve_latest(client: &SwarmClient, settings: &RelaySettings) -> Result<ResultsResponse> {
    let optimizer = settings.require_agent(AgentRole::Optimizer)?;

    let latest = client.list_agent_jobs(optimizer, 1).await?.into_iter().next();
    let Some(latest) = latest else {
        return Ok(ResultsResponse {
            message: Some("No optimizer jobs found".into()),
            ..ResultsResponse::bare(true, ResultStatus::NoJobs)
        });
    };

    // Listings may omit payloads; fetch the detail when needed.
    let job = match (latest.lineup(), latest.id.clone()) {
        (Some(lineup), _) => return Ok(ResultsResponse::completed(&latest, lineup)),
        (None, Some(id)) if latest.payload().is_none() => client.get_job(&id).await?,
        _ => latest,
    };

    Ok(classify_single(&job))
}

/// Report one job that is not part of a chain walk.
fn classify_single(job: &JobRecord) -> ResultsResponse {
    if let Some(lineup) = job.lineup() {
        return ResultsResponse::completed(job, lineup);
    }
    if job.status.is_failure() {
        return ResultsResponse::failed(job.error.clone());
    }
    if job.status.is_success() {
        return ResultsResponse::empty_lineup(job.id.clone());
    }
    ResultsResponse {
        optimizer_job_id: job.id.clone(),
        ..ResultsResponse::processing("Optimizer job still processing", None)
    }
}

// ---------------------------------------------------------------------------
// fetch-lineup
// ---------------------------------------------------------------------------

/// Body of a `fetch-lineup` response.
#[derive(Debug, Clone, Serialize)]
pub struct FetchLineupResponse {
    pub ok: bool,
    pub status: JobStatus,
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_return_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slate_type: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineup: Option<Vec<LineupPlayer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Value>,
}

/// Fetch one optimizer job and normalize its lineup.
///
/// Any non-2xx answer, 404 included, is an upstream error here.
#[instrument(skip(client))]
pub async fn fetch_lineup(client: &SwarmClient, job_id: &str) -> Result<FetchLineupResponse> {
    let job = client.get_job(job_id).await.map_err(|e| match e {
        RelayError::NotFound { .. } => RelayError::Upstream {
            status: 404,
            message: "Failed to fetch job: status 404".into(),
            body: None,
        },
        other => other,
    })?;

    let mut response = FetchLineupResponse {
        ok: true,
        status: job.status,
        job_id: job.id.clone(),
        message: None,
        error: None,
        raw_return_value: None,
        created_at: None,
        slate_type: None,
        lineup: None,
        stats: None,
        recommendations: None,
    };

    if !job.status.is_success() {
        response.message = Some("Job still processing".into());
        return Ok(response);
    }

    let payload = job.payload().unwrap_or_default();
    let players: Vec<LineupPlayer> = job
        .lineup()
        .unwrap_or_default()
        .iter()
        .filter_map(LineupPlayer::from_value)
        .collect();

    if players.is_empty() {
        response.ok = false;
        response.error = Some("No lineup found in return_value".into());
        response.raw_return_value = Some(Value::Object(payload));
        return Ok(response);
    }

    response.created_at = job.created_at.clone();
    response.slate_type = payload.get("slate_type").cloned().or(Some(Value::Null));
    response.stats = Some(payload.get("stats").cloned().unwrap_or_else(|| Value::Object(Map::new())));
    response.recommendations = Some(
        payload
            .get("recommendations")
            .cloned()
            .unwrap_or_else(|| Value::Array(vec![])),
    );
    response.lineup = Some(players);
    Ok(response)
}

/// Fetch a job's lineup for comparison purposes, normalized.
///
/// A direct fetch only; no chain walk.
pub async fn lineup_for_job(client: &SwarmClient, job_id: &str) -> Result<Vec<LineupPlayer>> {
    let job = client.get_job(job_id).await?;
    Ok(job
        .lineup()
        .unwrap_or_default()
        .iter()
        .filter_map(LineupPlayer::from_value)
        .collect())
}
