//! Adapter over SwarmNode job JSON.
//!
//! The platform has moved a job's return value between `return_value`,
//! `output` and `result`, sometimes nested under `latest_execution` or
//! `execution`. All of that probing lives here so callers see one shape.

use serde_json::{Map, Value};

use lineuprelay_shared::{JobStatus, value_to_string};

/// Keys that may hold a job's payload, in probe order.
const PAYLOAD_KEYS: [&str; 3] = ["return_value", "output", "result"];

/// Containers probed for payload keys: the job itself, then its executions.
const EXECUTION_KEYS: [&str; 2] = ["latest_execution", "execution"];

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// A job as reported by `GET /v1/agent-executor-jobs/{id}/` or a job listing.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: Option<String>,
    pub status: JobStatus,
    pub agent_id: Option<String>,
    pub created_at: Option<String>,
    /// Ids of jobs this job spawned, in upstream order.
    pub spawned_jobs: Vec<String>,
    pub error: Option<String>,
    /// The untouched upstream JSON.
    pub raw: Value,
}

impl JobRecord {
    /// Adapt an upstream job object. Never fails; absent fields stay `None`.
    pub fn from_value(raw: Value) -> Self {
        let status = raw
            .get("status")
            .and_then(Value::as_str)
            .or_else(|| {
                EXECUTION_KEYS
                    .iter()
                    .find_map(|k| raw.get(*k)?.get("status")?.as_str())
            })
            .map(JobStatus::parse)
            .unwrap_or_default();

        let spawned_jobs = raw
            .get("spawned_jobs")
            .and_then(Value::as_array)
            .map(|jobs| jobs.iter().filter_map(extract_job_id).collect())
            .unwrap_or_default();

        let error = raw
            .get("error")
            .and_then(error_text)
            .or_else(|| {
                EXECUTION_KEYS
                    .iter()
                    .find_map(|k| raw.get(*k)?.get("error").and_then(error_text))
            });

        Self {
            id: extract_job_id(&raw),
            status,
            agent_id: raw.get("agent_id").and_then(value_to_string),
            created_at: raw.get("created_at").and_then(value_to_string),
            spawned_jobs,
            error,
            raw,
        }
    }

    /// The job's payload object, wherever the platform put it.
    ///
    /// Null and blank values are skipped; string values are decoded as JSON.
    pub fn payload(&self) -> Option<Map<String, Value>> {
        let containers = std::iter::once(&self.raw)
            .chain(EXECUTION_KEYS.iter().filter_map(|k| self.raw.get(*k)));

        for container in containers {
            for key in PAYLOAD_KEYS {
                if let Some(found) = container.get(key).and_then(as_payload_object) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// The payload's `lineup` array, only when present and non-empty.
    pub fn lineup(&self) -> Option<Vec<Value>> {
        let payload = self.payload()?;
        match payload.get("lineup") {
            Some(Value::Array(players)) if !players.is_empty() => Some(players.clone()),
            _ => None,
        }
    }

    /// Completed successfully but the payload has no usable lineup.
    pub fn is_completed_without_lineup(&self) -> bool {
        self.status.is_success() && self.lineup().is_none()
    }
}

/// Interpret a payload slot as a JSON object.
fn as_payload_object(value: &Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map.clone()),
        Value::String(s) if !s.trim().is_empty() => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        },
        _ => None,
    }
}

/// Render an upstream `error` field (string or `{message}` object).
fn error_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("detail"))
            .and_then(value_to_string),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Identifiers and listings
// ---------------------------------------------------------------------------

/// Read a job id from `id`, else `job_id`, else `job.id`. Accepts a bare
/// string too, which is how `spawned_jobs` entries usually arrive.
pub fn extract_job_id(value: &Value) -> Option<String> {
    if let Some(id) = value_to_string(value).filter(|_| !value.is_boolean()) {
        return Some(id);
    }
    value
        .get("id")
        .and_then(value_to_string)
        .or_else(|| value.get("job_id").and_then(value_to_string))
        .or_else(|| value.get("job")?.get("id").and_then(value_to_string))
}

/// Parse a job listing: `{results: [...]}`, `{jobs: [...]}` or a bare array.
pub fn parse_job_list(body: Value) -> Vec<JobRecord> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("results").or_else(|| map.remove("jobs")) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    items.into_iter().map(JobRecord::from_value).collect()
}

/// A freshly created executor job.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedJob {
    pub job_id: String,
    pub agent_id: Option<String>,
    pub execution_address: Option<String>,
    pub raw: Value,
}
