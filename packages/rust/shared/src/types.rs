//! Core domain types shared by the relay crates.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// Status of a remote job, parsed leniently from upstream strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Processing,
    Completed,
    Success,
    Failed,
    Error,
    #[default]
    Unknown,
}

impl JobStatus {
    /// Parse an upstream status string. Unrecognized spellings map to `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "queued" => Self::Queued,
            "running" => Self::Running,
            "processing" => Self::Processing,
            "completed" | "complete" => Self::Completed,
            "success" | "succeeded" => Self::Success,
            "failed" | "failure" => Self::Failed,
            "error" | "errored" => Self::Error,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }

    /// Terminal and successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::Success)
    }

    /// Terminal and unsuccessful.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }

    /// Still being worked on by the platform.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Pending | Self::Queued | Self::Running | Self::Processing
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.map(|s| Self::parse(&s)).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Lineup players and actual results
// ---------------------------------------------------------------------------

/// A lineup entry normalized out of an optimizer payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineupPlayer {
    pub slot: Option<String>,
    pub name: String,
    pub team: Option<String>,
    /// Salary as the optimizer sent it (number or formatted string).
    pub salary: Value,
    pub salary_num: Option<f64>,
    pub projection: Option<f64>,
    pub value: Option<f64>,
    pub is_locked: bool,
}

impl LineupPlayer {
    /// Build a player from a loosely-typed payload object.
    ///
    /// Returns `None` when the entry has no usable name.
    pub fn from_value(entry: &Value) -> Option<Self> {
        let name = entry
            .get("name")
            .or_else(|| entry.get("player"))
            .and_then(Value::as_str)
            .map(normalize_name)
            .filter(|n| !n.is_empty())?;

        let salary = entry.get("salary").cloned().unwrap_or(Value::Null);

        Some(Self {
            slot: entry
                .get("slot")
                .or_else(|| entry.get("position"))
                .and_then(value_to_string),
            name,
            team: entry.get("team").and_then(value_to_string),
            salary_num: coerce_f64(&salary),
            salary,
            projection: entry
                .get("projection")
                .or_else(|| entry.get("projected_points"))
                .and_then(coerce_f64),
            value: entry.get("value").and_then(coerce_f64),
            is_locked: entry.get("is_locked").is_some_and(is_truthy),
        })
    }
}

/// A player's real-world score, as entered by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualResult {
    pub name: String,
    pub actual_points: Option<f64>,
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static NON_NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.\-]").expect("valid numeric regex"));

/// Trim a player name and collapse internal whitespace runs.
pub fn normalize_name(raw: &str) -> String {
    WHITESPACE_RE.replace_all(raw.trim(), " ").into_owned()
}

/// Case-insensitive join key for player names.
pub fn name_key(raw: &str) -> String {
    normalize_name(raw).to_lowercase()
}

/// Coerce a JSON number or numeric-looking string to `f64`.
///
/// Strings have currency symbols and separators stripped (`"$5,400"` → 5400).
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = NON_NUMERIC_RE.replace_all(s, "");
            if cleaned.is_empty() {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Render a scalar JSON value as a string; objects, arrays and null yield `None`.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// JavaScript-style truthiness for loosely-typed flags.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}
