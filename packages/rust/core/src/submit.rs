//! Slate submission: validate a salary CSV and start the ingest agent.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{info, instrument};

use lineuprelay_shared::{AgentRole, RelayError, RelaySettings, Result};
use lineuprelay_swarm::SwarmClient;

use crate::constraints::ConstraintSet;
use crate::csv::validate_salary_csv;
use crate::request::str_field;

/// Supported sports; each has its own ingest agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Nfl,
}

impl Sport {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "nba" => Ok(Self::Nba),
            "nfl" => Ok(Self::Nfl),
            other => Err(RelayError::validation_with(
                "Unsupported sport",
                format!("expected 'nba' or 'nfl', got '{other}'"),
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nba => "nba",
            Self::Nfl => "nfl",
        }
    }

    fn ingest_agent(&self) -> AgentRole {
        match self {
            Self::Nba => AgentRole::Ingest,
            Self::Nfl => AgentRole::NflIngest,
        }
    }
}

/// Which submission endpoint received the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRoute {
    /// `/api/optimize`
    Optimize,
    /// `/api/upload`
    Upload,
    /// `/api/upload-nfl`: sport is forced to NFL and the slate date defaults to today.
    UploadNfl,
}

/// A validated slate submission.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub csv: String,
    pub sport: Sport,
    pub slate_date: Option<String>,
    pub constraints: ConstraintSet,
}

impl SubmitRequest {
    /// Validate a request body. No remote call is made if this fails.
    pub fn from_body(body: &Map<String, Value>, route: SubmitRoute) -> Result<Self> {
        let csv = match body.get("csv").or_else(|| body.get("csvText")) {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        validate_salary_csv(&csv)?;

        let sport = match route {
            SubmitRoute::UploadNfl => Sport::Nfl,
            _ => str_field(body, &["sport"])
                .map(|s| Sport::parse(&s))
                .transpose()?
                .unwrap_or(Sport::Nba),
        };

        let slate_date = str_field(body, &["slate_date"]).or_else(|| {
            (route == SubmitRoute::UploadNfl)
                .then(|| chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string())
        });

        Ok(Self {
            csv,
            sport,
            slate_date,
            constraints: ConstraintSet::from_body(body),
        })
    }

    /// The payload handed to the ingest agent.
    fn agent_payload(&self) -> Value {
        let mut payload = json!({
            "csv": self.csv,
            "sport": self.sport,
            "locked_player": self.constraints.locked_player,
            "excluded_players": self.constraints.excluded_players,
        });
        if let Some(date) = &self.slate_date {
            payload["slate_date"] = json!(date);
        }
        payload
    }
}

/// Response for a successfully created ingest job.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub job_id: String,
    pub message: String,
    pub sport: Sport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slate_date: Option<String>,
    pub locked_player: Option<String>,
    pub excluded_players: Vec<String>,
}

/// Forward a validated slate to the sport's ingest agent.
#[instrument(skip_all, fields(sport = request.sport.as_str(), csv_len = request.csv.len()))]
pub async fn submit_slate(
    client: &SwarmClient,
    settings: &RelaySettings,
    request: SubmitRequest,
) -> Result<SubmitResponse> {
    let agent_id = settings.require_agent(request.sport.ingest_agent())?;

    info!(
        agent_id,
        has_locked_player = request.constraints.locked_player.is_some(),
        exclude_count = request.constraints.excluded_players.len(),
        "creating ingest job"
    );

    let created = client.create_job(agent_id, request.agent_payload()).await?;

    info!(job_id = %created.job_id, "ingest job created");

    Ok(SubmitResponse {
        ok: true,
        message: format!("{} optimization started", request.sport.as_str().to_uppercase()),
        job_id: created.job_id,
        sport: request.sport,
        agent_id: created.agent_id,
        execution_address: created.execution_address,
        slate_date: request.slate_date,
        locked_player: request.constraints.locked_player,
        excluded_players: request.constraints.excluded_players,
    })
}
