//! Application configuration for LineupRelay.
//!
//! User config lives at `~/.lineuprelay/lineuprelay.toml`.
//! Environment variables override config file values, CLI flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{RelayError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "lineuprelay.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".lineuprelay";

/// Public SwarmNode API origin.
pub const DEFAULT_SWARMNODE_BASE: &str = "https://api.swarmnode.ai";

// ---------------------------------------------------------------------------
// Config structs (matching lineuprelay.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream platform settings.
    #[serde(default)]
    pub swarmnode: SwarmNodeConfig,

    /// Remote agent identifiers, one per pipeline stage.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Chain-following and poll-loop bounds.
    #[serde(default)]
    pub polling: PollingConfig,

    /// In-memory performance tracking.
    #[serde(default)]
    pub tracking: TrackingConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `development` adds debug detail to error bodies.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_environment() -> String {
    "production".into()
}

/// `[swarmnode]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmNodeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for SwarmNodeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_SWARMNODE_BASE.into()
}
fn default_api_key_env() -> String {
    "SWARMNODE_API_KEY".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// `[agents]` section. Every id is optional; handlers that need a missing
/// one fail with a config error at request time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfl_ingest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner: Option<String>,
}

/// `[polling]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Deepest `spawned_jobs` hop followed from the root job.
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,

    /// Upper bound on job fetches during one chain walk.
    #[serde(default = "default_max_chain_jobs")]
    pub max_chain_jobs: usize,

    /// Fall back to the optimizer agent's recent jobs when the chain has no lineup.
    #[serde(default = "default_true")]
    pub recent_jobs_fallback: bool,

    #[serde(default = "default_recent_jobs_limit")]
    pub recent_jobs_limit: u32,

    #[serde(default = "default_feedback_attempts")]
    pub feedback_poll_attempts: u32,

    #[serde(default = "default_feedback_interval")]
    pub feedback_poll_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
            max_chain_jobs: default_max_chain_jobs(),
            recent_jobs_fallback: true,
            recent_jobs_limit: default_recent_jobs_limit(),
            feedback_poll_attempts: default_feedback_attempts(),
            feedback_poll_interval_ms: default_feedback_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_chain_depth() -> u32 {
    4
}
fn default_max_chain_jobs() -> usize {
    20
}
fn default_recent_jobs_limit() -> u32 {
    10
}
fn default_feedback_attempts() -> u32 {
    10
}
fn default_feedback_interval() -> u64 {
    2000
}

/// `[tracking]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    #[serde(default = "default_log_capacity")]
    pub performance_log_capacity: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            performance_log_capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    100
}

// ---------------------------------------------------------------------------
// Runtime settings (merged from config file + environment)
// ---------------------------------------------------------------------------

/// Resolved upstream connection settings.
#[derive(Debug, Clone)]
pub struct SwarmSettings {
    /// Base URL with trailing slashes removed.
    pub base_url: String,
    /// Bearer credential, if the configured env var is set.
    pub api_key: Option<String>,
    /// Env var the key was looked up in, for error messages.
    pub api_key_env: String,
    pub request_timeout: Duration,
}

impl SwarmSettings {
    /// The API key, or a config error naming the env var to set.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RelayError::config(format!("Missing {}", self.api_key_env)))
    }
}

/// Runtime settings shared by every request handler.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub swarm: SwarmSettings,
    pub agents: AgentsConfig,
    pub polling: PollingConfig,
    pub tracking: TrackingConfig,
    pub development: bool,
}

impl RelaySettings {
    /// Resolve settings from the config file and the process environment.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::from_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an injectable environment lookup.
    pub fn from_config_with_env<F>(config: &AppConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let base_url = lookup("SWARMNODE_BASE").unwrap_or_else(|| config.swarmnode.base_url.clone());
        let base_url = normalize_base_url(&base_url)?;

        let agents = AgentsConfig {
            ingest: lookup("INGEST_AGENT_ID").or_else(|| config.agents.ingest.clone()),
            nfl_ingest: lookup("NFL_INGEST_AGENT_ID").or_else(|| config.agents.nfl_ingest.clone()),
            optimizer: lookup("OPTIMIZER_AGENT_ID").or_else(|| config.agents.optimizer.clone()),
            learner: lookup("LEARNER_AGENT_ID").or_else(|| config.agents.learner.clone()),
        };

        let environment =
            lookup("LINEUPRELAY_ENV").unwrap_or_else(|| config.server.environment.clone());

        Ok(Self {
            swarm: SwarmSettings {
                base_url,
                api_key: lookup(config.swarmnode.api_key_env.as_str()),
                api_key_env: config.swarmnode.api_key_env.clone(),
                request_timeout: Duration::from_secs(config.swarmnode.request_timeout_secs),
            },
            agents,
            polling: config.polling.clone(),
            tracking: config.tracking.clone(),
            development: environment.eq_ignore_ascii_case("development"),
        })
    }

    /// Look up a configured agent id, naming its env var when missing.
    pub fn require_agent(&self, agent: AgentRole) -> Result<&str> {
        let id = match agent {
            AgentRole::Ingest => &self.agents.ingest,
            AgentRole::NflIngest => &self.agents.nfl_ingest,
            AgentRole::Optimizer => &self.agents.optimizer,
            AgentRole::Learner => &self.agents.learner,
        };
        id.as_deref()
            .ok_or_else(|| RelayError::config(format!("Missing {}", agent.env_var())))
    }
}

/// Pipeline stage an agent id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Ingest,
    NflIngest,
    Optimizer,
    Learner,
}

impl AgentRole {
    /// Environment variable that configures this agent.
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::Ingest => "INGEST_AGENT_ID",
            Self::NflIngest => "NFL_INGEST_AGENT_ID",
            Self::Optimizer => "OPTIMIZER_AGENT_ID",
            Self::Learner => "LEARNER_AGENT_ID",
        }
    }
}

/// Validate a base URL and strip trailing slashes.
fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| RelayError::config(format!("invalid SwarmNode base URL '{raw}': {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RelayError::config(format!(
            "SwarmNode base URL must be http(s), got '{raw}'"
        )));
    }
    Ok(trimmed.to_string())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.lineuprelay/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| RelayError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.lineuprelay/lineuprelay.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RelayError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| RelayError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| RelayError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RelayError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RelayError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
