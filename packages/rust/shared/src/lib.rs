//! Shared types, error model, and configuration for LineupRelay.
//!
//! This crate is the foundation depended on by all other LineupRelay crates.
//! It provides:
//! - [`RelayError`] — the unified error type
//! - Domain types ([`JobStatus`], [`LineupPlayer`], [`ActualResult`])
//! - Configuration ([`AppConfig`], [`RelaySettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AgentRole, AgentsConfig, AppConfig, DEFAULT_SWARMNODE_BASE, PollingConfig, RelaySettings,
    ServerConfig, SwarmNodeConfig, SwarmSettings, TrackingConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{RelayError, Result};
pub use types::{
    ActualResult, JobStatus, LineupPlayer, coerce_f64, is_truthy, name_key, normalize_name,
    value_to_string,
};
