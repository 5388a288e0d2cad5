//! Lock/exclude constraint normalization.
//!
//! Client UIs have sent player constraints as a single string, a
//! comma-separated string, an array, or an object, under several key names.
//! Everything is reduced here to one canonical, deduplicated list.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use lineuprelay_shared::{name_key, normalize_name, value_to_string};

/// Body keys that may carry the locked player, in probe order.
pub const LOCK_KEYS: [&str; 4] = ["lock", "locked_player", "lock_player", "locked_players"];

/// Body keys that may carry excluded players, in probe order.
pub const EXCLUDE_KEYS: [&str; 3] = ["exclude", "excluded_players", "exclude_players"];

/// Player constraints forwarded to the ingest agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConstraintSet {
    pub locked_player: Option<String>,
    pub excluded_players: Vec<String>,
}

impl ConstraintSet {
    /// Read constraints from a request body.
    ///
    /// The first key holding any names wins. A locked player is never also
    /// excluded.
    pub fn from_body(body: &Map<String, Value>) -> Self {
        let locked_player = first_non_empty(body, &LOCK_KEYS).into_iter().next();
        let mut excluded_players = first_non_empty(body, &EXCLUDE_KEYS);

        if let Some(locked) = &locked_player {
            let locked_key = name_key(locked);
            excluded_players.retain(|name| name_key(name) != locked_key);
        }

        Self {
            locked_player,
            excluded_players,
        }
    }
}

fn first_non_empty(body: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|k| body.get(*k))
        .map(normalize_names)
        .find(|names| !names.is_empty())
        .unwrap_or_default()
}

/// Normalize any accepted constraint shape into trimmed, whitespace-collapsed
/// names, deduplicated case-insensitively (first spelling kept).
pub fn normalize_names(value: &Value) -> Vec<String> {
    let mut raw = Vec::new();
    collect_names(value, &mut raw);

    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|name| normalize_name(&name))
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

fn collect_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(s.split(',').map(str::to_string)),
        Value::Number(_) => out.extend(value_to_string(value)),
        Value::Array(items) => {
            for item in items {
                collect_names(item, out);
            }
        }
        Value::Object(map) => {
            if let Some(name) = map.get("name") {
                collect_names(name, out);
            } else if !map.is_empty() && map.values().all(|v| v.is_boolean()) {
                // {"Steph Curry": true, "LeBron James": false}
                out.extend(
                    map.iter()
                        .filter(|(_, v)| v.as_bool() == Some(true))
                        .map(|(k, _)| k.clone()),
                );
            } else {
                for v in map.values().filter(|v| v.is_string()) {
                    collect_names(v, out);
                }
            }
        }
        Value::Null | Value::Bool(_) => {}
    }
}
