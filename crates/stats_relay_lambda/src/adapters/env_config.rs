use std::env;

use crate::runtime::config::{normalize_config, RawRelayConfig, RelayProfile, ValidationError};

/// Assemble the raw option bag from the process environment. Unset
/// variables stay `None`; validation decides what is required.
pub fn raw_config_from_env() -> RawRelayConfig {
    RawRelayConfig {
        shard: optional("SCREEPS_SHARD"),
        host: optional("SCREEPS_HOST"),
        port: optional("SCREEPS_PORT"),
        secure: optional("SCREEPS_SECURE"),
        api_path: optional("SCREEPS_API_PATH"),
        memory_path: optional("SCREEPS_MEMORY_PATH"),
        stats_url: optional("STATS_URL"),
        stats_username: optional("STATS_USERNAME"),
        prefix: optional("STATS_PREFIX"),
        screeps_token: optional("SCREEPS_TOKEN"),
        stats_token: optional("STATS_TOKEN"),
        screeps_token_ref: optional("SCREEPS_TOKEN_PARAM"),
        stats_token_ref: optional("STATS_TOKEN_PARAM"),
    }
}

/// Load and validate the relay profile from the environment. Called once at
/// process start so misconfiguration fails the deployment, not a tick.
pub fn profile_from_env() -> Result<RelayProfile, ValidationError> {
    normalize_config(raw_config_from_env())
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok()
}
