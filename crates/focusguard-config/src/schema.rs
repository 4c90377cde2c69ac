//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Built-in blocklist. Absent means the stock social sites.
    pub sites: Option<Vec<RawSite>>,

    /// Extra domains seeded into the custom list on first run
    #[serde(default)]
    pub custom_sites: Vec<String>,

    /// Shown on the block screen. Absent means the stock messages.
    pub motivational_messages: Option<Vec<String>>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// "toggle" (default) or "always_on"
    pub blocking_mode: Option<RawBlockingMode>,

    /// How often open sessions are credited
    pub poll_interval_seconds: Option<u64>,

    /// Drop expired grants from the ledger on each poll
    pub prune_expired_grants: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawBlockingMode {
    Toggle,
    AlwaysOn,
}

/// Raw blocklist entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSite {
    /// Display name
    pub name: String,

    /// Domain; normalized during conversion
    pub domain: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
