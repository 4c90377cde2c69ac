//! Validated policy structures

use crate::schema::{RawBlockingMode, RawConfig, RawServiceConfig, RawSite};
use focusguard_api::BlockedSite;
use focusguard_util::Domain;
use std::path::PathBuf;
use std::time::Duration;

/// Default seconds between usage polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

const DEFAULT_SITES: &[(&str, &str)] = &[
    ("Facebook", "facebook.com"),
    ("Instagram", "instagram.com"),
    ("Twitter", "twitter.com"),
    ("LinkedIn", "linkedin.com"),
    ("TikTok", "tiktok.com"),
    ("YouTube", "youtube.com"),
    ("Reddit", "reddit.com"),
    ("Snapchat", "snapchat.com"),
    ("Pinterest", "pinterest.com"),
    ("WhatsApp Web", "web.whatsapp.com"),
];

const DEFAULT_MESSAGES: &[&str] = &[
    "You're stronger than this distraction! 💪",
    "Focus on your goals, not your feed! 🎯",
    "Every moment away is progress! ✨",
    "Your future self will thank you! 🙏",
    "Stay focused, stay productive! 🚀",
    "You've got this! Keep going! 💯",
    "Time is precious - use it wisely! ⏰",
    "Distraction is temporary, success is permanent! 🌟",
];

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Policy {
    /// Service configuration
    pub service: ServiceConfig,

    /// Built-in blocklist seeded on first run and restored on reset
    pub sites: Vec<BlockedSite>,

    /// Custom domains seeded on first run
    pub custom_sites: Vec<Domain>,

    /// Messages seeded on first run and restored on reset
    pub motivational_messages: Vec<String>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let sites = raw
            .sites
            .map(|sites| sites.into_iter().map(convert_site).collect())
            .unwrap_or_else(default_sites);

        let mut custom_sites: Vec<Domain> = Vec::new();
        for raw_domain in raw.custom_sites {
            let domain = Domain::new(raw_domain);
            if !custom_sites.contains(&domain) {
                custom_sites.push(domain);
            }
        }

        Self {
            service: ServiceConfig::from_raw(raw.service),
            sites,
            custom_sites,
            motivational_messages: raw
                .motivational_messages
                .unwrap_or_else(default_messages),
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            sites: default_sites(),
            custom_sites: Vec::new(),
            motivational_messages: default_messages(),
        }
    }
}

/// How the global block session behaves when stopped or expired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockingMode {
    /// Blocking runs only while a session is active
    #[default]
    Toggle,
    /// Stopping or expiring a session falls back to indefinite blocking
    AlwaysOn,
}

impl From<RawBlockingMode> for BlockingMode {
    fn from(raw: RawBlockingMode) -> Self {
        match raw {
            RawBlockingMode::Toggle => BlockingMode::Toggle,
            RawBlockingMode::AlwaysOn => BlockingMode::AlwaysOn,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub socket_path: PathBuf,
    pub data_dir: PathBuf,
    pub blocking_mode: BlockingMode,
    pub poll_interval: Duration,
    pub prune_expired_grants: bool,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            socket_path: raw
                .socket_path
                .unwrap_or_else(focusguard_util::default_socket_path),
            data_dir: raw
                .data_dir
                .unwrap_or_else(focusguard_util::default_data_dir),
            blocking_mode: raw.blocking_mode.map(Into::into).unwrap_or_default(),
            poll_interval: Duration::from_secs(
                raw.poll_interval_seconds
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            prune_expired_grants: raw.prune_expired_grants.unwrap_or(true),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

fn convert_site(raw: RawSite) -> BlockedSite {
    BlockedSite {
        name: raw.name,
        domain: Domain::new(raw.domain),
        enabled: raw.enabled,
    }
}

/// The stock social sites, all enabled
pub fn default_sites() -> Vec<BlockedSite> {
    DEFAULT_SITES
        .iter()
        .map(|(name, domain)| BlockedSite {
            name: (*name).to_string(),
            domain: Domain::new(domain),
            enabled: true,
        })
        .collect()
}

pub fn default_messages() -> Vec<String> {
    DEFAULT_MESSAGES.iter().map(|m| (*m).to_string()).collect()
}
