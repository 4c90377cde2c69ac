//! Shared types for the focusguard API and persisted store
//!
//! Persisted entities use camelCase field names so the stored JSON keeps
//! the shape UI collaborators already read.

use chrono::{DateTime, Local, NaiveDate};
use focusguard_util::{DayKey, Domain};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A user-curated entry in the built-in blocklist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedSite {
    pub name: String,
    pub domain: Domain,
    pub enabled: bool,
}

/// Access exception for a single domain.
///
/// `allowed_until == None` means permanent. A grant whose `allowed_until`
/// is at or before now is expired and must be read as "no access", even
/// though the record is still stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub allowed_until: Option<DateTime<Local>>,
    pub allowed_at: DateTime<Local>,
}

impl AccessGrant {
    pub fn is_active(&self, now: DateTime<Local>) -> bool {
        match self.allowed_until {
            None => true,
            Some(until) => now < until,
        }
    }
}

/// Access ledger as persisted: one grant per domain
pub type SiteAccess = BTreeMap<Domain, AccessGrant>;

/// Requested length of an access grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantDuration {
    Minutes(u32),
    Forever,
}

/// Remaining time on a grant or block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "minutes", rename_all = "snake_case")]
pub enum Remaining {
    Unlimited,
    Minutes(u64),
}

/// Persisted global blocking session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSession {
    pub is_blocking: bool,
    pub block_until: Option<DateTime<Local>>,
}

impl BlockSession {
    pub fn inactive() -> Self {
        Self::default()
    }

    pub fn indefinite() -> Self {
        Self {
            is_blocking: true,
            block_until: None,
        }
    }

    pub fn until(until: DateTime<Local>) -> Self {
        Self {
            is_blocking: true,
            block_until: Some(until),
        }
    }
}

/// Block session as seen by a reader at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BlockState {
    Inactive,
    ActiveIndefinite,
    ActiveTimed { until: DateTime<Local> },
}

impl BlockState {
    pub fn is_active(&self) -> bool {
        !matches!(self, BlockState::Inactive)
    }
}

/// One navigation to a listed domain, blocked or let through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryAttempt {
    pub domain: Domain,
    pub timestamp: DateTime<Local>,
    pub blocked: bool,
    pub allowed: bool,
}

/// Open time-tracking interval for an allowed domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSession {
    pub start_time: DateTime<Local>,
}

/// Usage aggregate for one local calendar day. Minutes throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayStats {
    pub visits: u64,
    pub time_spent: u64,
    pub blocks: u64,
    pub breaks: u64,
    pub entry_attempts: Vec<EntryAttempt>,
    pub active_sessions: BTreeMap<Domain, OpenSession>,
    pub domain_usage: BTreeMap<Domain, u64>,
}

impl DayStats {
    pub fn has_activity(&self) -> bool {
        self.time_spent > 0 || self.blocks > 0
    }

    pub fn summary(&self) -> TodayStats {
        TodayStats {
            time_spent: self.time_spent,
            visits: self.visits,
            blocks: self.blocks,
            breaks: self.breaks,
        }
    }
}

/// All usage buckets, keyed by local day
pub type UsageStats = BTreeMap<DayKey, DayStats>;

/// Denormalized totals for the current day
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TodayStats {
    pub time_spent: u64,
    pub visits: u64,
    pub blocks: u64,
    pub breaks: u64,
}

/// What the navigation source should do with a page load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NavigationDecision {
    /// Not subject to blocking
    Allow,
    /// Listed, but access is granted; time is being tracked
    Track { domain: Domain },
    /// Listed and not granted; render the block screen
    Block { domain: Domain },
}

/// Data needed to render the interstitial for a blocked domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockScreen {
    pub domain: Domain,
    pub message: String,
    pub block_remaining: Remaining,
    pub today: TodayStats,
}

/// Granularity of a usage report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportView {
    Daily,
    Weekly,
    Monthly,
}

/// One bucket of a usage report; `start..=end` are inclusive local days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub time_spent: u64,
    pub blocks: u64,
    pub visits: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOverview {
    pub total_time_spent: u64,
    pub total_blocks: u64,
    pub average_daily_minutes: u64,
    pub streak_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainUsage {
    pub domain: Domain,
    pub minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub view: ReportView,
    pub rows: Vec<ReportRow>,
    pub overview: ReportOverview,
    pub top_domains: Vec<DomainUsage>,
}

/// A live grant as shown to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantView {
    pub domain: Domain,
    pub remaining: Remaining,
}

/// Current user settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsView {
    pub sites: Vec<BlockedSite>,
    pub custom_sites: Vec<Domain>,
    pub messages: Vec<String>,
    pub blocked_domains: Vec<Domain>,
}

/// Full service state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStateSnapshot {
    pub api_version: u32,
    pub block_state: BlockState,
    pub block_remaining: Remaining,
    pub blocked_domains: Vec<Domain>,
    pub active_grants: Vec<GrantView>,
    pub today: TodayStats,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn grant_uses_camel_case_keys() {
        let at = Local.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let grant = AccessGrant {
            allowed_until: None,
            allowed_at: at,
        };

        let json = serde_json::to_value(&grant).unwrap();
        assert!(json.get("allowedUntil").unwrap().is_null());
        assert!(json.get("allowedAt").is_some());
    }

    #[test]
    fn grant_activity_is_strictly_before_expiry() {
        let at = Local.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let until = Local.with_ymd_and_hms(2025, 3, 10, 9, 5, 0).unwrap();
        let grant = AccessGrant {
            allowed_until: Some(until),
            allowed_at: at,
        };

        assert!(grant.is_active(at));
        assert!(!grant.is_active(until));
    }

    #[test]
    fn day_stats_tolerates_missing_fields() {
        // Older buckets were written before some counters existed
        let parsed: DayStats = serde_json::from_str(r#"{"visits": 3}"#).unwrap();
        assert_eq!(parsed.visits, 3);
        assert_eq!(parsed.time_spent, 0);
        assert!(parsed.active_sessions.is_empty());
    }

    #[test]
    fn block_state_serialization() {
        let json = serde_json::to_string(&BlockState::ActiveIndefinite).unwrap();
        assert!(json.contains("active_indefinite"));
    }

    #[test]
    fn remaining_serialization() {
        let json = serde_json::to_string(&Remaining::Minutes(4)).unwrap();
        assert_eq!(json, r#"{"kind":"minutes","minutes":4}"#);
        let json = serde_json::to_string(&Remaining::Unlimited).unwrap();
        assert_eq!(json, r#"{"kind":"unlimited"}"#);
    }
}
