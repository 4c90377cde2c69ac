//! Store trait definitions

use focusguard_api::{BlockSession, BlockedSite, SiteAccess, TodayStats, UsageStats};
use focusguard_util::Domain;

use crate::{AuditEvent, StoreResult};

/// Repository over all persisted focusguard state.
///
/// Every entity has a narrow get/set pair. Getters return the empty value
/// when nothing was ever written, except `get_blocked_sites`, which reports
/// absence so first-run seeding can be detected.
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Settings

    /// Built-in blocklist; `None` before first-run seeding
    fn get_blocked_sites(&self) -> StoreResult<Option<Vec<BlockedSite>>>;

    fn set_blocked_sites(&self, sites: &[BlockedSite]) -> StoreResult<()>;

    fn get_custom_sites(&self) -> StoreResult<Vec<Domain>>;

    fn set_custom_sites(&self, domains: &[Domain]) -> StoreResult<()>;

    /// Cached effective blocklist
    fn get_blocked_domains(&self) -> StoreResult<Vec<Domain>>;

    fn set_blocked_domains(&self, domains: &[Domain]) -> StoreResult<()>;

    fn get_motivational_messages(&self) -> StoreResult<Vec<String>>;

    fn set_motivational_messages(&self, messages: &[String]) -> StoreResult<()>;

    // Block session

    fn get_block_session(&self) -> StoreResult<BlockSession>;

    fn set_block_session(&self, session: &BlockSession) -> StoreResult<()>;

    // Access ledger

    fn get_site_access(&self) -> StoreResult<SiteAccess>;

    fn set_site_access(&self, access: &SiteAccess) -> StoreResult<()>;

    // Usage

    fn get_usage_stats(&self) -> StoreResult<UsageStats>;

    fn set_usage_stats(&self, stats: &UsageStats) -> StoreResult<()>;

    /// Cached totals for the current day
    fn get_today_stats(&self) -> StoreResult<TodayStats>;

    fn set_today_stats(&self, stats: &TodayStats) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
