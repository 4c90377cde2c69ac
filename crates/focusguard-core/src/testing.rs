//! Test fixtures shared by the core unit tests

use chrono::{DateTime, Local, TimeZone};
use focusguard_api::{BlockSession, BlockedSite, SiteAccess, TodayStats, UsageStats};
use focusguard_store::{AuditEvent, SqliteStore, Store, StoreError, StoreResult};
use focusguard_util::Domain;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// In-memory store whose individual entities can be made unreadable
pub struct FlakyStore {
    inner: SqliteStore,
    pub block_session_broken: AtomicBool,
    pub blocklist_broken: AtomicBool,
    pub access_broken: AtomicBool,
    pub usage_broken: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            block_session_broken: AtomicBool::new(false),
            blocklist_broken: AtomicBool::new(false),
            access_broken: AtomicBool::new(false),
            usage_broken: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    fn check(flag: &AtomicBool) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Database("disk I/O error".into()))
        } else {
            Ok(())
        }
    }
}

impl Store for FlakyStore {
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.get_recent_audits(limit)
    }

    fn get_blocked_sites(&self) -> StoreResult<Option<Vec<BlockedSite>>> {
        self.inner.get_blocked_sites()
    }

    fn set_blocked_sites(&self, sites: &[BlockedSite]) -> StoreResult<()> {
        self.inner.set_blocked_sites(sites)
    }

    fn get_custom_sites(&self) -> StoreResult<Vec<Domain>> {
        self.inner.get_custom_sites()
    }

    fn set_custom_sites(&self, domains: &[Domain]) -> StoreResult<()> {
        self.inner.set_custom_sites(domains)
    }

    fn get_blocked_domains(&self) -> StoreResult<Vec<Domain>> {
        Self::check(&self.blocklist_broken)?;
        self.inner.get_blocked_domains()
    }

    fn set_blocked_domains(&self, domains: &[Domain]) -> StoreResult<()> {
        self.inner.set_blocked_domains(domains)
    }

    fn get_motivational_messages(&self) -> StoreResult<Vec<String>> {
        self.inner.get_motivational_messages()
    }

    fn set_motivational_messages(&self, messages: &[String]) -> StoreResult<()> {
        self.inner.set_motivational_messages(messages)
    }

    fn get_block_session(&self) -> StoreResult<BlockSession> {
        Self::check(&self.block_session_broken)?;
        self.inner.get_block_session()
    }

    fn set_block_session(&self, session: &BlockSession) -> StoreResult<()> {
        Self::check(&self.block_session_broken)?;
        self.inner.set_block_session(session)
    }

    fn get_site_access(&self) -> StoreResult<SiteAccess> {
        Self::check(&self.access_broken)?;
        self.inner.get_site_access()
    }

    fn set_site_access(&self, access: &SiteAccess) -> StoreResult<()> {
        Self::check(&self.access_broken)?;
        self.inner.set_site_access(access)
    }

    fn get_usage_stats(&self) -> StoreResult<UsageStats> {
        Self::check(&self.usage_broken)?;
        self.inner.get_usage_stats()
    }

    fn set_usage_stats(&self, stats: &UsageStats) -> StoreResult<()> {
        Self::check(&self.usage_broken)?;
        self.inner.set_usage_stats(stats)
    }

    fn get_today_stats(&self) -> StoreResult<TodayStats> {
        self.inner.get_today_stats()
    }

    fn set_today_stats(&self, stats: &TodayStats) -> StoreResult<()> {
        self.inner.set_today_stats(stats)
    }

    fn is_healthy(&self) -> bool {
        !self.usage_broken.load(Ordering::SeqCst) && self.inner.is_healthy()
    }
}
