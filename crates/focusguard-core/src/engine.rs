//! Core engine composing settings, ledger, recorder, blocker and monitor

use chrono::{DateTime, Local};
use focusguard_api::{
    BlockScreen, BlockState, NavigationDecision, Remaining, ReportView, ServiceStateSnapshot,
    SettingsView, TodayStats, UsageReport, API_VERSION,
};
use focusguard_config::Policy;
use focusguard_store::{AuditEvent, AuditEventType, Store};
use focusguard_util::{validate_host, DayKey, Domain, FocusError, Result, TabId};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    build_report, export_json, parse_grant_duration, AccessLedger, Alarms, BlockController,
    CoreEvent, NavigationMonitor, SettingsManager, UsageRecorder,
};

/// The core engine.
///
/// Every method takes the current time explicitly. Events produced while
/// handling a call are queued and collected with `drain_events`.
pub struct CoreEngine {
    policy: Policy,
    store: Arc<dyn Store>,
    settings: SettingsManager,
    ledger: AccessLedger,
    recorder: UsageRecorder,
    blocker: BlockController,
    monitor: NavigationMonitor,
    /// Day whose totals were last published
    current_day: Option<DayKey>,
    pending: Vec<CoreEvent>,
}

impl CoreEngine {
    /// Create a new core engine
    pub fn new(policy: Policy, store: Arc<dyn Store>, alarms: Arc<dyn Alarms>) -> Self {
        let settings = SettingsManager::new(store.clone(), &policy);
        let ledger = AccessLedger::new(store.clone());
        let recorder = UsageRecorder::new(store.clone());
        let blocker = BlockController::new(store.clone(), alarms, policy.service.blocking_mode);
        let monitor = NavigationMonitor::new(
            store.clone(),
            blocker.clone(),
            ledger.clone(),
            recorder.clone(),
        );

        info!(
            sites = policy.sites.len(),
            mode = ?policy.service.blocking_mode,
            "Core engine initialized"
        );

        Self {
            policy,
            store,
            settings,
            ledger,
            recorder,
            blocker,
            monitor,
            current_day: None,
            pending: Vec::new(),
        }
    }

    /// Get current policy
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Take the events queued since the last call
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.pending)
    }

    fn emit(&mut self, event: CoreEvent) {
        self.pending.push(event);
    }

    fn audit(&self, event: AuditEventType) {
        let _ = self.store.append_audit(AuditEvent::new(event));
    }

    /// Publish today's totals after a usage write
    fn stats_changed(&mut self, now: DateTime<Local>) {
        match self.recorder.today(now) {
            Ok(today) => {
                self.current_day = Some(DayKey::of(&now));
                self.emit(CoreEvent::StatsUpdated(today));
            }
            Err(e) => warn!(error = %e, "Failed to read today's stats"),
        }
    }

    /// Seed first-run settings, discard orphaned sessions and apply the
    /// blocking mode. Storage failures are logged and startup continues.
    pub fn initialize(&mut self, now: DateTime<Local>) {
        match self.settings.seed_if_first_run() {
            Ok(true) => self.audit(AuditEventType::SettingsSeeded {
                site_count: self.policy.sites.len(),
            }),
            Ok(false) => debug!("Settings already present"),
            Err(e) => warn!(error = %e, "Failed to seed settings"),
        }

        match self.recorder.drop_open_sessions(now) {
            Ok(0) => {}
            Ok(n) => info!(count = n, "Discarded sessions left open by a previous run"),
            Err(e) => warn!(error = %e, "Failed to discard stale sessions"),
        }

        match self.blocker.on_startup(now) {
            Ok(state) => info!(state = ?state, "Block state restored"),
            Err(e) => warn!(error = %e, "Failed to restore block state"),
        }

        match self.recorder.today(now) {
            Ok(_) => self.current_day = Some(DayKey::of(&now)),
            Err(e) => warn!(error = %e, "Failed to refresh today's stats"),
        }
    }

    /// Close open sessions before the service exits
    pub fn shutdown(&mut self, now: DateTime<Local>) {
        match self.recorder.close_all_sessions(now) {
            Ok(minutes) => debug!(minutes, "Open sessions closed"),
            Err(e) => warn!(error = %e, "Failed to close open sessions"),
        }
        self.monitor.reset();
    }

    // Block controller

    /// Read the block state, publishing an expiry if this read caused one
    fn observe_block(&mut self, now: DateTime<Local>) -> Result<BlockState> {
        let reading = self.blocker.observe(now)?;
        if reading.expired {
            self.audit(AuditEventType::BlockingExpired);
            self.emit(CoreEvent::BlockingChanged {
                state: reading.state,
            });
        }
        Ok(reading.state)
    }

    pub fn block_status(&mut self, now: DateTime<Local>) -> Result<(BlockState, Remaining)> {
        self.observe_block(now)?;
        let remaining = self.blocker.remaining_minutes(now)?;
        Ok((self.blocker.state(now)?, remaining))
    }

    pub fn start_blocking(&mut self, minutes: i64, now: DateTime<Local>) -> Result<BlockState> {
        let state = self.blocker.start(minutes, now)?;
        if let BlockState::ActiveTimed { until } = state {
            self.audit(AuditEventType::BlockingStarted { until });
        }
        self.emit(CoreEvent::BlockingChanged { state });
        Ok(state)
    }

    pub fn stop_blocking(&mut self, now: DateTime<Local>) -> Result<BlockState> {
        let state = self.blocker.stop(now)?;
        self.audit(AuditEventType::BlockingStopped);
        self.emit(CoreEvent::BlockingChanged { state });
        Ok(state)
    }

    pub fn extend_blocking(&mut self, minutes: i64, now: DateTime<Local>) -> Result<BlockState> {
        let before = self.observe_block(now)?;
        let state = self.blocker.extend(minutes, now)?;

        if state != before {
            if let BlockState::ActiveTimed { until } = state {
                self.audit(AuditEventType::BlockingExtended { until });
            }
            self.emit(CoreEvent::BlockingChanged { state });
        }
        Ok(state)
    }

    /// The `stopBlocking` wake-up fired
    pub fn on_stop_blocking_alarm(&mut self, now: DateTime<Local>) -> Result<BlockState> {
        let reading = self.blocker.on_alarm(now)?;
        if reading.expired {
            self.audit(AuditEventType::BlockingExpired);
            self.emit(CoreEvent::BlockingChanged {
                state: reading.state,
            });
        } else {
            debug!(state = ?reading.state, "Stop-blocking wake-up found nothing to expire");
        }
        Ok(reading.state)
    }

    // Blocklist and settings

    /// Recompute the effective blocklist and publish it
    pub fn update_blocking_rules(&mut self) -> Result<Vec<Domain>> {
        let domains = self.settings.update_effective_blocklist()?;
        self.audit(AuditEventType::BlocklistUpdated {
            domain_count: domains.len(),
        });
        self.emit(CoreEvent::BlocklistUpdated {
            domains: domains.clone(),
        });
        Ok(domains)
    }

    pub fn settings(&self) -> Result<SettingsView> {
        self.settings.view()
    }

    pub fn add_custom_site(&mut self, raw: &str) -> Result<SettingsView> {
        self.settings.add_custom_site(raw)?;
        self.update_blocking_rules()?;
        self.settings.view()
    }

    pub fn remove_custom_site(&mut self, raw: &str) -> Result<SettingsView> {
        if self.settings.remove_custom_site(raw)? {
            self.update_blocking_rules()?;
        }
        self.settings.view()
    }

    pub fn set_site_enabled(&mut self, raw: &str, enabled: bool) -> Result<SettingsView> {
        self.settings.set_site_enabled(raw, enabled)?;
        self.update_blocking_rules()?;
        self.settings.view()
    }

    pub fn add_message(&mut self, message: &str) -> Result<SettingsView> {
        self.settings.add_message(message)?;
        self.settings.view()
    }

    pub fn remove_message(&mut self, index: usize) -> Result<SettingsView> {
        self.settings.remove_message(index)?;
        self.settings.view()
    }

    pub fn reset_settings(&mut self) -> Result<SettingsView> {
        let domains = self.settings.reset()?;
        self.audit(AuditEventType::BlocklistUpdated {
            domain_count: domains.len(),
        });
        self.emit(CoreEvent::BlocklistUpdated { domains });
        self.settings.view()
    }

    // Navigation

    /// A tab finished loading `url`
    pub fn navigate(&mut self, tab_id: TabId, url: &str, now: DateTime<Local>) -> NavigationDecision {
        if let Err(e) = self.observe_block(now) {
            debug!(error = %e, "Block state unreadable before navigation");
        }

        let (decision, effects) = self.monitor.on_navigation(tab_id, url, now);

        if let NavigationDecision::Block { domain } = &decision {
            self.emit(CoreEvent::SiteBlocked {
                domain: domain.clone(),
            });
        }
        if effects.attempt_recorded || !effects.closed.is_empty() {
            self.stats_changed(now);
        }
        decision
    }

    pub fn tab_closed(&mut self, tab_id: TabId, now: DateTime<Local>) {
        if self.monitor.on_tab_closed(tab_id, now).is_some() {
            self.stats_changed(now);
        }
    }

    /// Record a blocked entry attempt reported by a collaborator
    pub fn track_visit(&mut self, raw: &str, now: DateTime<Local>) -> Result<TodayStats> {
        let domain = Domain::new(raw);
        if domain.as_str().is_empty() {
            return Err(FocusError::invalid_domain("domain cannot be empty"));
        }

        let today = self.recorder.record_entry_attempt(&domain, true, false, now)?;
        self.current_day = Some(DayKey::of(&now));
        self.emit(CoreEvent::StatsUpdated(today));
        Ok(today)
    }

    // Access ledger

    /// Grant access from the block screen. Counts as a break.
    pub fn grant_access(
        &mut self,
        raw_domain: &str,
        duration: &str,
        now: DateTime<Local>,
    ) -> Result<(Domain, Remaining)> {
        let domain = validate_host(raw_domain)?;
        let duration = parse_grant_duration(duration)?;

        let grant = self.ledger.grant(&domain, duration, now)?;
        self.audit(AuditEventType::AccessGranted {
            domain: domain.clone(),
            allowed_until: grant.allowed_until,
        });
        self.emit(CoreEvent::AccessGranted {
            domain: domain.clone(),
            allowed_until: grant.allowed_until,
        });

        match self.recorder.record_break(now) {
            Ok(today) => {
                self.current_day = Some(DayKey::of(&now));
                self.emit(CoreEvent::StatsUpdated(today));
            }
            Err(e) => warn!(domain = %domain, error = %e, "Failed to record break"),
        }

        let remaining = crate::grant_remaining(&grant, now);
        Ok((domain, remaining))
    }

    /// Delete a grant and close any session it was carrying
    pub fn revoke_access(&mut self, raw_domain: &str, now: DateTime<Local>) -> Result<Domain> {
        let domain = Domain::new(raw_domain);
        if !self.ledger.revoke(&domain)? {
            debug!(domain = %domain, "No grant to revoke");
            return Ok(domain);
        }

        self.audit(AuditEventType::AccessRevoked {
            domain: domain.clone(),
        });
        self.emit(CoreEvent::AccessRevoked {
            domain: domain.clone(),
        });

        self.monitor.forget_domain(&domain);
        match self.recorder.close_session(&domain, now) {
            Ok(0) => {}
            Ok(_) => self.stats_changed(now),
            Err(e) => warn!(domain = %domain, error = %e, "Failed to close session on revoke"),
        }
        Ok(domain)
    }

    /// Everything the interstitial shows for a blocked domain
    pub fn block_screen(&self, raw_domain: &str, now: DateTime<Local>) -> Result<BlockScreen> {
        let domain = Domain::new(raw_domain);
        if domain.as_str().is_empty() {
            return Err(FocusError::invalid_domain("domain cannot be empty"));
        }

        let message = self.settings.pick_message().unwrap_or_else(|e| {
            warn!(error = %e, "Messages unreadable");
            self.policy
                .motivational_messages
                .first()
                .cloned()
                .unwrap_or_default()
        });
        let block_remaining = self.blocker.remaining_minutes(now).unwrap_or_else(|e| {
            warn!(error = %e, "Block state unreadable");
            Remaining::Minutes(0)
        });
        let today = self.recorder.today(now).unwrap_or_else(|e| {
            warn!(error = %e, "Usage unreadable");
            TodayStats::default()
        });

        Ok(BlockScreen {
            domain,
            message,
            block_remaining,
            today,
        })
    }

    // Statistics

    pub fn today_stats(&self, now: DateTime<Local>) -> Result<TodayStats> {
        self.recorder.today(now)
    }

    pub fn report(&self, view: ReportView, now: DateTime<Local>) -> Result<UsageReport> {
        let stats = self.recorder.usage_stats()?;
        Ok(build_report(&stats, view, now.date_naive()))
    }

    pub fn export_usage(&self) -> Result<String> {
        export_json(&self.recorder.usage_stats()?)
    }

    pub fn clear_usage(&mut self, now: DateTime<Local>) -> Result<()> {
        self.recorder.clear()?;
        self.monitor.reset();
        self.audit(AuditEventType::UsageCleared);
        info!("Usage statistics cleared");
        self.stats_changed(now);
        Ok(())
    }

    // Periodic work

    /// Credit open sessions, close those whose grant lapsed, prune the
    /// ledger and roll today's totals over at midnight.
    pub fn tick(&mut self, now: DateTime<Local>) {
        if let Err(e) = self.observe_block(now) {
            warn!(error = %e, "Block state unreadable during tick");
        }

        let mut usage_changed = false;
        match self.recorder.poll_active_sessions(now, &self.ledger) {
            Ok(outcome) => {
                for domain in outcome.closed {
                    info!(domain = %domain, "Grant lapsed, session closed");
                    self.monitor.forget_domain(&domain);
                    self.emit(CoreEvent::AccessRevoked { domain });
                    usage_changed = true;
                }
                usage_changed |= outcome.credited_minutes > 0;
            }
            Err(e) => warn!(error = %e, "Failed to poll active sessions"),
        }

        if self.policy.service.prune_expired_grants
            && let Err(e) = self.ledger.prune_expired(now)
        {
            warn!(error = %e, "Failed to prune expired grants");
        }

        let day = DayKey::of(&now);
        if usage_changed || self.current_day.as_ref() != Some(&day) {
            self.stats_changed(now);
        }
    }

    // Introspection

    /// Full snapshot; unreadable parts degrade to empty values
    pub fn get_state(&mut self, now: DateTime<Local>) -> ServiceStateSnapshot {
        let (block_state, block_remaining) = self.block_status(now).unwrap_or_else(|e| {
            warn!(error = %e, "Block state unreadable");
            (BlockState::Inactive, Remaining::Minutes(0))
        });

        ServiceStateSnapshot {
            api_version: API_VERSION,
            block_state,
            block_remaining,
            blocked_domains: self.settings.blocked_domains().unwrap_or_default(),
            active_grants: self.ledger.active_grants(now).unwrap_or_default(),
            today: self.recorder.today(now).unwrap_or_default(),
        }
    }

    pub fn is_store_healthy(&self) -> bool {
        self.store.is_healthy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::{MockAlarms, STOP_BLOCKING_ALARM};
    use crate::testing::at;
    use focusguard_store::SqliteStore;

    fn engine() -> (CoreEngine, Arc<MockAlarms>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let alarms = Arc::new(MockAlarms::new());
        let mut engine = CoreEngine::new(Policy::default(), store.clone(), alarms.clone());
        engine.initialize(at(2025, 3, 10, 8, 0, 0));
        (engine, alarms, store)
    }

    fn t(h: u32, m: u32) -> DateTime<Local> {
        at(2025, 3, 10, h, m, 0)
    }

    #[test]
    fn first_run_seeds_blocklist() {
        let (mut engine, _, store) = engine();
        assert_eq!(store.get_blocked_domains().unwrap().len(), 10);

        let audits = store.get_recent_audits(10).unwrap();
        assert!(audits
            .iter()
            .any(|a| matches!(a.event, AuditEventType::SettingsSeeded { site_count: 10 })));

        let state = engine.get_state(t(9, 0));
        assert_eq!(state.block_state, BlockState::Inactive);
    }

    #[test]
    fn block_lifecycle_emits_events() {
        let (mut engine, alarms, _) = engine();

        engine.start_blocking(10, t(9, 0)).unwrap();
        engine.extend_blocking(5, t(9, 1)).unwrap();
        assert_eq!(alarms.scheduled(STOP_BLOCKING_ALARM), Some(t(9, 15)));

        let state = engine.on_stop_blocking_alarm(t(9, 15)).unwrap();
        assert_eq!(state, BlockState::Inactive);

        let events = engine.drain_events();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            CoreEvent::BlockingChanged {
                state: BlockState::Inactive
            }
        );
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn invalid_duration_commits_nothing() {
        let (mut engine, _, store) = engine();
        let err = engine.start_blocking(0, t(9, 0)).unwrap_err();
        assert!(err.is_validation());
        assert!(!store.get_block_session().unwrap().is_blocking);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn grant_from_block_screen_lets_site_through() {
        let (mut engine, _, _) = engine();
        engine.start_blocking(60, t(9, 0)).unwrap();

        let decision = engine.navigate(TabId(3), "https://www.youtube.com/", t(9, 1));
        assert!(matches!(decision, NavigationDecision::Block { .. }));

        let screen = engine.block_screen("youtube.com", t(9, 1)).unwrap();
        assert_eq!(screen.block_remaining, Remaining::Minutes(59));
        assert_eq!(screen.today.blocks, 1);
        assert!(!screen.message.is_empty());

        let (domain, remaining) = engine.grant_access("youtube.com", "5", t(9, 2)).unwrap();
        assert_eq!(domain.as_str(), "youtube.com");
        assert_eq!(remaining, Remaining::Minutes(5));
        assert_eq!(engine.today_stats(t(9, 2)).unwrap().breaks, 1);

        let decision = engine.navigate(TabId(3), "https://www.youtube.com/", t(9, 2));
        assert_eq!(decision, NavigationDecision::Track { domain: domain.clone() });

        // Grant lapses at 9:07; the poll closes the session
        engine.drain_events();
        engine.tick(t(9, 8));
        let events = engine.drain_events();
        assert!(events.contains(&CoreEvent::AccessRevoked { domain: domain.clone() }));

        let report = engine.report(ReportView::Daily, t(9, 8)).unwrap();
        assert_eq!(report.top_domains[0].minutes, 6);
    }

    #[test]
    fn bad_grant_requests_rejected() {
        let (mut engine, _, _) = engine();
        assert!(matches!(
            engine.grant_access("youtube.com", "never", t(9, 0)),
            Err(FocusError::InvalidDuration(_))
        ));
        assert!(matches!(
            engine.grant_access("not a domain", "5", t(9, 0)),
            Err(FocusError::InvalidDomain(_))
        ));
    }

    #[test]
    fn any_blocked_subdomain_can_be_granted() {
        let (mut engine, _, _) = engine();
        engine.start_blocking(60, t(9, 0)).unwrap();

        for (tab, url, host) in [
            (1, "https://my_team.facebook.com/", "my_team.facebook.com"),
            (2, "https://xn--80ak6aa92e.reddit.com/r/rust", "xn--80ak6aa92e.reddit.com"),
        ] {
            let decision = engine.navigate(TabId(tab), url, t(9, 1));
            assert_eq!(decision, NavigationDecision::Block { domain: Domain::new(host) });

            let (domain, _) = engine.grant_access(host, "5", t(9, 1)).unwrap();
            assert_eq!(domain.as_str(), host);

            let decision = engine.navigate(TabId(tab), url, t(9, 2));
            assert_eq!(decision, NavigationDecision::Track { domain });
        }
    }

    #[test]
    fn trailing_dot_host_is_still_blocked() {
        let (mut engine, _, _) = engine();
        engine.start_blocking(60, t(9, 0)).unwrap();

        let decision = engine.navigate(TabId(1), "https://facebook.com./", t(9, 1));
        assert_eq!(
            decision,
            NavigationDecision::Block { domain: Domain::new("facebook.com") }
        );
    }

    #[test]
    fn revoke_closes_open_session() {
        let (mut engine, _, _) = engine();
        engine.start_blocking(60, t(9, 0)).unwrap();
        engine.grant_access("reddit.com", "forever", t(9, 0)).unwrap();
        engine.navigate(TabId(1), "https://reddit.com/", t(9, 0));

        engine.revoke_access("reddit.com", t(9, 4)).unwrap();
        assert_eq!(engine.today_stats(t(9, 4)).unwrap().time_spent, 4);

        let decision = engine.navigate(TabId(1), "https://reddit.com/r/rust", t(9, 5));
        assert!(matches!(decision, NavigationDecision::Block { .. }));
    }

    #[test]
    fn settings_changes_publish_blocklist() {
        let (mut engine, _, _) = engine();
        engine.drain_events();

        let view = engine.add_custom_site("news.example.com").unwrap();
        assert!(view.blocked_domains.contains(&Domain::new("news.example.com")));
        assert!(matches!(
            engine.drain_events().as_slice(),
            [CoreEvent::BlocklistUpdated { .. }]
        ));

        let view = engine.set_site_enabled("facebook.com", false).unwrap();
        assert!(!view.blocked_domains.contains(&Domain::new("facebook.com")));

        let view = engine.reset_settings().unwrap();
        assert_eq!(view.blocked_domains.len(), 10);
        assert!(view.custom_sites.is_empty());
    }

    #[test]
    fn track_visit_counts_a_block() {
        let (mut engine, _, _) = engine();
        let today = engine.track_visit("www.tiktok.com", t(9, 0)).unwrap();
        assert_eq!(today.blocks, 1);
        assert!(engine.track_visit("  ", t(9, 0)).is_err());
    }

    #[test]
    fn clear_usage_zeroes_today() {
        let (mut engine, _, store) = engine();
        engine.track_visit("reddit.com", t(9, 0)).unwrap();

        engine.clear_usage(t(9, 1)).unwrap();
        assert_eq!(store.get_today_stats().unwrap(), TodayStats::default());
        assert_eq!(engine.export_usage().unwrap(), "{}");
    }

    #[test]
    fn tick_rolls_over_at_midnight() {
        let (mut engine, _, _) = engine();
        engine.track_visit("reddit.com", t(23, 0)).unwrap();
        engine.drain_events();

        engine.tick(t(23, 30));
        assert!(engine.drain_events().is_empty());

        engine.tick(at(2025, 3, 11, 0, 1, 0));
        assert_eq!(
            engine.drain_events(),
            vec![CoreEvent::StatsUpdated(TodayStats::default())]
        );
    }
}
