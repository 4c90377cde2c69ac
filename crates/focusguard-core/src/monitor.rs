//! Navigation monitor: decides allow / track / block for each page load
//!
//! Failure policy: an unreadable block state or blocklist lets the page
//! through, an unreadable ledger blocks it. Failures while recording
//! usage are logged and never change the decision.

use chrono::{DateTime, Local};
use focusguard_api::{BlockState, NavigationDecision};
use focusguard_store::Store;
use focusguard_util::{host_from_url, is_blocked, Domain, TabId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::blocking::BlockController;
use crate::ledger::AccessLedger;
use crate::usage::UsageRecorder;

/// What happened to usage tracking as a side effect of a navigation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationEffects {
    /// A blocked or allowed entry attempt was written
    pub attempt_recorded: bool,
    /// Sessions closed because their last tab left
    pub closed: Vec<Domain>,
}

pub struct NavigationMonitor {
    store: Arc<dyn Store>,
    blocker: BlockController,
    ledger: AccessLedger,
    recorder: UsageRecorder,
    /// Tabs currently on a tracked domain
    tabs: HashMap<TabId, Domain>,
}

impl NavigationMonitor {
    pub fn new(
        store: Arc<dyn Store>,
        blocker: BlockController,
        ledger: AccessLedger,
        recorder: UsageRecorder,
    ) -> Self {
        Self {
            store,
            blocker,
            ledger,
            recorder,
            tabs: HashMap::new(),
        }
    }

    /// Tabs tracking `domain`
    pub fn tab_count(&self, domain: &Domain) -> usize {
        self.tabs.values().filter(|d| *d == domain).count()
    }

    /// A tab finished loading `url`
    pub fn on_navigation(
        &mut self,
        tab_id: TabId,
        url: &str,
        now: DateTime<Local>,
    ) -> (NavigationDecision, NavigationEffects) {
        let mut effects = NavigationEffects::default();
        let decision = self.decide(url, now, &mut effects);

        let still_tracked = matches!(
            (&decision, self.tabs.get(&tab_id)),
            (NavigationDecision::Track { domain }, Some(prev)) if domain == prev
        );
        if !still_tracked {
            if let Some(closed) = self.release_tab(tab_id, now) {
                effects.closed.push(closed);
            }
            if let NavigationDecision::Track { domain } = &decision {
                self.tabs.insert(tab_id, domain.clone());
            }
        }

        (decision, effects)
    }

    /// A tab went away
    pub fn on_tab_closed(&mut self, tab_id: TabId, now: DateTime<Local>) -> Option<Domain> {
        self.release_tab(tab_id, now)
    }

    /// Stop tracking tabs on `domain` without touching its session
    pub fn forget_domain(&mut self, domain: &Domain) {
        self.tabs.retain(|_, d| d != domain);
    }

    /// Drop every tracked tab
    pub fn reset(&mut self) {
        self.tabs.clear();
    }

    fn decide(
        &self,
        url: &str,
        now: DateTime<Local>,
        effects: &mut NavigationEffects,
    ) -> NavigationDecision {
        let Some(host) = host_from_url(url) else {
            return NavigationDecision::Allow;
        };

        match self.blocker.state(now) {
            Ok(BlockState::Inactive) => return NavigationDecision::Allow,
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Block state unreadable, allowing navigation");
                return NavigationDecision::Allow;
            }
        }

        let blocklist = match self.store.get_blocked_domains() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "Blocklist unreadable, allowing navigation");
                return NavigationDecision::Allow;
            }
        };
        if !is_blocked(&host, &blocklist) {
            return NavigationDecision::Allow;
        }

        let domain = Domain::new(&host);
        let granted = match self.ledger.has_access(&domain, now) {
            Ok(granted) => granted,
            Err(e) => {
                warn!(domain = %domain, error = %e, "Access ledger unreadable, blocking navigation");
                false
            }
        };

        if granted {
            if let Err(e) = self.recorder.start_session(&domain, now) {
                warn!(domain = %domain, error = %e, "Failed to start usage session");
            }
            self.record_attempt(&domain, false, true, now, effects);
            debug!(domain = %domain, "Granted domain, tracking");
            NavigationDecision::Track { domain }
        } else {
            self.record_attempt(&domain, true, false, now, effects);
            debug!(domain = %domain, "Blocked navigation");
            NavigationDecision::Block { domain }
        }
    }

    fn record_attempt(
        &self,
        domain: &Domain,
        blocked: bool,
        allowed: bool,
        now: DateTime<Local>,
        effects: &mut NavigationEffects,
    ) {
        match self.recorder.record_entry_attempt(domain, blocked, allowed, now) {
            Ok(_) => effects.attempt_recorded = true,
            Err(e) => warn!(domain = %domain, error = %e, "Failed to record entry attempt"),
        }
    }

    /// Untrack a tab; closes the domain's session when it was the last tab.
    fn release_tab(&mut self, tab_id: TabId, now: DateTime<Local>) -> Option<Domain> {
        let domain = self.tabs.remove(&tab_id)?;
        if self.tab_count(&domain) > 0 {
            return None;
        }

        match self.recorder.close_session(&domain, now) {
            Ok(minutes) => debug!(domain = %domain, minutes, "Last tab left, session closed"),
            Err(e) => warn!(domain = %domain, error = %e, "Failed to close usage session"),
        }
        Some(domain)
    }
}
