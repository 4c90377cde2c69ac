//! Core events emitted by the engine

use chrono::{DateTime, Local};
use focusguard_api::{BlockState, TodayStats};
use focusguard_util::Domain;

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    /// Block session changed: started, stopped, extended or expired
    BlockingChanged { state: BlockState },

    /// A navigation was blocked
    SiteBlocked { domain: Domain },

    /// Access granted; `allowed_until == None` is permanent
    AccessGranted {
        domain: Domain,
        allowed_until: Option<DateTime<Local>>,
    },

    /// Access revoked by command, or lapsed while a session was open
    AccessRevoked { domain: Domain },

    /// Effective blocklist recomputed
    BlocklistUpdated { domains: Vec<Domain> },

    /// Today's totals changed
    StatsUpdated(TodayStats),
}
