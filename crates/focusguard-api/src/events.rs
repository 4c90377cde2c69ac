//! Event types for focusguard -> collaborator streaming

use chrono::{DateTime, Local};
use focusguard_util::Domain;
use serde::{Deserialize, Serialize};

use crate::{BlockState, TodayStats, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: focusguard_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Block session changed (start, stop, extend, expiry)
    BlockingChanged { state: BlockState },

    /// A navigation was blocked; the renderer should show the interstitial
    SiteBlocked { domain: Domain },

    /// Access was granted for a domain. `allowed_until == None` is permanent.
    AccessGranted {
        domain: Domain,
        allowed_until: Option<DateTime<Local>>,
    },

    /// Access was revoked, or lapsed while a session was open
    AccessRevoked { domain: Domain },

    /// Effective blocklist was recomputed
    BlocklistUpdated { domains: Vec<Domain> },

    /// Today's totals changed
    StatsUpdated(TodayStats),

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::SiteBlocked {
            domain: Domain::new("youtube.com"),
        });

        let json = serde_json::to_string(&event).unwrap();
        let parsed: Event = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(parsed.payload, EventPayload::SiteBlocked { .. }));
    }

    #[test]
    fn stats_event_carries_totals() {
        let event = Event::new(EventPayload::StatsUpdated(TodayStats {
            time_spent: 12,
            visits: 2,
            blocks: 5,
            breaks: 1,
        }));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "stats_updated");
        assert_eq!(json["payload"]["timeSpent"], 12);
    }
}
