//! Audit event types

use chrono::{DateTime, Local};
use focusguard_util::Domain;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Defaults written on first run
    SettingsSeeded { site_count: usize },

    /// Timed block started (or restarted)
    BlockingStarted { until: DateTime<Local> },

    /// Block end pushed out
    BlockingExtended { until: DateTime<Local> },

    /// Block stopped by a command
    BlockingStopped,

    /// Timed block reached its end
    BlockingExpired,

    /// Access granted; `None` is permanent
    AccessGranted {
        domain: Domain,
        allowed_until: Option<DateTime<Local>>,
    },

    /// Access revoked
    AccessRevoked { domain: Domain },

    /// Effective blocklist recomputed
    BlocklistUpdated { domain_count: usize },

    /// All usage buckets deleted
    UsageCleared,

    /// Client connected
    ClientConnected { client_id: String, uid: Option<u32> },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: focusguard_util::now(),
            event,
        }
    }
}
