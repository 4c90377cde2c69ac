//! Command types for the focusguard protocol

use focusguard_util::{ClientId, Domain, TabId};
use serde::{Deserialize, Serialize};

use crate::{
    BlockScreen, BlockState, HealthStatus, NavigationDecision, Remaining, ReportView,
    ServiceStateSnapshot, SettingsView, TodayStats, UsageReport, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    InvalidDuration,
    InvalidDomain,
    StorageUnavailable,
    InternalError,
}

/// All commands UI collaborators may send
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Get current service state
    GetState,

    // Block controller

    /// Start (or restart) a timed block, in minutes
    StartBlocking { duration: i64 },

    /// Stop blocking
    StopBlocking,

    /// Push the end of a timed block further out, in minutes
    ExtendBlocking { duration: i64 },

    // Blocklist and settings

    /// Recompute the effective blocklist from sites and custom sites
    UpdateBlockingRules,

    GetSettings,

    AddCustomSite { domain: String },

    RemoveCustomSite { domain: String },

    SetSiteEnabled { domain: String, enabled: bool },

    AddMessage { message: String },

    RemoveMessage { index: usize },

    /// Restore configured sites and messages, clear custom sites
    ResetSettings,

    // Navigation

    /// Record a blocked entry attempt for a domain
    TrackVisit { domain: String },

    /// A tab finished navigating to `url`
    Navigate { tab_id: TabId, url: String },

    /// A tab was closed
    TabClosed { tab_id: TabId },

    // Access ledger

    /// Allow a domain for `duration` minutes, or `"forever"`
    GrantAccess { domain: String, duration: String },

    RevokeAccess { domain: String },

    /// Everything the interstitial needs for a blocked domain
    GetBlockScreen { domain: String },

    // Statistics

    GetTodayStats,

    GetReport { view: ReportView },

    /// Dump all usage buckets as pretty JSON
    ExportUsage,

    /// Delete all usage buckets
    ClearUsage,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    State(ServiceStateSnapshot),
    Blocking {
        state: BlockState,
        remaining: Remaining,
    },
    Blocklist {
        domains: Vec<Domain>,
    },
    Settings(SettingsView),
    Navigation {
        decision: NavigationDecision,
    },
    Granted {
        domain: Domain,
        remaining: Remaining,
    },
    Revoked {
        domain: Domain,
    },
    BlockScreen(BlockScreen),
    Today(TodayStats),
    Report(UsageReport),
    Export {
        json: String,
    },
    Ack,
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new() -> Self {
        Self {
            client_id: ClientId::new(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(1, Command::StartBlocking { duration: 25 });
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""type":"start_blocking""#));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::StartBlocking { duration: 25 }));
    }

    #[test]
    fn collaborator_message_shape() {
        // What a browser-side collaborator writes on the wire
        let line = r#"{"request_id":7,"api_version":1,"command":{"type":"track_visit","domain":"www.reddit.com"}}"#;
        let parsed: Request = serde_json::from_str(line).unwrap();
        match parsed.command {
            Command::TrackVisit { domain } => assert_eq!(domain, "www.reddit.com"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            3,
            ErrorInfo::new(ErrorCode::InvalidDuration, "must be between 1 and 1440 minutes"),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("invalid_duration"));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed.result, ResponseResult::Err(ref e) if e.code == ErrorCode::InvalidDuration));
    }
}
