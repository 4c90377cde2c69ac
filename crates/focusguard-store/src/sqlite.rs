//! SQLite-based store implementation

use chrono::{DateTime, Local};
use focusguard_api::{BlockSession, BlockedSite, SiteAccess, TodayStats, UsageStats};
use focusguard_util::Domain;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult};

const KEY_BLOCKED_SITES: &str = "blockedSites";
const KEY_CUSTOM_SITES: &str = "customSites";
const KEY_BLOCKED_DOMAINS: &str = "blockedDomains";
const KEY_MESSAGES: &str = "motivationalMessages";
const KEY_BLOCK_SESSION: &str = "blockSession";
const KEY_SITE_ACCESS: &str = "siteAccess";
const KEY_USAGE_STATS: &str = "usageStats";
const KEY_TODAY_STATS: &str = "todayStats";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- One JSON document per persisted entity
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let conn = self.conn()?;

        let json: Option<String> = conn
            .query_row("SELECT value_json FROM kv WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let json = serde_json::to_string(value)?;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO kv (key, value_json)
            VALUES (?, ?)
            ON CONFLICT(key)
            DO UPDATE SET value_json = excluded.value_json
            "#,
            params![key, json],
        )?;

        debug!(key, bytes = json.len(), "Value stored");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let event_json = serde_json::to_string(&event.event)?;
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp_str)
                .map(|dt| dt.with_timezone(&Local))
                .unwrap_or_else(|_| focusguard_util::now());
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn get_blocked_sites(&self) -> StoreResult<Option<Vec<BlockedSite>>> {
        self.get_json(KEY_BLOCKED_SITES)
    }

    fn set_blocked_sites(&self, sites: &[BlockedSite]) -> StoreResult<()> {
        self.set_json(KEY_BLOCKED_SITES, sites)
    }

    fn get_custom_sites(&self) -> StoreResult<Vec<Domain>> {
        Ok(self.get_json(KEY_CUSTOM_SITES)?.unwrap_or_default())
    }

    fn set_custom_sites(&self, domains: &[Domain]) -> StoreResult<()> {
        self.set_json(KEY_CUSTOM_SITES, domains)
    }

    fn get_blocked_domains(&self) -> StoreResult<Vec<Domain>> {
        Ok(self.get_json(KEY_BLOCKED_DOMAINS)?.unwrap_or_default())
    }

    fn set_blocked_domains(&self, domains: &[Domain]) -> StoreResult<()> {
        self.set_json(KEY_BLOCKED_DOMAINS, domains)
    }

    fn get_motivational_messages(&self) -> StoreResult<Vec<String>> {
        Ok(self.get_json(KEY_MESSAGES)?.unwrap_or_default())
    }

    fn set_motivational_messages(&self, messages: &[String]) -> StoreResult<()> {
        self.set_json(KEY_MESSAGES, messages)
    }

    fn get_block_session(&self) -> StoreResult<BlockSession> {
        Ok(self.get_json(KEY_BLOCK_SESSION)?.unwrap_or_default())
    }

    fn set_block_session(&self, session: &BlockSession) -> StoreResult<()> {
        self.set_json(KEY_BLOCK_SESSION, session)
    }

    fn get_site_access(&self) -> StoreResult<SiteAccess> {
        Ok(self.get_json(KEY_SITE_ACCESS)?.unwrap_or_default())
    }

    fn set_site_access(&self, access: &SiteAccess) -> StoreResult<()> {
        self.set_json(KEY_SITE_ACCESS, access)
    }

    fn get_usage_stats(&self) -> StoreResult<UsageStats> {
        Ok(self.get_json(KEY_USAGE_STATS)?.unwrap_or_default())
    }

    fn set_usage_stats(&self, stats: &UsageStats) -> StoreResult<()> {
        self.set_json(KEY_USAGE_STATS, stats)
    }

    fn get_today_stats(&self) -> StoreResult<TodayStats> {
        Ok(self.get_json(KEY_TODAY_STATS)?.unwrap_or_default())
    }

    fn set_today_stats(&self, stats: &TodayStats) -> StoreResult<()> {
        self.set_json(KEY_TODAY_STATS, stats)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}
