//! Named one-shot wake-ups

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Mutex;

/// Name of the wake-up that ends a timed block
pub const STOP_BLOCKING_ALARM: &str = "stopBlocking";

/// Scheduler for named one-shot wake-ups.
///
/// Scheduling a name that is already pending replaces it. When an alarm
/// fires, the owner is expected to call back into the engine.
pub trait Alarms: Send + Sync {
    fn schedule(&self, name: &str, at: DateTime<Local>);

    fn cancel(&self, name: &str);
}

/// In-memory alarms that only record what was asked of them
#[derive(Debug, Default)]
pub struct MockAlarms {
    pending: Mutex<HashMap<String, DateTime<Local>>>,
}

impl MockAlarms {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `name` is due, if scheduled
    pub fn scheduled(&self, name: &str) -> Option<DateTime<Local>> {
        self.pending
            .lock()
            .ok()
            .and_then(|pending| pending.get(name).copied())
    }
}

impl Alarms for MockAlarms {
    fn schedule(&self, name: &str, at: DateTime<Local>) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(name.to_string(), at);
        }
    }

    fn cancel(&self, name: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(name);
        }
    }
}
