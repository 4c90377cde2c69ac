//! Named wake-ups backed by tokio timers

use chrono::{DateTime, Local};
use focusguard_core::Alarms;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Each alarm is a sleeping task that sends its name to the service loop.
/// Scheduling a name again aborts the earlier task.
pub struct TokioAlarms {
    runtime: Handle,
    fired_tx: mpsc::UnboundedSender<String>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioAlarms {
    /// Must be created inside the runtime
    pub fn new(fired_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            runtime: Handle::current(),
            fired_tx,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Alarms for TokioAlarms {
    fn schedule(&self, name: &str, at: DateTime<Local>) {
        let delay = (at - focusguard_util::now()).to_std().unwrap_or_default();
        let fired_tx = self.fired_tx.clone();
        let alarm = name.to_string();

        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = fired_tx.send(alarm);
        });

        if let Some(previous) = self.pending().insert(name.to_string(), task) {
            previous.abort();
        }
        debug!(alarm = name, at = %at, delay_secs = delay.as_secs(), "Alarm scheduled");
    }

    fn cancel(&self, name: &str) {
        if let Some(task) = self.pending().remove(name) {
            task.abort();
            debug!(alarm = name, "Alarm cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use focusguard_core::STOP_BLOCKING_ALARM;

    #[tokio::test]
    async fn past_deadline_fires_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let alarms = TokioAlarms::new(tx);

        alarms.schedule(STOP_BLOCKING_ALARM, focusguard_util::now() - Duration::minutes(1));
        assert_eq!(rx.recv().await.as_deref(), Some(STOP_BLOCKING_ALARM));
    }

    #[tokio::test]
    async fn rescheduling_replaces_earlier_alarm() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let alarms = TokioAlarms::new(tx);

        alarms.schedule(STOP_BLOCKING_ALARM, focusguard_util::now() + Duration::hours(1));
        alarms.schedule(STOP_BLOCKING_ALARM, focusguard_util::now());

        assert_eq!(rx.recv().await.as_deref(), Some(STOP_BLOCKING_ALARM));
        assert_eq!(alarms.pending().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_alarm_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let alarms = TokioAlarms::new(tx);

        alarms.schedule(STOP_BLOCKING_ALARM, focusguard_util::now() + Duration::milliseconds(50));
        alarms.cancel(STOP_BLOCKING_ALARM);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(waited.is_err());
    }
}
