//! Usage recorder: visits, entry attempts and time-on-site per local day
//!
//! Accounting is incremental. Each poll credits the whole minutes elapsed
//! since a session's `startTime` and advances `startTime` by exactly that
//! much, so closing a session only ever adds the remainder. Time is
//! credited to the bucket of the day it is observed in; an open session
//! record moves along with it.

use chrono::{DateTime, Local};
use focusguard_api::{DayStats, EntryAttempt, OpenSession, TodayStats, UsageStats};
use focusguard_store::Store;
use focusguard_util::{whole_minutes_between, DayKey, Domain, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ledger::{access_allows, AccessLedger};

/// Result of one polling pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollOutcome {
    pub credited_minutes: u64,
    /// Sessions closed because their grant lapsed
    pub closed: Vec<Domain>,
}

#[derive(Clone)]
pub struct UsageRecorder {
    store: Arc<dyn Store>,
}

impl UsageRecorder {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn usage_stats(&self) -> Result<UsageStats> {
        Ok(self.store.get_usage_stats()?)
    }

    /// Write all buckets and refresh the cached totals for today
    fn commit(&self, stats: &UsageStats, now: DateTime<Local>) -> Result<TodayStats> {
        self.store.set_usage_stats(stats)?;

        let today = summary_for(stats, now);
        if let Err(e) = self.store.set_today_stats(&today) {
            warn!(error = %e, "Failed to refresh today's stats");
        }
        Ok(today)
    }

    /// Log a navigation to a listed domain. Never opens or closes a session.
    pub fn record_entry_attempt(
        &self,
        domain: &Domain,
        blocked: bool,
        allowed: bool,
        now: DateTime<Local>,
    ) -> Result<TodayStats> {
        let mut stats = self.usage_stats()?;
        let day = stats.entry(DayKey::of(&now)).or_default();

        day.entry_attempts.push(EntryAttempt {
            domain: domain.clone(),
            timestamp: now,
            blocked,
            allowed,
        });
        if blocked {
            day.blocks += 1;
        }

        debug!(domain = %domain, blocked, allowed, "Entry attempt recorded");
        self.commit(&stats, now)
    }

    /// Open a tracking interval for `domain`. A second start while one is
    /// open is ignored. Returns whether a session was opened.
    pub fn start_session(&self, domain: &Domain, now: DateTime<Local>) -> Result<bool> {
        let mut stats = self.usage_stats()?;
        if find_session(&stats, domain).is_some() {
            debug!(domain = %domain, "Session already open");
            return Ok(false);
        }

        let day = stats.entry(DayKey::of(&now)).or_default();
        day.active_sessions
            .insert(domain.clone(), OpenSession { start_time: now });
        day.visits += 1;

        self.commit(&stats, now)?;
        debug!(domain = %domain, "Session started");
        Ok(true)
    }

    /// Fold the remaining time of an open session into the totals.
    /// Returns the minutes added; no open session is a no-op.
    pub fn close_session(&self, domain: &Domain, now: DateTime<Local>) -> Result<u64> {
        let mut stats = self.usage_stats()?;
        let Some(minutes) = close_in(&mut stats, domain, now) else {
            return Ok(0);
        };

        self.commit(&stats, now)?;
        debug!(domain = %domain, minutes, "Session closed");
        Ok(minutes)
    }

    /// Credit every open session, closing those whose grant has lapsed
    pub fn poll_active_sessions(
        &self,
        now: DateTime<Local>,
        ledger: &AccessLedger,
    ) -> Result<PollOutcome> {
        let mut stats = self.usage_stats()?;
        let sessions = open_sessions(&stats);
        if sessions.is_empty() {
            return Ok(PollOutcome::default());
        }

        let access = ledger.snapshot()?;
        let today = DayKey::of(&now);
        let mut outcome = PollOutcome::default();

        for (key, domain, session) in sessions {
            if !access_allows(&access, &domain, now) {
                if let Some(minutes) = close_in(&mut stats, &domain, now) {
                    outcome.credited_minutes += minutes;
                }
                outcome.closed.push(domain);
                continue;
            }

            let minutes = whole_minutes_between(session.start_time, now);
            let advanced = OpenSession {
                start_time: session.start_time
                    + chrono::Duration::minutes(i64::try_from(minutes).unwrap_or(i64::MAX)),
            };

            if key != today
                && let Some(old) = stats.get_mut(&key)
            {
                old.active_sessions.remove(&domain);
            }
            stats
                .entry(today.clone())
                .or_default()
                .active_sessions
                .insert(domain.clone(), advanced);

            credit(&mut stats, &today, &domain, minutes);
            outcome.credited_minutes += minutes;
        }

        self.commit(&stats, now)?;
        debug!(
            credited = outcome.credited_minutes,
            closed = outcome.closed.len(),
            "Polled active sessions"
        );
        Ok(outcome)
    }

    /// The user let a blocked site through from the block screen
    pub fn record_break(&self, now: DateTime<Local>) -> Result<TodayStats> {
        let mut stats = self.usage_stats()?;
        stats.entry(DayKey::of(&now)).or_default().breaks += 1;
        self.commit(&stats, now)
    }

    /// Today's totals, recomputed from the buckets and re-cached
    pub fn today(&self, now: DateTime<Local>) -> Result<TodayStats> {
        let stats = self.usage_stats()?;
        let today = summary_for(&stats, now);
        if let Err(e) = self.store.set_today_stats(&today) {
            warn!(error = %e, "Failed to refresh today's stats");
        }
        Ok(today)
    }

    /// Domains with an open session, across all buckets
    pub fn open_domains(&self) -> Result<Vec<Domain>> {
        Ok(open_sessions(&self.usage_stats()?)
            .into_iter()
            .map(|(_, domain, _)| domain)
            .collect())
    }

    /// Close every open session, crediting the remainders
    pub fn close_all_sessions(&self, now: DateTime<Local>) -> Result<u64> {
        let mut stats = self.usage_stats()?;
        let sessions = open_sessions(&stats);
        if sessions.is_empty() {
            return Ok(0);
        }

        let total = sessions
            .iter()
            .filter_map(|(_, domain, _)| close_in(&mut stats, domain, now))
            .sum();
        self.commit(&stats, now)?;
        Ok(total)
    }

    /// Forget open sessions without crediting them. Used at startup, when
    /// no tab can still be holding them.
    pub fn drop_open_sessions(&self, now: DateTime<Local>) -> Result<usize> {
        let mut stats = self.usage_stats()?;
        let mut dropped = 0;
        for day in stats.values_mut() {
            dropped += day.active_sessions.len();
            day.active_sessions.clear();
        }

        if dropped > 0 {
            self.commit(&stats, now)?;
        }
        Ok(dropped)
    }

    /// Delete all buckets and zero today's totals
    pub fn clear(&self) -> Result<()> {
        self.store.set_usage_stats(&UsageStats::new())?;
        self.store.set_today_stats(&TodayStats::default())?;
        Ok(())
    }
}

fn summary_for(stats: &UsageStats, now: DateTime<Local>) -> TodayStats {
    stats
        .get(&DayKey::of(&now))
        .map(DayStats::summary)
        .unwrap_or_default()
}

fn find_session(stats: &UsageStats, domain: &Domain) -> Option<DayKey> {
    stats
        .iter()
        .find(|(_, day)| day.active_sessions.contains_key(domain))
        .map(|(key, _)| key.clone())
}

fn open_sessions(stats: &UsageStats) -> Vec<(DayKey, Domain, OpenSession)> {
    stats
        .iter()
        .flat_map(|(key, day)| {
            day.active_sessions
                .iter()
                .map(move |(domain, session)| (key.clone(), domain.clone(), *session))
        })
        .collect()
}

fn credit(stats: &mut UsageStats, day: &DayKey, domain: &Domain, minutes: u64) {
    if minutes == 0 {
        return;
    }
    let bucket = stats.entry(day.clone()).or_default();
    bucket.time_spent += minutes;
    *bucket.domain_usage.entry(domain.clone()).or_insert(0) += minutes;
}

fn close_in(stats: &mut UsageStats, domain: &Domain, now: DateTime<Local>) -> Option<u64> {
    let key = find_session(stats, domain)?;
    let session = stats.get_mut(&key)?.active_sessions.remove(domain)?;

    let minutes = whole_minutes_between(session.start_time, now);
    credit(stats, &DayKey::of(&now), domain, minutes);
    Some(minutes)
}
