//! Access ledger: per-domain exceptions to blocking
//!
//! Expiry is lazy. An expired grant stays in the store until a writer
//! prunes it, and every reader treats it as "no access".

use chrono::{DateTime, Local};
use focusguard_api::{AccessGrant, GrantDuration, GrantView, Remaining, SiteAccess};
use focusguard_store::Store;
use focusguard_util::{
    add_minutes, whole_minutes_between, Domain, FocusError, Result, MAX_DURATION_MINUTES,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Parse the textual grant length: `"forever"` or 1 to 1440 minutes
pub fn parse_grant_duration(text: &str) -> Result<GrantDuration> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("forever") {
        return Ok(GrantDuration::Forever);
    }

    let minutes = text.parse::<u32>().map_err(|_| {
        FocusError::invalid_duration(format!(
            "'{}' is neither a number of minutes nor \"forever\"",
            text
        ))
    })?;
    check_grant_minutes(minutes)?;
    Ok(GrantDuration::Minutes(minutes))
}

fn check_grant_minutes(minutes: u32) -> Result<()> {
    if minutes == 0 || minutes > MAX_DURATION_MINUTES {
        return Err(FocusError::invalid_duration(format!(
            "grant of {} minutes is outside 1-{}",
            minutes, MAX_DURATION_MINUTES
        )));
    }
    Ok(())
}

/// Whether `access` lets `domain` through at `now`
pub fn access_allows(access: &SiteAccess, domain: &Domain, now: DateTime<Local>) -> bool {
    access.get(domain).is_some_and(|grant| grant.is_active(now))
}

/// Time left on a grant; expired grants have zero minutes left
pub fn grant_remaining(grant: &AccessGrant, now: DateTime<Local>) -> Remaining {
    match grant.allowed_until {
        None => Remaining::Unlimited,
        Some(until) => Remaining::Minutes(whole_minutes_between(now, until)),
    }
}

#[derive(Clone)]
pub struct AccessLedger {
    store: Arc<dyn Store>,
}

impl AccessLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current ledger contents, expired records included
    pub fn snapshot(&self) -> Result<SiteAccess> {
        Ok(self.store.get_site_access()?)
    }

    /// Grant access to `domain`, replacing any earlier grant
    pub fn grant(
        &self,
        domain: &Domain,
        duration: GrantDuration,
        now: DateTime<Local>,
    ) -> Result<AccessGrant> {
        let allowed_until = match duration {
            GrantDuration::Forever => None,
            GrantDuration::Minutes(minutes) => {
                check_grant_minutes(minutes)?;
                Some(add_minutes(now, minutes))
            }
        };

        let grant = AccessGrant {
            allowed_until,
            allowed_at: now,
        };

        let mut access = self.snapshot()?;
        access.insert(domain.clone(), grant.clone());
        self.store.set_site_access(&access)?;

        info!(domain = %domain, until = ?allowed_until, "Access granted");
        Ok(grant)
    }

    /// Delete the grant for `domain`. Returns whether one existed.
    pub fn revoke(&self, domain: &Domain) -> Result<bool> {
        let mut access = self.snapshot()?;
        let existed = access.remove(domain).is_some();
        if existed {
            self.store.set_site_access(&access)?;
            info!(domain = %domain, "Access revoked");
        }
        Ok(existed)
    }

    pub fn has_access(&self, domain: &Domain, now: DateTime<Local>) -> Result<bool> {
        Ok(access_allows(&self.snapshot()?, domain, now))
    }

    /// No grant means zero minutes
    pub fn remaining_minutes(&self, domain: &Domain, now: DateTime<Local>) -> Result<Remaining> {
        let access = self.snapshot()?;
        Ok(access
            .get(domain)
            .map(|grant| grant_remaining(grant, now))
            .unwrap_or(Remaining::Minutes(0)))
    }

    /// Grants still in force at `now`
    pub fn active_grants(&self, now: DateTime<Local>) -> Result<Vec<GrantView>> {
        let access = self.snapshot()?;
        Ok(access
            .iter()
            .filter(|(_, grant)| grant.is_active(now))
            .map(|(domain, grant)| GrantView {
                domain: domain.clone(),
                remaining: grant_remaining(grant, now),
            })
            .collect())
    }

    /// Drop expired records. Returns the domains removed.
    pub fn prune_expired(&self, now: DateTime<Local>) -> Result<Vec<Domain>> {
        let mut access = self.snapshot()?;
        let expired: Vec<Domain> = access
            .iter()
            .filter(|(_, grant)| !grant.is_active(now))
            .map(|(domain, _)| domain.clone())
            .collect();

        if !expired.is_empty() {
            for domain in &expired {
                access.remove(domain);
            }
            self.store.set_site_access(&access)?;
            debug!(count = expired.len(), "Pruned expired grants");
        }

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, FlakyStore};
    use focusguard_store::SqliteStore;
    use std::sync::atomic::Ordering;

    fn ledger() -> AccessLedger {
        AccessLedger::new(Arc::new(SqliteStore::in_memory().unwrap()))
    }

    #[test]
    fn forever_grant_never_lapses() {
        let ledger = ledger();
        let x = Domain::new("x.com");
        let t0 = at(2025, 3, 10, 9, 0, 0);

        ledger.grant(&x, GrantDuration::Forever, t0).unwrap();
        assert!(ledger.has_access(&x, at(2030, 1, 1, 0, 0, 0)).unwrap());
        assert_eq!(ledger.remaining_minutes(&x, t0).unwrap(), Remaining::Unlimited);

        assert!(ledger.revoke(&x).unwrap());
        assert!(!ledger.has_access(&x, t0).unwrap());
        assert!(!ledger.revoke(&x).unwrap());
    }

    #[test]
    fn timed_grant_lapses() {
        let ledger = ledger();
        let x = Domain::new("x.com");
        let t0 = at(2025, 3, 10, 9, 0, 0);

        ledger.grant(&x, GrantDuration::Minutes(5), t0).unwrap();
        assert!(ledger.has_access(&x, at(2025, 3, 10, 9, 4, 0)).unwrap());
        assert!(!ledger.has_access(&x, at(2025, 3, 10, 9, 5, 0)).unwrap());
        assert!(!ledger.has_access(&x, at(2025, 3, 10, 9, 6, 0)).unwrap());
    }

    #[test]
    fn remaining_is_floored_and_clamped() {
        let ledger = ledger();
        let x = Domain::new("x.com");
        let t0 = at(2025, 3, 10, 9, 0, 0);

        ledger.grant(&x, GrantDuration::Minutes(5), t0).unwrap();
        assert_eq!(
            ledger.remaining_minutes(&x, at(2025, 3, 10, 9, 1, 30)).unwrap(),
            Remaining::Minutes(3)
        );
        assert_eq!(
            ledger.remaining_minutes(&x, at(2025, 3, 10, 10, 0, 0)).unwrap(),
            Remaining::Minutes(0)
        );
        assert_eq!(
            ledger.remaining_minutes(&Domain::new("y.com"), t0).unwrap(),
            Remaining::Minutes(0)
        );
    }

    #[test]
    fn new_grant_replaces_old() {
        let ledger = ledger();
        let x = Domain::new("x.com");
        let t0 = at(2025, 3, 10, 9, 0, 0);

        ledger.grant(&x, GrantDuration::Forever, t0).unwrap();
        ledger.grant(&x, GrantDuration::Minutes(1), t0).unwrap();

        assert_eq!(ledger.snapshot().unwrap().len(), 1);
        assert!(!ledger.has_access(&x, at(2025, 3, 10, 9, 2, 0)).unwrap());
    }

    #[test]
    fn out_of_range_grant_rejected() {
        let ledger = ledger();
        for minutes in [0, 1441] {
            let err = ledger
                .grant(&Domain::new("x.com"), GrantDuration::Minutes(minutes), at(2025, 3, 10, 9, 0, 0))
                .unwrap_err();
            assert!(matches!(err, FocusError::InvalidDuration(_)));
        }
        assert!(ledger.snapshot().unwrap().is_empty());

        ledger
            .grant(&Domain::new("x.com"), GrantDuration::Minutes(1440), at(2025, 3, 10, 9, 0, 0))
            .unwrap();
    }

    #[test]
    fn parse_duration_text() {
        assert_eq!(parse_grant_duration("Forever").unwrap(), GrantDuration::Forever);
        assert_eq!(parse_grant_duration(" 15 ").unwrap(), GrantDuration::Minutes(15));
        assert_eq!(parse_grant_duration("1440").unwrap(), GrantDuration::Minutes(1440));
        assert!(parse_grant_duration("0").is_err());
        assert!(parse_grant_duration("1441").is_err());
        assert!(parse_grant_duration("100000").is_err());
        assert!(parse_grant_duration("-5").is_err());
        assert!(parse_grant_duration("soon").is_err());
    }

    #[test]
    fn prune_keeps_live_grants() {
        let ledger = ledger();
        let t0 = at(2025, 3, 10, 9, 0, 0);
        ledger.grant(&Domain::new("a.com"), GrantDuration::Minutes(1), t0).unwrap();
        ledger.grant(&Domain::new("b.com"), GrantDuration::Forever, t0).unwrap();

        let later = at(2025, 3, 10, 9, 30, 0);
        assert_eq!(ledger.prune_expired(later).unwrap(), vec![Domain::new("a.com")]);
        assert_eq!(ledger.active_grants(later).unwrap().len(), 1);
        assert!(ledger.prune_expired(later).unwrap().is_empty());
    }

    #[test]
    fn unreadable_ledger_is_an_error() {
        let store = Arc::new(FlakyStore::new());
        store.access_broken.store(true, Ordering::SeqCst);
        let ledger = AccessLedger::new(store);

        let err = ledger
            .has_access(&Domain::new("x.com"), at(2025, 3, 10, 9, 0, 0))
            .unwrap_err();
        assert!(matches!(err, FocusError::StorageUnavailable(_)));
    }
}
