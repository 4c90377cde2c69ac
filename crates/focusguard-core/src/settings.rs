//! User settings: built-in sites, custom sites and motivational messages

use focusguard_api::{BlockedSite, SettingsView};
use focusguard_config::Policy;
use focusguard_store::Store;
use focusguard_util::{validate_domain, Domain, FocusError, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::blocklist::compute_effective_blocklist;

/// Shown when no messages are configured
const FALLBACK_MESSAGE: &str = "Stay focused!";

#[derive(Clone)]
pub struct SettingsManager {
    store: Arc<dyn Store>,
    defaults_sites: Vec<BlockedSite>,
    defaults_custom: Vec<Domain>,
    defaults_messages: Vec<String>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn Store>, policy: &Policy) -> Self {
        Self {
            store,
            defaults_sites: policy.sites.clone(),
            defaults_custom: policy.custom_sites.clone(),
            defaults_messages: policy.motivational_messages.clone(),
        }
    }

    /// Write the configured defaults if nothing was ever stored.
    /// Returns whether seeding happened.
    pub fn seed_if_first_run(&self) -> Result<bool> {
        if self.store.get_blocked_sites()?.is_some() {
            return Ok(false);
        }

        self.store.set_blocked_sites(&self.defaults_sites)?;
        self.store.set_custom_sites(&self.defaults_custom)?;
        self.store.set_motivational_messages(&self.defaults_messages)?;
        self.update_effective_blocklist()?;

        info!(
            sites = self.defaults_sites.len(),
            custom = self.defaults_custom.len(),
            "Seeded default settings"
        );
        Ok(true)
    }

    fn sites(&self) -> Result<Vec<BlockedSite>> {
        Ok(self.store.get_blocked_sites()?.unwrap_or_default())
    }

    /// Recompute and cache the effective blocklist
    pub fn update_effective_blocklist(&self) -> Result<Vec<Domain>> {
        let sites = self.sites()?;
        let custom = self.store.get_custom_sites()?;

        let domains = compute_effective_blocklist(&sites, &custom);
        self.store.set_blocked_domains(&domains)?;

        debug!(count = domains.len(), "Effective blocklist updated");
        Ok(domains)
    }

    pub fn blocked_domains(&self) -> Result<Vec<Domain>> {
        Ok(self.store.get_blocked_domains()?)
    }

    pub fn view(&self) -> Result<SettingsView> {
        Ok(SettingsView {
            sites: self.sites()?,
            custom_sites: self.store.get_custom_sites()?,
            messages: self.store.get_motivational_messages()?,
            blocked_domains: self.store.get_blocked_domains()?,
        })
    }

    pub fn add_custom_site(&self, raw: &str) -> Result<Domain> {
        let domain = validate_domain(raw)?;
        let mut custom = self.store.get_custom_sites()?;

        if custom.contains(&domain) {
            return Err(FocusError::invalid_domain(format!(
                "{} is already listed",
                domain
            )));
        }

        custom.push(domain.clone());
        self.store.set_custom_sites(&custom)?;
        info!(domain = %domain, "Custom site added");
        Ok(domain)
    }

    /// Returns whether the domain was listed
    pub fn remove_custom_site(&self, raw: &str) -> Result<bool> {
        let domain = Domain::new(raw);
        let mut custom = self.store.get_custom_sites()?;

        let before = custom.len();
        custom.retain(|d| d != &domain);
        if custom.len() == before {
            return Ok(false);
        }

        self.store.set_custom_sites(&custom)?;
        info!(domain = %domain, "Custom site removed");
        Ok(true)
    }

    pub fn set_site_enabled(&self, raw: &str, enabled: bool) -> Result<()> {
        let domain = Domain::new(raw);
        let mut sites = self.sites()?;

        let Some(site) = sites.iter_mut().find(|s| s.domain == domain) else {
            return Err(FocusError::invalid_domain(format!(
                "{} is not a built-in site",
                domain
            )));
        };
        site.enabled = enabled;

        self.store.set_blocked_sites(&sites)?;
        info!(domain = %domain, enabled, "Site toggled");
        Ok(())
    }

    pub fn add_message(&self, message: &str) -> Result<()> {
        let message = message.trim();
        if message.is_empty() {
            return Err(FocusError::invalid_input("message cannot be empty"));
        }

        let mut messages = self.store.get_motivational_messages()?;
        messages.push(message.to_string());
        self.store.set_motivational_messages(&messages)?;
        Ok(())
    }

    pub fn remove_message(&self, index: usize) -> Result<String> {
        let mut messages = self.store.get_motivational_messages()?;
        if index >= messages.len() {
            return Err(FocusError::invalid_input(format!(
                "no message at index {}",
                index
            )));
        }

        let removed = messages.remove(index);
        self.store.set_motivational_messages(&messages)?;
        Ok(removed)
    }

    /// Restore configured sites and messages and clear custom sites
    pub fn reset(&self) -> Result<Vec<Domain>> {
        self.store.set_blocked_sites(&self.defaults_sites)?;
        self.store.set_custom_sites(&[])?;
        self.store.set_motivational_messages(&self.defaults_messages)?;
        info!("Settings reset to defaults");
        self.update_effective_blocklist()
    }

    /// A random motivational message
    pub fn pick_message(&self) -> Result<String> {
        let messages = self.store.get_motivational_messages()?;
        let pool = if messages.is_empty() {
            &self.defaults_messages
        } else {
            &messages
        };

        if pool.is_empty() {
            return Ok(FALLBACK_MESSAGE.to_string());
        }
        Ok(pool[fastrand::usize(..pool.len())].clone())
    }
}
