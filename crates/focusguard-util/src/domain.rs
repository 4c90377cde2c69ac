//! Domain normalization and blocklist matching

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{FocusError, Result};

/// Longest hostname accepted by `validate_domain`
pub const MAX_DOMAIN_LEN: usize = 253;

/// URL schemes that belong to the browser itself and are never blocked
const INTERNAL_SCHEMES: &[&str] = &["chrome", "chrome-extension", "about", "moz-extension", "edge"];

/// A normalized hostname. The identity key for sites, grants and usage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(String);

impl Domain {
    /// Normalize `raw` into a domain. Does not validate; see `validate_domain`.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `host` is this domain or one of its subdomains
    pub fn covers(&self, host: &str) -> bool {
        if self.0.is_empty() {
            return false;
        }
        host == self.0
            || (host.len() > self.0.len()
                && host.ends_with(self.0.as_str())
                && host.as_bytes()[host.len() - self.0.len() - 1] == b'.')
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Domain {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Lowercase, then strip scheme, leading `www.`, path and trailing slashes or dots.
pub fn normalize(raw: &str) -> String {
    let lowered = raw.trim().to_ascii_lowercase();
    let mut rest = lowered.as_str();

    for scheme in ["https://", "http://"] {
        if let Some(stripped) = rest.strip_prefix(scheme) {
            rest = stripped;
            break;
        }
    }
    if let Some(stripped) = rest.strip_prefix("www.") {
        rest = stripped;
    }
    if let Some(slash) = rest.find('/') {
        rest = &rest[..slash];
    }

    rest.trim_end_matches(['/', '.']).to_string()
}

/// Whether `hostname` is covered by any entry of `blocklist`.
///
/// Both sides are normalized, so `www.facebook.com` and `facebook.com`
/// match each other. An empty blocklist never blocks.
pub fn is_blocked<'a, I>(hostname: &str, blocklist: I) -> bool
where
    I: IntoIterator<Item = &'a Domain>,
{
    let host = normalize(hostname);
    if host.is_empty() {
        return false;
    }
    blocklist.into_iter().any(|d| d.covers(&host))
}

/// Normalize `raw` and check it is a plausible public hostname
pub fn validate_domain(raw: &str) -> Result<Domain> {
    let normalized = normalize(raw);

    if normalized.is_empty() {
        return Err(FocusError::invalid_domain("domain cannot be empty"));
    }
    if normalized.len() > MAX_DOMAIN_LEN {
        return Err(FocusError::invalid_domain(format!(
            "'{}' exceeds {} characters",
            normalized, MAX_DOMAIN_LEN
        )));
    }

    let labels: Vec<&str> = normalized.split('.').collect();
    if labels.len() < 2 {
        return Err(FocusError::invalid_domain(format!(
            "'{}' needs at least one dot",
            normalized
        )));
    }

    let (tld, rest) = labels.split_last().unwrap_or((&"", &[]));
    for label in rest {
        if !is_valid_label(label) {
            return Err(FocusError::invalid_domain(format!(
                "'{}' has an invalid label '{}'",
                normalized, label
            )));
        }
    }
    if tld.len() < 2 || !tld.bytes().all(|b| b.is_ascii_lowercase()) {
        return Err(FocusError::invalid_domain(format!(
            "'{}' must end in a top-level domain of two or more letters",
            normalized
        )));
    }

    Ok(Domain(normalized))
}

/// Normalize `raw` and check it is a hostname the monitor could have keyed a
/// block on. Looser than `validate_domain`: underscores, punycode `xn--`
/// labels and single-label hosts are accepted.
pub fn validate_host(raw: &str) -> Result<Domain> {
    let normalized = normalize(raw);

    if normalized.is_empty() {
        return Err(FocusError::invalid_domain("domain cannot be empty"));
    }
    if normalized.len() > MAX_DOMAIN_LEN {
        return Err(FocusError::invalid_domain(format!(
            "'{}' exceeds {} characters",
            normalized, MAX_DOMAIN_LEN
        )));
    }

    let is_host_label = |label: &str| {
        !label.is_empty()
            && label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    };
    if let Some(label) = normalized.split('.').find(|l| !is_host_label(l)) {
        return Err(FocusError::invalid_domain(format!(
            "'{}' has an invalid label '{}'",
            normalized, label
        )));
    }

    Ok(Domain(normalized))
}

/// `[a-z0-9]` runs joined by single hyphens
fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .split('-')
            .all(|run| !run.is_empty() && run.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()))
}

/// Hostname of a navigation URL, or `None` for browser-internal pages
/// and URLs without a host.
pub fn host_from_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    if INTERNAL_SCHEMES.contains(&parsed.scheme()) {
        return None;
    }
    parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_ascii_lowercase())
}
