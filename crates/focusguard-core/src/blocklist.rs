//! Effective blocklist derivation

use focusguard_api::BlockedSite;
use focusguard_util::Domain;

/// Enabled built-in sites followed by custom sites, deduplicated in order
pub fn compute_effective_blocklist(sites: &[BlockedSite], custom_sites: &[Domain]) -> Vec<Domain> {
    let mut domains: Vec<Domain> = Vec::with_capacity(sites.len() + custom_sites.len());

    let candidates = sites
        .iter()
        .filter(|s| s.enabled)
        .map(|s| &s.domain)
        .chain(custom_sites.iter());

    for domain in candidates {
        if !domain.as_str().is_empty() && !domains.contains(domain) {
            domains.push(domain.clone());
        }
    }

    domains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(domain: &str, enabled: bool) -> BlockedSite {
        BlockedSite {
            name: domain.to_string(),
            domain: Domain::new(domain),
            enabled,
        }
    }

    #[test]
    fn disabled_sites_are_skipped() {
        let sites = vec![site("facebook.com", true), site("youtube.com", false)];
        let domains = compute_effective_blocklist(&sites, &[]);
        assert_eq!(domains, vec![Domain::new("facebook.com")]);
    }

    #[test]
    fn custom_sites_follow_and_dedupe() {
        let sites = vec![site("reddit.com", true), site("tiktok.com", true)];
        let custom = vec![Domain::new("news.example.com"), Domain::new("reddit.com")];

        let domains = compute_effective_blocklist(&sites, &custom);
        assert_eq!(
            domains,
            vec![
                Domain::new("reddit.com"),
                Domain::new("tiktok.com"),
                Domain::new("news.example.com"),
            ]
        );
    }

    #[test]
    fn recompute_is_stable() {
        let sites = vec![site("instagram.com", true)];
        let custom = vec![Domain::new("news.example.com")];
        assert_eq!(
            compute_effective_blocklist(&sites, &custom),
            compute_effective_blocklist(&sites, &custom)
        );
    }
}
