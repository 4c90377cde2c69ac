//! Configuration validation

use crate::schema::{RawConfig, RawSite};
use focusguard_util::validate_domain;
use std::collections::HashSet;
use thiserror::Error;

/// Accepted range for `service.poll_interval_seconds`
pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=3600;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Site '{name}': {message}")]
    SiteError { name: String, message: String },

    #[error("Custom site '{value}': {message}")]
    CustomSiteError { value: String, message: String },

    #[error("Duplicate domain: {0}")]
    DuplicateDomain(String),

    #[error("Motivational message #{index} is empty")]
    EmptyMessage { index: usize },

    #[error("poll_interval_seconds must be between 10 and 3600, got {0}")]
    PollIntervalOutOfRange(u64),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration, collecting every problem found
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(secs) = config.service.poll_interval_seconds
        && !POLL_INTERVAL_RANGE.contains(&secs)
    {
        errors.push(ValidationError::PollIntervalOutOfRange(secs));
    }

    // Sites and custom sites share one domain namespace
    let mut seen = HashSet::new();

    if let Some(sites) = &config.sites {
        for site in sites {
            errors.extend(validate_site(site, &mut seen));
        }
    }

    for raw in &config.custom_sites {
        match validate_domain(raw) {
            Ok(domain) => {
                if !seen.insert(domain.as_str().to_string()) {
                    errors.push(ValidationError::DuplicateDomain(domain.to_string()));
                }
            }
            Err(e) => errors.push(ValidationError::CustomSiteError {
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    if let Some(messages) = &config.motivational_messages {
        if messages.is_empty() {
            errors.push(ValidationError::GlobalError(
                "motivational_messages must not be an empty list".into(),
            ));
        }
        for (index, message) in messages.iter().enumerate() {
            if message.trim().is_empty() {
                errors.push(ValidationError::EmptyMessage { index });
            }
        }
    }

    errors
}

fn validate_site(site: &RawSite, seen: &mut HashSet<String>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if site.name.trim().is_empty() {
        errors.push(ValidationError::SiteError {
            name: site.domain.clone(),
            message: "name cannot be empty".into(),
        });
    }

    match validate_domain(&site.domain) {
        Ok(domain) => {
            if !seen.insert(domain.as_str().to_string()) {
                errors.push(ValidationError::DuplicateDomain(domain.to_string()));
            }
        }
        Err(e) => errors.push(ValidationError::SiteError {
            name: site.name.clone(),
            message: e.to_string(),
        }),
    }

    errors
}
