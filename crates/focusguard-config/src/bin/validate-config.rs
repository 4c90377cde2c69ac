//! Config validation CLI tool
//!
//! Validates a focusguardd configuration file and reports any errors.

use focusguard_config::{BlockingMode, ConfigError, CURRENT_CONFIG_VERSION};
use focusguard_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a focusguardd configuration file.");
            eprintln!();
            eprintln!("Default location: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match focusguard_config::load_config(&config_path) {
        Ok(policy) => {
            let mode = match policy.service.blocking_mode {
                BlockingMode::Toggle => "toggle",
                BlockingMode::AlwaysOn => "always_on",
            };

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", CURRENT_CONFIG_VERSION);
            println!("  Blocking mode: {}", mode);
            println!("  Poll interval: {}s", policy.service.poll_interval.as_secs());
            println!("  Messages: {}", policy.motivational_messages.len());

            println!();
            println!("Sites:");
            for site in &policy.sites {
                let marker = if site.enabled { "on " } else { "off" };
                println!("  [{}] {} ({})", marker, site.name, site.domain);
            }
            if !policy.custom_sites.is_empty() {
                println!();
                println!("Custom sites:");
                for domain in &policy.custom_sites {
                    println!("  - {}", domain);
                }
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver, CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
