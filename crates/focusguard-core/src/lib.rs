//! Core blocking engine for focusguardd
//!
//! This crate holds the site-access and usage-tracking state machine:
//! - Effective blocklist and user settings
//! - Access ledger (temporary and permanent grants, lazy expiry)
//! - Usage recorder (visits, entry attempts, incremental time-on-site)
//! - Block controller (global timed block with a scheduled wake-up)
//! - Navigation monitor (allow / track / block decisions)
//! - Usage reports

mod alarms;
mod blocking;
mod blocklist;
mod engine;
mod events;
mod ledger;
mod monitor;
mod report;
mod settings;
mod usage;

#[cfg(test)]
mod testing;

pub use alarms::*;
pub use blocking::*;
pub use blocklist::*;
pub use engine::*;
pub use events::*;
pub use ledger::*;
pub use monitor::*;
pub use report::*;
pub use settings::*;
pub use usage::*;
