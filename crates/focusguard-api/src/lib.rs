//! Protocol types for focusguard
//!
//! This crate defines the stable contract between the focusguard service,
//! its persisted store, and UI collaborators:
//! - Persisted entities (blocked sites, grants, block session, day stats)
//! - Commands (requests from collaborators) and responses
//! - Events (service -> collaborators)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
