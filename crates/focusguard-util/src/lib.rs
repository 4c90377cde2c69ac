//! Shared utilities for focusguard
//!
//! This crate provides:
//! - Domain matching (normalization, validation, blocklist membership)
//! - ID types (TabId, ClientId)
//! - Time utilities (mockable clock, day keys, minute arithmetic)
//! - Error types
//! - Default paths for socket, config, and data directories

mod domain;
mod error;
mod ids;
mod paths;
mod time;

pub use domain::*;
pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
