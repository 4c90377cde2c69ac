//! IPC layer for focusguardd
//!
//! Newline-delimited JSON over a Unix domain socket. Collaborators send
//! `Request`s and read `Response`s; subscribed clients also receive
//! `Event`s on the same connection.

mod client;
mod server;

pub use client::*;
pub use server::*;

use focusguard_util::FocusError;
use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Server error: {0}")]
    ServerError(String),
}

impl From<IpcError> for FocusError {
    fn from(e: IpcError) -> Self {
        FocusError::ipc(e.to_string())
    }
}

pub type IpcResult<T> = Result<T, IpcError>;
