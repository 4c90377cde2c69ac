//! Error types for focusguard

use thiserror::Error;

/// Core error type for focusguard operations
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FocusError {
    pub fn invalid_duration(msg: impl Into<String>) -> Self {
        Self::InvalidDuration(msg.into())
    }

    pub fn invalid_domain(msg: impl Into<String>) -> Self {
        Self::InvalidDomain(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Validation errors are reported back to the caller as-is;
    /// everything else is an environment failure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidDuration(_) | Self::InvalidDomain(_) | Self::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FocusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_classification() {
        assert!(FocusError::invalid_duration("0").is_validation());
        assert!(FocusError::invalid_domain("bad").is_validation());
        assert!(FocusError::invalid_input("empty").is_validation());
        assert!(!FocusError::storage("disk gone").is_validation());
    }

    #[test]
    fn display_includes_detail() {
        let err = FocusError::invalid_duration("must be between 1 and 1440 minutes");
        assert_eq!(
            err.to_string(),
            "Invalid duration: must be between 1 and 1440 minutes"
        );
    }
}
