//! Error types for the relayer.
//!
//! Remote failures are split into transient (retried) and permanent
//! (retries exhausted). Local persistence failures are always reported to the
//! caller as values and never abort the relaying loop.

use thiserror::Error;

/// Top-level application error
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The underlying message without the category prefix.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            AppError::Blockchain(e) => e.message(),
            AppError::Persistence(e) => e.to_string(),
            AppError::Config(e) => e.to_string(),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

/// Errors raised by chain RPC and transaction submission
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("Connection failed: {0}")]
    Connection(String),

    /// RPC timeout, nonce conflict, gas estimation failure and the like
    #[error("Transient remote failure: {0}")]
    Transient(String),

    /// Every attempt of a retried operation failed
    #[error("Permanent remote failure after {attempts} attempt(s): {message}")]
    Permanent { attempts: u32, message: String },

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

impl BlockchainError {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Connection(msg)
            | Self::Transient(msg)
            | Self::Reverted(msg)
            | Self::InvalidEvent(msg) => msg.clone(),
            Self::Permanent { message, .. } => message.clone(),
        }
    }
}

/// Errors raised while reading or writing the local state files
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("corrupt state file {path}: {message}")]
    Corrupt { path: String, message: String },
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {var}: {message}")]
    Invalid { var: String, message: String },
}
