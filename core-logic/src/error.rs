//! # Core Error Types
//!
//! Typed errors for configuration, wallet material, storage and the network.
//! Chain crates wrap them in `anyhow` at the application boundary.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid URL for '{field}': '{url}'")]
    InvalidUrl { field: String, url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Wallet and key-material errors
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    #[error("Invalid private key format: expected hex string")]
    InvalidKeyFormat,

    #[error("Private key has wrong length: expected 64 hex chars, got {length}")]
    InvalidKeyLength { length: usize },

    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Invalid amount '{input}': {reason}")]
    InvalidAmount { input: String, reason: String },
}

/// Persistence errors for the flat-file and SQLite stores
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Database error: {msg}")]
    Database { msg: String },
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Database { msg: e.to_string() }
    }
}

/// Network and RPC-related errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout after {timeout_ms}ms to {endpoint}")]
    Timeout { timeout_ms: u64, endpoint: String },

    #[error("Connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("Proxy error via {proxy}: {reason}")]
    Proxy { proxy: String, reason: String },
}
