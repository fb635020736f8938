//! # Core Logic - Shared Utilities for the Faucet Bots
//!
//! This crate provides the chain-independent half of the claim/distribute
//! pipeline: the proxy pool, the funded-wallet key store, storage backends,
//! logging, shutdown handling and run metrics.
//!
//! ## Modules
//!
//! - [`config`] - Proxy endpoints, chain identity, storage backend selection
//! - [`error`] - Typed error handling with thiserror
//! - [`metrics`] - Claim/transfer/eviction counters
//! - [`storage`] - Flat-file and SQLite implementations of [`Store`]
//! - [`traits`] - The [`Store`] persistence contract
//! - [`utils`] - Proxy pool, key store, logger, worker runner

pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod traits;
pub(crate) mod utils;

pub use config::{ChainConfig, KeyStoreBackend, ProxyEndpoint};
pub use error::{ConfigError, NetworkError, StorageError, WalletError};
pub use metrics::{ClaimKind, MetricsCollector, MetricsSnapshot, TransferKind};
pub use storage::{JsonFileStore, LineFileStore, SqliteWalletStore};
pub use traits::Store;

pub use utils::{
    setup_logger, KeyStore, ProxyPool, RunStats, StoredWallet, WorkerRunner, OUTCOME_TARGET,
};
