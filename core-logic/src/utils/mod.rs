//! # Utilities Module
//!
//! Proxy pool, key store, logging and worker scheduling shared by the chain crates.

pub(crate) mod key_store;
pub(crate) mod logger;
pub(crate) mod proxy_pool;
pub(crate) mod runner;

pub use key_store::{KeyStore, StoredWallet};
pub use logger::{setup_logger, OUTCOME_TARGET};
pub use proxy_pool::ProxyPool;
pub use runner::{RunStats, WorkerRunner};
