//! Mova Mars faucet bot: creates wallets, funds them from the faucet through a
//! rotating SOCKS5 proxy pool, and sends their balance on to one address.

pub mod config;
pub mod faucet;
pub mod orchestrator;
pub mod transfer;
pub mod wallet;

pub use config::MovaConfig;
pub use faucet::{ClaimResult, FaucetApi, FaucetClient};
pub use orchestrator::{Orchestrator, RunMode};
pub use transfer::{Amount, TransferApi, TransferEngine, TransferResult};
