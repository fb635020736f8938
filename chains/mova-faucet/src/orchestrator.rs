use crate::config::MovaConfig;
use crate::faucet::{ClaimResult, FaucetApi};
use crate::transfer::{Amount, TransferApi, TransferResult};
use crate::wallet::{create_wallet, normalize_address};
use anyhow::{Context, Result};
use core_logic::{
    ChainConfig, ClaimKind, KeyStore, MetricsCollector, ProxyEndpoint, ProxyPool, RunStats,
    StoredWallet, TransferKind, WorkerRunner, OUTCOME_TARGET,
};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a run does. Each mode is a finite (or cancellable) sequence of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    ClaimOnce { count: u64 },
    ClaimForever,
    /// Claim again for every wallet already in the key store.
    Reclaim,
    Distribute { recipient: String, amount: Amount },
}

pub struct Orchestrator<F, T> {
    faucet: F,
    transfer: T,
    proxies: Arc<ProxyPool>,
    chain: ChainConfig,
    settings: MovaConfig,
}

impl<F, T> Orchestrator<F, T>
where
    F: FaucetApi,
    T: TransferApi,
{
    pub fn new(settings: MovaConfig, faucet: F, transfer: T, proxies: Arc<ProxyPool>) -> Self {
        Self {
            faucet,
            transfer,
            proxies,
            chain: settings.chain(),
            settings,
        }
    }

    pub fn proxies(&self) -> &ProxyPool {
        &self.proxies
    }

    pub async fn run(
        &self,
        mode: &RunMode,
        keys: &mut KeyStore,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        match mode {
            RunMode::ClaimOnce { count } => self.run_claims(keys, Some(*count), token).await,
            RunMode::ClaimForever => self.run_claims(keys, None, token).await,
            RunMode::Reclaim => Ok(self.run_reclaim(keys, token).await),
            RunMode::Distribute { recipient, amount } => {
                self.run_distribution(keys, recipient, amount, token).await
            }
        }
    }

    /// Creates and funds new wallets, appending each funded one to `keys`.
    ///
    /// Runs `limit` attempts, or until cancelled when `limit` is `None`.
    /// Fails only when a funded wallet cannot be persisted.
    pub async fn run_claims(
        &self,
        keys: &mut KeyStore,
        limit: Option<u64>,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        let start_time = Instant::now();
        let mut stats = RunStats::default();
        let mut attempt: u64 = 0;

        info!(
            target: OUTCOME_TARGET,
            "Claiming on {} with {} proxies from {}, saving to {}",
            self.chain.name,
            self.proxies.len().await,
            self.proxies.store_location(),
            keys.location()
        );

        loop {
            if limit.is_some_and(|n| attempt >= n) {
                break;
            }
            if token.is_cancelled() {
                stats.skipped += limit.map(|n| n - attempt).unwrap_or(0);
                break;
            }
            attempt += 1;

            let label = match limit {
                Some(n) => format!("[{}/{}]", attempt, n),
                None => format!("[#{}]", attempt),
            };
            let wallet = create_wallet();
            info!(target: OUTCOME_TARGET, "{} Created wallet {}", label, wallet.address);

            let proxy = self.proxies.pick_random().await;
            let result = self.claim_one(&wallet, proxy.as_ref(), &label).await;

            if result.is_funded() {
                let address = wallet.address.clone();
                keys.append(wallet)
                    .await
                    .with_context(|| format!("Failed to save funded wallet {}", address))?;
                debug!("{} Saved {} ({} total)", label, address, keys.len());
                stats.success += 1;
            } else {
                stats.failed += 1;
            }

            if limit.map_or(true, |n| attempt < n) {
                self.pause(token).await;
            }
        }

        self.log_summary("Claim", &stats, start_time);
        Ok(stats)
    }

    /// Requests funds again for every stored wallet. The key store is not modified.
    pub async fn run_reclaim(&self, keys: &KeyStore, token: &CancellationToken) -> RunStats {
        let start_time = Instant::now();
        let mut stats = RunStats::default();
        let total = keys.len();

        if total == 0 {
            warn!("No wallets in {}, nothing to re-claim", keys.location());
            return stats;
        }

        for (idx, wallet) in keys.wallets().iter().enumerate() {
            if token.is_cancelled() {
                stats.skipped += (total - idx) as u64;
                break;
            }

            let label = format!("[{}/{}]", idx + 1, total);
            let proxy = self.proxies.pick_random().await;
            if self.claim_one(wallet, proxy.as_ref(), &label).await.is_funded() {
                stats.success += 1;
            } else {
                stats.failed += 1;
            }

            if idx + 1 < total {
                self.pause(token).await;
            }
        }

        self.log_summary("Re-claim", &stats, start_time);
        stats
    }

    /// Sends `amount` from every stored wallet to `recipient`.
    ///
    /// Fails before any transfer when the recipient is not a valid address.
    pub async fn run_distribution(
        &self,
        keys: &KeyStore,
        recipient: &str,
        amount: &Amount,
        token: &CancellationToken,
    ) -> Result<RunStats> {
        let recipient = normalize_address(recipient).context("Invalid recipient address")?;
        let total = keys.len();

        if total == 0 {
            warn!("No wallets in {}, nothing to distribute", keys.location());
            return Ok(RunStats::default());
        }

        info!(
            target: OUTCOME_TARGET,
            "Distributing {} from {} wallets to {}",
            amount,
            total,
            recipient
        );

        let recipient = recipient.as_str();
        let stats = WorkerRunner::run_bounded(
            keys.wallets(),
            self.settings.distribute_concurrency,
            token,
            |idx, wallet| async move {
                let label = format!("[{}/{}]", idx + 1, total);
                self.distribute_one(wallet, recipient, amount, &label).await
            },
        )
        .await;

        Ok(stats)
    }

    async fn claim_one(
        &self,
        wallet: &StoredWallet,
        proxy: Option<&ProxyEndpoint>,
        label: &str,
    ) -> ClaimResult {
        let via = proxy.map(ProxyEndpoint::display_host).unwrap_or("direct");
        let started = Instant::now();
        let result = self.faucet.claim(&wallet.address, proxy).await;
        let elapsed = started.elapsed();

        match &result {
            ClaimResult::Funded { tx_hash } => {
                MetricsCollector::global().record_claim(ClaimKind::Funded, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} SUCCESS funded {} via {} | {}",
                    label,
                    wallet.short_address(),
                    via,
                    self.chain.tx_link(tx_hash)
                );
            }
            ClaimResult::Rejected { reason } => {
                MetricsCollector::global().record_claim(ClaimKind::Rejected, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} FAILED faucet rejected {} via {}: {}",
                    label,
                    wallet.short_address(),
                    via,
                    reason
                );
            }
            ClaimResult::TransportFailure { cause } => {
                MetricsCollector::global().record_claim(ClaimKind::Transport, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} FAILED no answer for {} via {}: {}",
                    label,
                    wallet.short_address(),
                    via,
                    cause
                );
                self.evict(proxy).await;
            }
        }

        result
    }

    async fn distribute_one(
        &self,
        wallet: &StoredWallet,
        recipient: &str,
        amount: &Amount,
        label: &str,
    ) -> bool {
        let proxy = self.proxies.pick_random().await;
        let via = proxy
            .as_ref()
            .map(ProxyEndpoint::display_host)
            .unwrap_or("direct");

        let started = Instant::now();
        let result = self
            .transfer
            .send(wallet, recipient, amount, proxy.as_ref())
            .await;
        let elapsed = started.elapsed();

        match &result {
            TransferResult::Sent { tx_hash } => {
                MetricsCollector::global().record_transfer(TransferKind::Sent, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} SUCCESS sent from {} | {}",
                    label,
                    wallet.short_address(),
                    self.chain.tx_link(tx_hash)
                );
            }
            TransferResult::TransportFailure { cause } => {
                MetricsCollector::global().record_transfer(TransferKind::Transport, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} FAILED node unreachable for {} via {}: {}",
                    label,
                    wallet.short_address(),
                    via,
                    cause
                );
                self.evict(proxy.as_ref()).await;
            }
            TransferResult::OtherFailure { cause } => {
                MetricsCollector::global().record_transfer(TransferKind::Other, elapsed);
                info!(
                    target: OUTCOME_TARGET,
                    "{} FAILED transfer from {}: {}",
                    label,
                    wallet.short_address(),
                    cause
                );
            }
        }

        result.is_sent()
    }

    async fn evict(&self, proxy: Option<&ProxyEndpoint>) {
        let Some(proxy) = proxy else {
            return;
        };

        match self.proxies.evict(proxy).await {
            Ok(true) => {
                MetricsCollector::global().record_eviction();
                warn!(
                    target: OUTCOME_TARGET,
                    "Removed dead proxy {} ({} left)",
                    proxy.display_host(),
                    self.proxies.len().await
                );
            }
            Ok(false) => debug!("Proxy {} already removed", proxy.display_host()),
            Err(e) => error!(
                "Could not persist removal of proxy {}: {}",
                proxy.display_host(),
                e
            ),
        }
    }

    /// Sleeps for the configured claim delay, returning early on shutdown.
    async fn pause(&self, token: &CancellationToken) {
        let delay = self.settings.random_claim_delay();
        if delay.is_zero() {
            return;
        }
        debug!("Waiting {}s before the next claim", delay.as_secs());
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }

    fn log_summary(&self, what: &str, stats: &RunStats, start_time: Instant) {
        info!(
            target: OUTCOME_TARGET,
            "{} finished in {:.1}s | Success: {} | Fail: {} | Skipped: {}",
            what,
            start_time.elapsed().as_secs_f64(),
            stats.success,
            stats.failed,
            stats.skipped
        );
    }
}
