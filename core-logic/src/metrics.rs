use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How a faucet claim attempt ended, as far as counting is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimKind {
    Funded,
    Rejected,
    Transport,
}

/// How a transfer attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Sent,
    Transport,
    Other,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_secs: u64,
    pub claims: ClaimMetrics,
    pub transfers: TransferMetrics,
    pub proxies_evicted: u64,
    pub performance: PerformanceMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimMetrics {
    pub total: u64,
    pub funded: u64,
    pub rejected: u64,
    pub transport_failures: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferMetrics {
    pub total: u64,
    pub sent: u64,
    pub transport_failures: u64,
    pub other_failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetrics {
    pub attempts: u64,
    pub avg_attempt_ms: f64,
    pub min_attempt_ms: u64,
    pub max_attempt_ms: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    claims_funded: AtomicU64,
    claims_rejected: AtomicU64,
    claims_transport: AtomicU64,
    transfers_sent: AtomicU64,
    transfers_transport: AtomicU64,
    transfers_other: AtomicU64,
    proxies_evicted: AtomicU64,
    attempts: AtomicU64,
    attempt_duration_sum_ms: AtomicU64,
    attempt_min_ms: AtomicU64,
    attempt_max_ms: AtomicU64,
    start_time: Instant,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            claims_funded: AtomicU64::new(0),
            claims_rejected: AtomicU64::new(0),
            claims_transport: AtomicU64::new(0),
            transfers_sent: AtomicU64::new(0),
            transfers_transport: AtomicU64::new(0),
            transfers_other: AtomicU64::new(0),
            proxies_evicted: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            attempt_duration_sum_ms: AtomicU64::new(0),
            attempt_min_ms: AtomicU64::new(u64::MAX),
            attempt_max_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl MetricsCollector {
    pub fn global() -> &'static Self {
        static INSTANCE: std::sync::OnceLock<MetricsCollector> = std::sync::OnceLock::new();
        INSTANCE.get_or_init(MetricsCollector::default)
    }

    fn record_duration(&self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_duration_sum_ms.fetch_add(ms, Ordering::SeqCst);
        self.attempt_min_ms.fetch_min(ms, Ordering::SeqCst);
        self.attempt_max_ms.fetch_max(ms, Ordering::SeqCst);
    }

    pub fn record_claim(&self, kind: ClaimKind, duration: Duration) {
        self.record_duration(duration);
        let counter = match kind {
            ClaimKind::Funded => &self.claims_funded,
            ClaimKind::Rejected => &self.claims_rejected,
            ClaimKind::Transport => &self.claims_transport,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_transfer(&self, kind: TransferKind, duration: Duration) {
        self.record_duration(duration);
        let counter = match kind {
            TransferKind::Sent => &self.transfers_sent,
            TransferKind::Transport => &self.transfers_transport,
            TransferKind::Other => &self.transfers_other,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_eviction(&self) {
        self.proxies_evicted.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let funded = self.claims_funded.load(Ordering::SeqCst);
        let rejected = self.claims_rejected.load(Ordering::SeqCst);
        let claim_transport = self.claims_transport.load(Ordering::SeqCst);
        let claims_total = funded + rejected + claim_transport;

        let sent = self.transfers_sent.load(Ordering::SeqCst);
        let transfer_transport = self.transfers_transport.load(Ordering::SeqCst);
        let other = self.transfers_other.load(Ordering::SeqCst);

        let attempts = self.attempts.load(Ordering::SeqCst);
        let sum = self.attempt_duration_sum_ms.load(Ordering::SeqCst);
        let min = self.attempt_min_ms.load(Ordering::SeqCst);

        MetricsSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            claims: ClaimMetrics {
                total: claims_total,
                funded,
                rejected,
                transport_failures: claim_transport,
                success_rate: if claims_total > 0 {
                    funded as f64 / claims_total as f64 * 100.0
                } else {
                    0.0
                },
            },
            transfers: TransferMetrics {
                total: sent + transfer_transport + other,
                sent,
                transport_failures: transfer_transport,
                other_failures: other,
            },
            proxies_evicted: self.proxies_evicted.load(Ordering::SeqCst),
            performance: PerformanceMetrics {
                attempts,
                avg_attempt_ms: if attempts > 0 {
                    sum as f64 / attempts as f64
                } else {
                    0.0
                },
                min_attempt_ms: if min == u64::MAX { 0 } else { min },
                max_attempt_ms: self.attempt_max_ms.load(Ordering::SeqCst),
            },
        }
    }

    pub fn to_json(&self) -> String {
        let snapshot = self.snapshot();
        serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "{}".to_string())
    }

    pub async fn export_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = self.to_json();
        tokio::fs::write(path, json).await
    }
}
