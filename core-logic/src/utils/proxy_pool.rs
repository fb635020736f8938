use crate::config::ProxyEndpoint;
use crate::error::StorageError;
use crate::traits::Store;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// The shared set of live proxies.
///
/// Callers only ever see single endpoints: `pick_random` hands one out and
/// `evict` permanently removes one. Every mutation runs remove-then-persist
/// under the same lock, so the backing store always mirrors the in-memory
/// list and concurrent evictions cannot overwrite each other's removals.
pub struct ProxyPool {
    proxies: Mutex<Vec<ProxyEndpoint>>,
    store: Box<dyn Store<ProxyEndpoint>>,
}

impl ProxyPool {
    /// Loads the pool from `store`.
    ///
    /// A missing or unreadable proxy file is not an error: the pool starts
    /// empty and every request goes out directly.
    pub async fn load<S>(store: S) -> Self
    where
        S: Store<ProxyEndpoint> + 'static,
    {
        let proxies = match store.load().await {
            Ok(list) if list.is_empty() => {
                warn!(
                    "No proxies found in {}. Running without proxies.",
                    store.describe()
                );
                list
            }
            Ok(list) => {
                info!("Loaded {} proxies from {}", list.len(), store.describe());
                list
            }
            Err(e) => {
                warn!(
                    "Could not read proxies from {}: {}. Running without proxies.",
                    store.describe(),
                    e
                );
                Vec::new()
            }
        };

        Self::with_entries(proxies, store)
    }

    /// Builds a pool from an explicit list without reading the store.
    pub fn with_entries<S>(proxies: Vec<ProxyEndpoint>, store: S) -> Self
    where
        S: Store<ProxyEndpoint> + 'static,
    {
        Self {
            proxies: Mutex::new(proxies),
            store: Box::new(store),
        }
    }

    /// Uniform random choice over the current members, `None` when empty.
    pub async fn pick_random(&self) -> Option<ProxyEndpoint> {
        let proxies = self.proxies.lock().await;
        proxies.choose(&mut rand::thread_rng()).cloned()
    }

    /// Permanently removes `proxy` and rewrites the store.
    ///
    /// Returns `Ok(false)` without touching the store when the endpoint is not
    /// in the pool. If the rewrite fails the removal is rolled back so memory
    /// and disk stay identical; the next transport failure retries it.
    pub async fn evict(&self, proxy: &ProxyEndpoint) -> Result<bool, StorageError> {
        let mut proxies = self.proxies.lock().await;

        let before = proxies.clone();
        proxies.retain(|p| p != proxy);
        if proxies.len() == before.len() {
            return Ok(false);
        }

        if let Err(e) = self.store.rewrite(&proxies).await {
            *proxies = before;
            return Err(e);
        }

        info!(
            "Evicted proxy {} ({} remaining)",
            proxy.display_host(),
            proxies.len()
        );
        Ok(true)
    }

    pub async fn len(&self) -> usize {
        self.proxies.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.proxies.lock().await.is_empty()
    }

    /// Copy of the current members, in file order.
    pub async fn snapshot(&self) -> Vec<ProxyEndpoint> {
        self.proxies.lock().await.clone()
    }

    pub fn store_location(&self) -> String {
        self.store.describe()
    }
}
