use anyhow::{Context, Result};
use config::{Config, Environment, File};
use core_logic::{
    ChainConfig, ConfigError, JsonFileStore, KeyStore, KeyStoreBackend, LineFileStore, ProxyPool,
    SqliteWalletStore, StoredWallet,
};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Bot configuration: optional TOML file, overridden by `MOVA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MovaConfig {
    pub network_name: String,
    pub rpc_url: String,
    pub chain_id: u64,
    pub explorer_tx_url: String,

    pub faucet_url: String,
    pub faucet_origin: String,
    pub faucet_referer: String,
    /// One is picked at random per faucet request.
    pub user_agents: Vec<String>,

    pub proxy_file: String,
    pub key_file: String,
    pub key_store_backend: KeyStoreBackend,
    pub sqlite_path: String,

    /// Applies to faucet requests and node RPC calls alike.
    pub request_timeout_secs: u64,
    pub claim_delay_min_secs: u64,
    pub claim_delay_max_secs: u64,

    pub gas_limit: u64,
    pub precheck_balance: bool,
    /// Route node RPC calls through the picked proxy too.
    pub proxy_rpc: bool,
    pub distribute_concurrency: usize,

    pub log_dir: String,
}

impl Default for MovaConfig {
    fn default() -> Self {
        Self {
            network_name: "Mova Mars Testnet".to_string(),
            rpc_url: "https://mars.rpc.movachain.com".to_string(),
            chain_id: 10323,
            explorer_tx_url: "https://mars.scan.movachain.com/tx/".to_string(),
            faucet_url: "https://faucet.mars.movachain.com/api/faucet/v1/transfer".to_string(),
            faucet_origin: "https://faucet.mars.movachain.com".to_string(),
            faucet_referer: "https://faucet.mars.movachain.com/".to_string(),
            user_agents: vec![
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/139.0.0.0 Safari/537.36".to_string(),
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Safari/605.1.15".to_string(),
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36".to_string(),
            ],
            proxy_file: "proxy.txt".to_string(),
            key_file: "key.json".to_string(),
            key_store_backend: KeyStoreBackend::Json,
            sqlite_path: "wallets.db".to_string(),
            request_timeout_secs: 15,
            claim_delay_min_secs: 2,
            claim_delay_max_secs: 2,
            gas_limit: 2_000_000,
            precheck_balance: true,
            proxy_rpc: false,
            distribute_concurrency: 1,
            log_dir: "logs".to_string(),
        }
    }
}

impl MovaConfig {
    /// Loads `path` if it exists, then applies `MOVA_*` overrides and validates.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("MOVA")
                    .try_parsing(true)
                    .list_separator("|")
                    .with_list_parse_key("user_agents"),
            )
            .build()
            .context(format!("Failed to read config from {}", path))?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("rpc_url", &self.rpc_url), ("faucet_url", &self.faucet_url)] {
            let ok = Url::parse(value)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !ok {
                return Err(ConfigError::InvalidUrl {
                    field: field.to_string(),
                    url: value.clone(),
                });
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.claim_delay_min_secs > self.claim_delay_max_secs {
            return Err(ConfigError::InvalidValue {
                field: "claim_delay_min_secs".to_string(),
                reason: format!(
                    "{} is greater than claim_delay_max_secs ({})",
                    self.claim_delay_min_secs, self.claim_delay_max_secs
                ),
            });
        }
        if self.gas_limit < 21_000 {
            return Err(ConfigError::InvalidValue {
                field: "gas_limit".to_string(),
                reason: "a plain transfer needs at least 21000".to_string(),
            });
        }
        if self.distribute_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "distribute_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.user_agents.is_empty() {
            return Err(ConfigError::MissingField {
                field: "user_agents".to_string(),
            });
        }
        Ok(())
    }

    pub fn chain(&self) -> ChainConfig {
        ChainConfig {
            name: self.network_name.clone(),
            rpc_endpoint: self.rpc_url.clone(),
            chain_id: self.chain_id,
            explorer_tx_url: self.explorer_tx_url.clone(),
        }
    }

    /// Loads the proxy file. A missing or unreadable file gives an empty pool.
    pub async fn proxy_pool(&self) -> ProxyPool {
        ProxyPool::load(LineFileStore::new(&self.proxy_file)).await
    }

    /// Opens the configured key store.
    ///
    /// With `keep_existing` the stored wallets are loaded and a missing or
    /// malformed store is an error; otherwise the store starts empty and its
    /// previous contents are replaced on the first append.
    pub async fn key_store(&self, keep_existing: bool) -> Result<KeyStore> {
        let keys = match (self.key_store_backend, keep_existing) {
            (KeyStoreBackend::Json, false) => {
                KeyStore::fresh(JsonFileStore::<StoredWallet>::new(&self.key_file))
            }
            (KeyStoreBackend::Json, true) => {
                KeyStore::open(JsonFileStore::<StoredWallet>::new(&self.key_file))
                    .await
                    .context(format!("Failed to load wallets from {}", self.key_file))?
            }
            (KeyStoreBackend::Sqlite, keep) => {
                let store = SqliteWalletStore::open(&self.sqlite_path)
                    .await
                    .context(format!("Failed to open {}", self.sqlite_path))?;
                if keep {
                    KeyStore::open(store)
                        .await
                        .context(format!("Failed to load wallets from {}", self.sqlite_path))?
                } else {
                    KeyStore::fresh(store)
                }
            }
        };
        Ok(keys)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay between two claims, uniform in `[min, max]` seconds.
    pub fn random_claim_delay(&self) -> Duration {
        let lo = self.claim_delay_min_secs.min(self.claim_delay_max_secs);
        let hi = self.claim_delay_min_secs.max(self.claim_delay_max_secs);
        Duration::from_secs(rand::thread_rng().gen_range(lo..=hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    /// `load()` reads process-wide `MOVA_*` variables; tests that load hold this.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MovaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id, 10323);
        assert_eq!(config.gas_limit, 2_000_000);
        assert_eq!(config.proxy_file, "proxy.txt");
        assert_eq!(config.key_file, "key.json");
        assert_eq!(config.random_claim_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let _env = env_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        let config = MovaConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.rpc_url, MovaConfig::default().rpc_url);
    }

    #[test]
    fn test_load_overrides_from_toml() {
        let _env = env_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            r#"
chain_id = 7
claim_delay_min_secs = 10
claim_delay_max_secs = 15
key_store_backend = "sqlite"
user_agents = ["ua-1"]
"#
        )
        .unwrap();

        let config = MovaConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.chain_id, 7);
        assert_eq!(config.key_store_backend, KeyStoreBackend::Sqlite);
        assert_eq!(config.user_agents, vec!["ua-1".to_string()]);
        let delay = config.random_claim_delay();
        assert!(delay >= Duration::from_secs(10) && delay <= Duration::from_secs(15));
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = MovaConfig {
            faucet_url: "not a url".to_string(),
            ..MovaConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { ref field, .. }) if field == "faucet_url"
        ));
    }

    #[test]
    fn test_rejects_inverted_delay_range() {
        let config = MovaConfig {
            claim_delay_min_secs: 5,
            claim_delay_max_secs: 1,
            ..MovaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_random_delay_tolerates_inverted_bounds() {
        let config = MovaConfig {
            claim_delay_min_secs: 5,
            claim_delay_max_secs: 1,
            ..MovaConfig::default()
        };
        for _ in 0..20 {
            let delay = config.random_claim_delay();
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(5));
        }
    }

    #[test]
    fn test_user_agents_env_keeps_commas() {
        let _env = env_lock();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        std::env::set_var(
            "MOVA_USER_AGENTS",
            "Mozilla/5.0 (KHTML, like Gecko) Chrome/1|Mozilla/5.0 (X11, Linux) Firefox/2",
        );
        let loaded = MovaConfig::load(path.to_str().unwrap());
        std::env::remove_var("MOVA_USER_AGENTS");

        let config = loaded.unwrap();
        assert_eq!(
            config.user_agents,
            vec![
                "Mozilla/5.0 (KHTML, like Gecko) Chrome/1".to_string(),
                "Mozilla/5.0 (X11, Linux) Firefox/2".to_string(),
            ]
        );
    }
}
