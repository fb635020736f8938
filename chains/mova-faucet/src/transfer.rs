use crate::config::MovaConfig;
use crate::wallet::{parse_address, signer_from_key};
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{NetworkError, ProxyEndpoint, StoredWallet, WalletError};
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use ethers::utils::{format_ether, parse_ether, to_checksum};
use reqwest::{Client, Proxy};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// How much to send from each wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    Wei(U256),
    /// Whole balance minus the gas reservation.
    All,
}

impl FromStr for Amount {
    type Err = WalletError;

    /// Accepts a decimal ether amount (`"0.05"`) or `all` / `max`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.eq_ignore_ascii_case("all") || input.eq_ignore_ascii_case("max") {
            return Ok(Amount::All);
        }

        let invalid = |reason: String| WalletError::InvalidAmount {
            input: input.to_string(),
            reason,
        };
        let wei = parse_ether(input).map_err(|e| invalid(e.to_string()))?;
        if wei.is_zero() {
            return Err(invalid("amount must be greater than zero".to_string()));
        }
        Ok(Amount::Wei(wei))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Wei(v) => write!(f, "{} MOVA", format_ether(*v)),
            Amount::All => f.write_str("full balance"),
        }
    }
}

/// Outcome of one value transfer.
#[derive(Debug, Clone)]
pub enum TransferResult {
    Sent { tx_hash: String },
    /// The node could not be reached. The proxy involved, if any, is dead.
    TransportFailure { cause: NetworkError },
    /// Reached the node (or never needed to) but the transfer cannot go through.
    OtherFailure { cause: String },
}

impl TransferResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, TransferResult::Sent { .. })
    }
}

#[async_trait]
pub trait TransferApi: Send + Sync {
    async fn send(
        &self,
        wallet: &StoredWallet,
        recipient: &str,
        amount: &Amount,
        proxy: Option<&ProxyEndpoint>,
    ) -> TransferResult;
}

pub struct TransferEngine {
    rpc_url: Url,
    chain_id: u64,
    gas_limit: u64,
    timeout: Duration,
    precheck_balance: bool,
    proxy_rpc: bool,
    direct: Provider<Http>,
}

impl TransferEngine {
    pub fn new(config: &MovaConfig) -> Result<Self> {
        let rpc_url: Url = config.rpc_url.parse().context("Invalid RPC URL")?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build RPC HTTP client")?;
        let direct = Provider::new(Http::new_with_client(rpc_url.clone(), client));

        Ok(Self {
            rpc_url,
            chain_id: config.chain_id,
            gas_limit: config.gas_limit,
            timeout: config.request_timeout(),
            precheck_balance: config.precheck_balance,
            proxy_rpc: config.proxy_rpc,
            direct,
        })
    }

    /// Node calls go direct unless `proxy_rpc` is on and a proxy was picked.
    fn provider_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Provider<Http>, NetworkError> {
        let proxy = match proxy {
            Some(p) if self.proxy_rpc => p,
            _ => return Ok(self.direct.clone()),
        };

        let proxy_error = |reason: String| NetworkError::Proxy {
            proxy: proxy.display_host().to_string(),
            reason,
        };
        let client = Client::builder()
            .proxy(Proxy::all(proxy.url()).map_err(|e| proxy_error(e.to_string()))?)
            .timeout(self.timeout)
            .build()
            .map_err(|e| proxy_error(e.to_string()))?;
        Ok(Provider::new(Http::new_with_client(self.rpc_url.clone(), client)))
    }

    /// Splits node errors into "could not talk to the node" and everything else.
    fn classify(&self, e: ProviderError, proxy: Option<&ProxyEndpoint>) -> TransferResult {
        let transport = |reason: String| {
            let cause = match proxy {
                Some(p) if self.proxy_rpc => NetworkError::Proxy {
                    proxy: p.display_host().to_string(),
                    reason,
                },
                _ => NetworkError::ConnectionFailed {
                    endpoint: self.rpc_url.to_string(),
                    reason,
                },
            };
            TransferResult::TransportFailure { cause }
        };

        match e {
            ProviderError::HTTPError(err) => {
                if err.is_timeout() {
                    TransferResult::TransportFailure {
                        cause: NetworkError::Timeout {
                            timeout_ms: self.timeout.as_millis() as u64,
                            endpoint: self.rpc_url.to_string(),
                        },
                    }
                } else {
                    transport(err.to_string())
                }
            }
            ProviderError::JsonRpcClientError(err) => {
                if err.as_error_response().is_some() || err.as_serde_error().is_some() {
                    TransferResult::OtherFailure {
                        cause: err.to_string(),
                    }
                } else {
                    transport(err.to_string())
                }
            }
            other => TransferResult::OtherFailure {
                cause: other.to_string(),
            },
        }
    }

    async fn submit(
        &self,
        provider: &Provider<Http>,
        signer: &LocalWallet,
        to: Address,
        amount: &Amount,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<H256, TransferResult> {
        let from = signer.address();

        let nonce = provider
            .get_transaction_count(from, None)
            .await
            .map_err(|e| self.classify(e, proxy))?;
        let gas_price = provider
            .get_gas_price()
            .await
            .map_err(|e| self.classify(e, proxy))?;
        let reserve = gas_price.saturating_mul(U256::from(self.gas_limit));

        let value = match amount {
            Amount::Wei(v) => {
                if self.precheck_balance {
                    let balance = provider
                        .get_balance(from, None)
                        .await
                        .map_err(|e| self.classify(e, proxy))?;
                    let needed = v.saturating_add(reserve);
                    if balance < needed {
                        return Err(TransferResult::OtherFailure {
                            cause: format!(
                                "insufficient balance: have {} MOVA, need {} MOVA",
                                format_ether(balance),
                                format_ether(needed)
                            ),
                        });
                    }
                }
                *v
            }
            Amount::All => {
                let balance = provider
                    .get_balance(from, None)
                    .await
                    .map_err(|e| self.classify(e, proxy))?;
                if balance <= reserve {
                    return Err(TransferResult::OtherFailure {
                        cause: format!(
                            "balance {} MOVA does not cover gas reservation {} MOVA",
                            format_ether(balance),
                            format_ether(reserve)
                        ),
                    });
                }
                balance - reserve
            }
        };

        let tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .gas(self.gas_limit)
            .gas_price(gas_price)
            .nonce(nonce)
            .data(Bytes::default())
            .chain_id(self.chain_id)
            .into();

        let signature = signer
            .sign_transaction(&tx)
            .await
            .map_err(|e| TransferResult::OtherFailure {
                cause: format!("signing failed: {}", e),
            })?;

        debug!(
            "Submitting {} wei from {:?} to {:?} (nonce {}, gas price {})",
            value, from, to, nonce, gas_price
        );

        let pending = provider
            .send_raw_transaction(tx.rlp_signed(&signature))
            .await
            .map_err(|e| self.classify(e, proxy))?;

        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl TransferApi for TransferEngine {
    async fn send(
        &self,
        wallet: &StoredWallet,
        recipient: &str,
        amount: &Amount,
        proxy: Option<&ProxyEndpoint>,
    ) -> TransferResult {
        let signer = match signer_from_key(&wallet.private_key, self.chain_id) {
            Ok(s) => s,
            Err(e) => return TransferResult::OtherFailure { cause: e.to_string() },
        };
        let to = match parse_address(recipient) {
            Ok(a) => a,
            Err(e) => return TransferResult::OtherFailure { cause: e.to_string() },
        };
        let provider = match self.provider_for(proxy) {
            Ok(p) => p,
            Err(cause) => return TransferResult::TransportFailure { cause },
        };

        debug!(
            "Transfer {} -> {} ({})",
            wallet.short_address(),
            to_checksum(&to, None),
            amount
        );

        match self.submit(&provider, &signer, to, amount, proxy).await {
            Ok(hash) => TransferResult::Sent {
                tx_hash: format!("{:?}", hash),
            },
            Err(result) => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_amount() {
        let amount: Amount = "0.5".parse().unwrap();
        assert_eq!(amount, Amount::Wei(U256::from(500_000_000_000_000_000u64)));
    }

    #[test]
    fn test_parse_all_keywords() {
        assert_eq!("all".parse::<Amount>().unwrap(), Amount::All);
        assert_eq!(" MAX ".parse::<Amount>().unwrap(), Amount::All);
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(matches!(
            "0".parse::<Amount>(),
            Err(WalletError::InvalidAmount { .. })
        ));
        assert!("ten".parse::<Amount>().is_err());
    }

    #[test]
    fn test_engine_builds_from_defaults() {
        let engine = TransferEngine::new(&MovaConfig::default()).unwrap();
        assert_eq!(engine.chain_id, 10323);
        assert!(!engine.proxy_rpc);
    }
}
