use crate::config::MovaConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{NetworkError, ProxyEndpoint};
use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Proxy};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Outcome of one faucet request.
#[derive(Debug, Clone)]
pub enum ClaimResult {
    Funded { tx_hash: String },
    /// The faucet answered but declined (already claimed, rate limited, ...).
    Rejected { reason: String },
    /// The request never got a usable answer. The proxy involved is dead.
    TransportFailure { cause: NetworkError },
}

impl ClaimResult {
    pub fn is_funded(&self) -> bool {
        matches!(self, ClaimResult::Funded { .. })
    }
}

#[async_trait]
pub trait FaucetApi: Send + Sync {
    async fn claim(&self, address: &str, proxy: Option<&ProxyEndpoint>) -> ClaimResult;
}

pub struct FaucetClient {
    url: String,
    origin: String,
    referer: String,
    user_agents: Vec<String>,
    timeout: Duration,
    direct: Client,
}

impl FaucetClient {
    pub fn new(config: &MovaConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let direct = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build faucet HTTP client")?;

        Ok(Self {
            url: config.faucet_url.clone(),
            origin: config.faucet_origin.clone(),
            referer: config.faucet_referer.clone(),
            user_agents: config.user_agents.clone(),
            timeout,
            direct,
        })
    }

    fn client_for(&self, proxy: Option<&ProxyEndpoint>) -> Result<Client, NetworkError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let proxy_error = |reason: String| NetworkError::Proxy {
            proxy: proxy.display_host().to_string(),
            reason,
        };
        let tunnel = Proxy::all(proxy.url()).map_err(|e| proxy_error(e.to_string()))?;
        Client::builder()
            .proxy(tunnel)
            .timeout(self.timeout)
            .build()
            .map_err(|e| proxy_error(e.to_string()))
    }

    fn user_agent(&self) -> &str {
        self.user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .unwrap_or("Mozilla/5.0")
    }

    fn transport_error(&self, e: &reqwest::Error, proxy: Option<&ProxyEndpoint>) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
                endpoint: self.url.clone(),
            }
        } else if let Some(p) = proxy {
            NetworkError::Proxy {
                proxy: p.display_host().to_string(),
                reason: e.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed {
                endpoint: self.url.clone(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl FaucetApi for FaucetClient {
    async fn claim(&self, address: &str, proxy: Option<&ProxyEndpoint>) -> ClaimResult {
        let client = match self.client_for(proxy) {
            Ok(c) => c,
            Err(cause) => return ClaimResult::TransportFailure { cause },
        };

        debug!(
            "POST {} for {} via {}",
            self.url,
            address,
            proxy.map(ProxyEndpoint::display_host).unwrap_or("direct")
        );

        let response = client
            .post(&self.url)
            .header(USER_AGENT, self.user_agent())
            .header(ACCEPT, "*/*")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(CONTENT_TYPE, "application/json")
            .header(ORIGIN, self.origin.as_str())
            .header(REFERER, self.referer.as_str())
            .json(&json!({ "to": address }))
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                return ClaimResult::TransportFailure {
                    cause: self.transport_error(&e, proxy),
                }
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify_body(status, &body),
            Err(e) => ClaimResult::TransportFailure {
                cause: self.transport_error(&e, proxy),
            },
        }
    }
}

/// Turns a faucet response body into a claim outcome.
///
/// Only `"error": "200"` counts as funded; `data` then holds the tx hash.
pub fn classify_body(status: u16, body: &str) -> ClaimResult {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let snippet: String = body.trim().chars().take(120).collect();
            return ClaimResult::Rejected {
                reason: format!("HTTP {} with non-JSON body: {}", status, snippet),
            };
        }
    };

    let error = value.get("error");
    if error.and_then(Value::as_str) == Some("200") {
        let tx_hash = match value.get("data") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        return ClaimResult::Funded { tx_hash };
    }

    let reason = value
        .get("err_msg")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| {
            error.map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        })
        .unwrap_or_else(|| format!("HTTP {} without error field", status));

    ClaimResult::Rejected { reason }
}
