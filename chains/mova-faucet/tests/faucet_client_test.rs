use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use core_logic::{NetworkError, ProxyEndpoint};
use mova_faucet::{ClaimResult, FaucetApi, FaucetClient, MovaConfig};
use serde_json::{json, Value};
use std::time::Duration;

const ADDRESS: &str = "0x5aAeb6053F3E94C9b9A09f33669435e7Ef1BeAed";

async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A local port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn client_for(url: String, timeout_secs: u64) -> FaucetClient {
    let config = MovaConfig {
        faucet_url: url,
        request_timeout_secs: timeout_secs,
        user_agents: vec!["test-agent/1.0".to_string()],
        ..MovaConfig::default()
    };
    FaucetClient::new(&config).unwrap()
}

async fn faucet(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };

    if header("origin") != "https://faucet.mars.movachain.com"
        || header("referer") != "https://faucet.mars.movachain.com/"
        || header("user-agent") != "test-agent/1.0"
    {
        return Json(json!({"error": "403", "err_msg": "bad headers"}));
    }

    match body["to"].as_str() {
        Some(ADDRESS) => Json(json!({"error": "200", "data": "0xabc"})),
        Some(_) => Json(json!({"error": "400", "err_msg": "already claimed"})),
        None => Json(json!({"error": "400", "err_msg": "missing to"})),
    }
}

#[tokio::test]
async fn test_claim_is_funded_with_tx_hash() {
    let base = spawn_server(Router::new().route("/transfer", post(faucet))).await;
    let client = client_for(format!("{}/transfer", base), 5);

    match client.claim(ADDRESS, None).await {
        ClaimResult::Funded { tx_hash } => assert_eq!(tx_hash, "0xabc"),
        other => panic!("expected Funded, got {:?}", other),
    }
}

#[tokio::test]
async fn test_claim_rejection_carries_err_msg() {
    let base = spawn_server(Router::new().route("/transfer", post(faucet))).await;
    let client = client_for(format!("{}/transfer", base), 5);

    match client
        .claim("0x0000000000000000000000000000000000000001", None)
        .await
    {
        ClaimResult::Rejected { reason } => assert_eq!(reason, "already claimed"),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_page_is_rejected_not_transport() {
    let router = Router::new().route(
        "/transfer",
        post(|| async { (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>") }),
    );
    let base = spawn_server(router).await;
    let client = client_for(format!("{}/transfer", base), 5);

    match client.claim(ADDRESS, None).await {
        ClaimResult::Rejected { reason } => assert!(reason.contains("502")),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refused_connection_is_transport_failure() {
    let port = closed_port().await;
    let client = client_for(format!("http://127.0.0.1:{}/transfer", port), 5);

    assert!(matches!(
        client.claim(ADDRESS, None).await,
        ClaimResult::TransportFailure {
            cause: NetworkError::ConnectionFailed { .. }
        }
    ));
}

#[tokio::test]
async fn test_dead_proxy_is_transport_failure() {
    let base = spawn_server(Router::new().route("/transfer", post(faucet))).await;
    let client = client_for(format!("{}/transfer", base), 5);
    let proxy = ProxyEndpoint::from(format!("127.0.0.1:{}", closed_port().await).as_str());

    assert!(matches!(
        client.claim(ADDRESS, Some(&proxy)).await,
        ClaimResult::TransportFailure {
            cause: NetworkError::Proxy { .. }
        }
    ));
}

#[tokio::test]
async fn test_unusable_proxy_spec_is_transport_failure() {
    let base = spawn_server(Router::new().route("/transfer", post(faucet))).await;
    let client = client_for(format!("{}/transfer", base), 5);
    let proxy = ProxyEndpoint::from("ftp://127.0.0.1:21");

    assert!(matches!(
        client.claim(ADDRESS, Some(&proxy)).await,
        ClaimResult::TransportFailure { .. }
    ));
}

#[tokio::test]
async fn test_slow_faucet_times_out() {
    let router = Router::new().route(
        "/transfer",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({"error": "200", "data": "0xlate"}))
        }),
    );
    let base = spawn_server(router).await;
    let client = client_for(format!("{}/transfer", base), 1);

    assert!(matches!(
        client.claim(ADDRESS, None).await,
        ClaimResult::TransportFailure {
            cause: NetworkError::Timeout { .. }
        }
    ));
}
