use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use core_logic::{NetworkError, StoredWallet};
use mova_faucet::wallet::create_wallet;
use mova_faucet::{Amount, MovaConfig, TransferApi, TransferEngine, TransferResult};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const RECIPIENT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
const TX_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

/// Canned node: fixed nonce and gas price, configurable balance and send reply.
struct MockNode {
    balance: &'static str,
    send_reply: Value,
    methods: Mutex<Vec<String>>,
}

impl MockNode {
    fn new(balance: &'static str, send_reply: Value) -> Arc<Self> {
        Arc::new(Self {
            balance,
            send_reply,
            methods: Mutex::default(),
        })
    }

    fn methods(&self) -> Vec<String> {
        self.methods.lock().unwrap().clone()
    }
}

async fn rpc(State(node): State<Arc<MockNode>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default().to_string();
    node.methods.lock().unwrap().push(method.clone());

    let reply = match method.as_str() {
        "eth_getTransactionCount" => json!({"result": "0x0"}),
        "eth_gasPrice" => json!({"result": "0x1"}),
        "eth_getBalance" => json!({"result": node.balance}),
        "eth_chainId" => json!({"result": "0x2853"}),
        "eth_sendRawTransaction" => node.send_reply.clone(),
        _ => json!({"error": {"code": -32601, "message": "method not found"}}),
    };

    let mut body = json!({"jsonrpc": "2.0", "id": id});
    if let (Some(out), Some(reply)) = (body.as_object_mut(), reply.as_object()) {
        for (k, v) in reply {
            out.insert(k.clone(), v.clone());
        }
    }
    Json(body)
}

async fn spawn_node(node: Arc<MockNode>) -> String {
    let router = Router::new().route("/", post(rpc)).with_state(node);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/", addr)
}

fn engine(rpc_url: String, precheck_balance: bool) -> TransferEngine {
    let config = MovaConfig {
        rpc_url,
        request_timeout_secs: 5,
        precheck_balance,
        ..MovaConfig::default()
    };
    TransferEngine::new(&config).unwrap()
}

fn one_ether() -> Amount {
    "1".parse().unwrap()
}

#[tokio::test]
async fn test_sent_returns_node_tx_hash() {
    let node = MockNode::new("0xde0b6b3a7640000000", json!({"result": TX_HASH}));
    let url = spawn_node(node.clone()).await;
    let wallet = create_wallet();

    let result = engine(url, true)
        .send(&wallet, RECIPIENT, &one_ether(), None)
        .await;

    match result {
        TransferResult::Sent { tx_hash } => assert_eq!(tx_hash, TX_HASH),
        other => panic!("expected Sent, got {:?}", other),
    }
    let methods = node.methods();
    assert!(methods.contains(&"eth_getTransactionCount".to_string()));
    assert!(methods.contains(&"eth_gasPrice".to_string()));
    assert_eq!(methods.last().map(String::as_str), Some("eth_sendRawTransaction"));
}

#[tokio::test]
async fn test_insufficient_balance_is_other_failure_without_submit() {
    let node = MockNode::new("0x0", json!({"result": TX_HASH}));
    let url = spawn_node(node.clone()).await;

    let result = engine(url, true)
        .send(&create_wallet(), RECIPIENT, &one_ether(), None)
        .await;

    match result {
        TransferResult::OtherFailure { cause } => assert!(cause.contains("insufficient")),
        other => panic!("expected OtherFailure, got {:?}", other),
    }
    assert!(!node.methods().contains(&"eth_sendRawTransaction".to_string()));
}

#[tokio::test]
async fn test_node_rejection_is_other_failure() {
    let node = MockNode::new(
        "0x0",
        json!({"error": {"code": -32000, "message": "insufficient funds for gas * price + value"}}),
    );
    let url = spawn_node(node).await;

    let result = engine(url, false)
        .send(&create_wallet(), RECIPIENT, &one_ether(), None)
        .await;

    match result {
        TransferResult::OtherFailure { cause } => assert!(cause.contains("insufficient funds")),
        other => panic!("expected OtherFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_send_all_below_gas_reservation_is_other_failure() {
    // 2_000_000 gas at 1 wei needs more than 0x100 wei
    let node = MockNode::new("0x100", json!({"result": TX_HASH}));
    let url = spawn_node(node.clone()).await;

    let result = engine(url, false)
        .send(&create_wallet(), RECIPIENT, &Amount::All, None)
        .await;

    assert!(matches!(result, TransferResult::OtherFailure { .. }));
    assert!(!node.methods().contains(&"eth_sendRawTransaction".to_string()));
}

#[tokio::test]
async fn test_send_all_submits_when_balance_covers_gas() {
    let node = MockNode::new("0xde0b6b3a7640000", json!({"result": TX_HASH}));
    let url = spawn_node(node).await;

    let result = engine(url, true)
        .send(&create_wallet(), RECIPIENT, &Amount::All, None)
        .await;

    assert!(result.is_sent());
}

#[tokio::test]
async fn test_unreachable_node_is_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = engine(format!("http://127.0.0.1:{}/", port), true)
        .send(&create_wallet(), RECIPIENT, &one_ether(), None)
        .await;

    assert!(matches!(
        result,
        TransferResult::TransportFailure {
            cause: NetworkError::ConnectionFailed { .. }
        }
    ));
}

#[tokio::test]
async fn test_bad_key_and_bad_recipient_are_other_failures() {
    let node = MockNode::new("0x0", json!({"result": TX_HASH}));
    let url = spawn_node(node.clone()).await;
    let engine = engine(url, true);

    let broken = StoredWallet::new("0x0000000000000000000000000000000000000001", "0x1234");
    assert!(matches!(
        engine.send(&broken, RECIPIENT, &one_ether(), None).await,
        TransferResult::OtherFailure { .. }
    ));
    assert!(matches!(
        engine
            .send(&create_wallet(), "not-an-address", &one_ether(), None)
            .await,
        TransferResult::OtherFailure { .. }
    ));
    assert!(node.methods().is_empty());
}
