//! End-to-end gateway tests over real HTTP, backed by the in-memory ledger.

use std::sync::Arc;

use bank_ledger::gateway::{self, auth::Claims, state::AppState};
use bank_ledger::money::Money;
use bank_ledger::store::MemoryLedgerStore;
use jsonwebtoken::{EncodingKey, Header, encode};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const SECRET: &str = "http-test-secret";
const OWNER_A: i64 = 1;
const OWNER_B: i64 = 2;

struct TestServer {
    base: String,
    store: Arc<MemoryLedgerStore>,
    client: reqwest::Client,
}

impl TestServer {
    /// A=100.00 (owner 1), B=50.00 (owner 2)
    async fn start() -> Self {
        let store = Arc::new(MemoryLedgerStore::new());
        store
            .open_account(OWNER_A, "A", Money::parse("100.00").unwrap())
            .unwrap();
        store
            .open_account(OWNER_B, "B", Money::parse("50.00").unwrap())
            .unwrap();

        let state = Arc::new(AppState::new(store.clone(), SECRET));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(gateway::serve(listener, state));

        Self {
            base: format!("http://{}", addr),
            store,
            client: reqwest::Client::new(),
        }
    }

    fn token(user_id: i64) -> String {
        let now = chrono::Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + 3600,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    async fn transfer(&self, user_id: i64, key: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = self
            .client
            .post(format!("{}/api/v1/transactions/transfer", self.base))
            .bearer_auth(Self::token(user_id))
            .json(&body);
        if let Some(key) = key {
            req = req.header("Idempotency-Key", key);
        }
        let resp = req.send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn history(&self, user_id: i64, query: &str) -> (StatusCode, Value) {
        let resp = self
            .client
            .get(format!("{}/api/v1/transactions{}", self.base, query))
            .bearer_auth(Self::token(user_id))
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    fn balance(&self, id: i64) -> String {
        self.store.account(id).unwrap().balance.to_string()
    }
}

fn body(amount: Value) -> Value {
    json!({ "fromAccountId": 1, "toAccount": "B", "amount": amount })
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let resp = reqwest::get(format!("{}/api/v1/health", server.base))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["store"], "memory");
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .post(format!("{}/api/v1/transactions/transfer", server.base))
        .header("Idempotency-Key", "k1")
        .json(&body(json!("1.00")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["code"], 2001);
    assert_eq!(server.balance(1), "100.00");
}

#[tokio::test]
async fn test_transfer_and_replay() {
    let server = TestServer::start().await;

    let (status, json) = server
        .transfer(OWNER_A, Some("k1"), body(json!("30.00")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["code"], 0);
    assert_eq!(json["data"]["transactionId"], 1);
    assert_eq!(json["data"]["message"], "Transfer successful");
    assert_eq!(server.balance(1), "70.00");
    assert_eq!(server.balance(2), "80.00");

    // Numeric amount, same key: replay
    let (status, json) = server.transfer(OWNER_A, Some("k1"), body(json!(30))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["transactionId"], 1);
    assert_eq!(
        json["data"]["message"],
        "Transfer already processed (Idempotent)"
    );
    assert_eq!(server.balance(1), "70.00");
    assert_eq!(server.balance(2), "80.00");
}

#[tokio::test]
async fn test_transfer_rejections() {
    let server = TestServer::start().await;

    let (status, json) = server.transfer(OWNER_A, None, body(json!("1.00"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["data"]["error"], "MISSING_IDEMPOTENCY_KEY");

    let (status, _) = server
        .transfer(OWNER_A, Some("k2"), body(json!("1.001")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .transfer(OWNER_A, Some("k3"), body(json!("0")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = server
        .transfer(OWNER_A, Some("k4"), body(json!("100.01")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], 1002);
    assert_eq!(json["data"]["error"], "INSUFFICIENT_FUNDS");
    assert_eq!(json["data"]["retryable"], false);

    let (status, json) = server
        .transfer(
            OWNER_A,
            Some("k5"),
            json!({ "fromAccountId": 1, "toAccount": "NOPE", "amount": "1.00" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["msg"], "Receiver account not found");

    // Owner B may not spend from A
    let (status, json) = server
        .transfer(OWNER_B, Some("k6"), body(json!("1.00")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["data"]["error"], "ACCOUNT_NOT_FOUND");

    assert_eq!(server.balance(1), "100.00");
    assert_eq!(server.store.transaction_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_over_http() {
    let server = TestServer::start().await;

    let requests = (0..8).map(|_| server.transfer(OWNER_A, Some("dup"), body(json!("30.00"))));
    let results = futures::future::join_all(requests).await;

    let created = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::CREATED)
        .count();
    assert_eq!(created, 1);
    assert!(
        results
            .iter()
            .all(|(_, json)| json["data"]["transactionId"] == 1)
    );
    assert_eq!(server.balance(1), "70.00");
}

#[tokio::test]
async fn test_history_scoped_and_paginated() {
    let server = TestServer::start().await;
    for i in 0..3 {
        let (status, _) = server
            .transfer(OWNER_A, Some(format!("h{}", i).as_str()), body(json!("1.00")))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = server.history(OWNER_B, "?page=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    let page = &json["data"];
    assert_eq!(page["count"], 3);
    assert_eq!(page["totalPages"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 2);
    assert_eq!(page["data"][0]["id"], 3);
    assert_eq!(page["data"][0]["type"], "TRANSFER");
    assert_eq!(page["data"][0]["fromAccountNumber"], "A");
    assert_eq!(page["data"][0]["toAccountNumber"], "B");

    let (_, json) = server.history(OWNER_B, "?page=2&limit=2").await;
    assert_eq!(json["data"]["data"].as_array().unwrap().len(), 1);

    let (_, json) = server.history(OWNER_A, "?type=DEPOSIT").await;
    assert_eq!(json["data"]["count"], 0);

    let (_, json) = server.history(OWNER_A, "?accountId=B").await;
    assert_eq!(json["data"]["count"], 3);

    // A user with no accounts sees nothing
    let (status, json) = server.history(99, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["count"], 0);
    assert_eq!(json["data"]["totalPages"], 0);

    let (status, _) = server.history(OWNER_A, "?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
