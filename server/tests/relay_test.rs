//! Integration tests for the admin chat: admission, join/leave notices and relaying.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use bullride_server::auth::{Admission, AdmissionPolicy, SharedSecretVerifier};
use bullride_server::chat::ChatRelay;
use futures_util::{SinkExt, StreamExt};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Helper: start the server on a random port and return (addr, relay handle).
async fn start_test_server(admission: Admission) -> (SocketAddr, ChatRelay) {
    let relay = ChatRelay::new();
    let db = bullride_server::db::init_memory_db().expect("Failed to init DB");
    let market = bullride_server::stocks::AlpacaClient::new(
        &bullride_server::config::AlpacaConfig::default(),
    )
    .expect("Failed to build market client");

    let state = bullride_server::state::AppState {
        relay: relay.clone(),
        admission,
        mailer: Arc::new(bullride_server::contact::LogMailer),
        market: Arc::new(market),
        baskets: Arc::new(bullride_server::baskets::SqliteBasketStore::new(db)),
        allowed_origin: HeaderValue::from_static("https://bullride.us"),
    };

    let app = bullride_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, relay)
}

fn token_for(email: &str) -> String {
    encode(
        &Header::default(),
        &json!({ "email": email }),
        &EncodingKey::from_secret(b"whatever-the-identity-provider-uses"),
    )
    .unwrap()
}

async fn connect(addr: SocketAddr, token: &str) -> WsStream {
    let url = format!("ws://{}/ws?token={}", addr, token);
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WebSocket connect failed");
    ws
}

/// Next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("Frame is not JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

/// Assert nothing arrives within a short window.
async fn assert_silent(ws: &mut WsStream) {
    let res = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(res.is_err(), "Expected no frame, got {:?}", res);
}

/// After a rejection notice the server closes the connection.
async fn assert_closed(ws: &mut WsStream) {
    let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timed out waiting for close");
    assert!(
        matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))),
        "Expected close, got {:?}",
        next
    );
}

async fn wait_for_members(relay: &ChatRelay, expected: usize) {
    for _ in 0..40 {
        if relay.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("Expected {} members, found {}", expected, relay.len());
}

#[tokio::test]
async fn test_plain_get_returns_liveness_text() {
    let (addr, _relay) = start_test_server(Admission::unverified("bullride.us")).await;

    for path in ["/", "/ws"] {
        let resp = reqwest::get(format!("http://{}{}", addr, path)).await.unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "Bullride backend is running!");
    }
}

#[tokio::test]
async fn test_admin_receives_own_join_notice() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut alice = connect(addr, &token_for("alice@bullride.us")).await;
    assert_eq!(
        next_json(&mut alice).await,
        json!({ "system": "alice@bullride.us joined the chat." })
    );
    assert_eq!(relay.len(), 1);
}

#[tokio::test]
async fn test_chat_message_reaches_every_member_once() {
    let (addr, _relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut alice = connect(addr, &token_for("alice@bullride.us")).await;
    next_json(&mut alice).await;

    let mut bob = connect(addr, &token_for("bob@bullride.us")).await;
    let bob_join = json!({ "system": "bob@bullride.us joined the chat." });
    assert_eq!(next_json(&mut bob).await, bob_join);
    assert_eq!(next_json(&mut alice).await, bob_join);

    alice
        .send(Message::Text(json!({ "text": "hello team" }).to_string().into()))
        .await
        .unwrap();

    let expected = json!({ "sender": "alice", "text": "hello team" });
    assert_eq!(next_json(&mut alice).await, expected);
    assert_eq!(next_json(&mut bob).await, expected);

    // Exactly once each
    assert_silent(&mut alice).await;
    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_non_admin_is_denied_and_closed() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut alice = connect(addr, &token_for("alice@bullride.us")).await;
    next_json(&mut alice).await;

    let mut mallory = connect(addr, &token_for("mallory@example.com")).await;
    assert_eq!(
        next_json(&mut mallory).await,
        json!({ "system": "Access denied: not an admin." })
    );
    assert_closed(&mut mallory).await;

    // Never registered, never announced
    assert_eq!(relay.len(), 1);
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_lookalike_domain_is_denied() {
    let (addr, _relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut ws = connect(addr, &token_for("eve@notbullride.us")).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!({ "system": "Access denied: not an admin." })
    );
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_garbage_token_is_invalid() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut ws = connect(addr, "not-a-token").await;
    assert_eq!(next_json(&mut ws).await, json!({ "system": "Invalid token." }));
    assert_closed(&mut ws).await;
    assert!(relay.is_empty());
}

#[tokio::test]
async fn test_missing_token_is_invalid() {
    let (addr, _relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/", addr))
        .await
        .expect("WebSocket connect failed");
    assert_eq!(next_json(&mut ws).await, json!({ "system": "Invalid token." }));
    assert_closed(&mut ws).await;
}

#[tokio::test]
async fn test_repeated_token_parameter_is_invalid() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let url = format!(
        "ws://{}/ws?token={}&token={}",
        addr,
        token_for("alice@bullride.us"),
        token_for("bob@bullride.us")
    );
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("WebSocket connect failed");
    assert_eq!(next_json(&mut ws).await, json!({ "system": "Invalid token." }));
    assert_closed(&mut ws).await;
    assert!(relay.is_empty());
}

#[tokio::test]
async fn test_leave_notice_after_disconnect() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut alice = connect(addr, &token_for("alice@bullride.us")).await;
    next_json(&mut alice).await;
    let mut bob = connect(addr, &token_for("bob@bullride.us")).await;
    next_json(&mut bob).await;
    next_json(&mut alice).await;

    bob.close(None).await.unwrap();

    assert_eq!(
        next_json(&mut alice).await,
        json!({ "system": "bob@bullride.us left the chat." })
    );
    wait_for_members(&relay, 1).await;

    // Announced once only
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let (addr, relay) = start_test_server(Admission::unverified("bullride.us")).await;

    let mut alice = connect(addr, &token_for("alice@bullride.us")).await;
    next_json(&mut alice).await;

    alice.send(Message::Text("not json".into())).await.unwrap();
    alice
        .send(Message::Text(json!({ "body": "wrong field" }).to_string().into()))
        .await
        .unwrap();
    alice
        .send(Message::Text(json!({ "text": "still here" }).to_string().into()))
        .await
        .unwrap();

    assert_eq!(
        next_json(&mut alice).await,
        json!({ "sender": "alice", "text": "still here" })
    );
    assert_eq!(relay.len(), 1);
}

#[tokio::test]
async fn test_shared_secret_rejects_forged_token() {
    let admission = Admission::new(
        Arc::new(SharedSecretVerifier::new(b"server-secret".to_vec())),
        AdmissionPolicy::new("bullride.us"),
    );
    let (addr, _relay) = start_test_server(admission).await;

    // Signed with the wrong key
    let mut forged = connect(addr, &token_for("alice@bullride.us")).await;
    assert_eq!(next_json(&mut forged).await, json!({ "system": "Invalid token." }));
    assert_closed(&mut forged).await;

    let exp = chrono::Utc::now().timestamp() + 600;
    let good = encode(
        &Header::default(),
        &json!({ "email": "alice@bullride.us", "exp": exp }),
        &EncodingKey::from_secret(b"server-secret"),
    )
    .unwrap();
    let mut alice = connect(addr, &good).await;
    assert_eq!(
        next_json(&mut alice).await,
        json!({ "system": "alice@bullride.us joined the chat." })
    );
}
