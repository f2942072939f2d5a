// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_auth::{RefreshScheduler, TokenExchange};
use courier_core::{
    CourierError, CredentialStore, EventLog, KeyedLocks, PluginAdapter, RefreshState,
};
use courier_dispatch::Dispatcher;
use courier_gateway::{AppState, AuthConfig, HealthState, build_router};
use courier_test_utils::TestHarness;
use courier_webhook::{IngestionHandler, SignatureVerifier};

const TOKEN: &str = "api-token";

fn app(h: &TestHarness) -> Router {
    let locks = KeyedLocks::new();
    let state = AppState {
        credentials: h.store.clone(),
        events: h.store.clone(),
        exchange: Arc::new(TokenExchange::new(
            h.platform.clone(),
            h.store.clone(),
            locks.clone(),
            &h.config.exchange,
        )),
        scheduler: Arc::new(RefreshScheduler::new(
            h.store.clone(),
            h.platform.clone(),
            h.alerts.clone(),
            locks,
            &h.config.refresh,
        )),
        dispatcher: Arc::new(Dispatcher::new(
            h.platform.clone(),
            h.store.clone(),
            h.store.clone(),
            &h.config.dispatch,
        )),
        ingestion: Arc::new(IngestionHandler::new(
            h.store.clone(),
            &h.config.webhook,
            h.config.webhook_app_secret(),
        )),
        auth: AuthConfig {
            bearer_token: Some(TOKEN.to_string()),
        },
        health: HealthState {
            start_time: std::time::Instant::now(),
            adapters: vec![h.store.clone() as Arc<dyn PluginAdapter>],
            prometheus_render: Some(Arc::new(|| "courier_lapsed_credentials 0\n".to_string())),
        },
    };
    build_router(state)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {TOKEN}"));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn webhook_body(mid: &str) -> String {
    json!({
        "object": "instagram",
        "entry": [{"id": "222", "time": 1, "messaging": [{
            "sender": {"id": "111"}, "recipient": {"id": "222"},
            "timestamp": 1, "message": {"mid": mid, "text": "hi"}
        }]}]
    })
    .to_string()
}

fn signed_delivery(body: &str, secret: &str) -> Request<Body> {
    let signature = SignatureVerifier::new(secret).sign(body.as_bytes()).unwrap();
    Request::post("/webhook")
        .header("x-hub-signature-256", signature)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn handshake_echoes_challenge() {
    let h = TestHarness::new().await.unwrap();
    let ok = app(&h)
        .oneshot(get(
            "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444",
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    let bytes = to_bytes(ok.into_body(), 1024).await.unwrap();
    assert_eq!(&bytes[..], b"1158201444");

    let bad = app(&h)
        .oneshot(get(
            "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=1",
        ))
        .await
        .unwrap();
    assert_eq!(bad.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn webhook_delivery_status_codes() {
    let h = TestHarness::new().await.unwrap();
    let body = webhook_body("m_1");

    let ok = app(&h)
        .oneshot(signed_delivery(&body, "test-secret"))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["persisted"], 1);

    let again = app(&h)
        .oneshot(signed_delivery(&body, "test-secret"))
        .await
        .unwrap();
    assert_eq!(body_json(again).await["duplicates"], 1);
    assert_eq!(h.store.count().await.unwrap(), 1);

    let forged = app(&h)
        .oneshot(signed_delivery(&body, "attacker"))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let malformed = app(&h)
        .oneshot(signed_delivery("{\"entry\": 5}", "test-secret"))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_exchanges_code_without_leaking_token() {
    let h = TestHarness::new().await.unwrap();
    h.platform.map_code("abc123", "alice").await;

    let response = app(&h)
        .oneshot(get("/auth/callback?code=abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["subject_id"], "alice");
    assert_eq!(json["token_kind"], "long_lived");
    assert!(!json.to_string().contains("long-short"));
    assert!(CredentialStore::get(&*h.store, "alice").await.unwrap().is_some());
}

#[tokio::test]
async fn callback_error_statuses() {
    let h = TestHarness::new().await.unwrap();
    h.platform
        .push_exchange(Err(CourierError::InvalidCode {
            message: "code has been used".into(),
        }))
        .await;
    let used = app(&h).oneshot(get("/auth/callback?code=old")).await.unwrap();
    assert_eq!(used.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(used).await["kind"], "invalid_code");

    h.platform
        .push_upgrade(Err(CourierError::UpgradeFailed {
            message: "nope".into(),
        }))
        .await;
    let upgrade = app(&h).oneshot(get("/auth/callback?code=x")).await.unwrap();
    assert_eq!(upgrade.status(), StatusCode::BAD_GATEWAY);

    let denied = app(&h)
        .oneshot(get("/auth/callback?error=access_denied&error_description=User+denied"))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::BAD_REQUEST);
    assert_eq!(h.platform.exchange_calls(), 2);
}

#[tokio::test]
async fn api_requires_bearer_token() {
    let h = TestHarness::new().await.unwrap();
    let response = app(&h).oneshot(get("/v1/credentials")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::get("/v1/credentials")
        .header("authorization", "Bearer guess")
        .body(Body::empty())
        .unwrap();
    assert_eq!(
        app(&h).oneshot(wrong).await.unwrap().status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn send_message_is_idempotent_over_http() {
    let h = TestHarness::new().await.unwrap();
    h.seed_credential("alice", "tok", Utc::now(), Duration::days(60))
        .await
        .unwrap();
    let body = json!({"idempotency_key": "k-1", "subject_id": "alice", "recipient_id": "bob", "text": "hi"});

    for _ in 0..2 {
        let response = app(&h)
            .oneshot(authed("POST", "/v1/messages", Some(body.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["state"], "sent");
    }
    assert_eq!(h.platform.send_count().await, 1);

    let status = app(&h)
        .oneshot(authed("GET", "/v1/messages/k-1", None))
        .await
        .unwrap();
    assert_eq!(body_json(status).await["state"], "sent");

    let orphan = json!({"subject_id": "nobody", "recipient_id": "bob", "text": "hi"});
    let response = app(&h)
        .oneshot(authed("POST", "/v1/messages", Some(orphan)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["kind"], "no_credential");
}

#[tokio::test]
async fn credential_status_listing_and_revocation() {
    let h = TestHarness::new().await.unwrap();
    h.seed_credential("alice", "tok-a", Utc::now(), Duration::days(60))
        .await
        .unwrap();
    let mut lapsed = h
        .seed_credential("bob", "tok-b", Utc::now(), Duration::days(60))
        .await
        .unwrap();
    lapsed.refresh_state = RefreshState::RefreshFailed;
    h.store.put(&lapsed).await.unwrap();

    let status = app(&h)
        .oneshot(authed("GET", "/v1/credentials/alice", None))
        .await
        .unwrap();
    let json = body_json(status).await;
    assert_eq!(json["refresh_state"], "fresh");
    assert!(!json.to_string().contains("tok-a"));

    let failed = app(&h)
        .oneshot(authed("GET", "/v1/credentials?state=refresh_failed", None))
        .await
        .unwrap();
    let list = body_json(failed).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["subject_id"], "bob");

    let health = app(&h).oneshot(get("/health")).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);
    assert_eq!(body_json(health).await["lapsed_credentials"], 1);

    let reset = app(&h)
        .oneshot(authed("POST", "/v1/credentials/bob/reset", None))
        .await
        .unwrap();
    assert_eq!(body_json(reset).await["reset"], true);

    let deleted = app(&h)
        .oneshot(authed("DELETE", "/v1/credentials/alice", None))
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let missing = app(&h)
        .oneshot(authed("GET", "/v1/credentials/alice", None))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let bad_state = app(&h)
        .oneshot(authed("GET", "/v1/credentials?state=stale", None))
        .await
        .unwrap();
    assert_eq!(bad_state.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn events_page_after_sequence() {
    let h = TestHarness::new().await.unwrap();
    for mid in ["m_1", "m_2", "m_3"] {
        app(&h)
            .oneshot(signed_delivery(&webhook_body(mid), "test-secret"))
            .await
            .unwrap();
    }
    let first = h.store.read_after(0, 1).await.unwrap()[0].sequence;

    let response = app(&h)
        .oneshot(authed("GET", &format!("/v1/events?after={first}&limit=10"), None))
        .await
        .unwrap();
    let events = body_json(response).await;
    let ids: Vec<_> = events
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["platform_event_id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["m_2", "m_3"]);
}

#[tokio::test]
async fn metrics_are_public() {
    let h = TestHarness::new().await.unwrap();
    let response = app(&h).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("courier_lapsed_credentials"));
}
