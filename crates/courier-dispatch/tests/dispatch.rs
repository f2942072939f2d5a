// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{Duration, Utc};

use courier_core::{
    CourierError, CredentialStore, DispatchLedger, DispatchState, OutboundMessageRequest,
    RefreshState, SendReceipt,
};
use courier_dispatch::Dispatcher;
use courier_test_utils::TestHarness;

async fn harness() -> TestHarness {
    let h = TestHarness::new().await.unwrap();
    h.seed_credential("alice", "tok-alice", Utc::now(), Duration::days(60))
        .await
        .unwrap();
    h
}

fn dispatcher(h: &TestHarness) -> Dispatcher {
    Dispatcher::new(
        h.platform.clone(),
        h.store.clone(),
        h.store.clone(),
        &h.config.dispatch,
    )
}

fn timeout() -> CourierError {
    CourierError::UpstreamUnavailable {
        message: "request timed out".into(),
        ambiguous: true,
    }
}

#[tokio::test]
async fn sends_with_current_token_and_records_sent() {
    let h = harness().await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-1");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Sent);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.platform_message_id.is_some());

    let sent = h.platform.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "tok-alice");
    assert_eq!(sent[0].1.idempotency_key, "k-1");
}

#[tokio::test]
async fn terminal_key_is_never_resent() {
    let h = harness().await;
    let d = dispatcher(&h);
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-1");

    let first = d.dispatch(&request).await.unwrap();
    let second = d.dispatch(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.platform.send_count().await, 1);
}

#[tokio::test]
async fn concurrent_dispatches_of_one_key_send_once() {
    let h = harness().await;
    let d = dispatcher(&h);
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-1");

    let (a, b) = tokio::join!(d.dispatch(&request), d.dispatch(&request));
    assert_eq!(a.unwrap().state, DispatchState::Sent);
    assert_eq!(b.unwrap().state, DispatchState::Sent);
    assert_eq!(h.platform.send_count().await, 1);
}

#[tokio::test]
async fn transient_failures_retry_with_same_key() {
    let h = harness().await;
    h.platform.push_send(Err(CourierError::upstream("503"))).await;
    h.platform.push_send(Err(CourierError::upstream("429"))).await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-1");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Sent);
    assert_eq!(outcome.attempts, 3);
    let keys: Vec<_> = h
        .platform
        .sent()
        .await
        .into_iter()
        .map(|(_, r)| r.idempotency_key)
        .collect();
    assert_eq!(keys, vec!["k-1", "k-1", "k-1"]);
}

#[tokio::test]
async fn retries_are_bounded() {
    let h = harness().await;
    for _ in 0..10 {
        h.platform.push_send(Err(CourierError::upstream("503"))).await;
    }
    let request = OutboundMessageRequest::new("alice", "bob", "hello");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Failed);
    assert_eq!(outcome.attempts, h.config.dispatch.max_attempts);
    assert_eq!(h.platform.send_count().await, h.config.dispatch.max_attempts as usize);
}

#[tokio::test]
async fn rejection_fails_without_retry() {
    let h = harness().await;
    h.platform
        .push_send(Err(CourierError::Rejected {
            message: "recipient unavailable".into(),
        }))
        .await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Failed);
    assert!(outcome.error.unwrap().contains("recipient unavailable"));
    assert_eq!(h.platform.send_count().await, 1);
}

#[tokio::test]
async fn ambiguous_timeout_is_not_resent_without_platform_idempotency() {
    let h = harness().await;
    h.platform.push_send(Err(timeout())).await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Failed);
    assert!(outcome.error.unwrap().starts_with("outcome unknown"));
    assert_eq!(h.platform.send_count().await, 1);
}

#[tokio::test]
async fn ambiguous_timeout_is_resent_with_platform_idempotency() {
    let mut h = harness().await;
    h.config.dispatch.platform_idempotency = true;
    h.platform.push_send(Err(timeout())).await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello");

    let outcome = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Sent);
    assert_eq!(h.platform.send_count().await, 2);
}

#[tokio::test]
async fn missing_or_lapsed_credential_is_no_credential() {
    let h = harness().await;
    let d = dispatcher(&h);

    let unknown = OutboundMessageRequest::new("nobody", "bob", "hi").with_key("k-none");
    let err = d.dispatch(&unknown).await.unwrap_err();
    assert!(matches!(err, CourierError::NoCredential { .. }));
    let record = DispatchLedger::get(&*h.store, "k-none")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.state, DispatchState::Failed);
    assert_eq!(record.attempts, 0);
    assert!(record.last_error.unwrap().contains("nobody"));

    let mut lapsed = CredentialStore::get(&*h.store, "alice")
        .await
        .unwrap()
        .unwrap();
    lapsed.refresh_state = RefreshState::RefreshFailed;
    h.store.put(&lapsed).await.unwrap();
    let request = OutboundMessageRequest::new("alice", "bob", "hi").with_key("k-lapsed");
    let err = d.dispatch(&request).await.unwrap_err();
    assert!(matches!(err, CourierError::NoCredential { .. }));
    assert_eq!(h.platform.send_count().await, 0);

    // The key stays failed after re-authorization; a retry replays it.
    h.seed_credential("alice", "tok-new", Utc::now(), Duration::days(60))
        .await
        .unwrap();
    let outcome = d.dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Failed);
    assert_eq!(outcome.attempts, 0);
    assert_eq!(h.platform.send_count().await, 0);
}

#[tokio::test]
async fn sent_key_is_not_resent_after_restart() {
    let h = harness().await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-restart");
    let first = dispatcher(&h).dispatch(&request).await.unwrap();
    assert_eq!(first.state, DispatchState::Sent);

    let restarted = h.reopen_store().await.unwrap();
    let d = Dispatcher::new(
        h.platform.clone(),
        restarted.clone(),
        restarted.clone(),
        &h.config.dispatch,
    );
    let second = d.dispatch(&request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.platform.send_count().await, 1);
}

#[tokio::test]
async fn interrupted_send_is_failed_after_restart() {
    let h = harness().await;
    let request = OutboundMessageRequest::new("alice", "bob", "hello").with_key("k-crash");
    // A previous process recorded an attempt and died before completing.
    h.store.begin(&request).await.unwrap();
    h.store.record_attempt("k-crash").await.unwrap();

    let restarted = h.reopen_store().await.unwrap();
    let d = Dispatcher::new(
        h.platform.clone(),
        restarted.clone(),
        restarted.clone(),
        &h.config.dispatch,
    );
    let outcome = d.dispatch(&request).await.unwrap();
    assert_eq!(outcome.state, DispatchState::Failed);
    assert_eq!(h.platform.send_count().await, 0);
    assert_eq!(
        d.status("k-crash").await.unwrap().unwrap().state,
        DispatchState::Failed
    );
}

#[tokio::test]
async fn key_reuse_with_different_body_is_rejected() {
    let h = harness().await;
    let d = dispatcher(&h);
    h.platform
        .push_send(Ok(SendReceipt {
            platform_message_id: None,
        }))
        .await;
    let first = OutboundMessageRequest::new("alice", "bob", "one").with_key("k-1");
    d.dispatch(&first).await.unwrap();

    // Terminal records replay regardless of content.
    let replay = OutboundMessageRequest::new("alice", "bob", "two").with_key("k-1");
    assert_eq!(d.dispatch(&replay).await.unwrap().state, DispatchState::Sent);

    let pending = OutboundMessageRequest::new("alice", "bob", "three").with_key("k-2");
    h.store.begin(&pending).await.unwrap();
    let other = OutboundMessageRequest::new("alice", "carol", "three").with_key("k-2");
    assert!(matches!(
        d.dispatch(&other).await.unwrap_err(),
        CourierError::Rejected { .. }
    ));
}
