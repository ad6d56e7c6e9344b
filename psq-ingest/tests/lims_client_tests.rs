//! LIMS client integration tests against the in-process mock
//!
//! Covers credential lifecycle, retry behavior and batch → sample
//! resolution over real HTTP.

mod helpers;

use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use helpers::mock_lims::{client, client_with_timeout, settings, spawn, spawn_dropping_api, MockState};
use psq_ingest::lims::{
    BatchResolver, LimsError, ResolutionWarning, SampleRecordBuilder, WeightExtractor,
};

#[tokio::test]
async fn test_first_request_authenticates_once() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    assert!(client.is_token_expired().await);
    client.get_json("batch/B-1", None).await.unwrap();
    client.get_json("batch/B-2", None).await.unwrap();

    assert!(!client.is_token_expired().await);
    assert_eq!(state.tokens_issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejected_client_surfaces_auth_error() {
    let state = MockState::new();
    state.reject_auth.store(true, Ordering::SeqCst);
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let err = client.get_json("batch/B-1", None).await.unwrap_err();
    match err {
        LimsError::Auth(auth) => assert!(auth.to_string().contains("invalid_client: bad secret")),
        other => panic!("expected auth error, got {other:?}"),
    }
    assert!(client.is_token_expired().await);
    assert_eq!(state.hits("batch/B-1"), 0);
}

#[tokio::test]
async fn test_unauthorized_response_reauthenticates() {
    let state = MockState::new();
    state.revoke_once.store(true, Ordering::SeqCst);
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let payload = client.get_json("sample/revoked", None).await.unwrap();

    assert_eq!(payload["data"]["sample_name"], "retry target");
    assert_eq!(state.hits("sample/revoked"), 2);
    assert_eq!(state.tokens_issued.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let state = MockState::new();
    state.throttle_once.store(true, Ordering::SeqCst);
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let payload = client.get_json("sample/throttled", None).await.unwrap();

    assert_eq!(payload["data"]["id"], "throttled");
    assert_eq!(state.hits("sample/throttled"), 2);
    assert_eq!(state.tokens_issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_persistent_throttling_exhausts_retries() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let err = client.get_json("sample/always-throttled", None).await.unwrap_err();

    assert!(matches!(err, LimsError::RetriesExhausted { attempts: 3, .. }));
    assert!(err.to_string().contains("sample/always-throttled"));
    assert_eq!(state.hits("sample/always-throttled"), 3);
}

#[tokio::test]
async fn test_timed_out_request_is_retried() {
    let state = MockState::new();
    state.slow_once.store(true, Ordering::SeqCst);
    let base = spawn(state.clone()).await;
    let client = client_with_timeout(&settings(&base), Duration::from_millis(150));

    let payload = client.get_json("sample/slow", None).await.unwrap();

    assert_eq!(payload["data"]["id"], "slow");
    assert_eq!(state.hits("sample/slow"), 2);
    assert_eq!(state.tokens_issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_connections_surface_transport_error() {
    let (base, dropped) = spawn_dropping_api().await;
    let client = client(&settings(&base));

    let err = client.get_json("batch/B-1", None).await.unwrap_err();

    match &err {
        LimsError::Transport { url, .. } => assert!(url.ends_with("/api/v1/batch/B-1")),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(dropped.load(Ordering::SeqCst), 3);
    assert!(!client.is_token_expired().await);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let err = client.get_json("batch/missing", None).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(state.hits("batch/missing"), 1);
}

#[tokio::test]
async fn test_batch_samples_with_partial_failure() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let settings = settings(&base);
    let client = client(&settings);
    let resolver = BatchResolver::new(&client, settings.page_size);
    let builder = SampleRecordBuilder::new(&client, WeightExtractor::new(settings.reference_mass));

    let batch = builder
        .fetch_batch_samples(&resolver, "B-1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(batch.requested_ids, vec!["101", "102", "103"]);
    assert_eq!(batch.diagnostic, "Batch B-1: 2 samples fetched | ids=3 | failed=1");
    assert_eq!(batch.records.len(), 2);

    let first = &batch.records[0];
    assert_eq!(first.id, "101");
    assert_eq!(first.batch_number, "B-1");
    assert_eq!(first.sample_weight, "502");

    let second = &batch.records[1];
    assert_eq!(second.id, "102");
    assert_eq!(second.sample_weight, "498");

    match &batch.failures[..] {
        [ResolutionWarning::SampleFetchFailed { sample_id, message }] => {
            assert_eq!(sample_id, "103");
            assert!(message.contains("HTTP 500"));
        }
        other => panic!("unexpected failures: {other:?}"),
    }
    assert_eq!(state.hits("sample/103"), 1);
}

#[tokio::test]
async fn test_page_size_truncates_ids() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));

    let resolution = BatchResolver::new(&client, Some(2)).resolve("B-1").await.unwrap();

    assert_eq!(resolution.sample_ids, vec!["101", "102"]);
    assert!(resolution.warning.is_none());
}

#[tokio::test]
async fn test_empty_batch_is_a_diagnostic() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let settings = settings(&base);
    let client = client(&settings);
    let resolver = BatchResolver::new(&client, settings.page_size);
    let builder = SampleRecordBuilder::new(&client, WeightExtractor::default());

    let batch = builder
        .fetch_batch_samples(&resolver, "EMPTY", &CancellationToken::new())
        .await
        .unwrap();
    assert!(batch.records.is_empty());
    assert_eq!(batch.diagnostic, "Batch EMPTY: 0 samples referenced");

    let blank = builder
        .fetch_batch_samples(&resolver, "  ", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(blank.diagnostic, "Empty batch id");
    assert_eq!(state.tokens_issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_fetch_stops() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let settings = settings(&base);
    let client = client(&settings);
    let resolver = BatchResolver::new(&client, settings.page_size);
    let builder = SampleRecordBuilder::new(&client, WeightExtractor::default());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = builder.fetch_batch_samples(&resolver, "B-1", &cancel).await.unwrap_err();

    assert!(matches!(err, LimsError::Cancelled));
    assert_eq!(state.hits("batch/B-1"), 0);
}

#[tokio::test]
async fn test_search_filters_client_side() {
    let state = MockState::new();
    let base = spawn(state.clone()).await;
    let client = client(&settings(&base));
    let builder = SampleRecordBuilder::new(&client, WeightExtractor::default());

    let (matches, diagnostic) = builder.search_samples_by_batch("B-77", 50).await.unwrap();

    let ids: Vec<&str> = matches.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(diagnostic, "GET sample → 3 items | matches=2");
}
