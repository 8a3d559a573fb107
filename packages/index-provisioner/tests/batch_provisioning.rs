//! End-to-end batch tests against the in-memory admin gateway
//!
//! Time is paused, so the 10 s polling cadence runs instantly.

use index_provisioner::{
    ensure_indexes, CollectionScope, InMemoryAdminGateway, IndexBatch, IndexManifest, IndexSpec,
    IndexState, Phase, ProvisionConfig, ProvisionError, SpecKey, StatusCode,
};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn parent() -> CollectionScope {
    CollectionScope::for_collection("project-id", "(default)", "collection-id").unwrap()
}

fn spec(fields: &[&str]) -> IndexSpec {
    IndexSpec::ascending(fields).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_two_fresh_indexes_ready_after_two_rounds() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let locations = spec(&["name", "location"]);
    let employers = spec(&["name", "employer"]);
    gateway.script(&locations, [IndexState::Creating, IndexState::Ready]);
    gateway.script(&employers, [IndexState::Ready]);

    let batch = IndexBatch::new(parent(), vec![locations, employers]);
    let started = Instant::now();
    let report = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.poll_rounds, 2);
    assert_eq!(report.submitted, 2);
    let ready: Vec<_> = report.became_ready.iter().map(|r| (r.key, r.round)).collect();
    assert_eq!(ready, vec![(SpecKey(1), 1), (SpecKey(0), 2)]);
    assert_eq!(started.elapsed(), Duration::from_secs(20));
    assert_eq!(gateway.created(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_already_existing_index_needs_no_polling() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let ab = spec(&["a", "b"]);
    gateway.seed_existing(&parent(), &ab);

    let batch = IndexBatch::new(parent(), vec![ab]);
    let started = Instant::now();
    let report = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.poll_rounds, 0);
    assert_eq!(report.already_existed, vec![SpecKey(0)]);
    assert!(report.became_ready.is_empty());
    assert_eq!(gateway.get_calls(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_resubmitting_same_batch_is_idempotent() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let batch = IndexBatch::new(
        parent(),
        vec![spec(&["name", "location"]), spec(&["name", "employer"])],
    );
    let config = ProvisionConfig::default();

    let first = ensure_indexes(gateway.clone(), &batch, &config, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(first.became_ready.len(), 2);
    let created = gateway.created();
    let polls = gateway.get_calls();

    let second = ensure_indexes(gateway.clone(), &batch, &config, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(second.already_existed, vec![SpecKey(0), SpecKey(1)]);
    assert_eq!(second.poll_rounds, 0);
    assert_eq!(gateway.created(), created);
    assert_eq!(gateway.get_calls(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_submission_aborts_batch() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let second = spec(&["b", "c"]);
    gateway.fail_create(&second, StatusCode::PermissionDenied, "missing datastore.indexes.create");

    let batch = IndexBatch::new(parent(), vec![spec(&["a", "b"]), second, spec(&["c", "d"])]);
    let err = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.spec(), Some(SpecKey(1)));
    match err {
        ProvisionError::Submission { source, .. } => {
            assert_eq!(source.code, StatusCode::PermissionDenied)
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Spec #3 never submitted, nothing polled
    assert_eq!(gateway.create_calls(), 2);
    assert_eq!(gateway.get_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pending_set_drains_monotonically() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let specs = vec![spec(&["a", "b"]), spec(&["a", "c"]), spec(&["a", "d"])];
    gateway.script(&specs[0], [IndexState::Creating, IndexState::Creating, IndexState::Ready]);
    gateway.script(&specs[1], [IndexState::Ready]);
    gateway.script(&specs[2], [IndexState::Creating, IndexState::Ready]);

    let batch = IndexBatch::new(parent(), specs);
    let report = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    let rounds: Vec<_> = report.became_ready.iter().map(|r| r.round).collect();
    assert_eq!(rounds, vec![1, 2, 3]);
    // Pending sizes per round: 3, 2, 1
    assert_eq!(gateway.get_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_needs_repair_surfaces_as_terminal_failure() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let broken = spec(&["name", "location"]);
    gateway.script(&broken, [IndexState::Creating, IndexState::NeedsRepair]);

    let batch = IndexBatch::new(parent(), vec![broken]);
    let err = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::TerminalState {
            spec: SpecKey(0),
            state: IndexState::NeedsRepair,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_sleep_returns_promptly() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let stuck = spec(&["a", "b"]);
    gateway.script(&stuck, [IndexState::Creating]);

    let batch = IndexBatch::new(parent(), vec![stuck]);
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let gateway = gateway.clone();
        let cancel = cancel.clone();
        async move { ensure_indexes(gateway, &batch, &ProvisionConfig::default(), &cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;
    let cancelled_at = Instant::now();
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Cancelled {
            phase: Phase::Reconciliation
        }
    ));
    assert!(cancelled_at.elapsed() < Duration::from_secs(1));
    assert_eq!(gateway.get_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_create_call() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    gateway.set_latency(Duration::from_secs(30));

    let batch = IndexBatch::new(parent(), vec![spec(&["a", "b"]), spec(&["c", "d"])]);
    let cancel = CancellationToken::new();
    let task = tokio::spawn({
        let gateway = gateway.clone();
        let cancel = cancel.clone();
        async move { ensure_indexes(gateway, &batch, &ProvisionConfig::default(), &cancel).await }
    });

    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::Cancelled {
            phase: Phase::Submission
        }
    ));
    assert_eq!(gateway.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_before_any_call() {
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let batch = IndexBatch::new(parent(), vec![spec(&["a", "b"])]);

    let err = ensure_indexes(
        gateway.clone(),
        &batch,
        &ProvisionConfig::default().poll_concurrency(0),
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::Config(_)));
    assert_eq!(gateway.create_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_manifest_driven_batch() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
version: 1
parent: projects/project-id/databases/(default)/collectionGroups/collection-id
indexes:
  - fields:
      - field_path: name
      - field_path: location
  - fields:
      - field_path: name
      - field_path: employer
        order: descending
settings:
  poll_interval_secs: 5
  max_poll_rounds: 10
"#
    )
    .unwrap();

    let manifest = IndexManifest::from_yaml(file.path()).unwrap();
    let gateway = Arc::new(InMemoryAdminGateway::new());
    let started = Instant::now();
    let report = ensure_indexes(
        gateway.clone(),
        &manifest.batch(),
        &manifest.settings,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(report.poll_rounds, 1);
    assert_eq!(report.became_ready.len(), 2);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert!(gateway
        .index_names()
        .iter()
        .all(|name| name.starts_with(manifest.parent.as_str())));
}
