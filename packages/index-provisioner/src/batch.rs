//! Batch entry point: submit everything, then wait for everything

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::ProvisionConfig;
use crate::error::Result;
use crate::gateway::AdminGateway;
use crate::provisioner::IndexProvisioner;
use crate::reconcile::{ReadyIndex, ReconciliationLoop};
use crate::spec::{CollectionScope, IndexSpec, SpecKey};

/// Specs to provision under one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBatch {
    parent: CollectionScope,
    specs: Vec<IndexSpec>,
}

impl IndexBatch {
    pub fn new(parent: CollectionScope, specs: Vec<IndexSpec>) -> Self {
        Self { parent, specs }
    }

    pub fn parent(&self) -> &CollectionScope {
        &self.parent
    }

    pub fn specs(&self) -> &[IndexSpec] {
        &self.specs
    }

    pub fn get(&self, key: SpecKey) -> Option<&IndexSpec> {
        self.specs.get(key.0)
    }

    /// Specs paired with their batch keys, in order
    pub fn entries(&self) -> impl Iterator<Item = (SpecKey, &IndexSpec)> {
        self.specs.iter().enumerate().map(|(i, s)| (SpecKey(i), s))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Summary of a successful batch
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Specs that reached the admin service
    pub submitted: usize,
    pub already_existed: Vec<SpecKey>,
    pub completed_immediately: Vec<SpecKey>,
    pub duplicates: Vec<SpecKey>,
    /// Indexes that were built during this run, in the order they became ready
    pub became_ready: Vec<ReadyIndex>,
    pub poll_rounds: u32,
    pub transient_errors: usize,
    pub elapsed: Duration,
}

/// Provision every index in `batch` and block until all are ready
///
/// Returns exactly one outcome: a report when every index is ready, or the
/// first fatal error. Submission fully completes before polling starts.
pub async fn ensure_indexes(
    gateway: Arc<dyn AdminGateway>,
    batch: &IndexBatch,
    config: &ProvisionConfig,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    config.validate()?;

    let batch_id = Uuid::new_v4();
    let started = Instant::now();
    info!(
        %batch_id,
        parent = %batch.parent(),
        specs = batch.len(),
        "Provisioning index batch"
    );

    let result = run(gateway, batch, config, cancel).await;
    let elapsed = started.elapsed();

    match result {
        Ok(mut report) => {
            report.batch_id = batch_id;
            report.elapsed = elapsed;
            info!(
                %batch_id,
                built = report.became_ready.len(),
                already_existed = report.already_existed.len(),
                rounds = report.poll_rounds,
                "All indexes ready in {}ms",
                elapsed.as_millis()
            );
            Ok(report)
        }
        Err(e) => {
            error!(%batch_id, "Index batch failed after {}ms: {}", elapsed.as_millis(), e);
            Err(e)
        }
    }
}

async fn run(
    gateway: Arc<dyn AdminGateway>,
    batch: &IndexBatch,
    config: &ProvisionConfig,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    let submission = IndexProvisioner::new(gateway.clone())
        .submit_all(batch, cancel)
        .await?;
    let submitted = submission.submitted();

    let reconciled = ReconciliationLoop::new(gateway, config.clone())
        .wait_until_ready(submission.pending, cancel)
        .await?;

    Ok(BatchReport {
        batch_id: Uuid::nil(),
        submitted,
        already_existed: submission.already_existed,
        completed_immediately: submission.completed,
        duplicates: submission.duplicates,
        became_ready: reconciled.ready,
        poll_rounds: reconciled.rounds,
        transient_errors: reconciled.transient_errors,
        elapsed: Duration::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_are_keyed_by_position() {
        let parent = CollectionScope::for_collection("p", "(default)", "c").unwrap();
        let batch = IndexBatch::new(
            parent,
            vec![
                IndexSpec::ascending(&["a", "b"]).unwrap(),
                IndexSpec::ascending(&["a", "c"]).unwrap(),
            ],
        );

        let keys: Vec<_> = batch.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![SpecKey(0), SpecKey(1)]);
        assert_eq!(batch.get(SpecKey(1)).unwrap().fields()[1].field_path, "c");
        assert!(batch.get(SpecKey(2)).is_none());
    }
}
