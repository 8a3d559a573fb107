//! Index submission
//!
//! Every spec becomes exactly one `create_index` call. "Already exists" counts
//! as success, which makes re-running a whole batch safe: the desired end state
//! is the same whether or not an index pre-existed.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::IndexBatch;
use crate::error::{Phase, ProvisionError, Result};
use crate::gateway::{AdminGateway, IndexDefinition};
use crate::pending::{PendingOperation, PendingSet};
use crate::spec::{CollectionScope, IndexSpec, SpecKey};

/// Result of submitting one spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Build started; poll until ready
    Pending(PendingOperation),
    /// Operation came back already done
    Completed,
    /// An equivalent index exists
    AlreadyExists,
}

/// What the submission phase produced
#[derive(Debug, Clone, Default)]
pub struct SubmissionSummary {
    pub pending: PendingSet,
    pub completed: Vec<SpecKey>,
    pub already_existed: Vec<SpecKey>,
    /// Specs identical to an earlier spec in the batch; never submitted
    pub duplicates: Vec<SpecKey>,
}

impl SubmissionSummary {
    pub fn submitted(&self) -> usize {
        self.pending.len() + self.completed.len() + self.already_existed.len()
    }
}

/// Submits creation requests and resolves idempotency conflicts
pub struct IndexProvisioner {
    gateway: Arc<dyn AdminGateway>,
}

impl IndexProvisioner {
    pub fn new(gateway: Arc<dyn AdminGateway>) -> Self {
        Self { gateway }
    }

    /// Submit one spec
    ///
    /// Any failure other than already-exists is returned as
    /// [`ProvisionError::Submission`] tagged with `key`.
    pub async fn submit(
        &self,
        parent: &CollectionScope,
        key: SpecKey,
        spec: &IndexSpec,
    ) -> Result<SubmitOutcome> {
        let definition = IndexDefinition::from(spec);

        let operation = match self.gateway.create_index(parent, &definition).await {
            Ok(operation) => operation,
            Err(e) if e.is_already_exists() => {
                info!(spec = %key, fields = %spec, "Index already exists");
                return Ok(SubmitOutcome::AlreadyExists);
            }
            Err(e) => {
                error!(spec = %key, fields = %spec, "Index creation failed: {}", e);
                return Err(ProvisionError::Submission {
                    spec: key,
                    fields: spec.to_string(),
                    source: e,
                });
            }
        };

        if operation.done {
            return match operation.error {
                Some(status) => Err(ProvisionError::Submission {
                    spec: key,
                    fields: spec.to_string(),
                    source: status.into(),
                }),
                None => {
                    info!(spec = %key, fields = %spec, "Index created immediately");
                    Ok(SubmitOutcome::Completed)
                }
            };
        }

        let metadata =
            operation
                .index_metadata()
                .map_err(|e| ProvisionError::MalformedOperation {
                    spec: key,
                    reason: e.to_string(),
                })?;

        info!(
            spec = %key,
            fields = %spec,
            index = %metadata.index,
            operation = %operation.name,
            "Index build started"
        );

        Ok(SubmitOutcome::Pending(PendingOperation::new(
            key,
            spec.clone(),
            metadata.index,
            operation.name,
        )))
    }

    /// Submit every spec in batch order
    ///
    /// Stops at the first fatal failure; indexes created before it are left in
    /// place. Cancellation is checked before each create and while one is in
    /// flight.
    pub async fn submit_all(
        &self,
        batch: &IndexBatch,
        cancel: &CancellationToken,
    ) -> Result<SubmissionSummary> {
        let mut summary = SubmissionSummary::default();
        let mut seen: HashMap<String, SpecKey> = HashMap::new();

        for (key, spec) in batch.entries() {
            if cancel.is_cancelled() {
                return Err(ProvisionError::Cancelled {
                    phase: Phase::Submission,
                });
            }

            if let Some(first) = seen.get(&spec.fingerprint()) {
                warn!(spec = %key, duplicate_of = %first, "Skipping duplicate index spec");
                summary.duplicates.push(key);
                continue;
            }
            seen.insert(spec.fingerprint(), key);

            debug!(spec = %key, fields = %spec, "Submitting index");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(ProvisionError::Cancelled { phase: Phase::Submission });
                }
                outcome = self.submit(batch.parent(), key, spec) => outcome?,
            };

            match outcome {
                SubmitOutcome::Pending(op) => summary.pending.insert(op),
                SubmitOutcome::Completed => summary.completed.push(key),
                SubmitOutcome::AlreadyExists => summary.already_existed.push(key),
            }
        }

        info!(
            pending = summary.pending.len(),
            completed = summary.completed.len(),
            already_existed = summary.already_existed.len(),
            duplicates = summary.duplicates.len(),
            "Submission phase finished"
        );
        Ok(summary)
    }
}
