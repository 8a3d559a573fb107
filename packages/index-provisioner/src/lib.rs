//! Index Provisioner - composite index provisioning with readiness reconciliation
//!
//! Submits a batch of composite index definitions to a document database's
//! admin service and blocks until every index is queryable.
//!
//! ## Phases
//!
//! 1. **Submission**: one create call per spec. "Already exists" is success,
//!    so re-running a batch is safe.
//! 2. **Reconciliation**: poll the in-flight builds on a fixed cadence until
//!    the pending set is empty.
//!
//! Submission fully finishes before polling starts. Both phases observe one
//! `CancellationToken`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use index_provisioner::{ensure_indexes, CollectionScope, IndexBatch, IndexSpec, ProvisionConfig};
//!
//! let parent = CollectionScope::for_collection("project-id", "(default)", "people")?;
//! let batch = IndexBatch::new(
//!     parent,
//!     vec![
//!         IndexSpec::ascending(&["name", "location"])?,
//!         IndexSpec::ascending(&["name", "employer"])?,
//!     ],
//! );
//!
//! let report = ensure_indexes(gateway, &batch, &ProvisionConfig::default(), &cancel).await?;
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pending;
pub mod provisioner;
pub mod reconcile;
pub mod spec;

pub use batch::{ensure_indexes, BatchReport, IndexBatch};
pub use config::{ConfigError, IndexManifest, ProvisionConfig};
pub use error::{GatewayError, Phase, ProvisionError, Result, StatusCode};
pub use gateway::{
    AdminGateway, InMemoryAdminGateway, IndexDefinition, IndexState, IndexStatus, Operation,
    RestAdminGateway,
};
pub use pending::{PendingOperation, PendingSet};
pub use provisioner::{IndexProvisioner, SubmissionSummary, SubmitOutcome};
pub use reconcile::{PollTimer, ReadyIndex, ReconcileReport, ReconciliationLoop};
pub use spec::{CollectionScope, Direction, IndexField, IndexSpec, QueryScope, SpecKey};
