//! In-process admin gateway
//!
//! Deterministic double for the admin service: indexes live in a mutex-guarded
//! table, each created index walks a scripted sequence of states (one step per
//! `get_index` call, the last state repeats), and failures can be injected per
//! index definition.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use super::{AdminGateway, IndexDefinition, IndexState, IndexStatus, Operation};
use crate::error::{GatewayError, StatusCode};
use crate::spec::{CollectionScope, IndexSpec};

const METADATA_TYPE: &str = "type.googleapis.com/google.firestore.admin.v1.IndexOperationMetadata";

struct IndexRecord {
    name: String,
    parent: CollectionScope,
    definition: IndexDefinition,
    state: IndexState,
    script: VecDeque<IndexState>,
    failing_reads: u32,
}

#[derive(Default)]
struct Inner {
    indexes: Vec<IndexRecord>,
    next_id: u64,
    scripts: HashMap<IndexDefinition, Vec<IndexState>>,
    create_failures: HashMap<IndexDefinition, (StatusCode, String)>,
    read_failures: HashMap<IndexDefinition, u32>,
    instant: Vec<IndexDefinition>,
    create_calls: usize,
    created: usize,
    get_calls: usize,
    latency: Option<Duration>,
}

impl Inner {
    fn allocate_name(&mut self, parent: &CollectionScope) -> String {
        self.next_id += 1;
        format!("{}/indexes/idx-{:04}", parent, self.next_id)
    }

    fn find(&self, parent: &CollectionScope, definition: &IndexDefinition) -> Option<&IndexRecord> {
        self.indexes
            .iter()
            .find(|r| &r.parent == parent && &r.definition == definition)
    }
}

/// Scripted in-memory [`AdminGateway`]
///
/// Unscripted indexes report `READY` on their first read.
#[derive(Default)]
pub struct InMemoryAdminGateway {
    inner: Mutex<Inner>,
}

impl InMemoryAdminGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an index that already exists and is `READY`; returns its name
    pub fn seed_existing(&self, parent: &CollectionScope, spec: &IndexSpec) -> String {
        let mut inner = self.inner.lock();
        let name = inner.allocate_name(parent);
        inner.indexes.push(IndexRecord {
            name: name.clone(),
            parent: parent.clone(),
            definition: IndexDefinition::from(spec),
            state: IndexState::Ready,
            script: VecDeque::new(),
            failing_reads: 0,
        });
        name
    }

    /// States reported by successive reads of the index created for `spec`
    pub fn script(&self, spec: &IndexSpec, states: impl IntoIterator<Item = IndexState>) {
        self.inner
            .lock()
            .scripts
            .insert(IndexDefinition::from(spec), states.into_iter().collect());
    }

    /// Make `create_index` for `spec` fail with `code`
    pub fn fail_create(&self, spec: &IndexSpec, code: StatusCode, message: impl Into<String>) {
        self.inner
            .lock()
            .create_failures
            .insert(IndexDefinition::from(spec), (code, message.into()));
    }

    /// Make the next `times` reads of the index for `spec` fail with `UNAVAILABLE`
    pub fn fail_reads(&self, spec: &IndexSpec, times: u32) {
        self.inner
            .lock()
            .read_failures
            .insert(IndexDefinition::from(spec), times);
    }

    /// Creating `spec` returns an operation that is already done
    pub fn complete_immediately(&self, spec: &IndexSpec) {
        self.inner.lock().instant.push(IndexDefinition::from(spec));
    }

    /// Delay applied to every call
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = Some(latency);
    }

    /// Number of `create_index` calls, including rejected ones
    pub fn create_calls(&self) -> usize {
        self.inner.lock().create_calls
    }

    /// Number of indexes actually created by `create_index`
    pub fn created(&self) -> usize {
        self.inner.lock().created
    }

    pub fn get_calls(&self) -> usize {
        self.inner.lock().get_calls
    }

    pub fn index_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .indexes
            .iter()
            .map(|r| r.name.clone())
            .collect()
    }

    async fn simulate_latency(&self) {
        let latency = self.inner.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl AdminGateway for InMemoryAdminGateway {
    async fn create_index(
        &self,
        parent: &CollectionScope,
        index: &IndexDefinition,
    ) -> Result<Operation, GatewayError> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.create_calls += 1;

        if let Some((code, message)) = inner.create_failures.get(index) {
            return Err(GatewayError::new(*code, message.clone()));
        }
        if let Some(existing) = inner.find(parent, index) {
            return Err(GatewayError::already_exists(format!(
                "index already exists: {}",
                existing.name
            )));
        }

        let name = inner.allocate_name(parent);
        let operation_name = format!(
            "{}/operations/op-{:04}",
            parent.database_scope(),
            inner.next_id
        );
        let done = inner.instant.contains(index);
        let (state, script) = if done {
            (IndexState::Ready, VecDeque::new())
        } else {
            let script = inner
                .scripts
                .get(index)
                .cloned()
                .unwrap_or_else(|| vec![IndexState::Ready]);
            (IndexState::Creating, script.into())
        };
        let failing_reads = inner.read_failures.get(index).copied().unwrap_or(0);

        inner.indexes.push(IndexRecord {
            name: name.clone(),
            parent: parent.clone(),
            definition: index.clone(),
            state,
            script,
            failing_reads,
        });
        inner.created += 1;

        Ok(Operation {
            name: operation_name,
            done,
            metadata: Some(serde_json::json!({
                "@type": METADATA_TYPE,
                "index": name,
                "state": if done { "SUCCESSFUL" } else { "INITIALIZING" },
            })),
            error: None,
        })
    }

    async fn get_index(&self, name: &str) -> Result<IndexStatus, GatewayError> {
        self.simulate_latency().await;

        let mut inner = self.inner.lock();
        inner.get_calls += 1;

        let record = inner
            .indexes
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| GatewayError::not_found(name))?;

        if record.failing_reads > 0 {
            record.failing_reads -= 1;
            return Err(GatewayError::unavailable("simulated read failure"));
        }

        if let Some(next) = record.script.pop_front() {
            record.state = next;
        }

        Ok(IndexStatus {
            name: record.name.clone(),
            state: record.state,
        })
    }
}
