//! Readiness reconciliation
//!
//! Polls every pending index once per interval until the pending set drains.
//!
//! # Outcomes per entry
//!
//! - `READY`: removed from the set
//! - `NEEDS_REPAIR` / `ERROR`: the whole loop fails immediately (fail-fast)
//! - anything else, or a failed status query: stays pending for the next round
//!
//! # Termination
//!
//! The set only shrinks. The loop ends when it is empty, on the first terminal
//! failure, on cancellation, or when the round limit or deadline trips.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProvisionConfig;
use crate::error::{GatewayError, Phase, ProvisionError, Result};
use crate::gateway::{AdminGateway, IndexState, IndexStatus};
use crate::pending::PendingSet;
use crate::spec::SpecKey;

/// Why a guarded wait stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    Deadline,
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

/// Run `fut` unless cancellation or the deadline wins first
pub async fn guarded<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> std::result::Result<F::Output, Interrupt> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupt::Cancelled),
        _ = until(deadline) => Err(Interrupt::Deadline),
        out = fut => Ok(out),
    }
}

/// Cancellable fixed-interval timer
#[derive(Debug, Clone, Copy)]
pub struct PollTimer {
    interval: Duration,
}

impl PollTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Sleep one interval; returns early if interrupted
    pub async fn tick(
        &self,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> std::result::Result<(), Interrupt> {
        guarded(tokio::time::sleep(self.interval), cancel, deadline).await
    }
}

/// An index that reached `READY` during reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyIndex {
    pub key: SpecKey,
    pub index_name: String,
    pub round: u32,
    pub submitted_at: DateTime<Utc>,
    /// When the poll that observed `READY` completed
    pub ready_at: DateTime<Utc>,
}

impl ReadyIndex {
    /// Time from submission until the index was seen ready
    pub fn build_time(&self) -> chrono::Duration {
        self.ready_at - self.submitted_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub rounds: u32,
    pub ready: Vec<ReadyIndex>,
    /// Status queries that failed and were retried next round
    pub transient_errors: usize,
}

/// Waits for a set of pending index builds to converge
pub struct ReconciliationLoop {
    gateway: Arc<dyn AdminGateway>,
    config: ProvisionConfig,
    timer: PollTimer,
}

impl ReconciliationLoop {
    pub fn new(gateway: Arc<dyn AdminGateway>, config: ProvisionConfig) -> Self {
        let timer = PollTimer::new(config.poll_interval());
        Self {
            gateway,
            config,
            timer,
        }
    }

    /// Block until every entry of `pending` is `READY`
    pub async fn wait_until_ready(
        &self,
        mut pending: PendingSet,
        cancel: &CancellationToken,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let deadline = self.config.deadline().map(|d| Instant::now() + d);

        loop {
            if pending.is_empty() {
                return Ok(report);
            }

            if let Some(limit) = self.config.round_limit() {
                if report.rounds >= limit {
                    return Err(ProvisionError::RoundsExhausted {
                        rounds: report.rounds,
                        pending: pending.len(),
                    });
                }
            }

            self.timer
                .tick(cancel, deadline)
                .await
                .map_err(|i| self.interrupted(i, &pending))?;

            report.rounds += 1;
            let round = report.rounds;

            let observations = guarded(self.poll_round(&pending), cancel, deadline)
                .await
                .map_err(|i| self.interrupted(i, &pending))?;

            for (key, name, result) in observations {
                let status = match result {
                    Ok(status) => status,
                    Err(e) => {
                        warn!(round, spec = %key, index = %name, "Status check failed, retrying next round: {}", e);
                        report.transient_errors += 1;
                        continue;
                    }
                };

                info!(
                    round,
                    spec = %key,
                    index = %status.name,
                    state = %status.state,
                    "Index state"
                );

                match status.state {
                    IndexState::Ready => {
                        let ready_at = Utc::now();
                        let submitted_at = pending
                            .remove(key)
                            .map_or(ready_at, |op| op.submitted_at);
                        let ready = ReadyIndex {
                            key,
                            index_name: name,
                            round,
                            submitted_at,
                            ready_at,
                        };
                        info!(
                            round,
                            spec = %key,
                            index = %ready.index_name,
                            build_secs = ready.build_time().num_seconds(),
                            "Index ready"
                        );
                        report.ready.push(ready);
                    }
                    state if state.is_failure() => {
                        return Err(ProvisionError::TerminalState {
                            spec: key,
                            index: name,
                            state,
                        });
                    }
                    _ => {}
                }
            }

            debug!(round, remaining = pending.len(), "Poll round finished");
        }
    }

    /// Query every pending index, at most `poll_concurrency` at a time
    ///
    /// Results come back ordered by spec key.
    async fn poll_round(
        &self,
        pending: &PendingSet,
    ) -> Vec<(SpecKey, String, std::result::Result<IndexStatus, GatewayError>)> {
        let gateway = &self.gateway;
        let mut results: Vec<_> = stream::iter(pending.targets())
            .map(|(key, name)| async move {
                let result = gateway.get_index(&name).await;
                (key, name, result)
            })
            .buffer_unordered(self.config.poll_concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(key, _, _)| *key);
        results
    }

    fn interrupted(&self, interrupt: Interrupt, pending: &PendingSet) -> ProvisionError {
        match interrupt {
            Interrupt::Cancelled => ProvisionError::Cancelled {
                phase: Phase::Reconciliation,
            },
            Interrupt::Deadline => ProvisionError::DeadlineExceeded {
                deadline_secs: self.config.deadline_secs.unwrap_or_default(),
                pending: pending.len(),
            },
        }
    }
}
