// crates/growthwire-server/src/reconciler.rs
// ============================================================================
// Module: Enrichment Reconciler
// Description: Supervised worker patching recommendations onto records.
// Purpose: Reconcile delayed scorer responses without blocking ingestion.
// Dependencies: growthwire-core, tokio
// ============================================================================

//! ## Overview
//! The reconciler consumes enrichment jobs from a bounded queue and calls the
//! external scorer with a bounded attempt budget and backoff. It runs
//! detached from the request/response cycle: acknowledgment never waits on
//! it, a full queue drops the job, and a job that exhausts its attempts is
//! audited and abandoned. Each completion patches only its own record, so
//! completions may interleave arbitrarily with later ingestions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use growthwire_core::EnqueueError;
use growthwire_core::EnrichmentJob;
use growthwire_core::EnrichmentQueue;
use growthwire_core::ReadingStore;
use growthwire_core::RecommendationScorer;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::audit::AuditSink;
use crate::audit::EnrichmentAuditEvent;
use crate::audit::now_millis;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Reconciler worker tuning.
///
/// # Invariants
/// - `max_attempts` is at least 1 and includes the first attempt.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Attempt budget per job.
    pub max_attempts: u32,
    /// Backoff between attempts.
    pub retry_backoff: Duration,
}

// ============================================================================
// SECTION: Queue Handle
// ============================================================================

/// Bounded, non-blocking sender half of the enrichment queue.
#[derive(Clone)]
pub struct EnrichmentQueueHandle {
    /// Channel sender into the worker.
    sender: mpsc::Sender<EnrichmentJob>,
}

impl EnrichmentQueue for EnrichmentQueueHandle {
    fn enqueue(&self, job: EnrichmentJob) -> Result<(), EnqueueError> {
        self.sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Enrichment worker state, consumed by [`Reconciler::run`].
pub struct Reconciler {
    /// Channel receiver of pending jobs.
    receiver: mpsc::Receiver<EnrichmentJob>,
    /// External scorer client.
    scorer: Arc<dyn RecommendationScorer>,
    /// Store receiving recommendation patches.
    store: Arc<dyn ReadingStore>,
    /// Audit sink for attempt outcomes.
    audit: Arc<dyn AuditSink>,
    /// Worker tuning.
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Creates the queue handle and worker pair.
    ///
    /// The worker does nothing until [`Reconciler::run`] is driven on a
    /// runtime; jobs enqueued before that simply wait in the channel.
    #[must_use]
    pub fn new(
        scorer: Arc<dyn RecommendationScorer>,
        store: Arc<dyn ReadingStore>,
        audit: Arc<dyn AuditSink>,
        config: ReconcilerConfig,
        queue_capacity: usize,
    ) -> (EnrichmentQueueHandle, Self) {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        (
            EnrichmentQueueHandle {
                sender,
            },
            Self {
                receiver,
                scorer,
                store,
                audit,
                config,
            },
        )
    }

    /// Spawns the worker onto the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Consumes jobs until every queue handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            self.process(job).await;
        }
    }

    /// Drives one job through its attempt budget.
    async fn process(&self, job: EnrichmentJob) {
        let record_id = job.record_id.get();
        for attempt in 1 ..= self.config.max_attempts {
            match self.scorer.score(&job).await {
                Ok(Some(recommendation)) => {
                    match self.store.set_recommendation(job.record_id, &recommendation) {
                        Ok(()) => self.record(record_id, attempt, "patched", None),
                        Err(err) => {
                            self.record(record_id, attempt, "store_failed", Some(err.to_string()));
                        }
                    }
                    return;
                }
                Ok(None) => {
                    // The scorer answered; an absent recommendation is final.
                    self.record(record_id, attempt, "no_recommendation", None);
                    return;
                }
                Err(err) => {
                    let exhausted = attempt == self.config.max_attempts;
                    let outcome = if exhausted { "dropped" } else { "retry" };
                    self.record(record_id, attempt, outcome, Some(err.to_string()));
                    if !exhausted {
                        tokio::time::sleep(self.config.retry_backoff).await;
                    }
                }
            }
        }
    }

    /// Emits one enrichment audit event.
    fn record(&self, record_id: u64, attempt: u32, outcome: &'static str, detail: Option<String>) {
        self.audit.record_enrichment(&EnrichmentAuditEvent {
            event: "enrichment",
            timestamp_ms: now_millis(),
            record_id,
            attempt,
            outcome,
            detail,
        });
    }
}
