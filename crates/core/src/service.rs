//! Ingestion service: the one component that owns the store, the queue and the
//! scheduler.
//!
//! Submissions validate synchronously, register their batches, and kick the drain
//! loop without waiting on it. Status reads go straight to the store, so anything
//! the drain loop records is visible on the next query.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::{runtime::Handle, sync::watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::IngestConfig,
    error::{IngestError, ServerError},
    models::{IngestRequest, IngestResponse, StatusResponse},
    processor::{IdProcessor, SimulatedProcessor},
    queue::QueueDepth,
    scheduler::{self, DrainCounters, DrainStats, SchedulerState},
    store::IngestStore,
    types::{Identifier, Priority, RequestId},
    validator::{Submission, SubmissionValidator, ValidatorConfig},
};

// state guarded by the service lock
pub(crate) struct Shared {
    pub(crate) store: IngestStore,
    pub(crate) state: SchedulerState,
}

pub(crate) struct Inner {
    pub(crate) config: IngestConfig,
    pub(crate) validator: SubmissionValidator,
    pub(crate) processor: Arc<dyn IdProcessor>,
    pub(crate) shared: Mutex<Shared>,
    pub(crate) state_tx: watch::Sender<SchedulerState>,
    pub(crate) counters: DrainCounters,
    runtime: Handle,
}

/// Cheaply cloneable handle to the ingestion engine.
#[derive(Clone)]
pub struct IngestService {
    inner: Arc<Inner>,
}

impl IngestService {
    /// Builds a service on the current tokio runtime.
    pub fn new(config: IngestConfig, processor: Arc<dyn IdProcessor>) -> Result<Self, ServerError> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| ServerError::Runtime(format!("no tokio runtime available: {}", e)))?;
        let (state_tx, _) = watch::channel(SchedulerState::Idle);

        Ok(Self {
            inner: Arc::new(Inner {
                validator: SubmissionValidator::new(ValidatorConfig::from(&config)),
                config,
                processor,
                shared: Mutex::new(Shared {
                    store: IngestStore::new(),
                    state: SchedulerState::Idle,
                }),
                state_tx,
                counters: DrainCounters::default(),
                runtime,
            }),
        })
    }

    /// Builds a service backed by [`SimulatedProcessor`] with the configured latency.
    pub fn simulated(config: IngestConfig) -> Result<Self, ServerError> {
        let processor = Arc::new(SimulatedProcessor::new(config.call_latency));
        Self::new(config, processor)
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    /// Submits typed ids; nothing is registered when validation fails.
    pub fn submit(&self, ids: Vec<Identifier>, priority: Priority) -> Result<RequestId, IngestError> {
        let submission = self
            .inner
            .validator
            .validate(ids, priority)
            .map_err(|e| {
                warn!(error = %e, "ingestion rejected");
                e
            })?
            .into_inner();
        self.register(submission)
    }

    /// Submits a raw request body as received at the boundary.
    pub fn submit_request(&self, request: &IngestRequest) -> Result<IngestResponse, IngestError> {
        let submission = self
            .inner
            .validator
            .validate_request(request)
            .map_err(|e| {
                warn!(error = %e, "ingestion rejected");
                e
            })?
            .into_inner();
        let ingestion_id = self.register(submission)?;
        Ok(IngestResponse { ingestion_id })
    }

    fn register(&self, submission: Submission) -> Result<RequestId, IngestError> {
        let Submission { ids, priority } = submission;
        let request_id = {
            let mut shared = self.inner.shared.lock();
            shared
                .store
                .register(&ids, priority, self.inner.config.batch_size)
                .map_err(|e| IngestError::Internal(e.to_string()))?
        };
        info!(
            request_id = %request_id,
            priority = %priority,
            id_count = ids.len(),
            "ingestion accepted"
        );

        self.trigger();
        Ok(request_id)
    }

    /// Starts the drain loop if idle. Returns false when a loop is already running.
    pub fn trigger(&self) -> bool {
        let should_spawn = {
            let mut shared = self.inner.shared.lock();
            scheduler::try_begin(&self.inner, &mut shared)
        };
        if should_spawn {
            self.inner
                .runtime
                .spawn(scheduler::drain(Arc::clone(&self.inner)));
        } else {
            debug!("drain loop already running, trigger ignored");
        }
        should_spawn
    }

    pub fn status(&self, request_id: &RequestId) -> Result<StatusResponse, IngestError> {
        self.inner
            .shared
            .lock()
            .store
            .status(request_id)
            .ok_or_else(|| IngestError::NotFound(request_id.to_string()))
    }

    /// Looks up a status by the identifier string a client sent; malformed ids are not found.
    pub fn status_str(&self, ingestion_id: &str) -> Result<StatusResponse, IngestError> {
        let request_id = Uuid::parse_str(ingestion_id)
            .map_err(|_| IngestError::NotFound(ingestion_id.to_string()))?;
        self.status(&request_id)
    }

    /// Resolves once the drain loop is idle.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.state_tx.subscribe();
        // the sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == SchedulerState::Idle).await;
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.inner.shared.lock().state
    }

    pub fn queue_depth(&self) -> QueueDepth {
        self.inner.shared.lock().store.queue_depth()
    }

    pub fn stats(&self) -> DrainStats {
        self.inner.counters.snapshot()
    }

    /// Number of registered ingestion requests.
    pub fn len(&self) -> usize {
        self.inner.shared.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ValidationError,
        processor::ProcessResult,
        types::Status,
    };
    use async_trait::async_trait;
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    // records call order and tracks how many calls overlap
    #[derive(Default)]
    struct RecordingProcessor {
        calls: Mutex<Vec<Identifier>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl IdProcessor for RecordingProcessor {
        async fn process(&self, id: Identifier) -> ProcessResult {
            self.calls.lock().push(id);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProcessResult::processed(id)
        }
    }

    fn service_with(processor: Arc<RecordingProcessor>) -> IngestService {
        IngestService::new(IngestConfig::for_tests(), processor).expect("service")
    }

    #[tokio::test]
    async fn single_batch_completes() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");
        let request_id = service.submit(vec![1, 2, 3], Priority::High).expect("submit");

        service.wait_idle().await;

        let status = service.status(&request_id).expect("status");
        assert_eq!(status.status, Status::Done);
        assert_eq!(status.batches.len(), 1);
        assert_eq!(status.batches[0].ids, vec![1, 2, 3]);
        assert_eq!(status.batches[0].status, Status::Done);
    }

    #[tokio::test]
    async fn submission_returns_before_any_batch_runs() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");
        let request_id = service.submit(vec![4, 5, 6, 7, 8], Priority::Medium).expect("submit");

        // current-thread runtime: the drain task has not been polled yet
        let status = service.status(&request_id).expect("status");
        assert_eq!(status.status, Status::Pending);
        assert_eq!(service.scheduler_state(), SchedulerState::Draining);
        assert_eq!(service.queue_depth().medium, 2);

        service.wait_idle().await;
        assert_eq!(service.scheduler_state(), SchedulerState::Idle);
        assert_eq!(service.status(&request_id).expect("status").status, Status::Done);
    }

    #[tokio::test]
    async fn priority_order_is_respected_across_requests() {
        let processor = Arc::new(RecordingProcessor::default());
        let service = service_with(Arc::clone(&processor));

        service.submit(vec![1], Priority::Medium).expect("submit");
        service.submit(vec![10, 11, 12, 13], Priority::Low).expect("submit");
        service.submit(vec![20, 21, 22, 23], Priority::High).expect("submit");
        service.wait_idle().await;

        assert_eq!(
            *processor.calls.lock(),
            vec![20, 21, 22, 23, 1, 10, 11, 12, 13]
        );
    }

    #[tokio::test]
    async fn ids_in_a_batch_run_concurrently() {
        let processor = Arc::new(RecordingProcessor::default());
        let service = service_with(Arc::clone(&processor));

        service.submit(vec![1, 2, 3, 4], Priority::High).expect("submit");
        service.wait_idle().await;

        // three ids in the first batch overlap, batches themselves never do
        assert_eq!(processor.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(service.stats().ids_processed, 4);
        assert_eq!(service.stats().batches_completed, 2);
    }

    #[tokio::test]
    async fn invalid_submission_registers_nothing() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");

        let err = service.submit(vec![], Priority::High).expect_err("empty ids");
        assert!(matches!(err, IngestError::InvalidInput(ValidationError::EmptyIds)));

        let err = service
            .submit_request(&IngestRequest::new([10], "URGENT"))
            .expect_err("unknown priority");
        assert_eq!(err.status_code(), 400);

        let err = service
            .submit(vec![5, 1_000_000_008], Priority::Low)
            .expect_err("out of range");
        assert!(matches!(
            err,
            IngestError::InvalidInput(ValidationError::InvalidId { .. })
        ));

        assert!(service.is_empty());
        assert_eq!(service.queue_depth().total, 0);
        assert_eq!(service.scheduler_state(), SchedulerState::Idle);
        assert_eq!(service.stats().loops_started, 0);
    }

    #[tokio::test]
    async fn unknown_ingestion_is_not_found() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");
        let err = service.status(&Uuid::new_v4()).expect_err("unknown");
        assert_eq!(err.status_code(), 404);

        let err = service.status_str("nonexistent-id").expect_err("malformed");
        assert!(matches!(err, IngestError::NotFound(ref id) if id == "nonexistent-id"));
    }

    #[tokio::test]
    async fn trigger_while_draining_is_a_no_op() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");
        service.submit(vec![1, 2, 3, 4, 5, 6], Priority::Low).expect("submit");

        assert!(!service.trigger());
        assert!(!service.trigger());
        service.wait_idle().await;

        let stats = service.stats();
        assert_eq!(stats.loops_started, 1);
        assert_eq!(stats.max_concurrent_loops, 1);
        assert_eq!(stats.active_loops, 0);
    }

    #[tokio::test]
    async fn idle_trigger_with_empty_queue_goes_straight_back_to_idle() {
        let service = IngestService::simulated(IngestConfig::for_tests()).expect("service");
        assert!(service.trigger());
        service.wait_idle().await;
        assert_eq!(service.stats().loops_started, 1);
        assert_eq!(service.stats().batches_completed, 0);
    }

    #[test]
    fn new_requires_a_runtime() {
        let result = IngestService::simulated(IngestConfig::for_tests());
        assert!(matches!(result, Err(ServerError::Runtime(_))));
    }
}
