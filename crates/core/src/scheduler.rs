// Single-flight drain loop
//
// the scheduler state lives under the same lock as the store, so "queue is empty, go
// idle" and "enqueue, trigger if idle" can never interleave into a lost wakeup.
// at most one drain task exists at any time.

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::service::{Inner, Shared};

// scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Draining,
}

// snapshot of drain loop counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainStats {
    pub loops_started: u64,
    pub batches_completed: u64,
    pub ids_processed: u64,
    // loop bodies running right now, never above 1
    pub active_loops: usize,
    pub max_concurrent_loops: usize,
}

#[derive(Debug, Default)]
pub(crate) struct DrainCounters {
    loops_started: AtomicU64,
    batches_completed: AtomicU64,
    ids_processed: AtomicU64,
    active_loops: AtomicUsize,
    max_concurrent_loops: AtomicUsize,
}

impl DrainCounters {
    fn enter_loop(&self) {
        self.loops_started.fetch_add(1, Ordering::Relaxed);
        let active = self.active_loops.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_loops.fetch_max(active, Ordering::SeqCst);
    }

    fn exit_loop(&self) {
        self.active_loops.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self) -> DrainStats {
        DrainStats {
            loops_started: self.loops_started.load(Ordering::Relaxed),
            batches_completed: self.batches_completed.load(Ordering::Relaxed),
            ids_processed: self.ids_processed.load(Ordering::Relaxed),
            active_loops: self.active_loops.load(Ordering::SeqCst),
            max_concurrent_loops: self.max_concurrent_loops.load(Ordering::SeqCst),
        }
    }
}

// idle -> draining; returns true only when the caller must spawn the loop
pub(crate) fn try_begin(inner: &Inner, shared: &mut Shared) -> bool {
    if shared.state == SchedulerState::Draining {
        return false;
    }
    shared.state = SchedulerState::Draining;
    inner.state_tx.send_replace(SchedulerState::Draining);
    true
}

// draining -> idle, called with the lock held once the queue is empty
fn finish(inner: &Inner, shared: &mut Shared) {
    inner.counters.exit_loop();
    shared.state = SchedulerState::Idle;
    inner.state_tx.send_replace(SchedulerState::Idle);
}

// resets the scheduler if the loop unwinds, so later submissions can trigger again
struct LoopGuard {
    inner: Arc<Inner>,
    finished: bool,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("drain loop ended abnormally, resetting scheduler");
            let mut shared = self.inner.shared.lock();
            finish(&self.inner, &mut shared);
        }
    }
}

// drain the queue to empty, one batch at a time, then go idle
pub(crate) async fn drain(inner: Arc<Inner>) {
    inner.counters.enter_loop();
    let mut guard = LoopGuard {
        inner: Arc::clone(&inner),
        finished: false,
    };
    debug!("drain loop started");

    loop {
        let next = {
            let mut shared = inner.shared.lock();
            match shared.store.start_next() {
                Some(batch) => batch,
                None => {
                    finish(&inner, &mut shared);
                    guard.finished = true;
                    break;
                }
            }
        };

        if next.request_started {
            info!(request_id = %next.request_id, priority = %next.priority, "ingestion started");
        }
        info!(
            batch_id = %next.batch_id,
            request_id = %next.request_id,
            ids = ?next.ids,
            "processing batch"
        );

        // fan out one call per id, fan in on all of them
        let results = join_all(next.ids.iter().map(|id| inner.processor.process(*id))).await;
        for result in &results {
            debug!(batch_id = %next.batch_id, id = result.id, data = %result.data, "id processed");
        }
        inner
            .counters
            .ids_processed
            .fetch_add(results.len() as u64, Ordering::Relaxed);

        tokio::time::sleep(inner.config.settle_delay).await;

        let completed = {
            let mut shared = inner.shared.lock();
            shared.store.complete(next.request_id, next.batch_index)
        };
        match completed {
            Ok(done) => {
                inner
                    .counters
                    .batches_completed
                    .fetch_add(1, Ordering::Relaxed);
                info!(batch_id = %next.batch_id, request_status = %done.request_status, "batch completed");
                if done.request_finished {
                    info!(request_id = %next.request_id, "ingestion completed");
                }
            }
            Err(e) => warn!(batch_id = %next.batch_id, error = %e, "batch completion rejected"),
        }
    }

    debug!("drain loop idle");
}
