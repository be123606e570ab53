// Store of request records and the batch queue that references them.
// Not synchronized on its own: the service keeps it behind one lock together with
// the scheduler state, so queue and status mutations are always serialized.

use std::collections::HashMap;

use tracing::warn;
use uuid::Uuid;

use crate::{
    batch::chunk_ids,
    error::{QueueError, StoreError},
    models::StatusResponse,
    queue::{BatchQueue, QueueDepth},
    record::RequestRecord,
    types::{BatchId, Identifier, Priority, RequestId, Status},
};

// a batch that just moved to running, handed to the drain loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedBatch {
    pub request_id: RequestId,
    pub batch_id: BatchId,
    pub batch_index: usize,
    pub priority: Priority,
    pub ids: Vec<Identifier>,
    // true when this batch moved its request out of pending
    pub request_started: bool,
}

// outcome of marking a batch done
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedBatch {
    pub request_status: Status,
    // true when this batch was the request's last
    pub request_finished: bool,
}

#[derive(Debug, Default)]
pub struct IngestStore {
    records: HashMap<RequestId, RequestRecord>,
    queue: BatchQueue,
    next_sequence: u64,
}

impl IngestStore {
    pub fn new() -> Self {
        Self::default()
    }

    // create a record for already-validated ids, chunk it, and queue every batch
    pub fn register(
        &mut self,
        ids: &[Identifier],
        priority: Priority,
        batch_size: usize,
    ) -> Result<RequestId, QueueError> {
        let request_id = Uuid::new_v4();
        let sequence = self.next_sequence;
        let record = RequestRecord::new(
            request_id,
            priority,
            sequence,
            chunk_ids(request_id, ids, batch_size),
        );

        self.queue.enqueue_all(&record)?;
        self.next_sequence += 1;
        self.records.insert(request_id, record);
        Ok(request_id)
    }

    // pop the highest-priority batch and mark it (and its request) running
    pub fn start_next(&mut self) -> Option<StartedBatch> {
        while let Some(entry) = self.queue.drain_next() {
            let Some(record) = self.records.get_mut(&entry.request_id) else {
                warn!(request_id = %entry.request_id, "queued batch has no record, skipping");
                continue;
            };
            let Some(batch) = record.batch_mut(entry.batch_index) else {
                warn!(request_id = %entry.request_id, index = entry.batch_index, "queued batch index out of range, skipping");
                continue;
            };
            if let Err(e) = batch.start() {
                warn!(batch_id = %entry.batch_id, error = %e, "queued batch could not start, skipping");
                continue;
            }
            let ids = batch.ids().to_vec();
            let previous = record.refresh_status();

            return Some(StartedBatch {
                request_id: entry.request_id,
                batch_id: entry.batch_id,
                batch_index: entry.batch_index,
                priority: entry.priority,
                ids,
                request_started: previous == Status::Pending,
            });
        }
        None
    }

    // mark a running batch done and re-derive its request's status
    pub fn complete(
        &mut self,
        request_id: RequestId,
        batch_index: usize,
    ) -> Result<CompletedBatch, StoreError> {
        let record = self
            .records
            .get_mut(&request_id)
            .ok_or(StoreError::UnknownBatch {
                request_id,
                batch_index,
            })?;
        record
            .batch_mut(batch_index)
            .ok_or(StoreError::UnknownBatch {
                request_id,
                batch_index,
            })?
            .complete()?;

        let previous = record.refresh_status();
        let request_status = record.status();
        Ok(CompletedBatch {
            request_status,
            request_finished: request_status == Status::Done && previous != Status::Done,
        })
    }

    pub fn get(&self, request_id: &RequestId) -> Option<&RequestRecord> {
        self.records.get(request_id)
    }

    pub fn status(&self, request_id: &RequestId) -> Option<StatusResponse> {
        self.records.get(request_id).map(RequestRecord::to_response)
    }

    pub fn queue_depth(&self) -> QueueDepth {
        self.queue.queue_depth()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    // number of registered requests
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(submissions: Vec<(Vec<Identifier>, Priority)>) -> (IngestStore, Vec<RequestId>) {
        let mut store = IngestStore::new();
        let ids = submissions
            .iter()
            .map(|(ids, priority)| store.register(ids, *priority, 3).expect("register"))
            .collect();
        (store, ids)
    }

    #[test]
    fn register_chunks_and_queues() {
        let (store, ids) = store_with(vec![(vec![4, 5, 6, 7, 8], Priority::Medium)]);
        let response = store.status(&ids[0]).expect("registered");
        assert_eq!(response.status, Status::Pending);
        assert_eq!(response.batches.len(), 2);
        assert_eq!(store.queue_depth().medium, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn start_and_complete_drive_request_status() {
        let (mut store, ids) = store_with(vec![(vec![1, 2, 3, 4], Priority::High)]);
        let request_id = ids[0];

        let first = store.start_next().expect("first batch");
        assert!(first.request_started);
        assert_eq!(first.ids, vec![1, 2, 3]);
        assert_eq!(store.get(&request_id).map(|r| r.status()), Some(Status::Running));

        let done = store.complete(request_id, first.batch_index).expect("complete");
        assert_eq!(done.request_status, Status::Running);
        assert!(!done.request_finished);

        let second = store.start_next().expect("second batch");
        assert!(!second.request_started);
        assert_eq!(second.ids, vec![4]);

        let done = store.complete(request_id, second.batch_index).expect("complete");
        assert_eq!(done.request_status, Status::Done);
        assert!(done.request_finished);

        assert!(store.start_next().is_none());
        assert!(!store.has_pending());
    }

    #[test]
    fn completing_a_pending_batch_is_rejected() {
        let (mut store, ids) = store_with(vec![(vec![1], Priority::Low)]);
        let result = store.complete(ids[0], 0);
        assert!(matches!(result, Err(StoreError::Transition(_))));
        assert_eq!(store.status(&ids[0]).map(|s| s.status), Some(Status::Pending));
    }

    #[test]
    fn completing_an_unknown_batch_is_rejected() {
        let (mut store, ids) = store_with(vec![(vec![1], Priority::Low)]);
        assert!(matches!(
            store.complete(ids[0], 7),
            Err(StoreError::UnknownBatch { batch_index: 7, .. })
        ));
        assert!(matches!(
            store.complete(Uuid::new_v4(), 0),
            Err(StoreError::UnknownBatch { .. })
        ));
    }

    #[test]
    fn start_order_follows_priority_then_submission() {
        let (mut store, ids) = store_with(vec![
            (vec![1], Priority::Low),
            (vec![2], Priority::High),
            (vec![3], Priority::Low),
            (vec![4], Priority::High),
        ]);
        let order: Vec<RequestId> = std::iter::from_fn(|| store.start_next())
            .map(|b| b.request_id)
            .collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[0], ids[2]]);
    }
}
