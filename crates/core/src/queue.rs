// Priority queue of pending batches
// entries are references into the store (request id + batch index), never copies,
// ordered by (priority ordinal, request submission order, chunk index)

use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashSet},
};

use crate::{
    batch::Batch,
    error::QueueError,
    record::RequestRecord,
    types::{BatchId, Priority, RequestId, Status},
};

// queue depth statistics by priority
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

// a queued reference to one batch of a stored request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedBatch {
    pub request_id: RequestId,
    pub batch_id: BatchId,
    pub batch_index: usize,
    pub priority: Priority,
    pub sequence: u64,
}

impl QueuedBatch {
    pub fn new(record: &RequestRecord, batch_index: usize, batch: &Batch) -> Self {
        Self {
            request_id: record.id(),
            batch_id: batch.id(),
            batch_index,
            priority: record.priority(),
            sequence: record.sequence(),
        }
    }

    fn key(&self) -> (u8, u64, usize) {
        (self.priority.ordinal(), self.sequence, self.batch_index)
    }
}

impl Ord for QueuedBatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl PartialOrd for QueuedBatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// min-heap over the queue key; unbounded, enqueue never blocks
#[derive(Debug, Default)]
pub struct BatchQueue {
    heap: BinaryHeap<Reverse<QueuedBatch>>,
    // batch ids currently queued, a batch appears at most once
    queued: HashSet<BatchId>,
    depth: QueueDepth,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // queue one batch of a record; only pending batches are accepted
    pub fn enqueue(&mut self, record: &RequestRecord, batch_index: usize) -> Result<(), QueueError> {
        let batch = record.batch(batch_index).ok_or(QueueError::UnknownBatch {
            request_id: record.id(),
            batch_index,
        })?;
        if batch.status() != Status::Pending {
            return Err(QueueError::NotPending {
                batch_id: batch.id(),
                status: batch.status(),
            });
        }
        if !self.queued.insert(batch.id()) {
            return Err(QueueError::Duplicate(batch.id()));
        }

        let entry = QueuedBatch::new(record, batch_index, batch);
        self.adjust_depth(entry.priority, true);
        self.heap.push(Reverse(entry));
        Ok(())
    }

    // queue every batch of a record in chunk order
    pub fn enqueue_all(&mut self, record: &RequestRecord) -> Result<(), QueueError> {
        for index in 0..record.batches().len() {
            self.enqueue(record, index)?;
        }
        Ok(())
    }

    // remove and return the current minimum, or None when empty
    pub fn drain_next(&mut self) -> Option<QueuedBatch> {
        let Reverse(entry) = self.heap.pop()?;
        self.queued.remove(&entry.batch_id);
        self.adjust_depth(entry.priority, false);
        Some(entry)
    }

    pub fn peek(&self) -> Option<&QueuedBatch> {
        self.heap.peek().map(|Reverse(entry)| entry)
    }

    pub fn contains(&self, batch_id: &BatchId) -> bool {
        self.queued.contains(batch_id)
    }

    pub fn queue_depth(&self) -> QueueDepth {
        self.depth.clone()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn adjust_depth(&mut self, priority: Priority, added: bool) {
        let slot = match priority {
            Priority::High => &mut self.depth.high,
            Priority::Medium => &mut self.depth.medium,
            Priority::Low => &mut self.depth.low,
        };
        if added {
            *slot += 1;
            self.depth.total += 1;
        } else {
            *slot = slot.saturating_sub(1);
            self.depth.total = self.depth.total.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::chunk_ids;
    use uuid::Uuid;

    fn record(priority: Priority, sequence: u64, ids: &[u64]) -> RequestRecord {
        let id = Uuid::new_v4();
        RequestRecord::new(id, priority, sequence, chunk_ids(id, ids, 3))
    }

    fn drain_all(queue: &mut BatchQueue) -> Vec<(RequestId, usize)> {
        std::iter::from_fn(|| queue.drain_next())
            .map(|e| (e.request_id, e.batch_index))
            .collect()
    }

    #[test]
    fn empty_queue_drains_none() {
        let mut queue = BatchQueue::new();
        assert!(queue.drain_next().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn priority_wins_over_submission_order() {
        let mut queue = BatchQueue::new();
        let low = record(Priority::Low, 0, &[1, 2, 3, 4]);
        let medium = record(Priority::Medium, 1, &[5]);
        let high = record(Priority::High, 2, &[6, 7, 8, 9]);
        for r in [&low, &medium, &high] {
            queue.enqueue_all(r).expect("enqueue");
        }

        assert_eq!(
            drain_all(&mut queue),
            vec![
                (high.id(), 0),
                (high.id(), 1),
                (medium.id(), 0),
                (low.id(), 0),
                (low.id(), 1),
            ]
        );
    }

    #[test]
    fn equal_priority_is_fifo_by_submission() {
        let mut queue = BatchQueue::new();
        let first = record(Priority::Medium, 0, &[1, 2, 3, 4, 5]);
        let second = record(Priority::Medium, 1, &[6, 7, 8, 9]);
        // enqueue out of order, the key still decides
        queue.enqueue_all(&second).expect("enqueue");
        queue.enqueue_all(&first).expect("enqueue");

        assert_eq!(
            drain_all(&mut queue),
            vec![
                (first.id(), 0),
                (first.id(), 1),
                (second.id(), 0),
                (second.id(), 1),
            ]
        );
    }

    #[test]
    fn minimum_is_recomputed_between_draws() {
        let mut queue = BatchQueue::new();
        let low = record(Priority::Low, 0, &[1, 2, 3, 4]);
        queue.enqueue_all(&low).expect("enqueue");
        assert_eq!(queue.drain_next().map(|e| e.batch_index), Some(0));

        // higher priority work arriving mid-drain jumps ahead of the rest
        let high = record(Priority::High, 1, &[9]);
        queue.enqueue_all(&high).expect("enqueue");
        assert_eq!(queue.drain_next().map(|e| e.request_id), Some(high.id()));
        assert_eq!(queue.drain_next().map(|e| (e.request_id, e.batch_index)), Some((low.id(), 1)));
    }

    #[test]
    fn batch_is_queued_at_most_once() {
        let mut queue = BatchQueue::new();
        let r = record(Priority::High, 0, &[1]);
        queue.enqueue(&r, 0).expect("enqueue");
        assert_eq!(
            queue.enqueue(&r, 0),
            Err(QueueError::Duplicate(r.batches()[0].id()))
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn only_pending_batches_are_queued() {
        let mut queue = BatchQueue::new();
        let mut r = record(Priority::High, 0, &[1]);
        r.batch_mut(0).expect("batch").start().expect("start");
        assert!(matches!(
            queue.enqueue(&r, 0),
            Err(QueueError::NotPending {
                status: Status::Running,
                ..
            })
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn depth_tracks_priorities() {
        let mut queue = BatchQueue::new();
        queue
            .enqueue_all(&record(Priority::High, 0, &[1, 2, 3, 4]))
            .expect("enqueue");
        queue
            .enqueue_all(&record(Priority::Low, 1, &[5]))
            .expect("enqueue");
        assert_eq!(
            queue.queue_depth(),
            QueueDepth {
                high: 2,
                medium: 0,
                low: 1,
                total: 3
            }
        );

        queue.drain_next();
        assert_eq!(queue.queue_depth().high, 1);
        assert_eq!(queue.queue_depth().total, 2);
    }
}
