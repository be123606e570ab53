// request records: one per submission, owning its batches.

use std::time::Instant;

use crate::{
    batch::Batch,
    models::{BatchView, StatusResponse},
    types::{Priority, RequestId, Status},
};

#[derive(Debug, Clone)]
pub struct RequestRecord {
    id: RequestId,
    priority: Priority,
    // monotonic submission order, the FIFO tie-break between equal priorities
    sequence: u64,
    created_at: Instant,
    batches: Vec<Batch>,
    status: Status,
}

impl RequestRecord {
    pub fn new(id: RequestId, priority: Priority, sequence: u64, batches: Vec<Batch>) -> Self {
        Self {
            id,
            priority,
            sequence,
            created_at: Instant::now(),
            batches,
            status: Status::Pending,
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, index: usize) -> Option<&Batch> {
        self.batches.get(index)
    }

    pub(crate) fn batch_mut(&mut self, index: usize) -> Option<&mut Batch> {
        self.batches.get_mut(index)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    // done iff every batch is done; running once any batch left pending; else pending
    pub fn derive_status(&self) -> Status {
        if self.batches.iter().all(Batch::is_done) {
            Status::Done
        } else if self.batches.iter().any(|b| b.status() != Status::Pending) {
            Status::Running
        } else {
            Status::Pending
        }
    }

    // recompute the aggregate status after a batch changed, returning the previous one
    pub(crate) fn refresh_status(&mut self) -> Status {
        let previous = self.status;
        self.status = self.derive_status();
        previous
    }

    pub fn to_response(&self) -> StatusResponse {
        StatusResponse {
            ingestion_id: self.id,
            priority: self.priority,
            status: self.status,
            batches: self
                .batches
                .iter()
                .map(|b| BatchView {
                    batch_id: b.id(),
                    ids: b.ids().to_vec(),
                    status: b.status(),
                })
                .collect(),
        }
    }
}
