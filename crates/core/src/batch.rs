// batches: fixed-size chunks of a request's identifiers, the unit of scheduling.

use uuid::Uuid;

use crate::{
    error::StatusError,
    types::{BatchId, Identifier, RequestId, Status},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    request_id: RequestId,
    ids: Vec<Identifier>,
    status: Status,
}

impl Batch {
    pub fn new(request_id: RequestId, ids: Vec<Identifier>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            ids,
            status: Status::Pending,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn ids(&self) -> &[Identifier] {
        &self.ids
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    // pending -> running
    pub fn start(&mut self) -> Result<(), StatusError> {
        self.transition(Status::Running)
    }

    // running -> done
    pub fn complete(&mut self) -> Result<(), StatusError> {
        self.transition(Status::Done)
    }

    fn transition(&mut self, next: Status) -> Result<(), StatusError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

// split ids into consecutive batches of at most `batch_size`, preserving input order
pub fn chunk_ids(request_id: RequestId, ids: &[Identifier], batch_size: usize) -> Vec<Batch> {
    ids.chunks(batch_size.max(1))
        .map(|chunk| Batch::new(request_id, chunk.to_vec()))
        .collect()
}
