// error types for the ingestion engine.

use thiserror::Error;

use crate::types::{BatchId, RequestId, Status};

// top-level process errors (internal, not exposed to clients)
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// API-level errors (returned to client as HTTP responses)
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    InvalidInput(#[from] ValidationError),

    #[error("Ingestion ID not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IngestError {
    // returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            IngestError::InvalidInput(_) => 400,
            IngestError::NotFound(_) => 404,
            IngestError::Internal(_) => 500,
        }
    }

    // returns the error type string for the API response
    pub fn error_type(&self) -> &'static str {
        match self {
            IngestError::InvalidInput(_) => "invalid_request_error",
            IngestError::NotFound(_) => "not_found_error",
            IngestError::Internal(_) => "server_error",
        }
    }

    // returns the machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidInput(e) => e.code(),
            IngestError::NotFound(_) => "ingestion_not_found",
            IngestError::Internal(_) => "internal_error",
        }
    }
}

// validation error for incoming submissions
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid input. Provide ids (array) and priority (HIGH, MEDIUM, LOW). Missing field: {0}")]
    MissingField(String),

    #[error("Invalid input. Provide ids (array) and priority (HIGH, MEDIUM, LOW). ids is empty")]
    EmptyIds,

    #[error("Invalid input. Provide ids (array) and priority (HIGH, MEDIUM, LOW). Unknown priority: {0}")]
    UnknownPriority(String),

    #[error("ID {value} is invalid. IDs must be integers between {min} and {max}.")]
    InvalidId { value: String, min: u64, max: u64 },
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingField(_) => "missing_field",
            ValidationError::EmptyIds => "empty_ids",
            ValidationError::UnknownPriority(_) => "unknown_priority",
            ValidationError::InvalidId { .. } => "invalid_id",
        }
    }
}

// illegal batch lifecycle transition
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Illegal status transition: {from} -> {to}")]
pub struct StatusError {
    pub from: Status,
    pub to: Status,
}

// errors from the batch queue
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Batch {0} is already queued")]
    Duplicate(BatchId),

    #[error("Batch {batch_id} is {status}, only pending batches can be queued")]
    NotPending { batch_id: BatchId, status: Status },

    #[error("Request {request_id} has no batch at index {batch_index}")]
    UnknownBatch {
        request_id: RequestId,
        batch_index: usize,
    },
}

// errors from store bookkeeping in the drain loop
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Request {request_id} has no batch at index {batch_index}")]
    UnknownBatch {
        request_id: RequestId,
        batch_index: usize,
    },

    #[error(transparent)]
    Transition(#[from] StatusError),
}
