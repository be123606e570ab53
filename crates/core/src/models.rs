// request and response data models for the ingestion boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::IngestError,
    types::{BatchId, Identifier, Priority, RequestId, Status},
};

// ============================================================================
// Request Types
// ============================================================================

// request body for POST /ingest
// fields stay raw JSON so the validator can name whatever value was sent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestRequest {
    #[serde(default)]
    pub ids: Option<Value>,

    #[serde(default)]
    pub priority: Option<Value>,
}

impl IngestRequest {
    pub fn new<I>(ids: I, priority: impl Into<String>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            ids: Some(Value::Array(ids.into_iter().map(Into::into).collect())),
            priority: Some(Value::String(priority.into())),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

// response body for POST /ingest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestResponse {
    pub ingestion_id: RequestId,
}

// response body for GET /status/{ingestion_id}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub ingestion_id: RequestId,
    pub priority: Priority,
    // aggregate status, derived from the batches
    pub status: Status,
    // batches in creation order
    pub batches: Vec<BatchView>,
}

// one batch inside a status response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchView {
    pub batch_id: BatchId,
    pub ids: Vec<Identifier>,
    pub status: Status,
}

// ============================================================================
// Error Response
// ============================================================================

// error response body (returned on any error)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorDetail {
    // human-readable error message
    pub message: String,
    // error type (eg: "invalid_request_error")
    pub error_type: String,
    // error code (eg: "invalid_id")
    pub code: String,
}

impl ErrorResponse {
    pub fn new(
        message: impl Into<String>,
        error_type: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: error_type.into(),
                code: code.into(),
            },
        }
    }
}

impl From<&IngestError> for ErrorResponse {
    fn from(err: &IngestError) -> Self {
        Self::new(err.to_string(), err.error_type(), err.code())
    }
}
