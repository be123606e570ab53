// prioritized bulk-ingestion engine: batching, priority queue and single-flight drain loop.

pub mod batch;
pub mod config;
pub mod error;
pub mod models;
pub mod processor;
pub mod queue;
pub mod record;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;
pub mod validator;

// commonly used types
pub use config::IngestConfig;
pub use error::{IngestError, QueueError, ServerError, StatusError, StoreError, ValidationError};
pub use types::{BatchId, Identifier, Priority, RequestId, Status};

// engine
pub use processor::{IdProcessor, ProcessResult, SimulatedProcessor};
pub use scheduler::{DrainStats, SchedulerState};
pub use service::IngestService;

// models
pub use models::{BatchView, ErrorDetail, ErrorResponse, IngestRequest, IngestResponse, StatusResponse};
