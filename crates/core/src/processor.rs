// external per-identifier processing capability.
//
// the drain loop only depends on `IdProcessor`; the simulated implementation stands in
// for the real downstream call, which is outside this crate.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Identifier;

// result of processing one identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub id: Identifier,
    pub data: String,
}

impl ProcessResult {
    pub fn processed(id: Identifier) -> Self {
        Self {
            id,
            data: "processed".to_string(),
        }
    }
}

// one call per identifier; always resolves
#[async_trait]
pub trait IdProcessor: Send + Sync + 'static {
    async fn process(&self, id: Identifier) -> ProcessResult;
}

// fixed-latency stand-in for the external call
#[derive(Debug, Clone)]
pub struct SimulatedProcessor {
    latency: Duration,
}

impl SimulatedProcessor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for SimulatedProcessor {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl IdProcessor for SimulatedProcessor {
    async fn process(&self, id: Identifier) -> ProcessResult {
        tokio::time::sleep(self.latency).await;
        ProcessResult::processed(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn simulated_processor_returns_processed() {
        let processor = SimulatedProcessor::new(Duration::from_millis(5));
        let started = Instant::now();
        let result = processor.process(42).await;
        assert_eq!(result, ProcessResult::processed(42));
        assert_eq!(result.data, "processed");
        assert!(started.elapsed() >= Duration::from_millis(5));
    }
}
