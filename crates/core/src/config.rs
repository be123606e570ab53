// runtime configuration for the ingestion engine.
// defaults mirror the production timings; `from_env` lets a deployment shorten them.

use std::time::Duration;

use crate::{
    error::ServerError,
    types::{Identifier, DEFAULT_BATCH_SIZE, MAX_IDENTIFIER, MIN_IDENTIFIER},
};

pub const ENV_BATCH_SIZE: &str = "INGEST_BATCH_SIZE";
pub const ENV_SETTLE_DELAY_MS: &str = "INGEST_SETTLE_DELAY_MS";
pub const ENV_CALL_LATENCY_MS: &str = "INGEST_CALL_LATENCY_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    // max identifiers per batch
    pub batch_size: usize,
    // pause after a batch's calls return, before it is marked done
    pub settle_delay: Duration,
    // latency of the simulated external call
    pub call_latency: Duration,
    // inclusive identifier bounds
    pub min_id: Identifier,
    pub max_id: Identifier,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            settle_delay: Duration::from_secs(5),
            call_latency: Duration::from_secs(1),
            min_id: MIN_IDENTIFIER,
            max_id: MAX_IDENTIFIER,
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // short timings for tests (10ms settle, 1ms calls)
    pub fn for_tests() -> Self {
        Self {
            settle_delay: Duration::from_millis(10),
            call_latency: Duration::from_millis(1),
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_call_latency(mut self, latency: Duration) -> Self {
        self.call_latency = latency;
        self
    }

    // defaults overridden by INGEST_* environment variables
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // same as `from_env` but reads from an arbitrary source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_BATCH_SIZE) {
            config.batch_size = parse_var(ENV_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_SETTLE_DELAY_MS) {
            config.settle_delay = Duration::from_millis(parse_var(ENV_SETTLE_DELAY_MS, &raw)?);
        }
        if let Some(raw) = lookup(ENV_CALL_LATENCY_MS) {
            config.call_latency = Duration::from_millis(parse_var(ENV_CALL_LATENCY_MS, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.batch_size == 0 {
            return Err(ServerError::Config(format!(
                "{} must be at least 1",
                ENV_BATCH_SIZE
            )));
        }
        if self.min_id > self.max_id {
            return Err(ServerError::Config(format!(
                "min_id {} exceeds max_id {}",
                self.min_id, self.max_id
            )));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ServerError> {
    raw.trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{} has invalid value '{}'", key, raw)))
}
