//! Submits a few ingestions of each priority against the simulated processor, waits
//! for the queue to drain, and prints every status as JSON.
//!
//! Timings come from `INGEST_*` environment variables; logging from `RUST_LOG`.

use std::process::ExitCode;

use ingest_core::{ErrorResponse, IngestConfig, IngestRequest, IngestService, ServerError};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    let config = IngestConfig::from_env()?;
    let service = IngestService::simulated(config)?;

    let requests = [
        json!({"ids": [1, 2, 3, 4, 5], "priority": "MEDIUM"}),
        json!({"ids": [6, 7, 8, 9], "priority": "HIGH"}),
        json!({"ids": [10, 11], "priority": "LOW"}),
        json!({"ids": [], "priority": "HIGH"}),
        json!({"ids": [12], "priority": "URGENT"}),
    ];

    let mut accepted = Vec::new();
    for body in requests {
        let request: IngestRequest = serde_json::from_value(body)
            .map_err(|e| ServerError::Config(format!("bad demo request: {}", e)))?;
        match service.submit_request(&request) {
            Ok(response) => accepted.push(response.ingestion_id),
            Err(e) => println!("{}", render(&ErrorResponse::from(&e))),
        }
    }

    service.wait_idle().await;

    for ingestion_id in accepted {
        match service.status(&ingestion_id) {
            Ok(status) => println!("{}", render(&status)),
            Err(e) => println!("{}", render(&ErrorResponse::from(&e))),
        }
    }
    println!("{}", render(&service.stats()));
    Ok(())
}

fn render<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}
