// type aliases and small value types for the ingestion engine.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// unique identifier for an ingestion request
pub type RequestId = Uuid;
// unique identifier for a batch, independent of its parent request
pub type BatchId = Uuid;
// a single identifier to process, always in [1, 10^9+7] once validated
pub type Identifier = u64;

// default number of identifiers per batch
pub const DEFAULT_BATCH_SIZE: usize = 3;
// inclusive bounds for a valid identifier
pub const MIN_IDENTIFIER: Identifier = 1;
pub const MAX_IDENTIFIER: Identifier = 1_000_000_007;

// priority levels for request scheduling
// lower ordinal drains first: HIGH (1) < MEDIUM (2) < LOW (3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High = 1,
    Medium = 2,
    Low = 3,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    // fixed ordinal used as the primary queue key
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// exact, case-sensitive match on the wire names
impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HIGH" => Ok(Priority::High),
            "MEDIUM" => Ok(Priority::Medium),
            "LOW" => Ok(Priority::Low),
            other => Err(other.to_string()),
        }
    }
}

// lifecycle status shared by batches and request records
// serialized with the names clients already know
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "yet_to_start")]
    Pending,
    #[serde(rename = "triggered")]
    Running,
    #[serde(rename = "completed")]
    Done,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Pending => "yet_to_start",
            Status::Running => "triggered",
            Status::Done => "completed",
        }
    }

    // only single forward steps are legal: pending -> running -> done
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::Running) | (Status::Running, Status::Done)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
