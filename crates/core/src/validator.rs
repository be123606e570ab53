// Submission validation for the ingestion engine
// Checks incoming requests before any scheduling state is touched

use serde_json::Value;

use crate::{
    config::IngestConfig,
    models::IngestRequest,
    types::{Identifier, Priority, MAX_IDENTIFIER, MIN_IDENTIFIER},
    ValidationError,
};

// configuration for the submission validator
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    pub min_id: Identifier, // smallest accepted identifier (inclusive)
    pub max_id: Identifier, // largest accepted identifier (inclusive)
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_id: MIN_IDENTIFIER,
            max_id: MAX_IDENTIFIER,
        }
    }
}

impl From<&IngestConfig> for ValidatorConfig {
    fn from(config: &IngestConfig) -> Self {
        Self {
            min_id: config.min_id,
            max_id: config.max_id,
        }
    }
}

// wrapper for a validated submission
#[derive(Debug, Clone)]
pub struct Validated<T>(pub T);

impl<T> Validated<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

// a submission that passed every check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub ids: Vec<Identifier>,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
pub struct SubmissionValidator {
    config: ValidatorConfig,
}

impl SubmissionValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ValidatorConfig::default())
    }

    // validate a raw request body
    // shape problems (ids, priority) are reported before individual ids
    pub fn validate_request(
        &self,
        request: &IngestRequest,
    ) -> Result<Validated<Submission>, ValidationError> {
        let raw_ids = match &request.ids {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField("ids".to_string()))
            }
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(ValidationError::MissingField(format!(
                    "ids (expected array, got {})",
                    other
                )))
            }
        };
        if raw_ids.is_empty() {
            return Err(ValidationError::EmptyIds);
        }

        let priority = match &request.priority {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingField("priority".to_string()))
            }
            Some(Value::String(name)) => name
                .parse::<Priority>()
                .map_err(ValidationError::UnknownPriority)?,
            Some(other) => return Err(ValidationError::UnknownPriority(other.to_string())),
        };

        let ids = raw_ids
            .iter()
            .map(|raw| self.parse_id(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Validated(Submission { ids, priority }))
    }

    // validate an already-typed submission
    pub fn validate(
        &self,
        ids: Vec<Identifier>,
        priority: Priority,
    ) -> Result<Validated<Submission>, ValidationError> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyIds);
        }
        if let Some(bad) = ids.iter().find(|id| !self.in_range(**id)) {
            return Err(self.invalid_id(bad.to_string()));
        }
        Ok(Validated(Submission { ids, priority }))
    }

    pub fn in_range(&self, id: Identifier) -> bool {
        (self.config.min_id..=self.config.max_id).contains(&id)
    }

    // only JSON integers are identifiers; floats, strings and negatives are rejected by value
    fn parse_id(&self, raw: &Value) -> Result<Identifier, ValidationError> {
        match raw.as_u64() {
            Some(id) if self.in_range(id) => Ok(id),
            _ => Err(self.invalid_id(raw.to_string())),
        }
    }

    fn invalid_id(&self, value: String) -> ValidationError {
        ValidationError::InvalidId {
            value,
            min: self.config.min_id,
            max: self.config.max_id,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }
}
