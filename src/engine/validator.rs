// Request validation - the first pipeline stage
//
// Shape errors (unknown fields, wrong types) are caught earlier by
// `TransitionRequest::from_value`; this stage rejects structurally
// valid requests with blank required fields. Validation failures are
// terminal and never reach the matcher.

use crate::engine::types::TransitionRequest;
use crate::error::EngineError;

pub fn validate(request: &TransitionRequest) -> Result<(), EngineError> {
    for (field, value) in [
        ("entity_type", &request.entity_type),
        ("entity_id", &request.entity_id),
        ("on", &request.on),
    ] {
        if value.trim().is_empty() {
            return Err(EngineError::Validation {
                reason: format!("missing required field '{field}'"),
            });
        }
    }
    if let Some(key) = &request.idempotency_key {
        if key.trim().is_empty() {
            return Err(EngineError::Validation {
                reason: "idempotency_key must not be blank when supplied".to_string(),
            });
        }
    }
    Ok(())
}
