//! # Request Validation
//!
//! Schema checks for incoming request specifications and the final
//! completeness check of a resolution pass.

use envconf_core::RequestSpec;
use errors::{ConfigError, ResolutionError};
use serde_json::Value;
use validator::Validate;

/// Validate a request specification.
///
/// # M-CANONICAL-DOCS
///
/// ## Purpose
/// Rejects malformed requests before they reach the pipeline. Field rules
/// live on [`RequestSpec`] and `ServiceDescriptor` as `validator` attributes.
///
/// ## Usage
/// ```rust
/// use config::validate_spec;
/// use envconf_core::RequestSpec;
///
/// assert!(validate_spec(&RequestSpec::new("TEST")).is_ok());
/// assert!(validate_spec(&RequestSpec::new("")).is_err());
/// ```
///
/// ## Validation Rules
/// - `name`: 1-255 characters, no `/`, not blank
/// - `services[].name`: 1-253 characters
pub fn validate_spec(spec: &RequestSpec) -> Result<(), ConfigError> {
    spec.validate().map_err(|e| ConfigError::InvalidSpec {
        reason: e.to_string(),
    })
}

/// Deserialize and validate a request specification from JSON.
pub fn parse_spec(value: Value) -> Result<RequestSpec, ConfigError> {
    let spec: RequestSpec =
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidSpec {
            reason: e.to_string(),
        })?;
    validate_spec(&spec)?;
    Ok(spec)
}

/// Whether `name` can key a store entry even though its request was
/// rejected.
pub fn is_usable_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains('/')
}

/// One missing-value error per required pointer absent from `config`.
///
/// Present `null` and `""` values count as defined.
pub fn missing_values(spec: &RequestSpec, config: &Value) -> Vec<ResolutionError> {
    spec.required_pointers()
        .into_iter()
        .filter(|pointer| pointer.get(config).is_none())
        .map(|pointer| ResolutionError::MissingValue {
            namespace: spec.name.clone(),
            pointer: pointer.to_string(),
        })
        .collect()
}
