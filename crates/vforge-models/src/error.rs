//! Agent-consumable error records and validation helpers.
//!
//! Boundary validation returns these records instead of raising; the
//! `suggestion` and `example` fields are part of the contract for
//! validation failures so a calling agent can self-correct.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::platform::{ASPECT_RATIOS, PLATFORMS};

pub type AgentResult<T> = Result<T, AgentError>;

/// Category of a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    Validation,
    ResourceNotFound,
    State,
    Api,
    System,
    NotFound,
    InvalidOperation,
}

/// Sub-class of a provider (API) failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorClass {
    Validation,
    Authentication,
    RateLimit,
    Timeout,
    ContentPolicy,
    ResourceExhausted,
    DownstreamTransient,
    DownstreamPermanent,
    Unknown,
}

/// Structured error record surfaced to callers.
#[derive(Debug, Clone, Serialize, JsonSchema, Error)]
#[error("{message}")]
pub struct AgentError {
    #[serde(rename = "error_type")]
    pub kind: AgentErrorKind,

    /// Human-readable description
    pub message: String,

    /// Sub-class of a provider failure, present when `kind` is `Api`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_class: Option<ApiErrorClass>,

    /// Whether retrying the same call may succeed (API errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,

    /// Structured context (offending parameter, provided value, ...)
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,

    /// The accepted values, when a closed set exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_options: Option<Value>,

    /// How to recover
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    /// A concrete corrected call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl AgentError {
    pub fn new(kind: AgentErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            api_class: None,
            retryable: None,
            details: Map::new(),
            valid_options: None,
            suggestion: None,
            example: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::Validation, message)
    }

    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::ResourceNotFound, message)
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::State, message)
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::System, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::NotFound, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(AgentErrorKind::InvalidOperation, message)
    }

    pub fn api(class: ApiErrorClass, retryable: bool, message: impl Into<String>) -> Self {
        let mut err = Self::new(AgentErrorKind::Api, message);
        err.api_class = Some(class);
        err.retryable = Some(retryable);
        err
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        self.details.insert(key.into(), value);
        self
    }

    pub fn with_valid_options(mut self, options: Value) -> Self {
        self.valid_options = Some(options);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Validate a video duration against the model's legal values.
pub fn validate_duration(duration: u32, valid_durations: &[u32]) -> AgentResult<u32> {
    if valid_durations.contains(&duration) {
        return Ok(duration);
    }
    let choices = valid_durations
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>();
    Err(AgentError::validation(format!(
        "Invalid duration: {duration} seconds"
    ))
    .with_detail("parameter", "duration".into())
    .with_detail("provided", duration.into())
    .with_valid_options(Value::from(valid_durations.to_vec()))
    .with_suggestion(format!("Use {} seconds", choices.join(" or ")))
    .with_example(format!("duration={}", valid_durations[0])))
}

/// Validate a platform key against the registry.
pub fn validate_platform(platform: &str) -> AgentResult<()> {
    if PLATFORMS.iter().any(|p| p.key == platform) {
        return Ok(());
    }
    let known: Vec<&str> = PLATFORMS.iter().map(|p| p.key).collect();
    Err(
        AgentError::validation(format!("Unknown platform: '{platform}'"))
            .with_detail("parameter", "platform".into())
            .with_detail("provided", platform.into())
            .with_valid_options(Value::from(known))
            .with_suggestion("Choose a platform based on your target audience")
            .with_example("create_project(title='My Video', platform='youtube')"),
    )
}

/// Validate an aspect-ratio string against the recognized set.
pub fn validate_aspect_ratio(aspect_ratio: &str) -> AgentResult<()> {
    if ASPECT_RATIOS.iter().any(|(r, _)| *r == aspect_ratio) {
        return Ok(());
    }
    let options: Map<String, Value> = ASPECT_RATIOS
        .iter()
        .map(|(r, d)| (r.to_string(), Value::from(*d)))
        .collect();
    Err(
        AgentError::validation(format!("Invalid aspect ratio: '{aspect_ratio}'"))
            .with_detail("parameter", "aspect_ratio".into())
            .with_detail("provided", aspect_ratio.into())
            .with_valid_options(Value::Object(options))
            .with_suggestion("Use 16:9 for YouTube, 9:16 for TikTok/Reels, or 1:1 for Instagram")
            .with_example("aspect_ratio='16:9'"),
    )
}

/// Validate a numeric parameter against an inclusive range.
pub fn validate_range(
    value: f64,
    param_name: &str,
    min_value: f64,
    max_value: f64,
    param_description: &str,
) -> AgentResult<f64> {
    if value >= min_value && value <= max_value {
        return Ok(value);
    }
    Err(AgentError::validation(format!(
        "{param_description} must be between {min_value} and {max_value}, got: {value}"
    ))
    .with_detail("parameter", param_name.into())
    .with_detail("provided", value.into())
    .with_detail("min", min_value.into())
    .with_detail("max", max_value.into())
    .with_suggestion(format!("Use a value between {min_value} and {max_value}"))
    .with_example(format!("{param_name}={}", (min_value + max_value) / 2.0)))
}

/// Validate a value against a closed set of options.
pub fn validate_enum(
    value: &str,
    param_name: &str,
    valid_values: &[&str],
    param_description: &str,
) -> AgentResult<()> {
    if valid_values.contains(&value) {
        return Ok(());
    }
    Err(
        AgentError::validation(format!("Invalid {param_description}: '{value}'"))
            .with_detail("parameter", param_name.into())
            .with_detail("provided", value.into())
            .with_valid_options(Value::from(
                valid_values.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            ))
            .with_suggestion(format!("Choose one of: {}", valid_values.join(", ")))
            .with_example(format!("{param_name}='{}'", valid_values[0])),
    )
}
