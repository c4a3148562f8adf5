//! FAL client error types and classification.

use thiserror::Error;
use vforge_models::ApiErrorClass;

pub type FalResult<T> = Result<T, FalError>;

#[derive(Debug, Error)]
pub enum FalError {
    #[error("Validation rejected by provider: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Content policy violation: {0}")]
    ContentPolicy(String),

    #[error("Provider out of capacity: {0}")]
    ResourceExhausted(String),

    #[error("Transient provider failure: {0}")]
    DownstreamTransient(String),

    #[error("Permanent provider failure: {0}")]
    DownstreamPermanent(String),

    #[error("Request is not ready: {0}")]
    NotReady(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Not a file: {0}")]
    NotAFile(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Unknown(String),
}

impl FalError {
    /// Classify an HTTP failure from the provider into the error taxonomy.
    ///
    /// Classification is by status code first, then by well-known body
    /// markers, matching how the provider reports queue and model errors.
    pub fn classify(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();

        if status == 401 || status == 403 || lower.contains("unauthorized") || lower.contains("api key") {
            return FalError::Authentication(truncate(body));
        }
        if status == 429 || lower.contains("rate limit") || lower.contains("too many requests") {
            return FalError::RateLimit(truncate(body));
        }
        if lower.contains("safety") || lower.contains("content policy") || lower.contains("blocked")
        {
            return FalError::ContentPolicy(truncate(body));
        }
        if lower.contains("out of memory") || lower.contains("capacity") {
            return FalError::ResourceExhausted(truncate(body));
        }
        if lower.contains("downstream") {
            return FalError::DownstreamPermanent(truncate(body));
        }
        if is_not_ready_marker(&lower) {
            return FalError::NotReady(truncate(body));
        }
        if matches!(status, 502 | 503 | 504) {
            return FalError::DownstreamTransient(truncate(body));
        }
        if (400..500).contains(&status) {
            return FalError::Validation(truncate(body));
        }
        if status >= 500 {
            return FalError::DownstreamTransient(truncate(body));
        }
        FalError::Unknown(truncate(body))
    }

    /// Whether the synchronous retry path should try again.
    pub fn is_retryable(&self) -> bool {
        match self {
            FalError::RateLimit(_)
            | FalError::Timeout(_)
            | FalError::DownstreamTransient(_)
            | FalError::Network(_) => true,
            _ => false,
        }
    }

    /// "Not ready"-class errors do not count as failures while polling.
    pub fn is_not_ready(&self) -> bool {
        match self {
            FalError::NotReady(_) => true,
            FalError::Validation(msg)
            | FalError::Unknown(msg)
            | FalError::DownstreamPermanent(msg) => is_not_ready_marker(&msg.to_lowercase()),
            _ => false,
        }
    }

    /// Project the error onto the agent-facing API sub-class.
    pub fn api_class(&self) -> ApiErrorClass {
        match self {
            FalError::Validation(_) | FalError::FileNotFound(_) | FalError::NotAFile(_) => {
                ApiErrorClass::Validation
            }
            FalError::Authentication(_) => ApiErrorClass::Authentication,
            FalError::RateLimit(_) => ApiErrorClass::RateLimit,
            FalError::Timeout(_) => ApiErrorClass::Timeout,
            FalError::ContentPolicy(_) => ApiErrorClass::ContentPolicy,
            FalError::ResourceExhausted(_) => ApiErrorClass::ResourceExhausted,
            FalError::DownstreamTransient(_) | FalError::Network(_) => {
                ApiErrorClass::DownstreamTransient
            }
            FalError::DownstreamPermanent(_) => ApiErrorClass::DownstreamPermanent,
            _ => ApiErrorClass::Unknown,
        }
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }
}

fn is_not_ready_marker(lower: &str) -> bool {
    lower.contains("not found")
        || lower.contains("pending")
        || lower.contains("in_queue")
        || lower.contains("processing")
        || lower.contains("still in progress")
}

fn truncate(body: &str) -> String {
    const MAX: usize = 500;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rate_limit() {
        let err = FalError::classify(429, "Too Many Requests");
        assert!(matches!(err, FalError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_bad_gateway_is_transient() {
        let err = FalError::classify(502, "Bad Gateway");
        assert!(matches!(err, FalError::DownstreamTransient(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_downstream_marker_is_permanent() {
        let err = FalError::classify(500, "downstream_service_error");
        assert!(matches!(err, FalError::DownstreamPermanent(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_classify_validation_not_retryable() {
        let err = FalError::classify(422, "duration must be one of 5, 10");
        assert!(matches!(err, FalError::Validation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_not_ready_markers() {
        assert!(FalError::classify(400, "request is still in progress").is_not_ready());
        assert!(FalError::classify(404, "request not found").is_not_ready());
        assert!(!FalError::classify(400, "invalid image_url").is_not_ready());
    }

    #[test]
    fn test_api_class_projection() {
        assert_eq!(
            FalError::classify(401, "bad api key").api_class(),
            ApiErrorClass::Authentication
        );
        assert_eq!(
            FalError::Timeout(600).api_class(),
            ApiErrorClass::Timeout
        );
    }
}
