//! Completion hooks.
//!
//! The queue owns a typed callback table keyed by task kind; the
//! composition root registers handlers at startup. This inverts the
//! dependency so no service here knows about the project graph.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::job::GenerationJob;

pub type HookResult<T> = Result<T, HookError>;

/// Error raised by a completion hook.
///
/// Hook failures are logged by the queue and never fail the job.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("result payload carried no usable artifact URL")]
    MissingArtifactUrl,

    #[error("{0}")]
    PostProcessing(String),
}

impl HookError {
    pub fn post_processing(msg: impl Into<String>) -> Self {
        Self::PostProcessing(msg.into())
    }
}

/// Invoked after a job reaches terminal success.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    /// Materialize the result (create an asset, download it, attach it).
    async fn on_completed(&self, job: &GenerationJob, result: &Value) -> HookResult<()>;
}
