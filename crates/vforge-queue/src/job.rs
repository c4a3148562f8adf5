//! Generation job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

use vforge_models::{ProjectId, SceneId};

/// Unique identifier for a queued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job state in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the provider to pick the request up
    #[default]
    Queued,
    /// The provider is working on the request
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled locally
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// Category of generated media; selects the completion hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Video,
    Image,
    Audio,
    Music,
    Speech,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Video => "video",
            TaskKind::Image => "image",
            TaskKind::Audio => "audio",
            TaskKind::Music => "music",
            TaskKind::Speech => "speech",
        }
    }
}

/// A single tracked generation request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    /// Local job ID
    pub id: JobId,

    /// Provider request ID, set after submission
    #[serde(default)]
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<SceneId>,

    pub task_kind: TaskKind,

    /// Model registry key or endpoint path
    pub model: String,

    /// Provider payload
    pub arguments: Value,

    #[serde(default)]
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,

    /// Progress percentage reported by the provider, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    /// Provider log entries, append-only
    #[serde(default)]
    pub logs: Vec<Value>,

    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Final provider payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Submit-time context consumed by the completion hook
    /// (cost, source_image, motion_prompt, duration, aspect_ratio, ...)
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl GenerationJob {
    /// Create a new queued job.
    pub fn new(
        task_kind: TaskKind,
        model: impl Into<String>,
        arguments: Value,
        project_id: Option<ProjectId>,
        scene_id: Option<SceneId>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id: JobId::new(),
            request_id: String::new(),
            project_id,
            scene_id,
            task_kind,
            model: model.into(),
            arguments,
            status: JobStatus::Queued,
            queue_position: None,
            progress: None,
            logs: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
            result: None,
            metadata,
        }
    }

    /// Seconds since creation, or to completion once terminal.
    pub fn elapsed_secs(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// Seconds spent processing, if the job ever started.
    pub fn processing_secs(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        Some((end - started).num_milliseconds() as f64 / 1000.0)
    }

    /// Seconds spent waiting in the queue before processing started.
    pub fn wait_secs(&self) -> Option<f64> {
        let started = self.started_at?;
        Some((started - self.created_at).num_milliseconds() as f64 / 1000.0)
    }

    /// Compact projection for listings.
    pub fn to_summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            task_kind: self.task_kind,
            model: self.model.clone(),
            status: self.status,
            queue_position: self.queue_position,
            progress: self.progress,
            elapsed_secs: self.elapsed_secs(),
            project_id: self.project_id.clone(),
            scene_id: self.scene_id.clone(),
            error_message: self.error_message.clone(),
        }
    }
}

/// Summary view of a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobSummary {
    pub id: JobId,
    pub task_kind: TaskKind,
    pub model: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    pub elapsed_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<SceneId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_job_is_queued() {
        let job = GenerationJob::new(
            TaskKind::Video,
            "kling_2.1",
            json!({"prompt": "zoom in"}),
            None,
            None,
            Map::new(),
        );
        assert_eq!(job.status, JobStatus::Queued);
        assert!(!job.status.is_terminal());
        assert!(job.request_id.is_empty());
        assert!(job.result.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_summary_projection() {
        let mut job = GenerationJob::new(
            TaskKind::Music,
            "lyria2",
            json!({"prompt": "calm piano"}),
            Some(ProjectId::from_string("p1")),
            None,
            Map::new(),
        );
        job.progress = Some(50.0);
        let summary = job.to_summary();
        assert_eq!(summary.model, "lyria2");
        assert_eq!(summary.progress, Some(50.0));
        assert_eq!(summary.project_id.unwrap().as_str(), "p1");
    }
}
