//! Engine error types and agent-record conversions.

use serde_json::json;
use thiserror::Error;

use vforge_fal::FalError;
use vforge_media::MediaError;
use vforge_models::{AgentError, ApiErrorClass};
use vforge_project::ProjectError;
use vforge_queue::QueueError;
use vforge_storage::StorageError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Startup/wiring failures of the composition root.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("provider client error: {0}")]
    Fal(#[from] FalError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("media tool error: {0}")]
    Media(#[from] MediaError),
}

/// Conversion of internal service errors into agent-consumable records.
pub trait IntoAgentError {
    fn into_agent_error(self) -> AgentError;
}

impl IntoAgentError for ProjectError {
    fn into_agent_error(self) -> AgentError {
        match self {
            ProjectError::ProjectNotFound(id) => {
                AgentError::resource_not_found(format!("Project not found: {id}"))
                    .with_detail("project_id", id.into())
                    .with_suggestion("Use list_projects() to see available projects")
                    .with_example("create_project(title='My Video', platform='youtube')")
            }
            ProjectError::SceneNotFound(id) => {
                AgentError::resource_not_found(format!("Scene not found: {id}"))
                    .with_detail("scene_id", id.into())
                    .with_suggestion("Use get_project() to see the project's scenes")
                    .with_example("add_scene(project_id='...', description='...', duration=5)")
            }
            ProjectError::InvalidPosition {
                position,
                scene_count,
            } => AgentError::validation(format!(
                "Position {position} is invalid (project has {scene_count} scenes)"
            ))
            .with_detail("position", position.into())
            .with_detail("current_scenes", scene_count.into())
            .with_suggestion(format!("Use a position between 0 and {scene_count}"))
            .with_example(format!("add_scene(..., position={scene_count})")),
        }
    }
}

impl IntoAgentError for FalError {
    fn into_agent_error(self) -> AgentError {
        let class = self.api_class();
        let retryable = self.is_retryable();
        let err = AgentError::api(class, retryable, self.to_string());
        match class {
            ApiErrorClass::RateLimit => err
                .with_suggestion("Wait a few minutes before trying again, or add delays between calls"),
            ApiErrorClass::Authentication => err
                .with_suggestion("Check that the FALAI_API_KEY environment variable is set correctly")
                .with_example("export FALAI_API_KEY='your-api-key-here'"),
            ApiErrorClass::Timeout => err
                .with_suggestion("Try again with simpler parameters or a shorter duration")
                .with_example("duration=5"),
            ApiErrorClass::ContentPolicy => {
                err.with_suggestion("Modify your prompt to avoid sensitive or inappropriate content")
            }
            ApiErrorClass::ResourceExhausted => {
                err.with_suggestion("The service is at capacity; retry with smaller parameters")
            }
            ApiErrorClass::DownstreamTransient | ApiErrorClass::DownstreamPermanent => err
                .with_suggestion(
                    "The AI model is having trouble; try a simpler prompt or wait before retrying",
                ),
            _ => err.with_suggestion("Check your parameters and try again"),
        }
    }
}

impl IntoAgentError for QueueError {
    fn into_agent_error(self) -> AgentError {
        match self {
            QueueError::JobNotFound(id) => {
                AgentError::not_found(format!("Job not found: {id}"))
                    .with_detail("job_id", id.into())
                    .with_suggestion("Use list_jobs() to see tracked jobs")
            }
            QueueError::Provider(e) => e.into_agent_error(),
            QueueError::JobCancelled => AgentError::state("Job was cancelled"),
            QueueError::WaitTimeout(t) => AgentError::api(
                ApiErrorClass::Timeout,
                true,
                format!("Timed out after {t:?} waiting for job"),
            )
            .with_suggestion("The job keeps running; poll get_job_status() for the result"),
            other => AgentError::api(ApiErrorClass::Unknown, false, other.to_string()),
        }
    }
}

impl IntoAgentError for StorageError {
    fn into_agent_error(self) -> AgentError {
        AgentError::system(self.to_string())
            .with_suggestion("Check disk space and that the storage directory is writable")
    }
}

impl IntoAgentError for MediaError {
    fn into_agent_error(self) -> AgentError {
        match self {
            MediaError::ToolMissing | MediaError::ProbeMissing => {
                AgentError::system(self.to_string())
                    .with_suggestion("Install FFmpeg or set FFMPEG_PATH / FFPROBE_PATH")
            }
            MediaError::InputMissing(msg) => AgentError::validation(msg)
                .with_suggestion("Generate videos for these scenes first")
                .with_example(
                    "generate_video_from_image(image='...', motion_prompt='...', scene_id='...')",
                ),
            MediaError::PassFailed { pass, code, stderr } => {
                AgentError::system(format!("{pass} pass failed"))
                    .with_detail("pass", pass.as_str().into())
                    .with_detail("code", json!(code))
                    .with_detail("stderr", stderr.into())
                    .with_suggestion("Inspect the tool output in details.stderr")
            }
            MediaError::FileNotFound(path) => {
                AgentError::resource_not_found(format!("File not found: {}", path.display()))
            }
            other => AgentError::system(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vforge_models::AgentErrorKind;

    #[test]
    fn test_project_not_found_record() {
        let err = ProjectError::ProjectNotFound("p1".to_string()).into_agent_error();
        assert_eq!(err.kind, AgentErrorKind::ResourceNotFound);
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_fal_rate_limit_record() {
        let err = FalError::RateLimit("429".to_string()).into_agent_error();
        assert_eq!(err.kind, AgentErrorKind::Api);
        assert_eq!(err.api_class, Some(ApiErrorClass::RateLimit));
        assert_eq!(err.retryable, Some(true));
    }

    #[test]
    fn test_pass_failure_carries_stderr() {
        let err = MediaError::pass_failed(
            vforge_media::AssemblyPass::AudioMix,
            Some(1),
            "amix: no such filter",
        )
        .into_agent_error();
        assert_eq!(err.details["pass"], "audio_mix");
        assert_eq!(err.details["stderr"], "amix: no such filter");
    }
}
