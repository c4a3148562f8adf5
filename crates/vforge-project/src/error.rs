//! Project store error types.

use thiserror::Error;

pub type ProjectResult<T> = Result<T, ProjectError>;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Scene position {position} is invalid (project has {scene_count} scenes)")]
    InvalidPosition { position: usize, scene_count: usize },
}
