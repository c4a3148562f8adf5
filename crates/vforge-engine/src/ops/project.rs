//! Project operations.

use serde::Serialize;
use tracing::info;

use vforge_models::{
    aspect_ratio_dimensions, platform_spec, sanitize_title, validate_aspect_ratio,
    validate_platform, validate_range, AgentError, AgentResult, ProjectId, ProjectStatus,
    VideoProject,
};
use vforge_project::{NewProject, ProjectUpdate};

use crate::error::IntoAgentError;
use crate::Engine;

/// Durations accepted for a scene: the union of what the registered
/// video models can generate.
pub const SCENE_DURATIONS: &[u32] = &[5, 6, 10];

/// Compact projection of a project.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub title: String,
    pub platform: String,
    pub aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
    pub actual_duration: u32,
    pub status: ProjectStatus,
    pub scene_count: usize,
    pub total_cost: f64,
}

impl From<&VideoProject> for ProjectSummary {
    fn from(project: &VideoProject) -> Self {
        Self {
            id: project.id.clone(),
            title: project.title.clone(),
            platform: project.platform.clone(),
            aspect_ratio: project.aspect_ratio.clone(),
            target_duration: project.target_duration,
            actual_duration: project.actual_duration,
            status: project.status,
            scene_count: project.scenes.len(),
            total_cost: project.total_cost,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateProjectResponse {
    pub project: ProjectSummary,
    /// Pixel dimensions derived from the aspect ratio at 1080 height
    pub dimensions: (u32, u32),
    /// File stem the assembled output will use
    pub output_stem: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddSceneResponse {
    pub scene_id: vforge_models::SceneId,
    pub order: usize,
    pub duration: u32,
    pub total_scenes: usize,
    pub total_duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_warning: Option<String>,
}

impl Engine {
    /// Initialize a project with platform-derived defaults.
    pub fn create_project(
        &self,
        title: &str,
        platform: &str,
        script: Option<String>,
        target_duration: Option<u32>,
        aspect_ratio: Option<String>,
    ) -> AgentResult<CreateProjectResponse> {
        if title.trim().is_empty() {
            return Err(AgentError::validation("Project title cannot be empty")
                .with_detail("parameter", "title".into())
                .with_suggestion("Provide a descriptive title for your project")
                .with_example("create_project(title='My Product Launch Video', platform='youtube')"));
        }
        validate_platform(platform)?;
        let spec = platform_spec(platform);

        if let Some(target) = target_duration {
            validate_range(target as f64, "target_duration", 1.0, 3600.0, "Target duration")?;
            if target > spec.max_duration {
                return Err(AgentError::validation(format!(
                    "{platform} videos cannot exceed {} seconds",
                    spec.max_duration
                ))
                .with_detail("platform", platform.into())
                .with_detail("target_duration", target.into())
                .with_detail("max_duration", spec.max_duration.into())
                .with_suggestion(format!(
                    "Use a duration of {} seconds or less for {platform}",
                    spec.max_duration
                ))
                .with_example(format!(
                    "target_duration={}",
                    spec.recommended_duration.min(spec.max_duration)
                )));
            }
        }

        let aspect_ratio = match aspect_ratio {
            Some(ratio) => {
                validate_aspect_ratio(&ratio)?;
                ratio
            }
            None => spec.default_aspect_ratio.to_string(),
        };
        let target_duration = target_duration.or(Some(spec.recommended_duration));

        let project = self.projects().create(NewProject {
            title: title.trim().to_string(),
            platform: platform.to_string(),
            aspect_ratio: aspect_ratio.clone(),
            target_duration,
            script,
        });

        info!(project_id = %project.id, platform, "project created");
        Ok(CreateProjectResponse {
            dimensions: aspect_ratio_dimensions(&aspect_ratio, 1080),
            output_stem: format!("{}_{}", sanitize_title(&project.title), project.platform),
            project: ProjectSummary::from(&project),
        })
    }

    /// Add a scene to a project's timeline.
    pub fn add_scene(
        &self,
        project_id: &str,
        description: &str,
        duration: u32,
        position: Option<usize>,
    ) -> AgentResult<AddSceneResponse> {
        if description.trim().is_empty() {
            return Err(AgentError::validation("Scene description cannot be empty")
                .with_detail("parameter", "description".into())
                .with_suggestion("Describe what should happen in this scene")
                .with_example(
                    "add_scene(project_id='...', description='Hero walking through city streets', duration=10)",
                ));
        }
        let duration = vforge_models::validate_duration(duration, SCENE_DURATIONS)?;

        let project_id = ProjectId::from_string(project_id);
        let scene = self
            .projects()
            .add_scene(&project_id, description, duration, position)
            .map_err(IntoAgentError::into_agent_error)?;
        let project = self
            .projects()
            .get(&project_id)
            .map_err(IntoAgentError::into_agent_error)?;

        let duration_warning = project.target_duration.and_then(|target| {
            (project.actual_duration > target).then(|| {
                format!(
                    "Total duration ({}s) exceeds target ({target}s)",
                    project.actual_duration
                )
            })
        });

        Ok(AddSceneResponse {
            scene_id: scene.id,
            order: scene.order,
            duration: scene.duration,
            total_scenes: project.scenes.len(),
            total_duration: project.actual_duration,
            target_duration: project.target_duration,
            duration_warning,
        })
    }

    /// Snapshot a project.
    pub fn get_project(&self, project_id: &str) -> AgentResult<VideoProject> {
        self.projects()
            .get(&ProjectId::from_string(project_id))
            .map_err(IntoAgentError::into_agent_error)
    }

    /// The current project, if any.
    pub fn current_project(&self) -> Option<VideoProject> {
        self.projects().current()
    }

    /// Summaries of all projects, newest first.
    pub fn list_projects(&self) -> Vec<ProjectSummary> {
        self.projects()
            .list()
            .iter()
            .map(ProjectSummary::from)
            .collect()
    }

    /// Update a project's status.
    pub fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> AgentResult<ProjectSummary> {
        let project = self
            .projects()
            .update(
                &ProjectId::from_string(project_id),
                ProjectUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .map_err(IntoAgentError::into_agent_error)?;
        Ok(ProjectSummary::from(&project))
    }

    /// Drop all projects.
    pub fn clear_all_projects(&self) -> usize {
        self.projects().clear_all()
    }
}
