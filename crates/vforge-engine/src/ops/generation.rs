//! Generation operations: validate, price, and enqueue provider jobs.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{info, warn};

use vforge_fal::registry::{
    KLING_DEFAULT_CFG_SCALE, KLING_DEFAULT_NEGATIVE_PROMPT, KONTEXT_DEFAULT_SAFETY_TOLERANCE,
    KONTEXT_GUIDANCE_SCALE, KONTEXT_SAFETY_TOLERANCES, LYRIA_TYPICAL_DURATION,
};
use vforge_fal::{model_spec, ModelKind, VOICE_OPTIONS};
use vforge_models::{
    image_cost, music_cost, speech_cost, validate_aspect_ratio, validate_duration, validate_enum,
    validate_range, video_cost, AgentError, AgentResult, ProjectId, SceneId,
};
use vforge_queue::{JobId, TaskKind};

use crate::config::is_remote_url;
use crate::error::IntoAgentError;
use crate::Engine;

/// Request for image-to-video generation.
#[derive(Debug, Clone)]
pub struct GenerateVideoRequest {
    /// Image input: a URL or a local file path (uploaded transparently)
    pub image: String,
    pub motion_prompt: String,
    pub duration: u32,
    pub aspect_ratio: String,
    pub model: Option<String>,
    pub negative_prompt: Option<String>,
    pub cfg_scale: Option<f64>,
    pub prompt_optimizer: Option<bool>,
    pub project_id: Option<String>,
    pub scene_id: Option<String>,
}

/// Request for text-to-image or image-edit generation.
#[derive(Debug, Clone)]
pub struct GenerateImageRequest {
    pub prompt: String,
    /// Source image for edits; `None` selects text-to-image
    pub source_image: Option<String>,
    pub aspect_ratio: String,
    pub model: Option<String>,
    pub safety_tolerance: Option<String>,
    pub project_id: Option<String>,
    pub scene_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerateMusicRequest {
    pub prompt: String,
    pub duration: Option<u32>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GenerateSpeechRequest {
    pub text: String,
    pub voice: Option<String>,
    pub speed: Option<f64>,
    pub project_id: Option<String>,
    pub scene_id: Option<String>,
}

/// A job accepted by the queue.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
    pub model: String,
    pub estimated_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_warning: Option<String>,
}

impl Engine {
    /// Resolve an image input: pass URLs through, upload local files.
    pub async fn process_image_input(&self, image: &str) -> AgentResult<String> {
        if is_remote_url(image) {
            return Ok(image.to_string());
        }
        let path = Path::new(image);
        if !path.exists() {
            return Err(AgentError::validation(format!(
                "Image input is neither a URL nor an existing file: {image}"
            ))
            .with_detail("parameter", "image".into())
            .with_detail("provided", image.into())
            .with_suggestion(
                "Use a public https:// URL, or an absolute path to a local image file",
            )
            .with_example("image='/home/user/images/photo.png'"));
        }
        let outcome = self
            .fal()
            .upload(path)
            .await
            .map_err(IntoAgentError::into_agent_error)?;
        if outcome.cached {
            info!(sha256 = %outcome.sha256, "image upload served from cache");
        }
        Ok(outcome.url)
    }

    /// Submit an image-to-video generation job.
    pub async fn generate_video_from_image(
        &self,
        request: GenerateVideoRequest,
    ) -> AgentResult<SubmittedJob> {
        if request.motion_prompt.trim().is_empty() {
            return Err(AgentError::validation("Motion prompt cannot be empty")
                .with_detail("parameter", "motion_prompt".into())
                .with_suggestion("Describe the motion you want to apply to the image")
                .with_example("motion_prompt='Camera slowly zooms in while panning right'"));
        }

        let model_key = request
            .model
            .clone()
            .unwrap_or_else(|| self.settings().default_video_model.clone());
        let spec = model_spec(&model_key)
            .filter(|m| m.kind == ModelKind::ImageToVideo)
            .ok_or_else(|| {
                let models = vforge_fal::registry::video_model_keys();
                AgentError::validation(format!("Invalid video model: {model_key}"))
                    .with_detail("parameter", "model".into())
                    .with_valid_options(Value::from(
                        models.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
                    ))
                    .with_suggestion(format!("Choose one of: {}", models.join(", ")))
                    .with_example(format!("model='{}'", models[0]))
            })?;

        let duration = validate_duration(request.duration, spec.valid_durations)?;
        validate_aspect_ratio(&request.aspect_ratio)?;
        if let Some(cfg) = request.cfg_scale {
            validate_range(cfg, "cfg_scale", 0.0, 1.0, "CFG scale")?;
        }

        let image_url = self.process_image_input(&request.image).await?;

        let mut arguments = json!({
            "prompt": request.motion_prompt,
            "image_url": image_url,
            "duration": duration.to_string(),
        });
        match model_key.as_str() {
            "kling_2.1" => {
                arguments["aspect_ratio"] = json!(request.aspect_ratio);
                arguments["negative_prompt"] = json!(request
                    .negative_prompt
                    .as_deref()
                    .unwrap_or(KLING_DEFAULT_NEGATIVE_PROMPT));
                arguments["cfg_scale"] = json!(request.cfg_scale.unwrap_or(KLING_DEFAULT_CFG_SCALE));
            }
            _ => {
                arguments["prompt_optimizer"] = json!(request.prompt_optimizer.unwrap_or(true));
            }
        }

        let cost = video_cost(&model_key, duration).unwrap_or(0.0);
        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(cost));
        metadata.insert("model".to_string(), json!(model_key));
        metadata.insert("source_image".to_string(), json!(image_url));
        metadata.insert("motion_prompt".to_string(), json!(request.motion_prompt));
        metadata.insert("duration".to_string(), json!(duration));
        metadata.insert("aspect_ratio".to_string(), json!(request.aspect_ratio));

        self.submit_job(
            TaskKind::Video,
            spec.endpoint,
            &model_key,
            arguments,
            metadata,
            cost,
            request.project_id,
            request.scene_id,
        )
        .await
    }

    /// Submit a text-to-image or image-edit job.
    pub async fn generate_image(&self, request: GenerateImageRequest) -> AgentResult<SubmittedJob> {
        if request.prompt.trim().is_empty() {
            return Err(AgentError::validation("Prompt cannot be empty")
                .with_detail("parameter", "prompt".into())
                .with_suggestion("Describe the image you want")
                .with_example("prompt='A lighthouse at dawn, cinematic lighting'"));
        }
        validate_aspect_ratio(&request.aspect_ratio)?;

        let (model_key, arguments) = match &request.source_image {
            Some(source) => {
                let tolerance = request
                    .safety_tolerance
                    .clone()
                    .unwrap_or_else(|| KONTEXT_DEFAULT_SAFETY_TOLERANCE.to_string());
                validate_enum(
                    &tolerance,
                    "safety_tolerance",
                    KONTEXT_SAFETY_TOLERANCES,
                    "safety tolerance",
                )?;
                let image_url = self.process_image_input(source).await?;
                (
                    "flux_kontext".to_string(),
                    json!({
                        "prompt": request.prompt,
                        "image_url": image_url,
                        "guidance_scale": KONTEXT_GUIDANCE_SCALE,
                        "safety_tolerance": tolerance,
                    }),
                )
            }
            None => {
                let model_key = request
                    .model
                    .clone()
                    .unwrap_or_else(|| self.settings().default_image_model.clone());
                if model_spec(&model_key)
                    .filter(|m| m.kind == ModelKind::TextToImage)
                    .is_none()
                {
                    return Err(AgentError::validation(format!(
                        "Invalid image model: {model_key}"
                    ))
                    .with_detail("parameter", "model".into())
                    .with_valid_options(json!(["imagen4", "flux_pro"]))
                    .with_suggestion("Choose one of: imagen4, flux_pro")
                    .with_example("model='imagen4'"));
                }
                (
                    model_key,
                    json!({
                        "prompt": request.prompt,
                        "aspect_ratio": request.aspect_ratio,
                        "num_images": 1,
                    }),
                )
            }
        };

        let spec = model_spec(&model_key).ok_or_else(|| {
            AgentError::validation(format!("Unknown model: {model_key}"))
        })?;
        let cost = image_cost(&model_key, 1).unwrap_or(0.0);

        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(cost));
        metadata.insert("model".to_string(), json!(model_key));
        metadata.insert("prompt".to_string(), json!(request.prompt));
        metadata.insert("aspect_ratio".to_string(), json!(request.aspect_ratio));
        if let Some(source) = &request.source_image {
            metadata.insert("source_image".to_string(), json!(source));
        }

        self.submit_job(
            TaskKind::Image,
            spec.endpoint,
            &model_key,
            arguments,
            metadata,
            cost,
            request.project_id,
            request.scene_id,
        )
        .await
    }

    /// Submit a music generation job. The track joins the project's global
    /// audio tracks on completion.
    pub async fn generate_music(&self, request: GenerateMusicRequest) -> AgentResult<SubmittedJob> {
        if request.prompt.trim().is_empty() {
            return Err(AgentError::validation("Music prompt cannot be empty")
                .with_detail("parameter", "prompt".into())
                .with_suggestion("Describe the mood and instrumentation")
                .with_example("prompt='uplifting ambient electronic, steady pulse'"));
        }
        let duration = request.duration.unwrap_or(LYRIA_TYPICAL_DURATION);
        let spec = model_spec("lyria2").ok_or_else(|| {
            AgentError::system("music model missing from registry")
        })?;
        let cost = music_cost(duration);

        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(cost));
        metadata.insert("model".to_string(), json!("lyria2"));
        metadata.insert("prompt".to_string(), json!(request.prompt));
        metadata.insert("duration".to_string(), json!(duration));
        metadata.insert("track_type".to_string(), json!("music"));

        self.submit_job(
            TaskKind::Music,
            spec.endpoint,
            "lyria2",
            json!({"prompt": request.prompt}),
            metadata,
            cost,
            request.project_id,
            None,
        )
        .await
    }

    /// Submit a speech synthesis job.
    pub async fn generate_speech(
        &self,
        request: GenerateSpeechRequest,
    ) -> AgentResult<SubmittedJob> {
        if request.text.trim().is_empty() {
            return Err(AgentError::validation("Speech text cannot be empty")
                .with_detail("parameter", "text".into())
                .with_suggestion("Provide the narration text to synthesize")
                .with_example("text='Welcome to our product tour.'"));
        }
        let voice = request.voice.unwrap_or_else(|| "Wise_Woman".to_string());
        let voices: Vec<&str> = VOICE_OPTIONS.iter().map(|(name, _)| *name).collect();
        validate_enum(&voice, "voice", &voices, "voice")?;
        let speed = request.speed.unwrap_or(1.0);
        validate_range(speed, "speed", 0.5, 2.0, "Speech speed")?;

        let spec = model_spec("minimax_speech").ok_or_else(|| {
            AgentError::system("speech model missing from registry")
        })?;
        let cost = speech_cost(&request.text);

        let mut metadata = Map::new();
        metadata.insert("cost".to_string(), json!(cost));
        metadata.insert("model".to_string(), json!("minimax_speech"));
        metadata.insert("text".to_string(), json!(request.text));
        metadata.insert("voice".to_string(), json!(voice));
        metadata.insert("track_type".to_string(), json!("voiceover"));

        self.submit_job(
            TaskKind::Speech,
            spec.endpoint,
            "minimax_speech",
            json!({
                "text": request.text,
                "voice_setting": {"voice_id": voice, "speed": speed},
            }),
            metadata,
            cost,
            request.project_id,
            request.scene_id,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_job(
        &self,
        task_kind: TaskKind,
        endpoint: &str,
        model_key: &str,
        arguments: Value,
        metadata: Map<String, Value>,
        cost: f64,
        project_id: Option<String>,
        scene_id: Option<String>,
    ) -> AgentResult<SubmittedJob> {
        // Associations must point at live records; a dangling scene would
        // silently drop the result in the completion hook.
        let project_id = match project_id {
            Some(id) => {
                let pid = ProjectId::from_string(id);
                let project = self
                    .projects()
                    .get(&pid)
                    .map_err(IntoAgentError::into_agent_error)?;
                if let Some(scene) = &scene_id {
                    if !project.scenes.iter().any(|s| s.id.as_str() == scene.as_str()) {
                        return Err(AgentError::resource_not_found(format!(
                            "Scene not found: {scene}"
                        ))
                        .with_detail("scene_id", scene.as_str().into())
                        .with_suggestion("Use add_scene() to create a scene first")
                        .with_example("add_scene(project_id='...', description='...', duration=5)"));
                    }
                }
                Some(pid)
            }
            None => None,
        };
        let scene_id = scene_id.map(SceneId::from_string);

        let cost_warning = (cost > self.settings().cost_warning_threshold).then(|| {
            let warning = format!(
                "Estimated cost ${cost:.3} exceeds the warning threshold ${:.2}",
                self.settings().cost_warning_threshold
            );
            warn!(model = model_key, cost, "{warning}");
            warning
        });

        let job_id = self
            .queue()
            .submit(task_kind, endpoint, arguments, project_id, scene_id, metadata)
            .await;

        info!(job_id = %job_id, model = model_key, cost, "generation queued");
        Ok(SubmittedJob {
            job_id,
            model: model_key.to_string(),
            estimated_cost: cost,
            cost_warning,
        })
    }
}
