//! Assembly pipeline: concat, audio mix, logo overlay.
//!
//! A deterministic multi-pass plan over the external media tool. Every
//! pass that rewrites the output goes through write-temp + atomic swap,
//! and all temp paths live in a pipeline-scoped registry that cleans up
//! on every exit path.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use vforge_models::{SceneId, VideoProject};

use crate::command::FfmpegRunner;
use crate::concat::concat_clips;
use crate::error::{MediaError, MediaResult};
use crate::mix::{mix_audio_tracks, AudioTrackInput};
use crate::overlay::{find_logo, overlay_logo, LogoPosition};
use crate::probe::probe_video;
use crate::replace::{replace_file, sweep_stale_temps, TempRegistry};

/// File name of the optional end clip.
pub const END_CLIP_FILE_NAME: &str = "h2a_end.mp4";

/// Flags controlling an assembly run.
#[derive(Debug, Clone)]
pub struct AssemblyOptions {
    pub output_format: String,
    pub add_logo: bool,
    pub logo_position: LogoPosition,
    pub logo_padding: u32,
    pub add_end_clip: bool,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            output_format: "mp4".to_string(),
            add_logo: false,
            logo_position: LogoPosition::BottomRight,
            logo_padding: 10,
            add_end_clip: false,
        }
    }
}

/// Result of an assembly run.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyOutput {
    pub output_path: PathBuf,
    pub format: String,
    pub duration: f64,
    pub size_bytes: u64,
    pub scenes_count: usize,
    pub trimmed_seconds: f64,
    pub audio_tracks_mixed: usize,
    pub logo_added: bool,
    pub end_clip_added: bool,
    /// True when a previous run already produced the mixed output
    pub already_assembled: bool,
}

/// Plans and executes the assembly passes for a project.
pub struct AssemblyPipeline {
    runner: FfmpegRunner,
    temp_dir: PathBuf,
    logos_dir: PathBuf,
    base_dir: PathBuf,
}

impl AssemblyPipeline {
    /// Create a pipeline, discovering the external tool.
    pub fn new(
        temp_dir: impl Into<PathBuf>,
        logos_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> MediaResult<Self> {
        Ok(Self {
            runner: FfmpegRunner::new()?,
            temp_dir: temp_dir.into(),
            logos_dir: logos_dir.into(),
            base_dir: base_dir.into(),
        })
    }

    /// Create a pipeline around an existing runner.
    pub fn with_runner(
        runner: FfmpegRunner,
        temp_dir: impl Into<PathBuf>,
        logos_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            temp_dir: temp_dir.into(),
            logos_dir: logos_dir.into(),
            base_dir: base_dir.into(),
        }
    }

    /// The runner driving this pipeline's tool invocations.
    pub fn runner(&self) -> &FfmpegRunner {
        &self.runner
    }

    /// Assemble the selected scenes of `project` into
    /// `<project_dir>/<title>_<platform>.<format>`.
    ///
    /// Concurrent assembly for the same project is not supported; callers
    /// serialize.
    pub async fn assemble(
        &self,
        project: &VideoProject,
        scene_ids: Option<&[SceneId]>,
        options: &AssemblyOptions,
        project_dir: &Path,
    ) -> MediaResult<AssemblyOutput> {
        let output_path =
            project_dir.join(format!("{}.{}", project.output_stem(), options.output_format));

        // Idempotence short-circuit: a previous run already mixed audio in.
        if output_path.exists() {
            if let Ok(info) = probe_video(&output_path).await {
                if info.has_audio {
                    info!(path = %output_path.display(), "output already assembled with audio");
                    return Ok(AssemblyOutput {
                        output_path,
                        format: options.output_format.clone(),
                        duration: info.duration,
                        size_bytes: info.size,
                        scenes_count: 0,
                        trimmed_seconds: 0.0,
                        audio_tracks_mixed: 0,
                        logo_added: false,
                        end_clip_added: false,
                        already_assembled: true,
                    });
                }
            }
        }

        let scenes = select_scenes(project, scene_ids)?;
        if scenes.is_empty() {
            return Err(MediaError::input_missing("no scenes to assemble"));
        }

        // Every selected scene must own a downloaded video clip.
        let mut clips: Vec<PathBuf> = Vec::with_capacity(scenes.len());
        let mut missing: Vec<String> = Vec::new();
        for scene in &scenes {
            match scene.video_asset().and_then(|a| a.local_path.clone()) {
                Some(path) if path.exists() => clips.push(path),
                _ => missing.push(format!(
                    "scene {} ({})",
                    scene.order + 1,
                    truncate_description(&scene.description)
                )),
            }
        }
        if !missing.is_empty() {
            return Err(MediaError::input_missing(format!(
                "scenes missing video assets: {}",
                missing.join(", ")
            )));
        }

        let mut end_clip_added = false;
        if options.add_end_clip {
            let end_clip = self.logos_dir.join(END_CLIP_FILE_NAME);
            if end_clip.exists() {
                match probe_video(&end_clip).await {
                    Ok(info) => {
                        info!(
                            duration = info.duration,
                            width = info.width,
                            height = info.height,
                            "appending end clip"
                        );
                        clips.push(end_clip);
                        end_clip_added = true;
                    }
                    Err(e) => warn!("end clip unreadable, continuing without it: {e}"),
                }
            } else {
                warn!(path = %end_clip.display(), "end clip not found, continuing without it");
            }
        }

        tokio::fs::create_dir_all(project_dir).await?;
        let mut temps = TempRegistry::new();

        // Pass 1: concat.
        let trimmed_seconds = concat_clips(
            &self.runner,
            &clips,
            &output_path,
            &self.temp_dir,
            &mut temps,
        )
        .await?;

        // Pass 2: mix global audio tracks.
        let tracks: Vec<AudioTrackInput> = project
            .global_audio_tracks
            .iter()
            .filter_map(|asset| {
                let input = AudioTrackInput::from_asset(asset);
                if input.is_none() {
                    warn!(asset_id = %asset.id, "audio track has no local copy, skipped");
                }
                input
            })
            .collect();

        if !tracks.is_empty() {
            let concat_info = probe_video(&output_path).await?;
            let mixed = temps.reserve(project_dir, "audio", &options.output_format);
            mix_audio_tracks(
                &self.runner,
                &output_path,
                concat_info.has_audio,
                &tracks,
                &mixed,
            )
            .await?;
            replace_file(&output_path, &mixed).await?;
            temps.release(&mixed);
        }

        // Pass 3: logo overlay.
        let mut logo_added = false;
        if options.add_logo {
            match find_logo(&self.logos_dir, &self.base_dir) {
                Some(logo) => {
                    let overlaid = temps.reserve(project_dir, "logo", &options.output_format);
                    overlay_logo(
                        &self.runner,
                        &output_path,
                        &logo,
                        &overlaid,
                        options.logo_position,
                        options.logo_padding,
                    )
                    .await?;
                    replace_file(&output_path, &overlaid).await?;
                    temps.release(&overlaid);
                    logo_added = true;
                }
                None => warn!("logo requested but not found, continuing without it"),
            }
        }

        temps.cleanup();
        sweep_stale_temps(project_dir).await;

        let info = probe_video(&output_path).await?;
        info!(
            path = %output_path.display(),
            duration = info.duration,
            "assembly complete"
        );

        Ok(AssemblyOutput {
            output_path,
            format: options.output_format.clone(),
            duration: info.duration,
            size_bytes: info.size,
            scenes_count: scenes.len(),
            trimmed_seconds,
            audio_tracks_mixed: tracks.len(),
            logo_added,
            end_clip_added,
            already_assembled: false,
        })
    }
}

/// Resolve the scene selection: the given ids in their given order, or
/// every scene in timeline order.
fn select_scenes<'a>(
    project: &'a VideoProject,
    scene_ids: Option<&[SceneId]>,
) -> MediaResult<Vec<&'a vforge_models::Scene>> {
    match scene_ids {
        Some(ids) => ids
            .iter()
            .map(|id| {
                project
                    .scenes
                    .iter()
                    .find(|s| &s.id == id)
                    .ok_or_else(|| MediaError::input_missing(format!("unknown scene id: {id}")))
            })
            .collect(),
        None => {
            let mut scenes: Vec<&vforge_models::Scene> = project.scenes.iter().collect();
            scenes.sort_by_key(|s| s.order);
            Ok(scenes)
        }
    }
}

fn truncate_description(description: &str) -> String {
    let mut short: String = description.chars().take(30).collect();
    if description.chars().count() > 30 {
        short.push_str("...");
    }
    short
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vforge_models::{Asset, AssetKind, Scene};

    fn project_with_scenes(n: usize) -> VideoProject {
        let mut project = VideoProject::new("Demo", "tiktok");
        for i in 0..n {
            let mut scene = Scene::new(format!("scene {i}"), 10);
            scene.order = i;
            project.scenes.push(scene);
        }
        project
    }

    #[test]
    fn test_select_all_scenes_in_timeline_order() {
        let mut project = project_with_scenes(3);
        project.scenes.reverse(); // stored out of order
        let scenes = select_scenes(&project, None).unwrap();
        let orders: Vec<usize> = scenes.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_select_subset_keeps_caller_order() {
        let project = project_with_scenes(3);
        let ids = [project.scenes[2].id.clone(), project.scenes[0].id.clone()];
        let scenes = select_scenes(&project, Some(&ids)).unwrap();
        let orders: Vec<usize> = scenes.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![2, 0]);
    }

    #[test]
    fn test_select_unknown_scene() {
        let project = project_with_scenes(1);
        let err = select_scenes(&project, Some(&[SceneId::from_string("nope")])).unwrap_err();
        assert!(matches!(err, MediaError::InputMissing(_)));
    }

    #[tokio::test]
    async fn test_assemble_rejects_scenes_without_clips() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut project = project_with_scenes(2);
        // Only the first scene gets a (fake) downloaded clip.
        let clip = dir.path().join("clip0.mp4");
        tokio::fs::write(&clip, b"mp4").await.unwrap();
        let mut asset = Asset::generated(AssetKind::Video, "https://cdn/v.mp4")
            .with_meta("duration", json!(10));
        asset.local_path = Some(clip);
        project.scenes[0].assets.push(asset);

        let pipeline = AssemblyPipeline::with_runner(
            FfmpegRunner::with_path("/usr/bin/false"),
            dir.path().join("temp"),
            dir.path().join("logos"),
            dir.path(),
        );
        let err = pipeline
            .assemble(&project, None, &AssemblyOptions::default(), dir.path())
            .await
            .unwrap_err();
        match err {
            MediaError::InputMissing(msg) => {
                assert!(msg.contains("scene 2"));
                assert!(!msg.contains("scene 1,"));
            }
            other => panic!("expected InputMissing, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_assemble_empty_project() {
        let dir = tempfile::TempDir::new().unwrap();
        let project = project_with_scenes(0);
        let pipeline = AssemblyPipeline::with_runner(
            FfmpegRunner::with_path("/usr/bin/false"),
            dir.path().join("temp"),
            dir.path().join("logos"),
            dir.path(),
        );
        let err = pipeline
            .assemble(&project, None, &AssemblyOptions::default(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InputMissing(_)));
    }
}
