//! End-to-end lifecycle tests against a mock provider and mock media tools.
//!
//! Environment variables are process-global, so everything runs inside a
//! single test body.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Map};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vforge_engine::{Engine, Settings};
use vforge_models::AgentErrorKind;
use vforge_queue::{JobStatus, TaskKind};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let script = dir.join(name);
    std::fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

const PROBE_JSON_WITH_AUDIO: &str = r#"{"format": {"duration": "29.0", "size": "1000", "bit_rate": "800000"}, "streams": [{"codec_type": "video", "codec_name": "h264", "width": 1080, "height": 1920, "r_frame_rate": "30/1"}, {"codec_type": "audio", "codec_name": "aac"}]}"#;

async fn mount_completed_video(server: &MockServer, model_path: &str, request_id: &str, clip_url: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/{model_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": request_id})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{model_path}/requests/{request_id}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "IN_PROGRESS",
            "logs": [{"message": "rendering", "progress": 50.0}]
        })))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{model_path}/requests/{request_id}/status")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{model_path}/requests/{request_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "video": {"url": clip_url}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_generation_lifecycle() {
    let provider = MockServer::start().await;
    let root = TempDir::new().unwrap();
    let tools = root.path().join("tools");
    std::fs::create_dir_all(&tools).unwrap();

    // Mock media tools: ffprobe reports a finished 29 s clip with audio;
    // ffmpeg records every invocation so passes can be asserted against.
    let marker = root.path().join("ffmpeg_invoked");
    let ffprobe = write_script(&tools, "ffprobe", &format!("echo '{PROBE_JSON_WITH_AUDIO}'"));
    let ffmpeg = write_script(
        &tools,
        "ffmpeg",
        &format!("touch {}\nexit 0", marker.display()),
    );
    std::env::set_var("FFMPEG_PATH", &ffmpeg);
    std::env::set_var("FFPROBE_PATH", &ffprobe);
    std::env::set_var("FAL_API_URL", provider.uri());

    // Generated clip bytes served from the same mock server.
    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip-bytes".to_vec()))
        .mount(&provider)
        .await;

    let engine = Engine::new(Settings::with_storage_dir(
        "test-key",
        root.path().join("storage"),
        root.path(),
    ))
    .expect("engine");

    // --- S1: happy-path single-scene video ------------------------------

    let created = engine
        .create_project("Demo", "tiktok", None, None, None)
        .unwrap();
    assert_eq!(created.project.aspect_ratio, "9:16");
    assert_eq!(created.project.target_duration, Some(30));
    let project_id = created.project.id.as_str().to_string();

    let scene = engine.add_scene(&project_id, "intro", 5, None).unwrap();
    assert_eq!(scene.order, 0);

    mount_completed_video(
        &provider,
        "fal-ai/kling-video/v2.1/standard/image-to-video",
        "r-happy",
        &format!("{}/clip.mp4", provider.uri()),
    )
    .await;

    let submitted = engine
        .generate_video_from_image(vforge_engine::ops::GenerateVideoRequest {
            image: "https://cdn.example/frame.png".to_string(),
            motion_prompt: "slow zoom".to_string(),
            duration: 5,
            aspect_ratio: "9:16".to_string(),
            model: Some("kling_2.1".to_string()),
            negative_prompt: None,
            cfg_scale: None,
            prompt_optimizer: None,
            project_id: Some(project_id.clone()),
            scene_id: Some(scene.scene_id.as_str().to_string()),
        })
        .await
        .unwrap();
    assert_eq!(submitted.estimated_cost, 0.25);

    let result = engine
        .wait_for_job(submitted.job_id.as_str(), Some(10))
        .await
        .unwrap();
    assert!(result["video"]["url"].as_str().unwrap().ends_with("/clip.mp4"));

    // The hook runs after the job flips to completed; poll for the asset.
    let mut attached = None;
    for _ in 0..100 {
        let project = engine.get_project(&project_id).unwrap();
        if let Some(asset) = project.scenes[0].video_asset() {
            attached = Some((asset.clone(), project.total_cost));
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let (asset, total_cost) = attached.expect("video asset attached to scene");
    assert_eq!(total_cost, 0.25);
    assert_eq!(asset.cost, 0.25);
    let local = asset.local_path.expect("downloaded clip");
    assert!(local.exists());
    assert_eq!(std::fs::read(&local).unwrap(), b"clip-bytes");

    let job = engine
        .get_job_status(submitted.job_id.as_str())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.request_id, "r-happy");
    assert_eq!(job.progress, Some(100.0));
    assert!(!job.logs.is_empty());

    // --- S2: duration rejection per model -------------------------------

    let err = engine
        .generate_video_from_image(vforge_engine::ops::GenerateVideoRequest {
            image: "https://cdn.example/frame.png".to_string(),
            motion_prompt: "slow zoom".to_string(),
            duration: 6,
            aspect_ratio: "9:16".to_string(),
            model: Some("kling_2.1".to_string()),
            negative_prompt: None,
            cfg_scale: None,
            prompt_optimizer: None,
            project_id: None,
            scene_id: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, AgentErrorKind::Validation);
    assert_eq!(err.valid_options, Some(json!([5, 10])));

    mount_completed_video(
        &provider,
        "fal-ai/minimax/hailuo-02/standard/image-to-video",
        "r-hailuo",
        &format!("{}/clip.mp4", provider.uri()),
    )
    .await;
    let accepted = engine
        .generate_video_from_image(vforge_engine::ops::GenerateVideoRequest {
            image: "https://cdn.example/frame.png".to_string(),
            motion_prompt: "slow zoom".to_string(),
            duration: 6,
            aspect_ratio: "9:16".to_string(),
            model: Some("hailuo_02".to_string()),
            negative_prompt: None,
            cfg_scale: None,
            prompt_optimizer: None,
            project_id: None,
            scene_id: None,
        })
        .await;
    assert!(accepted.is_ok());

    // --- S3: cancellation ------------------------------------------------

    Mock::given(method("POST"))
        .and(path("/m/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r-slow"})))
        .mount(&provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/m/slow/requests/r-slow/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "IN_PROGRESS"})))
        .mount(&provider)
        .await;

    let slow_job = engine
        .queue()
        .submit(
            TaskKind::Video,
            "m/slow",
            json!({}),
            None,
            None,
            Map::new(),
        )
        .await;
    for _ in 0..100 {
        if engine.queue().get(&slow_job).await.unwrap().status == JobStatus::InProgress {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let cancelled = engine.cancel_job(slow_job.as_str()).await.unwrap();
    assert!(cancelled.cancelled);
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    let again = engine.cancel_job(slow_job.as_str()).await.unwrap();
    assert!(!again.cancelled);

    // --- S6: completion hook with a missing scene ------------------------

    mount_completed_video(
        &provider,
        "m/ghost-scene",
        "r-ghost",
        &format!("{}/clip.mp4", provider.uri()),
    )
    .await;
    let mut metadata = Map::new();
    metadata.insert("cost".to_string(), json!(0.25));
    let ghost_job = engine
        .queue()
        .submit(
            TaskKind::Video,
            "m/ghost-scene",
            json!({}),
            Some(created.project.id.clone()),
            Some(vforge_models::SceneId::from_string("deleted-scene")),
            metadata,
        )
        .await;

    engine
        .wait_for_job(ghost_job.as_str(), Some(10))
        .await
        .unwrap();
    assert_eq!(
        engine.queue().get(&ghost_job).await.unwrap().status,
        JobStatus::Completed
    );
    // Give the hook time to run, then confirm nothing was attached.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let project = engine.get_project(&project_id).unwrap();
    assert_eq!(project.scenes[0].assets.len(), 1);
    assert!(project.global_audio_tracks.is_empty());

    // --- Assembly short-circuit ------------------------------------------

    // A previous run's output with an audio stream already exists.
    let project_dir = root
        .path()
        .join("storage/projects")
        .join(&project_id);
    std::fs::create_dir_all(&project_dir).unwrap();
    std::fs::write(project_dir.join("Demo_tiktok.mp4"), b"assembled").unwrap();
    assert!(!marker.exists());

    let response = engine
        .assemble_video(&project_id, None, false, None, None, false)
        .await
        .unwrap();
    assert!(response.already_assembled);
    assert!((response.duration - 29.0).abs() < 0.01);
    // No media-tool invocation happened.
    assert!(!marker.exists());

    // The short-circuit did not touch project status.
    let project = engine.get_project(&project_id).unwrap();
    assert_eq!(project.status, created.project.status);
}
