//! Startup self-check: environment, storage tree, external tools.

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vforge_engine::{Engine, Settings};
use vforge_media::{discover_ffmpeg, discover_ffprobe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vforge=info,forge_selfcheck=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    info!(storage = %settings.storage_dir.display(), "resolved settings");

    let ffmpeg = discover_ffmpeg()?;
    let ffprobe = discover_ffprobe()?;
    info!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "media tools found");

    let engine = Engine::new(settings)?;
    let stats = engine.queue_stats().await;
    info!(tracked_jobs = stats.total, "queue ready");

    println!("forge-selfcheck: ok");
    Ok(())
}
