//! Platform export pass.

use std::path::Path;
use tracing::info;

use vforge_models::platform_spec;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{AssemblyPass, MediaError, MediaResult};
use crate::probe::probe_video;

/// Re-mux `input` for a target platform: stream-copied video, AAC audio
/// at the platform's recommended bitrate, and the platform's upload size
/// cap when one applies.
pub async fn export_for_platform(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    platform: &str,
) -> MediaResult<crate::probe::VideoInfo> {
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    let spec = platform_spec(platform);

    let mut cmd = FfmpegCommand::new(output)
        .input(input)
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate(spec.recommendations.audio_bitrate)
        .faststart();

    if spec.max_file_size > 0 {
        cmd = cmd
            .output_arg("-fs")
            .output_arg(spec.max_file_size.to_string());
    }

    runner.run(&cmd, AssemblyPass::Export).await?;

    let info = probe_video(output).await?;
    info!(
        platform = spec.key,
        path = %output.display(),
        size = info.size,
        "platform export written"
    );
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_export_missing_input() {
        let runner = FfmpegRunner::with_path("/usr/bin/false");
        let err = export_for_platform(
            &runner,
            Path::new("/nope/in.mp4"),
            Path::new("/nope/out.mp4"),
            "tiktok",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
