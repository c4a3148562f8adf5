//! Concat pass: stream-copy scene clips into one video.
//!
//! Every clip after the first loses its initial 0.5 seconds so cuts land
//! mid-motion instead of on duplicated establishing frames. Trims and the
//! final concat are stream copies; nothing is re-encoded.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{AssemblyPass, MediaError, MediaResult};
use crate::probe::probe_video;
use crate::replace::TempRegistry;

/// Seconds trimmed from the head of every clip after the first.
pub const TAIL_TRIM_SECONDS: f64 = 0.5;

/// Concatenate `inputs` into `output`.
///
/// Returns the total duration removed by tail trims. A failed trim falls
/// back to the untrimmed clip.
pub async fn concat_clips(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output: &Path,
    temp_dir: &Path,
    temps: &mut TempRegistry,
) -> MediaResult<f64> {
    if inputs.is_empty() {
        return Err(MediaError::input_missing("no clips to concatenate"));
    }

    let has_audio = match probe_video(&inputs[0]).await {
        Ok(info) => info.has_audio,
        Err(e) => {
            warn!("probe of first clip failed, assuming no audio: {e}");
            false
        }
    };

    if inputs.len() == 1 {
        let mut cmd = FfmpegCommand::new(output)
            .input(&inputs[0])
            .video_codec("copy");
        cmd = if has_audio {
            cmd.audio_codec("copy")
        } else {
            cmd.output_arg("-an")
        };
        runner.run(&cmd.faststart(), AssemblyPass::Concat).await?;
        return Ok(0.0);
    }

    // Trim the head of every clip after the first.
    let mut parts: Vec<PathBuf> = Vec::with_capacity(inputs.len());
    parts.push(inputs[0].clone());
    for (index, input) in inputs.iter().enumerate().skip(1) {
        let trimmed = temps.reserve(temp_dir, "trimmed", "mp4");
        let mut cmd = FfmpegCommand::new(&trimmed)
            .input_with_args(
                ["-ss".to_string(), format!("{TAIL_TRIM_SECONDS}")],
                input,
            )
            .video_codec("copy");
        cmd = if has_audio {
            cmd.audio_codec("copy")
        } else {
            cmd.output_arg("-an")
        };
        cmd = cmd
            .output_arg("-avoid_negative_ts")
            .output_arg("make_zero");

        match runner.run(&cmd, AssemblyPass::Concat).await {
            Ok(()) => parts.push(trimmed),
            Err(e) => {
                warn!(clip = index, "tail trim failed, using original clip: {e}");
                parts.push(input.clone());
            }
        }
    }

    // Concat demuxer needs a list file with escaped absolute paths.
    let list_path = temps.reserve(temp_dir, "concat", "txt");
    let mut list = String::new();
    for part in &parts {
        let absolute = std::fs::canonicalize(part).unwrap_or_else(|_| part.clone());
        let escaped = absolute.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{escaped}'\n"));
    }
    tokio::fs::write(&list_path, list).await?;

    let cmd = FfmpegCommand::new(output)
        .input_with_args(["-f", "concat", "-safe", "0"], &list_path)
        .output_arg("-c")
        .output_arg("copy")
        .faststart();
    runner.run(&cmd, AssemblyPass::Concat).await?;

    let trimmed_seconds = TAIL_TRIM_SECONDS * (inputs.len() - 1) as f64;
    info!(
        clips = inputs.len(),
        trimmed_seconds, "clips concatenated"
    );
    Ok(trimmed_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_amount() {
        assert_eq!(TAIL_TRIM_SECONDS * (3 - 1) as f64, 1.0);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let runner = FfmpegRunner::with_path("/usr/bin/false");
        let dir = tempfile::TempDir::new().unwrap();
        let mut temps = TempRegistry::new();
        let err = concat_clips(
            &runner,
            &[],
            &dir.path().join("out.mp4"),
            dir.path(),
            &mut temps,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::InputMissing(_)));
    }
}
