//! Audio mix pass.
//!
//! Mixes the project's global audio tracks into the assembled video in a
//! single invocation: per-track volume filters feed one `amix` with unit
//! weights and `dropout_transition=0`, so a track ending early does not
//! re-normalize the gain of the rest. Video is stream-copied; audio is
//! re-encoded to AAC at 192 kbps.

use std::path::Path;
use tracing::{debug, info};

use vforge_models::{Asset, AssetKind};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{AssemblyPass, MediaError, MediaResult};

/// Volume defaults by track type.
pub const VOLUME_SPEECH: f64 = 1.0;
pub const VOLUME_MUSIC: f64 = 0.3;
pub const VOLUME_SFX: f64 = 0.7;
pub const VOLUME_BACKGROUND: f64 = 0.3;

/// One audio input for the mix pass.
#[derive(Debug, Clone)]
pub struct AudioTrackInput {
    pub path: std::path::PathBuf,
    pub volume: f64,
}

impl AudioTrackInput {
    /// Build the mix input for a global audio track asset.
    ///
    /// Returns `None` when the asset has no local copy. Volume resolves
    /// from an explicit metadata override (clamped to [0, 2]), then the
    /// metadata track type, then the asset kind.
    pub fn from_asset(asset: &Asset) -> Option<Self> {
        let path = asset.local_path.clone()?;
        Some(Self {
            path,
            volume: track_volume(asset),
        })
    }
}

fn track_volume(asset: &Asset) -> f64 {
    if let Some(volume) = asset.metadata.get("volume").and_then(|v| v.as_f64()) {
        return volume.clamp(0.0, 2.0);
    }
    if let Some(track_type) = asset.metadata.get("track_type").and_then(|v| v.as_str()) {
        return match track_type {
            "voiceover" | "speech" => VOLUME_SPEECH,
            "music" => VOLUME_MUSIC,
            "sfx" | "sound_effects" => VOLUME_SFX,
            "background" => VOLUME_BACKGROUND,
            _ => VOLUME_MUSIC,
        };
    }
    match asset.kind {
        AssetKind::Speech => VOLUME_SPEECH,
        AssetKind::Audio => VOLUME_SFX,
        _ => VOLUME_MUSIC,
    }
}

/// Build the mix filter graph and the stream to map as audio.
///
/// Returns `(filter_complex, audio_map)`; the filter is `None` for the
/// degenerate case of one unit-volume track over a silent video.
fn build_mix_filter(
    tracks: &[AudioTrackInput],
    include_embedded: bool,
) -> (Option<String>, String) {
    let mut chains: Vec<String> = Vec::new();
    let mut mix_inputs: Vec<String> = Vec::new();

    if include_embedded {
        mix_inputs.push("[0:a]".to_string());
    }
    for (i, track) in tracks.iter().enumerate() {
        let stream = i + 1; // input 0 is the video
        if (track.volume - 1.0).abs() > f64::EPSILON {
            chains.push(format!("[{stream}:a]volume={:.2}[a{i}]", track.volume));
            mix_inputs.push(format!("[a{i}]"));
        } else {
            mix_inputs.push(format!("[{stream}:a]"));
        }
    }

    if mix_inputs.len() == 1 && chains.is_empty() {
        let map = mix_inputs[0].trim_matches(['[', ']']).to_string();
        return (None, map);
    }

    let total = mix_inputs.len();
    let weights = vec!["1"; total].join(" ");
    chains.push(format!(
        "{}amix=inputs={total}:duration=longest:dropout_transition=0:weights='{weights}'[aout]",
        mix_inputs.concat()
    ));
    (Some(chains.join(";")), "[aout]".to_string())
}

/// Mix `tracks` into `video` and write the result to `output`.
pub async fn mix_audio_tracks(
    runner: &FfmpegRunner,
    video: &Path,
    video_has_audio: bool,
    tracks: &[AudioTrackInput],
    output: &Path,
) -> MediaResult<()> {
    if tracks.is_empty() {
        return Err(MediaError::input_missing("no audio tracks to mix"));
    }
    for track in tracks {
        if !track.path.exists() {
            return Err(MediaError::FileNotFound(track.path.clone()));
        }
    }

    let mut cmd = FfmpegCommand::new(output).input(video);
    for track in tracks {
        cmd = cmd.input(&track.path);
    }

    let (filter, audio_map) = build_mix_filter(tracks, video_has_audio);
    if let Some(filter) = filter {
        cmd = cmd.filter_complex(filter);
    }

    debug!(tracks = tracks.len(), video_has_audio, "mixing audio tracks");
    cmd = cmd
        .map("0:v")
        .map(audio_map)
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate("192k");

    runner.run(&cmd, AssemblyPass::AudioMix).await?;
    info!(tracks = tracks.len(), "audio tracks mixed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_volume_defaults_by_kind() {
        let speech = Asset::generated(AssetKind::Speech, "https://x/s.mp3");
        let music = Asset::generated(AssetKind::Music, "https://x/m.mp3");
        assert_eq!(track_volume(&speech), 1.0);
        assert_eq!(track_volume(&music), 0.3);
    }

    #[test]
    fn test_volume_override_clamped() {
        let loud = Asset::generated(AssetKind::Music, "https://x/m.mp3")
            .with_meta("volume", json!(5.0));
        assert_eq!(track_volume(&loud), 2.0);

        let custom = Asset::generated(AssetKind::Music, "https://x/m.mp3")
            .with_meta("volume", json!(0.8));
        assert_eq!(track_volume(&custom), 0.8);
    }

    #[test]
    fn test_volume_by_track_type() {
        let sfx = Asset::generated(AssetKind::Audio, "https://x/fx.mp3")
            .with_meta("track_type", json!("sfx"));
        assert_eq!(track_volume(&sfx), 0.7);

        let background = Asset::generated(AssetKind::Audio, "https://x/bg.mp3")
            .with_meta("track_type", json!("background"));
        assert_eq!(track_volume(&background), 0.3);
    }

    #[test]
    fn test_from_asset_requires_local_path() {
        let remote = Asset::generated(AssetKind::Music, "https://x/m.mp3");
        assert!(AudioTrackInput::from_asset(&remote).is_none());

        let mut local = Asset::generated(AssetKind::Music, "https://x/m.mp3");
        local.local_path = Some("/tmp/m.mp3".into());
        let input = AudioTrackInput::from_asset(&local).unwrap();
        assert_eq!(input.volume, 0.3);
    }

    fn track(volume: f64) -> AudioTrackInput {
        AudioTrackInput {
            path: "/tmp/a.mp3".into(),
            volume,
        }
    }

    #[test]
    fn test_mix_filter_shape() {
        // Speech at 1.0 and music at 0.3 over embedded audio.
        let (filter, output) = build_mix_filter(&[track(1.0), track(0.3)], true);
        let filter = filter.unwrap();
        assert!(filter.contains("[2:a]volume=0.30[a1]"));
        assert!(filter.contains("amix=inputs=3"));
        assert!(filter.contains("dropout_transition=0"));
        assert!(filter.contains("weights='1 1 1'"));
        assert_eq!(output, "[aout]");
    }

    #[test]
    fn test_single_unit_track_maps_directly() {
        let (filter, output) = build_mix_filter(&[track(1.0)], false);
        assert!(filter.is_none());
        assert_eq!(output, "1:a");
    }

    #[test]
    fn test_two_tracks_without_embedded_audio() {
        let (filter, _) = build_mix_filter(&[track(0.3), track(0.7)], false);
        let filter = filter.unwrap();
        assert!(filter.contains("amix=inputs=2"));
        assert!(!filter.contains("[0:a]"));
    }
}
