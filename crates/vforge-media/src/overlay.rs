//! Logo overlay pass.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{AssemblyPass, MediaResult};

/// File name of the logo artwork.
pub const LOGO_FILE_NAME: &str = "h2a.png";

/// Corner the logo is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl LogoPosition {
    /// Parse the wire form ("bottom_right", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bottom_right" => Some(Self::BottomRight),
            "bottom_left" => Some(Self::BottomLeft),
            "top_right" => Some(Self::TopRight),
            "top_left" => Some(Self::TopLeft),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottom_right",
            Self::BottomLeft => "bottom_left",
            Self::TopRight => "top_right",
            Self::TopLeft => "top_left",
        }
    }

    /// Overlay coordinates for this corner with the given padding.
    pub fn overlay_expr(&self, padding: u32) -> String {
        match self {
            Self::BottomRight => format!("W-w-{padding}:H-h-{padding}"),
            Self::BottomLeft => format!("{padding}:H-h-{padding}"),
            Self::TopRight => format!("W-w-{padding}:{padding}"),
            Self::TopLeft => format!("{padding}:{padding}"),
        }
    }

    /// All recognized wire forms.
    pub fn names() -> &'static [&'static str] {
        &["bottom_right", "bottom_left", "top_right", "top_left"]
    }
}

/// Search the candidate locations for the logo artwork:
/// the logos directory, then the base directory, then the working dir.
pub fn find_logo(logos_dir: &Path, base_dir: &Path) -> Option<PathBuf> {
    let candidates = [
        logos_dir.join(LOGO_FILE_NAME),
        base_dir.join(LOGO_FILE_NAME),
        PathBuf::from(LOGO_FILE_NAME),
    ];
    for candidate in candidates {
        if candidate.exists() {
            debug!(path = %candidate.display(), "found logo");
            return Some(candidate);
        }
    }
    warn!("logo file {LOGO_FILE_NAME} not found in any candidate location");
    None
}

/// Overlay `logo` onto `video`, writing to `output`.
///
/// The overlay forces a video re-encode; audio is stream-copied.
pub async fn overlay_logo(
    runner: &FfmpegRunner,
    video: &Path,
    logo: &Path,
    output: &Path,
    position: LogoPosition,
    padding: u32,
) -> MediaResult<()> {
    let filter = format!("[0:v][1:v]overlay={}:format=auto", position.overlay_expr(padding));

    let cmd = FfmpegCommand::new(output)
        .input(video)
        .input(logo)
        .filter_complex(filter)
        .video_codec("libx264")
        .output_args(["-preset", "medium", "-crf", "18"])
        .audio_codec("copy")
        .faststart();

    runner.run(&cmd, AssemblyPass::LogoOverlay).await?;
    info!(position = position.as_str(), padding, "logo overlay applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_overlay_expressions() {
        assert_eq!(LogoPosition::BottomRight.overlay_expr(10), "W-w-10:H-h-10");
        assert_eq!(LogoPosition::BottomLeft.overlay_expr(10), "10:H-h-10");
        assert_eq!(LogoPosition::TopRight.overlay_expr(20), "W-w-20:20");
        assert_eq!(LogoPosition::TopLeft.overlay_expr(0), "0:0");
    }

    #[test]
    fn test_position_parsing() {
        assert_eq!(
            LogoPosition::parse("bottom_right"),
            Some(LogoPosition::BottomRight)
        );
        assert_eq!(LogoPosition::parse("center"), None);
        for name in LogoPosition::names() {
            assert!(LogoPosition::parse(name).is_some());
        }
    }

    #[test]
    fn test_find_logo_prefers_logos_dir() {
        let logos = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        std::fs::write(logos.path().join(LOGO_FILE_NAME), b"png").unwrap();
        std::fs::write(base.path().join(LOGO_FILE_NAME), b"png").unwrap();

        let found = find_logo(logos.path(), base.path()).unwrap();
        assert_eq!(found, logos.path().join(LOGO_FILE_NAME));
    }

    #[test]
    fn test_find_logo_falls_back_to_base() {
        let logos = TempDir::new().unwrap();
        let base = TempDir::new().unwrap();
        std::fs::write(base.path().join(LOGO_FILE_NAME), b"png").unwrap();

        let found = find_logo(logos.path(), base.path()).unwrap();
        assert_eq!(found, base.path().join(LOGO_FILE_NAME));
    }
}
