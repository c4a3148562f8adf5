//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

/// Which assembly pass an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyPass {
    Concat,
    AudioMix,
    LogoOverlay,
    Export,
}

impl AssemblyPass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyPass::Concat => "concat",
            AssemblyPass::AudioMix => "audio_mix",
            AssemblyPass::LogoOverlay => "logo_overlay",
            AssemblyPass::Export => "export",
        }
    }
}

impl std::fmt::Display for AssemblyPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while driving the external media tool.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found (set FFMPEG_PATH or install it on PATH)")]
    ToolMissing,

    #[error("FFprobe not found (set FFPROBE_PATH or install it on PATH)")]
    ProbeMissing,

    #[error("Input missing: {0}")]
    InputMissing(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Probe failed: {message}")]
    ProbeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("{pass} pass failed with code {code:?}")]
    PassFailed {
        pass: AssemblyPass,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Rename failed: {0}")]
    RenameFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    pub fn pass_failed(pass: AssemblyPass, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::PassFailed {
            pass,
            code,
            stderr: stderr.into(),
        }
    }

    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProbeFailed {
            message: message.into(),
            stderr,
        }
    }

    pub fn input_missing(message: impl Into<String>) -> Self {
        Self::InputMissing(message.into())
    }
}
