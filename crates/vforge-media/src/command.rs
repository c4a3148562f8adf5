//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{AssemblyPass, MediaError, MediaResult};

/// Resolve the ffmpeg executable: env override, then PATH, then the
/// platform-suffixed default name.
pub fn discover_ffmpeg() -> MediaResult<PathBuf> {
    discover_tool("FFMPEG_PATH", "ffmpeg").ok_or(MediaError::ToolMissing)
}

/// Resolve the ffprobe executable with the same discovery order.
pub fn discover_ffprobe() -> MediaResult<PathBuf> {
    discover_tool("FFPROBE_PATH", "ffprobe").ok_or(MediaError::ProbeMissing)
}

fn discover_tool(env_var: &str, name: &str) -> Option<PathBuf> {
    if let Ok(custom) = std::env::var(env_var) {
        if !custom.is_empty() {
            return Some(PathBuf::from(custom));
        }
    }
    let binary = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };
    which::which(&binary).ok()
}

struct Input {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg invocations.
///
/// Inputs keep their per-input arguments (those passed before `-i`);
/// everything added with `output_arg` lands after the last input.
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args::<[&str; 0], &str>([], path)
    }

    /// Add an input file with arguments placed before its `-i`.
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(Input {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set the video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set the audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set the audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Move the moov atom up front for streaming playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Build the full argv (without the executable).
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Runner for FFmpeg commands with timeout and cooperative cancellation.
pub struct FfmpegRunner {
    ffmpeg_path: PathBuf,
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a runner, discovering the tool. Missing tool is a hard error.
    pub fn new() -> MediaResult<Self> {
        Ok(Self {
            ffmpeg_path: discover_ffmpeg()?,
            cancel_rx: None,
            timeout_secs: Some(300),
        })
    }

    /// Use an explicit tool path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: path.into(),
            cancel_rx: None,
            timeout_secs: Some(300),
        }
    }

    /// Set a cancellation signal checked while the tool runs.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set the per-invocation timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run a command; `pass` labels any failure.
    pub async fn run(&self, cmd: &FfmpegCommand, pass: AssemblyPass) -> MediaResult<()> {
        let args = cmd.build_args();
        debug!(pass = %pass, "running {} {}", self.ffmpeg_path.display(), args.join(" "));

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::ToolMissing
                } else {
                    MediaError::Io(e)
                }
            })?;

        // Drain stderr concurrently so the child cannot block on the pipe.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut captured = String::new();
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if captured.len() < 4096 {
                        captured.push_str(&line);
                        captured.push('\n');
                    }
                }
            }
            captured
        });

        let status = self.wait_for_exit(&mut child).await;
        let stderr_text = stderr_task.await.unwrap_or_default();

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => {
                warn!(pass = %pass, code = ?status.code(), "ffmpeg failed: {}", stderr_text.trim());
                Err(MediaError::pass_failed(pass, status.code(), stderr_text))
            }
            Err(e) => Err(e),
        }
    }

    async fn wait_for_exit(
        &self,
        child: &mut tokio::process::Child,
    ) -> MediaResult<std::process::ExitStatus> {
        let mut cancel_rx = self.cancel_rx.clone();

        // The wait future borrows the child; it must be dropped before the
        // child can be killed on the cancellation and timeout paths.
        let outcome = {
            let wait = async {
                if let Some(rx) = cancel_rx.as_mut() {
                    tokio::select! {
                        status = child.wait() => Some(status),
                        _ = cancelled(rx) => None,
                    }
                } else {
                    Some(child.wait().await)
                }
            };

            match self.timeout_secs {
                Some(secs) => {
                    match tokio::time::timeout(std::time::Duration::from_secs(secs), wait).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!("ffmpeg timed out after {secs}s, killing process");
                            let _ = child.kill().await;
                            return Err(MediaError::Timeout(secs));
                        }
                    }
                }
                None => wait.await,
            }
        };

        match outcome {
            Some(status) => Ok(status?),
            None => {
                info!("cancelling ffmpeg invocation");
                let _ = child.kill().await;
                Err(MediaError::Cancelled)
            }
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            if *rx.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}
