//! Resolved configuration and path layout.

use std::path::PathBuf;
use std::time::Duration;

use vforge_models::ProjectId;

use crate::error::{EngineError, EngineResult};

/// Resolved engine settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Provider credential (mandatory)
    pub api_key: String,

    /// Storage root; everything below lives under it
    pub storage_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub projects_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub logos_dir: PathBuf,
    /// Directory the process was launched from (logo fallback lookup)
    pub base_dir: PathBuf,

    pub max_parallel_downloads: usize,
    pub download_timeout: Duration,
    pub generation_timeout: Duration,

    /// Warn when a single generation would cost more than this (USD)
    pub cost_warning_threshold: f64,

    pub default_image_model: String,
    pub default_video_model: String,
    pub default_output_format: String,
}

impl Settings {
    /// Resolve settings from the environment.
    ///
    /// `FALAI_API_KEY` is mandatory; `VIDEOFORGE_STORAGE` overrides the
    /// storage root (default `./storage`).
    pub fn from_env() -> EngineResult<Self> {
        let api_key =
            std::env::var("FALAI_API_KEY").map_err(|_| EngineError::MissingEnv("FALAI_API_KEY"))?;

        let base_dir = std::env::current_dir()?;
        let storage_dir = std::env::var("VIDEOFORGE_STORAGE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base_dir.join("storage"));

        Ok(Self::with_storage_dir(api_key, storage_dir, base_dir))
    }

    /// Build settings around an explicit storage root.
    pub fn with_storage_dir(
        api_key: impl Into<String>,
        storage_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
    ) -> Self {
        let storage_dir = storage_dir.into();
        let assets_dir = storage_dir.join("assets");
        Self {
            api_key: api_key.into(),
            temp_dir: storage_dir.join("temp"),
            projects_dir: storage_dir.join("projects"),
            logos_dir: assets_dir.join("logos"),
            assets_dir,
            storage_dir,
            base_dir: base_dir.into(),
            max_parallel_downloads: env_parse("MAX_PARALLEL_DOWNLOADS", 5),
            download_timeout: Duration::from_secs(env_parse("DOWNLOAD_TIMEOUT", 300)),
            generation_timeout: Duration::from_secs(env_parse("GENERATION_TIMEOUT", 600)),
            cost_warning_threshold: env_parse("COST_WARNING_THRESHOLD", 10.0),
            default_image_model: std::env::var("DEFAULT_IMAGE_MODEL")
                .unwrap_or_else(|_| "imagen4".to_string()),
            default_video_model: std::env::var("DEFAULT_VIDEO_MODEL")
                .unwrap_or_else(|_| "kling_2.1".to_string()),
            default_output_format: std::env::var("DEFAULT_OUTPUT_FORMAT")
                .unwrap_or_else(|_| "mp4".to_string()),
        }
    }

    /// Create the storage directory tree.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            &self.storage_dir,
            &self.temp_dir,
            &self.projects_dir,
            &self.assets_dir,
            &self.logos_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Directory for a specific project, created on demand.
    pub fn project_dir(&self, project_id: &ProjectId) -> std::io::Result<PathBuf> {
        let dir = self.projects_dir.join(project_id.as_str());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Path of a project's assembled output for a given title stem.
    pub fn assembled_path(&self, project_id: &ProjectId, stem: &str, format: &str) -> PathBuf {
        self.projects_dir
            .join(project_id.as_str())
            .join(format!("{stem}.{format}"))
    }

    /// Export directory for a project, created on demand.
    pub fn exports_dir(&self, project_id: &ProjectId) -> std::io::Result<PathBuf> {
        let dir = self.projects_dir.join(project_id.as_str()).join("exports");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn env_parse<T: std::str::FromStr + Copy>(var: &str, default: T) -> T {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// True when the path looks like a remote URL rather than a local file.
pub fn is_remote_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_storage_root() {
        let settings = Settings::with_storage_dir("key", "/srv/forge/storage", "/srv/forge");
        assert_eq!(settings.temp_dir, PathBuf::from("/srv/forge/storage/temp"));
        assert_eq!(
            settings.logos_dir,
            PathBuf::from("/srv/forge/storage/assets/logos")
        );
        assert_eq!(
            settings.projects_dir,
            PathBuf::from("/srv/forge/storage/projects")
        );
    }

    #[test]
    fn test_assembled_path() {
        let settings = Settings::with_storage_dir("key", "/tmp/s", "/tmp");
        let path = settings.assembled_path(&ProjectId::from_string("p1"), "Demo_tiktok", "mp4");
        assert_eq!(path, PathBuf::from("/tmp/s/projects/p1/Demo_tiktok.mp4"));
    }

    #[test]
    fn test_is_remote_url() {
        assert!(is_remote_url("https://cdn/x.png"));
        assert!(is_remote_url("http://cdn/x.png"));
        assert!(!is_remote_url("/tmp/x.png"));
        assert!(!is_remote_url("x.png"));
    }
}
