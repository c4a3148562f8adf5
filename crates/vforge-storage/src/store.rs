//! Asset download and bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

use vforge_models::{AssetId, AssetKind, ProjectId};

use crate::error::{StorageError, StorageResult};

/// Hard cap on concurrent downloads, regardless of configuration.
pub const MAX_CONCURRENT_DOWNLOADS: usize = 10;

/// Configuration for asset storage.
#[derive(Debug, Clone)]
pub struct AssetStorageConfig {
    /// Root directory holding per-project subdirectories
    pub projects_dir: PathBuf,
    /// Scratch directory for transient files
    pub temp_dir: PathBuf,
    /// Per-download timeout
    pub download_timeout: Duration,
    /// Default batch-download parallelism
    pub max_parallel_downloads: usize,
}

impl AssetStorageConfig {
    pub fn new(projects_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
            temp_dir: temp_dir.into(),
            download_timeout: Duration::from_secs(300),
            max_parallel_downloads: 5,
        }
    }
}

/// Sidecar metadata written next to each stored asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub asset_id: AssetId,
    pub url: String,
    pub local_path: PathBuf,
    pub kind: String,
    pub size: u64,
    pub downloaded_at: DateTime<Utc>,
}

/// A successfully downloaded asset.
#[derive(Debug, Clone)]
pub struct DownloadedAsset {
    pub local_path: PathBuf,
    pub size: u64,
}

/// One item of a batch download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub asset_id: AssetId,
    pub kind: AssetKind,
}

/// Recursive storage usage of a project directory.
#[derive(Debug, Clone, Serialize)]
pub struct StorageUsage {
    pub total_size_bytes: u64,
    pub file_count: u64,
}

/// Downloads remote artifacts into `<projects>/<project_id>/assets/`.
pub struct AssetStorage {
    http: reqwest::Client,
    config: AssetStorageConfig,
}

impl AssetStorage {
    pub fn new(config: AssetStorageConfig) -> StorageResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.download_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Local path an asset of the given kind is stored at.
    pub fn asset_path(&self, project_id: &ProjectId, asset_id: &AssetId, kind: AssetKind) -> PathBuf {
        self.assets_dir(project_id)
            .join(format!("{}.{}", asset_id, kind.extension()))
    }

    fn assets_dir(&self, project_id: &ProjectId) -> PathBuf {
        self.config.projects_dir.join(project_id.as_str()).join("assets")
    }

    /// Download a remote artifact and write its sidecar metadata.
    pub async fn download_asset(
        &self,
        url: &str,
        project_id: &ProjectId,
        asset_id: &AssetId,
        kind: AssetKind,
    ) -> StorageResult<DownloadedAsset> {
        let parsed = Url::parse(url).map_err(|e| StorageError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StorageError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let assets_dir = self.assets_dir(project_id);
        tokio::fs::create_dir_all(&assets_dir).await?;
        let local_path = self.asset_path(project_id, asset_id, kind);

        debug!(url, path = %local_path.display(), "downloading asset");
        let response = self.http.get(parsed).send().await?;
        if !response.status().is_success() {
            return Err(StorageError::download_failed(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(&local_path, &bytes).await?;
        let size = bytes.len() as u64;

        let sidecar = SidecarMetadata {
            asset_id: asset_id.clone(),
            url: url.to_string(),
            local_path: local_path.clone(),
            kind: kind.as_str().to_string(),
            size,
            downloaded_at: Utc::now(),
        };
        let sidecar_path = local_path.with_extension("json");
        tokio::fs::write(&sidecar_path, serde_json::to_vec_pretty(&sidecar)?).await?;

        info!(asset_id = %asset_id, size, "asset stored");
        Ok(DownloadedAsset { local_path, size })
    }

    /// Download many assets concurrently.
    ///
    /// Parallelism is bounded by a semaphore (capped at
    /// [`MAX_CONCURRENT_DOWNLOADS`]); per-item failures are returned in the
    /// result list rather than aborting the batch.
    pub async fn download_many(
        &self,
        requests: Vec<DownloadRequest>,
        project_id: &ProjectId,
        max_concurrent: Option<usize>,
    ) -> Vec<(AssetId, StorageResult<DownloadedAsset>)> {
        let limit = max_concurrent
            .unwrap_or(self.config.max_parallel_downloads)
            .clamp(1, MAX_CONCURRENT_DOWNLOADS);
        let semaphore = Arc::new(Semaphore::new(limit));

        let futures = requests.into_iter().map(|request| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await;
                let outcome = self
                    .download_asset(&request.url, project_id, &request.asset_id, request.kind)
                    .await;
                if let Err(e) = &outcome {
                    warn!(asset_id = %request.asset_id, "download failed: {e}");
                }
                (request.asset_id, outcome)
            }
        });

        futures_util::future::join_all(futures).await
    }

    /// Read the sidecar metadata of every stored asset in a project.
    pub async fn list_project_assets(
        &self,
        project_id: &ProjectId,
    ) -> StorageResult<Vec<SidecarMetadata>> {
        let assets_dir = self.assets_dir(project_id);
        if !assets_dir.exists() {
            return Ok(Vec::new());
        }

        let mut sidecars = Vec::new();
        let mut entries = tokio::fs::read_dir(&assets_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                match tokio::fs::read(&path).await {
                    Ok(bytes) => match serde_json::from_slice::<SidecarMetadata>(&bytes) {
                        Ok(sidecar) => sidecars.push(sidecar),
                        Err(e) => warn!(path = %path.display(), "unreadable sidecar: {e}"),
                    },
                    Err(e) => warn!(path = %path.display(), "unreadable sidecar: {e}"),
                }
            }
        }
        Ok(sidecars)
    }

    /// Recursive byte/file count under a project directory.
    pub async fn project_storage(&self, project_id: &ProjectId) -> StorageResult<StorageUsage> {
        let root = self.config.projects_dir.join(project_id.as_str());
        let mut usage = StorageUsage {
            total_size_bytes: 0,
            file_count: 0,
        };
        if !root.exists() {
            return Ok(usage);
        }

        let mut stack = vec![root];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    stack.push(entry.path());
                } else {
                    usage.total_size_bytes += metadata.len();
                    usage.file_count += 1;
                }
            }
        }
        Ok(usage)
    }

    /// Delete files in the temp directory older than the threshold.
    pub async fn cleanup_temp_files(&self, older_than_hours: u64) -> StorageResult<u64> {
        let cutoff = std::time::SystemTime::now()
            .checked_sub(Duration::from_secs(older_than_hours * 3600));
        let Some(cutoff) = cutoff else { return Ok(0) };

        let temp_dir = &self.config.temp_dir;
        if !temp_dir.exists() {
            return Ok(0);
        }

        let mut cleaned = 0;
        let mut entries = tokio::fs::read_dir(temp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
            if modified < cutoff {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(path = %entry.path().display(), "failed to remove temp file: {e}");
                } else {
                    cleaned += 1;
                }
            }
        }
        Ok(cleaned)
    }
}
