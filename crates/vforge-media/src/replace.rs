//! Atomic output replacement and temp-file hygiene.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Pipeline-scoped registry of temporary files.
///
/// Every temp path a pass creates is registered here; paths promoted to
/// the final output are released. Whatever is left is removed on drop, so
/// cleanup runs on success, failure and cancellation alike.
#[derive(Debug, Default)]
pub struct TempRegistry {
    paths: Vec<PathBuf>,
    counter: u64,
}

impl TempRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh temp path in `dir` for the given pass label, and
    /// register it for cleanup.
    pub fn reserve(&mut self, dir: &Path, label: &str, extension: &str) -> PathBuf {
        self.counter += 1;
        let path = dir.join(format!(
            ".temp_{label}_{}_{}.{extension}",
            std::process::id(),
            self.counter
        ));
        self.register(path.clone());
        path
    }

    /// Track an externally created temp path.
    pub fn register(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    /// Stop tracking a path that became a real output.
    pub fn release(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }

    /// Remove all tracked files now. Best effort.
    pub fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), "failed to remove temp file: {e}");
                } else {
                    debug!(path = %path.display(), "removed temp file");
                }
            }
        }
    }

    pub fn tracked(&self) -> usize {
        self.paths.len()
    }
}

impl Drop for TempRegistry {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Replace `original` with `replacement` using a backup dance:
/// original -> `.backup`, replacement -> original, delete backup.
/// If the second rename fails the backup is restored.
pub async fn replace_file(original: &Path, replacement: &Path) -> MediaResult<()> {
    let backup = original.with_extension("backup");

    fs::rename(original, &backup)
        .await
        .map_err(|e| MediaError::RenameFailed(format!("{} -> backup: {e}", original.display())))?;

    if let Err(e) = fs::rename(replacement, original).await {
        // Put the original back before surfacing the error.
        if let Err(restore) = fs::rename(&backup, original).await {
            warn!(
                original = %original.display(),
                "failed to restore backup after rename error: {restore}"
            );
        }
        return Err(MediaError::RenameFailed(format!(
            "{} -> {}: {e}",
            replacement.display(),
            original.display()
        )));
    }

    if let Err(e) = fs::remove_file(&backup).await {
        warn!(backup = %backup.display(), "failed to delete backup: {e}");
    }
    Ok(())
}

/// Unlink `.temp_*` leftovers from prior runs in a directory. Best effort.
pub async fn sweep_stale_temps(dir: &Path) -> u64 {
    let mut removed = 0;
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return 0;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(".temp_") && fs::remove_file(entry.path()).await.is_ok() {
            debug!(path = %entry.path().display(), "removed stale temp file");
            removed += 1;
        }
    }
    removed
}
