//! Local asset storage.
//!
//! This crate provides:
//! - Downloads of remote artifacts into project-scoped directories
//! - JSON sidecar metadata per stored asset
//! - Semaphore-bounded batch downloads
//! - Storage usage accounting and temp-file cleanup

pub mod error;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use store::{
    AssetStorage, AssetStorageConfig, DownloadRequest, DownloadedAsset, SidecarMetadata,
    StorageUsage,
};
