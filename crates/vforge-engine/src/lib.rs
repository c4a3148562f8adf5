//! VideoForge composition root.
//!
//! Constructs the services once, wires the queue's completion hooks to the
//! project store and asset storage, and exposes the validating operations
//! the tool layer calls into.

pub mod config;
pub mod error;
pub mod hooks;
pub mod ops;

use std::sync::Arc;

use tracing::info;

use vforge_fal::{FalClient, FalConfig};
use vforge_media::AssemblyPipeline;
use vforge_models::AssetKind;
use vforge_project::ProjectStore;
use vforge_queue::{GenerationQueue, TaskKind};
use vforge_storage::{AssetStorage, AssetStorageConfig};

pub use config::Settings;
pub use error::{EngineError, EngineResult, IntoAgentError};
pub use hooks::AssetCompletionHook;

/// The wired engine. Construct once at startup and share by reference;
/// none of the services are reachable through globals.
pub struct Engine {
    settings: Settings,
    fal: FalClient,
    queue: Arc<GenerationQueue>,
    projects: Arc<ProjectStore>,
    storage: Arc<AssetStorage>,
    assembler: AssemblyPipeline,
}

impl Engine {
    /// Build the engine from resolved settings.
    ///
    /// Creates the storage tree, discovers the external media tool (a
    /// missing tool is a hard startup error) and registers the completion
    /// hooks with the queue.
    pub fn new(settings: Settings) -> EngineResult<Self> {
        settings.ensure_directories()?;

        let mut fal_config = FalConfig {
            api_key: settings.api_key.clone(),
            timeout: settings.generation_timeout,
            ..Default::default()
        };
        if let Ok(base_url) = std::env::var("FAL_API_URL") {
            fal_config.base_url = base_url;
        }
        let fal = FalClient::new(fal_config)?;

        let mut storage_config =
            AssetStorageConfig::new(&settings.projects_dir, &settings.temp_dir);
        storage_config.download_timeout = settings.download_timeout;
        storage_config.max_parallel_downloads = settings.max_parallel_downloads;
        let storage = Arc::new(AssetStorage::new(storage_config)?);

        let projects = Arc::new(ProjectStore::new());
        let queue = Arc::new(GenerationQueue::new(fal.clone()));
        let assembler = AssemblyPipeline::new(
            &settings.temp_dir,
            &settings.logos_dir,
            &settings.base_dir,
        )?;

        for (task_kind, asset_kind) in [
            (TaskKind::Video, AssetKind::Video),
            (TaskKind::Image, AssetKind::Image),
            (TaskKind::Audio, AssetKind::Audio),
            (TaskKind::Music, AssetKind::Music),
            (TaskKind::Speech, AssetKind::Speech),
        ] {
            queue.register_hook(
                task_kind,
                Arc::new(AssetCompletionHook::new(
                    asset_kind,
                    Arc::clone(&projects),
                    Arc::clone(&storage),
                )),
            );
        }

        info!(storage = %settings.storage_dir.display(), "engine ready");
        Ok(Self {
            settings,
            fal,
            queue,
            projects,
            storage,
            assembler,
        })
    }

    /// Build the engine from the environment.
    pub fn from_env() -> EngineResult<Self> {
        Self::new(Settings::from_env()?)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn fal(&self) -> &FalClient {
        &self.fal
    }

    pub fn queue(&self) -> &Arc<GenerationQueue> {
        &self.queue
    }

    pub fn projects(&self) -> &Arc<ProjectStore> {
        &self.projects
    }

    pub fn storage(&self) -> &Arc<AssetStorage> {
        &self.storage
    }

    pub(crate) fn assembler(&self) -> &AssemblyPipeline {
        &self.assembler
    }

    pub(crate) fn runner(&self) -> &vforge_media::FfmpegRunner {
        self.assembler.runner()
    }
}
