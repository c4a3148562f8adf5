//! Validating operations exposed to the tool layer.
//!
//! Every operation validates its inputs against the model/platform
//! registries and returns either a typed response or an [`AgentError`]
//! record carrying `suggestion` and `example` fields.
//!
//! [`AgentError`]: vforge_models::AgentError

mod assembly;
mod generation;
mod project;
mod queue;

pub use assembly::{AddAudioTrackResponse, AssembleResponse, DownloadAssetsResponse, ExportResponse};
pub use generation::{
    GenerateImageRequest, GenerateMusicRequest, GenerateSpeechRequest, GenerateVideoRequest,
    SubmittedJob,
};
pub use project::{AddSceneResponse, CreateProjectResponse, ProjectSummary};
pub use queue::CancelJobResponse;
