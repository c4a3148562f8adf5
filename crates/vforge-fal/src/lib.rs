//! FAL queue API client.
//!
//! This crate provides:
//! - Typed submit/status/result/upload operations over the FAL queue API
//! - An event-stream view of a request's lifecycle
//! - Retry with exponential backoff and error classification
//! - Content-addressed upload caching

pub mod client;
pub mod error;
pub mod registry;
pub mod types;
pub mod upload_cache;

pub use client::{FalClient, FalConfig, SubmitHandle};
pub use error::{FalError, FalResult};
pub use registry::{model_spec, ModelKind, ModelSpec, MODELS, VOICE_OPTIONS};
pub use types::{
    extract_audio_url, extract_image_url, extract_progress, extract_speech_duration_ms,
    extract_video_url, QueueEvent, RequestState, StatusResponse,
};
pub use upload_cache::{UploadCache, UploadCacheStats, UploadOutcome};
