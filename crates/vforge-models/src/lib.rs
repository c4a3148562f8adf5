//! Shared data models for the VideoForge engine.
//!
//! This crate provides Serde-serializable types for:
//! - Projects, scenes and assets
//! - The platform registry and aspect-ratio derivation
//! - Generation pricing
//! - Agent-consumable error records and validation helpers

pub mod asset;
pub mod error;
pub mod platform;
pub mod pricing;
pub mod project;

// Re-export common types
pub use asset::{Asset, AssetId, AssetKind, AssetSource};
pub use error::{AgentError, AgentErrorKind, ApiErrorClass, AgentResult};
pub use error::{
    validate_aspect_ratio, validate_duration, validate_enum, validate_platform, validate_range,
};
pub use platform::{
    aspect_ratio_dimensions, is_known_platform, platform_spec, PlatformSpec, Recommendations,
    ASPECT_RATIOS, PLATFORMS,
};
pub use pricing::{image_cost, music_cost, round_cost, speech_cost, video_cost};
pub use project::{
    sanitize_title, ProjectId, ProjectStatus, Scene, SceneId, VideoProject,
};
