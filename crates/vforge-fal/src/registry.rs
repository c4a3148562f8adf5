//! Model registry: endpoints, legal parameters and defaults.

/// What a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    TextToImage,
    ImageEdit,
    ImageToVideo,
    Music,
    Speech,
}

/// Registry record for a generation model.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    /// Registry key used by callers (e.g. "kling_2.1")
    pub key: &'static str,
    /// Provider endpoint path
    pub endpoint: &'static str,
    pub kind: ModelKind,
    /// Legal clip durations in seconds (video models only)
    pub valid_durations: &'static [u32],
    /// Extra parameters the model accepts
    pub supports: &'static [&'static str],
}

/// The pre-registered models.
pub static MODELS: &[ModelSpec] = &[
    ModelSpec {
        key: "kling_2.1",
        endpoint: "fal-ai/kling-video/v2.1/standard/image-to-video",
        kind: ModelKind::ImageToVideo,
        valid_durations: &[5, 10],
        supports: &["negative_prompt", "cfg_scale"],
    },
    ModelSpec {
        key: "hailuo_02",
        endpoint: "fal-ai/minimax/hailuo-02/standard/image-to-video",
        kind: ModelKind::ImageToVideo,
        valid_durations: &[6, 10],
        supports: &["prompt_optimizer"],
    },
    ModelSpec {
        key: "imagen4",
        endpoint: "fal-ai/imagen4/preview",
        kind: ModelKind::TextToImage,
        valid_durations: &[],
        supports: &["aspect_ratio", "num_images"],
    },
    ModelSpec {
        key: "flux_pro",
        endpoint: "fal-ai/flux-pro",
        kind: ModelKind::TextToImage,
        valid_durations: &[],
        supports: &["aspect_ratio", "num_images"],
    },
    ModelSpec {
        key: "flux_kontext",
        endpoint: "fal-ai/flux-pro/kontext",
        kind: ModelKind::ImageEdit,
        valid_durations: &[],
        supports: &["safety_tolerance"],
    },
    ModelSpec {
        key: "lyria2",
        endpoint: "fal-ai/lyria2",
        kind: ModelKind::Music,
        valid_durations: &[],
        supports: &[],
    },
    ModelSpec {
        key: "minimax_speech",
        endpoint: "fal-ai/minimax/speech-02-hd",
        kind: ModelKind::Speech,
        valid_durations: &[],
        supports: &["voice_setting"],
    },
];

/// Default negative prompt for Kling.
pub const KLING_DEFAULT_NEGATIVE_PROMPT: &str = "blur, distort, and low quality";
/// Default CFG scale for Kling, clamped to [0, 1].
pub const KLING_DEFAULT_CFG_SCALE: f64 = 0.5;
/// Kontext always runs at this guidance scale.
pub const KONTEXT_GUIDANCE_SCALE: f64 = 3.5;
/// Kontext safety tolerance levels, least to most permissive.
pub static KONTEXT_SAFETY_TOLERANCES: &[&str] = &["1", "2", "3", "4", "5", "6"];
/// Default Kontext safety tolerance.
pub const KONTEXT_DEFAULT_SAFETY_TOLERANCE: &str = "3";
/// Typical length of a generated music track in seconds.
pub const LYRIA_TYPICAL_DURATION: u32 = 95;

/// Speech voices with a short character description each.
pub static VOICE_OPTIONS: &[(&str, &str)] = &[
    ("Wise_Woman", "Professional and knowledgeable"),
    ("Friendly_Person", "Warm and approachable"),
    ("Deep_Voice_Man", "Commanding and authoritative"),
    ("Calm_Woman", "Soothing and peaceful"),
    ("Casual_Guy", "Relaxed and conversational"),
    ("Inspirational_girl", "Energetic and motivating"),
    ("Patient_Man", "Gentle and understanding"),
    ("Determined_Man", "Confident and assertive"),
];

/// Look up a model by registry key.
pub fn model_spec(key: &str) -> Option<&'static ModelSpec> {
    MODELS.iter().find(|m| m.key == key)
}

/// Keys of all registered video models.
pub fn video_model_keys() -> Vec<&'static str> {
    MODELS
        .iter()
        .filter(|m| m.kind == ModelKind::ImageToVideo)
        .map(|m| m.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_models_have_disjoint_durations() {
        let kling = model_spec("kling_2.1").unwrap();
        let hailuo = model_spec("hailuo_02").unwrap();
        assert_eq!(kling.valid_durations, &[5, 10]);
        assert_eq!(hailuo.valid_durations, &[6, 10]);
        assert!(kling.valid_durations.contains(&5));
        assert!(!hailuo.valid_durations.contains(&5));
    }

    #[test]
    fn test_unknown_model() {
        assert!(model_spec("sora").is_none());
    }

    #[test]
    fn test_video_model_keys() {
        let keys = video_model_keys();
        assert_eq!(keys, vec!["kling_2.1", "hailuo_02"]);
    }
}
