//! Generation pricing for cost tracking.
//!
//! Costs are computed at submit time and attached to job metadata so the
//! completion hooks can stamp them onto the produced asset.

/// Round a cost to the project-wide 3 decimal places.
pub fn round_cost(cost: f64) -> f64 {
    (cost * 1000.0).round() / 1000.0
}

/// Per-artifact cost for an image model, if the model is priced.
pub fn image_cost(model: &str, count: u32) -> Option<f64> {
    let per_image = match model {
        "imagen4" | "flux_pro" | "flux_kontext" | "flux_kontext_multi" => 0.04,
        _ => return None,
    };
    Some(round_cost(per_image * count as f64))
}

/// Per-second cost for a video model, if the model is priced.
pub fn video_cost(model: &str, duration_secs: u32) -> Option<f64> {
    let per_second = match model {
        "kling_2.1" => 0.05,
        "hailuo_02" => 0.045,
        _ => return None,
    };
    Some(round_cost(per_second * duration_secs as f64))
}

/// Music is charged per 30-second block, rounded up.
pub fn music_cost(duration_secs: u32) -> f64 {
    let blocks = duration_secs.div_ceil(30);
    round_cost(0.10 * blocks as f64)
}

/// Speech is charged per 1,000-character block of input text, rounded up.
pub fn speech_cost(text: &str) -> f64 {
    let blocks = text.chars().count().div_ceil(1000).max(1);
    round_cost(0.10 * blocks as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_cost_per_model() {
        assert_eq!(video_cost("kling_2.1", 5), Some(0.25));
        assert_eq!(video_cost("hailuo_02", 10), Some(0.45));
        assert_eq!(video_cost("unknown", 5), None);
    }

    #[test]
    fn test_music_cost_rounds_up_to_block() {
        assert_eq!(music_cost(30), 0.1);
        assert_eq!(music_cost(31), 0.2);
        assert_eq!(music_cost(95), 0.4);
    }

    #[test]
    fn test_speech_cost_per_thousand_chars() {
        assert_eq!(speech_cost("hello"), 0.1);
        assert_eq!(speech_cost(&"x".repeat(1000)), 0.1);
        assert_eq!(speech_cost(&"x".repeat(1001)), 0.2);
    }

    #[test]
    fn test_round_cost_three_decimals() {
        assert_eq!(round_cost(0.0451 * 3.0), 0.135);
        assert_eq!(round_cost(1.0 / 3.0), 0.333);
    }
}
