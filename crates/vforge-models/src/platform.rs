//! Platform registry consumed by validation and export.

use schemars::JsonSchema;
use serde::Serialize;

/// Encoding recommendations for a target platform.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Recommendations {
    pub resolution: &'static str,
    pub frame_rate: u32,
    pub bitrate: &'static str,
    pub audio_bitrate: &'static str,
}

/// Specification of a publishing platform.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PlatformSpec {
    /// Registry key (e.g. "youtube_shorts")
    pub key: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Aspect ratios the platform accepts
    pub aspect_ratios: &'static [&'static str],
    /// Default aspect ratio when the caller does not pick one
    pub default_aspect_ratio: &'static str,
    /// Hard duration limit in seconds
    pub max_duration: u32,
    /// Recommended duration in seconds
    pub recommended_duration: u32,
    /// Accepted container formats
    pub formats: &'static [&'static str],
    /// Upload size cap in bytes
    pub max_file_size: u64,
    pub recommendations: Recommendations,
}

/// The fixed platform table.
pub static PLATFORMS: &[PlatformSpec] = &[
    PlatformSpec {
        key: "youtube",
        name: "YouTube",
        aspect_ratios: &["16:9", "9:16", "4:3", "1:1"],
        default_aspect_ratio: "16:9",
        max_duration: 43_200, // 12 hours
        recommended_duration: 600,
        formats: &["mp4", "mov", "avi", "webm"],
        max_file_size: 137_438_953_472, // 128 GB
        recommendations: Recommendations {
            resolution: "1920x1080",
            frame_rate: 30,
            bitrate: "8-12 Mbps",
            audio_bitrate: "384k",
        },
    },
    PlatformSpec {
        key: "youtube_shorts",
        name: "YouTube Shorts",
        aspect_ratios: &["9:16"],
        default_aspect_ratio: "9:16",
        max_duration: 60,
        recommended_duration: 30,
        formats: &["mp4"],
        max_file_size: 1_073_741_824, // 1 GB
        recommendations: Recommendations {
            resolution: "1080x1920",
            frame_rate: 30,
            bitrate: "8-10 Mbps",
            audio_bitrate: "256k",
        },
    },
    PlatformSpec {
        key: "tiktok",
        name: "TikTok",
        aspect_ratios: &["9:16"],
        default_aspect_ratio: "9:16",
        max_duration: 600,
        recommended_duration: 30,
        formats: &["mp4"],
        max_file_size: 4_294_967_296, // 4 GB
        recommendations: Recommendations {
            resolution: "1080x1920",
            frame_rate: 30,
            bitrate: "8-10 Mbps",
            audio_bitrate: "256k",
        },
    },
    PlatformSpec {
        key: "instagram_reel",
        name: "Instagram Reel",
        aspect_ratios: &["9:16"],
        default_aspect_ratio: "9:16",
        max_duration: 90,
        recommended_duration: 30,
        formats: &["mp4"],
        max_file_size: 1_073_741_824,
        recommendations: Recommendations {
            resolution: "1080x1920",
            frame_rate: 30,
            bitrate: "5-8 Mbps",
            audio_bitrate: "192k",
        },
    },
    PlatformSpec {
        key: "instagram_post",
        name: "Instagram Post",
        aspect_ratios: &["1:1", "4:5"],
        default_aspect_ratio: "1:1",
        max_duration: 60,
        recommended_duration: 30,
        formats: &["mp4"],
        max_file_size: 1_073_741_824,
        recommendations: Recommendations {
            resolution: "1080x1080",
            frame_rate: 30,
            bitrate: "5-8 Mbps",
            audio_bitrate: "192k",
        },
    },
    PlatformSpec {
        key: "twitter",
        name: "Twitter/X",
        aspect_ratios: &["16:9", "1:1"],
        default_aspect_ratio: "16:9",
        max_duration: 140,
        recommended_duration: 60,
        formats: &["mp4"],
        max_file_size: 536_870_912, // 512 MB
        recommendations: Recommendations {
            resolution: "1280x720",
            frame_rate: 30,
            bitrate: "5-6 Mbps",
            audio_bitrate: "192k",
        },
    },
    PlatformSpec {
        key: "linkedin",
        name: "LinkedIn",
        aspect_ratios: &["16:9", "1:1", "4:5"],
        default_aspect_ratio: "16:9",
        max_duration: 600,
        recommended_duration: 120,
        formats: &["mp4"],
        max_file_size: 5_368_709_120, // 5 GB
        recommendations: Recommendations {
            resolution: "1920x1080",
            frame_rate: 30,
            bitrate: "8-10 Mbps",
            audio_bitrate: "256k",
        },
    },
    PlatformSpec {
        key: "facebook",
        name: "Facebook",
        aspect_ratios: &["16:9", "9:16", "1:1", "4:5"],
        default_aspect_ratio: "16:9",
        max_duration: 14_400, // 4 hours
        recommended_duration: 180,
        formats: &["mp4", "mov"],
        max_file_size: 10_737_418_240, // 10 GB
        recommendations: Recommendations {
            resolution: "1920x1080",
            frame_rate: 30,
            bitrate: "8-12 Mbps",
            audio_bitrate: "256k",
        },
    },
    PlatformSpec {
        key: "custom",
        name: "Custom",
        aspect_ratios: &["16:9", "9:16", "1:1", "4:5", "4:3", "21:9"],
        default_aspect_ratio: "16:9",
        max_duration: 3_600,
        recommended_duration: 300,
        formats: &["mp4", "mov", "avi", "webm", "mkv"],
        max_file_size: 53_687_091_200, // 50 GB
        recommendations: Recommendations {
            resolution: "1920x1080",
            frame_rate: 30,
            bitrate: "10-15 Mbps",
            audio_bitrate: "320k",
        },
    },
];

/// Aspect ratios recognized project-wide, with a short description each.
pub static ASPECT_RATIOS: &[(&str, &str)] = &[
    ("16:9", "Widescreen (YouTube, TV, monitors)"),
    ("9:16", "Vertical (TikTok, Reels, Stories)"),
    ("1:1", "Square (Instagram feed, some social media)"),
    ("4:5", "Portrait (Instagram feed)"),
    ("21:9", "Ultrawide (cinematic)"),
    ("4:3", "Classic TV format"),
];

/// Look up a platform spec by key. Unknown keys resolve to "custom".
pub fn platform_spec(key: &str) -> &'static PlatformSpec {
    PLATFORMS
        .iter()
        .find(|p| p.key == key)
        .or_else(|| PLATFORMS.iter().find(|p| p.key == "custom"))
        .expect("platform registry contains 'custom'")
}

/// Check whether a platform key is registered.
pub fn is_known_platform(key: &str) -> bool {
    PLATFORMS.iter().any(|p| p.key == key)
}

/// Convert an aspect-ratio string to pixel dimensions at the given height.
///
/// The common ratios are pinned to their canonical 1080-height dimensions;
/// arbitrary `w:h` strings are computed.
pub fn aspect_ratio_dimensions(aspect_ratio: &str, height: u32) -> (u32, u32) {
    if height == 1080 {
        match aspect_ratio {
            "16:9" => return (1920, 1080),
            "9:16" => return (1080, 1920),
            "1:1" => return (1080, 1080),
            "4:5" => return (864, 1080),
            "4:3" => return (1440, 1080),
            "21:9" => return (2560, 1080),
            _ => {}
        }
    }

    if let Some((w, h)) = aspect_ratio.split_once(':') {
        if let (Ok(w), Ok(h)) = (w.parse::<f64>(), h.parse::<f64>()) {
            if h > 0.0 {
                return ((height as f64 * (w / h)).round() as u32, height);
            }
        }
    }

    (1920, 1080)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_lookup() {
        assert_eq!(platform_spec("tiktok").default_aspect_ratio, "9:16");
        assert_eq!(platform_spec("tiktok").recommended_duration, 30);
        assert_eq!(platform_spec("youtube").max_duration, 43_200);
    }

    #[test]
    fn test_unknown_platform_falls_back_to_custom() {
        assert_eq!(platform_spec("myspace").key, "custom");
        assert!(!is_known_platform("myspace"));
        assert!(is_known_platform("linkedin"));
    }

    #[test]
    fn test_aspect_ratio_dimensions_table() {
        assert_eq!(aspect_ratio_dimensions("16:9", 1080), (1920, 1080));
        assert_eq!(aspect_ratio_dimensions("9:16", 1080), (1080, 1920));
        assert_eq!(aspect_ratio_dimensions("4:5", 1080), (864, 1080));
    }

    #[test]
    fn test_aspect_ratio_dimensions_computed() {
        // 2:1 at height 540 -> 1080x540
        assert_eq!(aspect_ratio_dimensions("2:1", 540), (1080, 540));
        // Garbage falls back to 1080p widescreen
        assert_eq!(aspect_ratio_dimensions("wide", 1080), (1920, 1080));
    }
}
