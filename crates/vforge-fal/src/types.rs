//! Wire types and payload extraction.
//!
//! Provider payloads are treated as opaque JSON; the extraction functions
//! below encode the only structural expectations, trying fields in a fixed
//! order that is part of the contract.

use serde::Deserialize;
use serde_json::Value;

/// State of a queued request as reported by the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    InQueue,
    InProgress,
    Completed,
}

/// Response of the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub status: RequestState,
    #[serde(default)]
    pub queue_position: Option<u32>,
    #[serde(default)]
    pub logs: Option<Vec<Value>>,
}

/// A lifecycle event observed on a submitted request.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Queued { position: Option<u32> },
    InProgress { logs: Vec<Value>, progress: Option<f64> },
    Completed { logs: Vec<Value> },
}

/// Extract the video URL from a result payload.
///
/// Field order is fixed: `video.url`, then `url`, then `output_url`.
pub fn extract_video_url(result: &Value) -> Option<&str> {
    result
        .get("video")
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
        .or_else(|| result.get("url").and_then(Value::as_str))
        .or_else(|| result.get("output_url").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Extract the first image URL from a result payload (`images[0].url`).
pub fn extract_image_url(result: &Value) -> Option<&str> {
    result
        .get("images")
        .and_then(Value::as_array)
        .and_then(|imgs| imgs.first())
        .and_then(|img| img.get("url"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Extract the audio URL from a result payload (`audio.url`).
pub fn extract_audio_url(result: &Value) -> Option<&str> {
    result
        .get("audio")
        .and_then(|a| a.get("url"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Extract the synthesized speech duration (`duration_ms`).
pub fn extract_speech_duration_ms(result: &Value) -> Option<u64> {
    result.get("duration_ms").and_then(Value::as_u64)
}

/// Scan log entries for the most recent `progress` field.
pub fn extract_progress(logs: &[Value]) -> Option<f64> {
    logs.iter()
        .rev()
        .find_map(|log| log.get("progress").and_then(Value::as_f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_url_field_order() {
        let nested = json!({"video": {"url": "https://a/v.mp4"}, "url": "https://b/v.mp4"});
        assert_eq!(extract_video_url(&nested), Some("https://a/v.mp4"));

        let flat = json!({"url": "https://b/v.mp4", "output_url": "https://c/v.mp4"});
        assert_eq!(extract_video_url(&flat), Some("https://b/v.mp4"));

        let output_only = json!({"output_url": "https://c/v.mp4"});
        assert_eq!(extract_video_url(&output_only), Some("https://c/v.mp4"));

        assert_eq!(extract_video_url(&json!({"video": {"url": ""}})), None);
    }

    #[test]
    fn test_image_and_audio_urls() {
        let img = json!({"images": [{"url": "https://x/i.png"}, {"url": "https://x/j.png"}]});
        assert_eq!(extract_image_url(&img), Some("https://x/i.png"));
        assert_eq!(extract_image_url(&json!({"images": []})), None);

        let audio = json!({"audio": {"url": "https://x/a.mp3"}, "duration_ms": 28000});
        assert_eq!(extract_audio_url(&audio), Some("https://x/a.mp3"));
        assert_eq!(extract_speech_duration_ms(&audio), Some(28000));
    }

    #[test]
    fn test_progress_from_logs() {
        let logs = vec![
            json!({"message": "starting"}),
            json!({"message": "rendering", "progress": 40.0}),
            json!({"message": "rendering", "progress": 70.0}),
        ];
        assert_eq!(extract_progress(&logs), Some(70.0));
        assert_eq!(extract_progress(&[json!({"message": "hi"})]), None);
    }

    #[test]
    fn test_status_response_parsing() {
        let raw = json!({"status": "IN_QUEUE", "queue_position": 3});
        let status: StatusResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(status.status, RequestState::InQueue);
        assert_eq!(status.queue_position, Some(3));
    }
}
