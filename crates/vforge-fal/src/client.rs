//! FAL queue API client.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::Stream;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{FalError, FalResult};
use crate::registry::{model_spec, ModelKind};
use crate::types::{extract_progress, QueueEvent, RequestState, StatusResponse};
use crate::upload_cache::{UploadCache, UploadOutcome};

/// Configuration for the FAL client.
#[derive(Debug, Clone)]
pub struct FalConfig {
    /// API credential
    pub api_key: String,
    /// Queue API base URL
    pub base_url: String,
    /// Per-attempt timeout for the polled path
    pub timeout: Duration,
    /// Max attempts inside `subscribe`
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,
    /// Poll interval for long-running requests
    pub poll_interval: Duration,
    /// Upload cache capacity
    pub upload_cache_size: usize,
    /// Upload cache entry TTL
    pub upload_cache_ttl: Duration,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://queue.fal.run".to_string(),
            timeout: Duration::from_secs(600),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(10),
            upload_cache_size: 100,
            upload_cache_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl FalConfig {
    /// Create config from environment variables.
    ///
    /// `FALAI_API_KEY` is mandatory; everything else has defaults.
    pub fn from_env() -> FalResult<Self> {
        let api_key = std::env::var("FALAI_API_KEY")
            .map_err(|_| FalError::Authentication("FALAI_API_KEY is not set".to_string()))?;
        Ok(Self {
            api_key,
            base_url: std::env::var("FAL_API_URL")
                .unwrap_or_else(|_| "https://queue.fal.run".to_string()),
            timeout: Duration::from_secs(
                std::env::var("GENERATION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
            ..Default::default()
        })
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    access_url: Option<String>,
}

/// Handle to a submitted request.
#[derive(Clone)]
pub struct SubmitHandle {
    pub request_id: String,
    model_id: String,
    client: FalClient,
}

impl SubmitHandle {
    /// Observe the request lifecycle as a stream of queue events.
    ///
    /// The stream polls the status endpoint, deduplicates log entries by
    /// index, and ends after `Completed` or the first error.
    pub fn events(&self) -> impl Stream<Item = FalResult<QueueEvent>> + Send + 'static {
        struct State {
            client: FalClient,
            model_id: String,
            request_id: String,
            logs_seen: usize,
            first: bool,
            done: bool,
        }

        let state = State {
            client: self.client.clone(),
            model_id: self.model_id.clone(),
            request_id: self.request_id.clone(),
            logs_seen: 0,
            first: true,
            done: false,
        };

        futures_util::stream::unfold(state, |mut st| async move {
            if st.done {
                return None;
            }
            if !st.first {
                tokio::time::sleep(st.client.config.poll_interval).await;
            }
            st.first = false;

            match st.client.status(&st.model_id, &st.request_id, true).await {
                Ok(status) => {
                    let logs = status.logs.unwrap_or_default();
                    let new_logs: Vec<Value> = logs.get(st.logs_seen..).unwrap_or(&[]).to_vec();
                    st.logs_seen = logs.len();

                    let event = match status.status {
                        RequestState::InQueue => QueueEvent::Queued {
                            position: status.queue_position,
                        },
                        RequestState::InProgress => QueueEvent::InProgress {
                            progress: extract_progress(&new_logs),
                            logs: new_logs,
                        },
                        RequestState::Completed => {
                            st.done = true;
                            QueueEvent::Completed { logs: new_logs }
                        }
                    };
                    Some((Ok(event), st))
                }
                Err(e) => {
                    st.done = true;
                    Some((Err(e), st))
                }
            }
        })
    }

    /// Fetch the final payload once the request has completed.
    pub async fn result(&self) -> FalResult<Value> {
        self.client.result(&self.model_id, &self.request_id).await
    }
}

/// Client for the FAL queue API.
#[derive(Clone)]
pub struct FalClient {
    http: reqwest::Client,
    config: Arc<FalConfig>,
    upload_cache: Arc<UploadCache>,
}

impl FalClient {
    /// Create a new client.
    pub fn new(config: FalConfig) -> FalResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        let upload_cache = Arc::new(UploadCache::new(
            config.upload_cache_size,
            config.upload_cache_ttl,
        ));
        Ok(Self {
            http,
            config: Arc::new(config),
            upload_cache,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> FalResult<Self> {
        Self::new(FalConfig::from_env()?)
    }

    pub fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    /// Submit a request to the model's queue.
    pub async fn submit(&self, model_id: &str, arguments: &Value) -> FalResult<SubmitHandle> {
        let url = format!("{}/{}", self.config.base_url, model_id);
        debug!(model = model_id, "submitting generation request");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .json(arguments)
            .send()
            .await?;

        let response = Self::check(response).await?;
        let submit: SubmitResponse = response.json().await?;
        info!(model = model_id, request_id = %submit.request_id, "request queued");

        Ok(SubmitHandle {
            request_id: submit.request_id,
            model_id: model_id.to_string(),
            client: self.clone(),
        })
    }

    /// Fetch the queue status of a request.
    pub async fn status(
        &self,
        model_id: &str,
        request_id: &str,
        with_logs: bool,
    ) -> FalResult<StatusResponse> {
        let mut url = format!(
            "{}/{}/requests/{}/status",
            self.config.base_url, model_id, request_id
        );
        if with_logs {
            url.push_str("?logs=1");
        }

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Fetch the final result payload. Fails with a not-ready error while
    /// the request is still in the queue.
    pub async fn result(&self, model_id: &str, request_id: &str) -> FalResult<Value> {
        let url = format!(
            "{}/{}/requests/{}",
            self.config.base_url, model_id, request_id
        );

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .send()
            .await?;

        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    /// Upload a local file, deduplicated by content hash.
    pub async fn upload(&self, path: &Path) -> FalResult<UploadOutcome> {
        let client = self.clone();
        self.upload_cache
            .get_or_upload(path, move |p| async move { client.do_upload(&p).await })
            .await
    }

    async fn do_upload(&self, path: &Path) -> FalResult<String> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        let bytes = tokio::fs::read(path).await?;

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/storage/upload", self.config.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Key {}", self.config.api_key))
            .multipart(form)
            .send()
            .await?;

        let response = Self::check(response).await?;
        let upload: UploadResponse = response.json().await?;
        upload
            .url
            .or(upload.access_url)
            .ok_or_else(|| FalError::upload_failed("upload response carried no URL"))
    }

    /// Run a request to completion with retry/backoff. Intended for short
    /// jobs; each attempt submits, drains events and fetches the result.
    pub async fn subscribe(&self, model_id: &str, arguments: &Value) -> FalResult<Value> {
        use futures_util::StreamExt;

        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            let outcome: FalResult<Value> = async {
                let handle = self.submit(model_id, arguments).await?;
                let mut events = Box::pin(handle.events());
                while let Some(event) = events.next().await {
                    match event? {
                        QueueEvent::Queued { position } => {
                            debug!(request_id = %handle.request_id, ?position, "queued");
                        }
                        QueueEvent::InProgress { logs, .. } => {
                            for log in &logs {
                                if let Some(message) = log.get("message").and_then(Value::as_str) {
                                    debug!(request_id = %handle.request_id, "[fal] {message}");
                                }
                            }
                        }
                        QueueEvent::Completed { .. } => break,
                    }
                }
                handle.result().await
            }
            .await;

            match outcome {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt + 1 < self.config.max_retries => {
                    let delay = self.config.retry_base_delay * 2u32.pow(attempt);
                    warn!(
                        model = model_id,
                        attempt = attempt + 1,
                        ?delay,
                        "retryable provider failure: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| FalError::Unknown("retries exhausted".to_string())))
    }

    /// Run a request, routing by duration.
    ///
    /// Image-to-video requests of 10 seconds or more must use submit+poll
    /// so a single stalled connection cannot time the job out; shorter jobs
    /// go through the retrying `subscribe` path.
    pub async fn run(
        &self,
        model_id: &str,
        arguments: &Value,
        budget: Option<Duration>,
    ) -> FalResult<Value> {
        let duration = arguments
            .get("duration")
            .and_then(|d| match d {
                Value::String(s) => s.parse::<u32>().ok(),
                other => other.as_u64().map(|n| n as u32),
            })
            .unwrap_or(5);

        let is_long_video = model_spec(model_id)
            .map(|m| m.kind == ModelKind::ImageToVideo)
            .unwrap_or_else(|| model_id.ends_with("image-to-video"))
            && duration >= 10;

        if is_long_video {
            self.run_with_polling(model_id, arguments, budget.unwrap_or(self.config.timeout))
                .await
        } else {
            self.subscribe(model_id, arguments).await
        }
    }

    /// Submit and poll until the result is ready or the budget elapses.
    async fn run_with_polling(
        &self,
        model_id: &str,
        arguments: &Value,
        budget: Duration,
    ) -> FalResult<Value> {
        let handle = self.submit(model_id, arguments).await?;
        let max_polls = (budget.as_secs() / self.config.poll_interval.as_secs().max(1)).max(1);

        for poll in 0..max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            match handle.result().await {
                Ok(result) => {
                    info!(
                        request_id = %handle.request_id,
                        elapsed_secs = (poll + 1) * self.config.poll_interval.as_secs(),
                        "request completed"
                    );
                    return Ok(result);
                }
                Err(e) if e.is_not_ready() => {
                    // Still processing; surface the latest provider logs.
                    if let Ok(status) = self
                        .status(&handle.model_id, &handle.request_id, true)
                        .await
                    {
                        for log in status.logs.unwrap_or_default().iter().rev().take(5).rev() {
                            if let Some(message) = log.get("message").and_then(Value::as_str) {
                                debug!(request_id = %handle.request_id, "[fal] {message}");
                            }
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        // One final attempt before declaring the budget spent.
        match handle.result().await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(request_id = %handle.request_id, "request timed out: {e}");
                Err(FalError::Timeout(budget.as_secs()))
            }
        }
    }

    /// Turn a non-success HTTP response into a classified error.
    async fn check(response: reqwest::Response) -> FalResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(FalError::classify(status.as_u16(), &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer) -> FalClient {
        FalClient::new(FalConfig {
            api_key: "test-key".to_string(),
            base_url: server.uri(),
            poll_interval: Duration::from_millis(10),
            retry_base_delay: Duration::from_millis(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_request_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/fal-ai/lyria2"))
            .and(header("Authorization", "Key test-key"))
            .and(body_json(json!({"prompt": "calm piano"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "req-1"})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let handle = client
            .submit("fal-ai/lyria2", &json!({"prompt": "calm piano"}))
            .await
            .unwrap();
        assert_eq!(handle.request_id, "req-1");
    }

    #[tokio::test]
    async fn test_event_stream_classifies_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/m/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r1"})))
            .mount(&server)
            .await;

        // First poll: queued; second: in progress with logs; third: completed.
        Mock::given(method("GET"))
            .and(path("/m/x/requests/r1/status"))
            .and(query_param("logs", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "IN_QUEUE", "queue_position": 2
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/x/requests/r1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "IN_PROGRESS",
                "logs": [{"message": "rendering", "progress": 40.0}]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/x/requests/r1/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "COMPLETED",
                "logs": [{"message": "rendering", "progress": 40.0}, {"message": "done"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let handle = client.submit("m/x", &json!({})).await.unwrap();
        let events: Vec<_> = handle.events().collect().await;

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            QueueEvent::Queued { position: Some(2) }
        ));
        match events[1].as_ref().unwrap() {
            QueueEvent::InProgress { logs, progress } => {
                assert_eq!(logs.len(), 1);
                assert_eq!(*progress, Some(40.0));
            }
            other => panic!("expected InProgress, got {other:?}"),
        }
        match events[2].as_ref().unwrap() {
            QueueEvent::Completed { logs } => {
                // Only the log entry not seen in the previous poll.
                assert_eq!(logs.len(), 1);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/m/x"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limit"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/m/x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r2"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/x/requests/r2/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/x/requests/r2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"audio": {"url": "https://x/a.mp3"}})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client.subscribe("m/x", &json!({})).await.unwrap();
        assert_eq!(result["audio"]["url"], "https://x/a.mp3");
    }

    #[tokio::test]
    async fn test_subscribe_does_not_retry_validation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/m/x"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid arguments"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.subscribe("m/x", &json!({})).await.unwrap_err();
        assert!(matches!(err, FalError::Validation(_)));
    }

    #[tokio::test]
    async fn test_polling_path_waits_through_not_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/m/video"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"request_id": "r3"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/video/requests/r3"))
            .respond_with(ResponseTemplate::new(400).set_body_string("request is still in progress"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/video/requests/r3/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "IN_PROGRESS"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/m/video/requests/r3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"video": {"url": "https://x/v.mp4"}})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server);
        let result = client
            .run_with_polling("m/video", &json!({}), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(result["video"]["url"], "https://x/v.mp4");
    }

    #[tokio::test]
    async fn test_upload_hits_cache_on_second_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/storage/upload"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn/f.png"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("f.png");
        tokio::fs::write(&file, b"png bytes").await.unwrap();

        let client = test_client(&server);
        let first = client.upload(&file).await.unwrap();
        assert!(!first.cached);
        let second = client.upload(&file).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.url, "https://cdn/f.png");
    }
}
