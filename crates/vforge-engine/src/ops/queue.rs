//! Queue operations exposed to the tool layer.

use serde::Serialize;
use serde_json::Value;

use vforge_models::{AgentResult, ProjectId};
use vforge_queue::{GenerationJob, JobId, JobStatus, JobSummary, QueueStats};

use crate::error::IntoAgentError;
use crate::Engine;

#[derive(Debug, Clone, Serialize)]
pub struct CancelJobResponse {
    pub job_id: JobId,
    /// False when the job had already reached a terminal state
    pub cancelled: bool,
    pub status: JobStatus,
}

impl Engine {
    /// Full record of a job.
    pub async fn get_job_status(&self, job_id: &str) -> AgentResult<GenerationJob> {
        let id = JobId::from_string(job_id);
        self.queue()
            .get(&id)
            .await
            .ok_or_else(|| vforge_queue::QueueError::job_not_found(&id).into_agent_error())
    }

    /// Job summaries, newest first.
    pub async fn list_jobs(
        &self,
        project_id: Option<&str>,
        status_filter: Option<&[JobStatus]>,
    ) -> Vec<JobSummary> {
        let project_id = project_id.map(ProjectId::from_string);
        self.queue()
            .list(project_id.as_ref(), status_filter)
            .await
            .iter()
            .map(GenerationJob::to_summary)
            .collect()
    }

    /// Cancel a job. Idempotent; unknown jobs are an error, terminal jobs
    /// report `cancelled: false`.
    pub async fn cancel_job(&self, job_id: &str) -> AgentResult<CancelJobResponse> {
        let id = JobId::from_string(job_id);
        // Existence check separates "no such job" from "already terminal".
        let _ = self
            .queue()
            .get(&id)
            .await
            .ok_or_else(|| vforge_queue::QueueError::job_not_found(&id).into_agent_error())?;

        let cancelled = self.queue().cancel(&id).await;
        let status = self
            .queue()
            .get(&id)
            .await
            .map(|job| job.status)
            .unwrap_or(JobStatus::Cancelled);

        Ok(CancelJobResponse {
            job_id: id,
            cancelled,
            status,
        })
    }

    /// Aggregate queue statistics.
    pub async fn queue_stats(&self) -> QueueStats {
        self.queue().stats().await
    }

    /// Block until a job reaches a terminal state and return its result.
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        timeout_secs: Option<u64>,
    ) -> AgentResult<Value> {
        self.queue()
            .wait(
                &JobId::from_string(job_id),
                timeout_secs.map(std::time::Duration::from_secs),
                None,
            )
            .await
            .map_err(IntoAgentError::into_agent_error)
    }

    /// Evict terminal jobs older than the threshold.
    pub async fn cleanup_jobs(&self, age_hours: i64) -> usize {
        self.queue().cleanup(age_hours).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Settings;
    use tempfile::TempDir;
    use vforge_models::AgentErrorKind;

    fn test_engine(root: &TempDir) -> Engine {
        std::env::set_var("FFMPEG_PATH", "/usr/bin/true");
        std::env::set_var("FFPROBE_PATH", "/usr/bin/true");
        std::env::set_var("FAL_API_URL", "http://127.0.0.1:1");
        Engine::new(Settings::with_storage_dir(
            "test-key",
            root.path().join("storage"),
            root.path(),
        ))
        .expect("engine")
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let root = TempDir::new().unwrap();
        let engine = test_engine(&root);

        let err = engine.get_job_status("ghost").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::NotFound);

        let err = engine.cancel_job("ghost").await.unwrap_err();
        assert_eq!(err.kind, AgentErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_cancel_reports_terminal_state() {
        let root = TempDir::new().unwrap();
        let engine = test_engine(&root);

        let job_id = engine
            .queue()
            .create(
                vforge_queue::TaskKind::Music,
                "lyria2",
                serde_json::json!({}),
                None,
                None,
                serde_json::Map::new(),
            )
            .await;

        let first = engine.cancel_job(job_id.as_str()).await.unwrap();
        assert!(first.cancelled);
        assert_eq!(first.status, JobStatus::Cancelled);

        let second = engine.cancel_job(job_id.as_str()).await.unwrap();
        assert!(!second.cancelled);
        assert_eq!(second.status, JobStatus::Cancelled);
    }
}
