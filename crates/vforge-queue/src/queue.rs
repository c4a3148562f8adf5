//! The generation queue scheduler.
//!
//! Every long-running provider call goes through here: `submit` returns a
//! job id immediately while a spawned worker drives the request against
//! the provider, feeding status/log/progress updates into the job record
//! and invoking the registered completion hook on terminal success.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use vforge_fal::{FalClient, QueueEvent};
use vforge_models::{ProjectId, SceneId};

use crate::error::{QueueError, QueueResult};
use crate::hooks::CompletionHook;
use crate::job::{GenerationJob, JobId, JobStatus, TaskKind};

const DEFAULT_WAIT_POLL: Duration = Duration::from_secs(2);

#[derive(Default)]
struct QueueInner {
    jobs: HashMap<JobId, GenerationJob>,
    /// Cancellation signals for running workers
    active: HashMap<JobId, watch::Sender<bool>>,
}

/// Aggregate queue statistics.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_kind: BTreeMap<String, usize>,
    /// Jobs currently queued or in progress
    pub active_count: usize,
    pub average_wait_secs: f64,
    pub average_processing_secs: f64,
}

/// In-process job queue and scheduler.
///
/// All mutations to the job map and the active-worker map are serialized
/// by a single mutex with short critical sections; provider I/O happens
/// outside the lock and re-acquires it per write.
pub struct GenerationQueue {
    inner: Mutex<QueueInner>,
    hooks: std::sync::RwLock<HashMap<TaskKind, Arc<dyn CompletionHook>>>,
    fal: FalClient,
}

impl GenerationQueue {
    /// Create a queue backed by the given provider client.
    pub fn new(fal: FalClient) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            hooks: std::sync::RwLock::new(HashMap::new()),
            fal,
        }
    }

    /// Register the completion hook for a task kind.
    ///
    /// Called once at startup by the composition root, before any job runs.
    pub fn register_hook(&self, kind: TaskKind, hook: Arc<dyn CompletionHook>) {
        if let Ok(mut hooks) = self.hooks.write() {
            hooks.insert(kind, hook);
        }
    }

    /// Create a job record without starting it.
    pub async fn create(
        &self,
        task_kind: TaskKind,
        model: impl Into<String>,
        arguments: Value,
        project_id: Option<ProjectId>,
        scene_id: Option<SceneId>,
        metadata: Map<String, Value>,
    ) -> JobId {
        let job = GenerationJob::new(task_kind, model, arguments, project_id, scene_id, metadata);
        let id = job.id.clone();
        self.inner.lock().await.jobs.insert(id.clone(), job);
        id
    }

    /// Create a job and start its worker. Returns immediately.
    pub async fn submit(
        self: &Arc<Self>,
        task_kind: TaskKind,
        model: impl Into<String>,
        arguments: Value,
        project_id: Option<ProjectId>,
        scene_id: Option<SceneId>,
        metadata: Map<String, Value>,
    ) -> JobId {
        let id = self
            .create(task_kind, model, arguments, project_id, scene_id, metadata)
            .await;
        self.start(&id).await;
        id
    }

    /// Spawn the worker for an already-created job.
    pub async fn start(self: &Arc<Self>, job_id: &JobId) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.inner
            .lock()
            .await
            .active
            .insert(job_id.clone(), cancel_tx);

        let queue = Arc::clone(self);
        let job_id = job_id.clone();
        tokio::spawn(async move {
            queue.drive(job_id, cancel_rx).await;
        });
    }

    /// Get a snapshot of a job.
    pub async fn get(&self, job_id: &JobId) -> Option<GenerationJob> {
        self.inner.lock().await.jobs.get(job_id).cloned()
    }

    /// List jobs, newest first, optionally filtered.
    pub async fn list(
        &self,
        project_id: Option<&ProjectId>,
        status_filter: Option<&[JobStatus]>,
    ) -> Vec<GenerationJob> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<GenerationJob> = inner
            .jobs
            .values()
            .filter(|j| project_id.map_or(true, |p| j.project_id.as_ref() == Some(p)))
            .filter(|j| status_filter.map_or(true, |f| f.contains(&j.status)))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Cancel a job. Idempotent: returns false for unknown or terminal jobs.
    ///
    /// The worker is stopped cooperatively; no attempt is made to cancel
    /// the remote request, so provider charges may still accrue.
    pub async fn cancel(&self, job_id: &JobId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                job.error_message = Some("Task cancelled by user".to_string());
            }
            _ => return false,
        }
        if let Some(tx) = inner.active.remove(job_id) {
            let _ = tx.send(true);
        }
        info!(job_id = %job_id, "job cancelled");
        true
    }

    /// Aggregate statistics over all tracked jobs.
    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;

        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for status in [
            JobStatus::Queued,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            by_status.insert(status.as_str().to_string(), 0);
        }
        let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut active_count = 0;
        let mut wait_total = 0.0;
        let mut processing_total = 0.0;
        let mut completed = 0usize;

        for job in inner.jobs.values() {
            *by_status.entry(job.status.as_str().to_string()).or_insert(0) += 1;
            *by_kind.entry(job.task_kind.as_str().to_string()).or_insert(0) += 1;
            if matches!(job.status, JobStatus::Queued | JobStatus::InProgress) {
                active_count += 1;
            }
            if job.status == JobStatus::Completed {
                completed += 1;
                wait_total += job.wait_secs().unwrap_or(0.0);
                processing_total += job.processing_secs().unwrap_or(0.0);
            }
        }

        QueueStats {
            total: inner.jobs.len(),
            by_status,
            by_kind,
            active_count,
            average_wait_secs: if completed > 0 {
                wait_total / completed as f64
            } else {
                0.0
            },
            average_processing_secs: if completed > 0 {
                processing_total / completed as f64
            } else {
                0.0
            },
        }
    }

    /// Watch the local job record until it reaches a terminal state.
    ///
    /// This polls the in-memory record only; it never shortens or contacts
    /// the worker.
    pub async fn wait(
        &self,
        job_id: &JobId,
        timeout: Option<Duration>,
        poll: Option<Duration>,
    ) -> QueueResult<Value> {
        let poll = poll.unwrap_or(DEFAULT_WAIT_POLL);
        let started = tokio::time::Instant::now();

        loop {
            let job = self
                .get(job_id)
                .await
                .ok_or_else(|| QueueError::job_not_found(job_id))?;

            match job.status {
                JobStatus::Completed => return Ok(job.result.unwrap_or(Value::Null)),
                JobStatus::Failed => {
                    return Err(QueueError::JobFailed(
                        job.error_message.unwrap_or_else(|| "unknown error".to_string()),
                    ))
                }
                JobStatus::Cancelled => return Err(QueueError::JobCancelled),
                JobStatus::Queued | JobStatus::InProgress => {}
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(QueueError::WaitTimeout(limit));
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Evict terminal jobs older than the threshold. Returns the count.
    pub async fn cleanup(&self, age_hours: i64) -> usize {
        let cutoff = Utc::now() - ChronoDuration::hours(age_hours);
        let mut inner = self.inner.lock().await;
        let before = inner.jobs.len();
        inner
            .jobs
            .retain(|_, job| !(job.status.is_terminal() && job.created_at < cutoff));
        let removed = before - inner.jobs.len();
        if removed > 0 {
            debug!(removed, "evicted old terminal jobs");
        }
        removed
    }

    /// Apply a mutation to a non-terminal job. Terminal records are
    /// never overwritten, which keeps per-job status monotonic.
    async fn update_job<F>(&self, job_id: &JobId, mutate: F) -> bool
    where
        F: FnOnce(&mut GenerationJob),
    {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                mutate(job);
                true
            }
            _ => false,
        }
    }

    /// Background worker: drive one job to a terminal state.
    async fn drive(self: Arc<Self>, job_id: JobId, mut cancel: watch::Receiver<bool>) {
        let outcome = self.run_to_completion(&job_id, &mut cancel).await;

        match outcome {
            Ok(Some(result)) => {
                self.update_job(&job_id, |job| {
                    job.status = JobStatus::Completed;
                    job.progress = Some(100.0);
                    job.completed_at = Some(Utc::now());
                    job.result = Some(result.clone());
                })
                .await;
                info!(job_id = %job_id, "job completed");
                self.dispatch_hook(&job_id, &result).await;
            }
            Ok(None) => {
                // Cancelled; `cancel` already recorded the terminal state.
                debug!(job_id = %job_id, "worker stopped by cancellation");
            }
            Err(e) => {
                self.update_job(&job_id, |job| {
                    job.status = JobStatus::Failed;
                    job.completed_at = Some(Utc::now());
                    job.error_message = Some(e.to_string());
                })
                .await;
                warn!(job_id = %job_id, "job failed: {e}");
            }
        }

        self.inner.lock().await.active.remove(&job_id);
    }

    /// Submit to the provider and consume its event stream.
    ///
    /// Returns `Ok(None)` when cancelled. Cancellation is checked at every
    /// suspension point; none of them sit inside a critical section.
    async fn run_to_completion(
        &self,
        job_id: &JobId,
        cancel: &mut watch::Receiver<bool>,
    ) -> QueueResult<Option<Value>> {
        let (model, arguments) = {
            let inner = self.inner.lock().await;
            let job = inner
                .jobs
                .get(job_id)
                .ok_or_else(|| QueueError::job_not_found(job_id))?;
            (job.model.clone(), job.arguments.clone())
        };

        let handle = tokio::select! {
            _ = cancelled(cancel) => return Ok(None),
            submitted = self.fal.submit(&model, &arguments) => submitted?,
        };

        let request_id = handle.request_id.clone();
        self.update_job(job_id, |job| job.request_id = request_id.clone())
            .await;

        let mut events = Box::pin(handle.events());
        loop {
            let next = tokio::select! {
                _ = cancelled(cancel) => return Ok(None),
                event = events.next() => event,
            };
            let Some(event) = next else { break };

            match event? {
                QueueEvent::Queued { position } => {
                    self.update_job(job_id, |job| {
                        job.status = JobStatus::Queued;
                        job.queue_position = position;
                    })
                    .await;
                }
                QueueEvent::InProgress { logs, progress } => {
                    self.update_job(job_id, |job| {
                        job.status = JobStatus::InProgress;
                        if job.started_at.is_none() {
                            job.started_at = Some(Utc::now());
                        }
                        if let Some(progress) = progress {
                            job.progress = Some(progress);
                        }
                        job.logs.extend(logs);
                    })
                    .await;
                }
                QueueEvent::Completed { logs } => {
                    self.update_job(job_id, |job| job.logs.extend(logs)).await;
                    let result = tokio::select! {
                        _ = cancelled(cancel) => return Ok(None),
                        result = handle.result() => result?,
                    };
                    return Ok(Some(result));
                }
            }
        }

        Err(QueueError::JobFailed(
            "provider event stream ended before completion".to_string(),
        ))
    }

    /// Invoke the registered hook for the job's task kind.
    ///
    /// Hook errors are logged and swallowed; the job stays completed.
    async fn dispatch_hook(&self, job_id: &JobId, result: &Value) {
        let Some(job) = self.get(job_id).await else {
            return;
        };
        let hook = self
            .hooks
            .read()
            .ok()
            .and_then(|hooks| hooks.get(&job.task_kind).cloned());

        if let Some(hook) = hook {
            if let Err(e) = hook.on_completed(&job, result).await {
                warn!(
                    job_id = %job_id,
                    task_kind = job.task_kind.as_str(),
                    "post-completion hook failed: {e}"
                );
            }
        }
    }
}

/// Resolve once the cancellation flag is raised.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender dropped without cancelling; never resolves.
            if *rx.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}
