//! Merge job engine: a facade over shared state (`state`), the per-job
//! pipeline (`job_runner`) and its encoder helpers (`ffmpeg`, `normalize`,
//! `concat`).
mod concat;
mod ffmpeg;
mod job_runner;
mod normalize;
mod state;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::domain::{JobState, MergeJob, MergeRequest};
use super::settings::AppSettings;
use state::Inner;

/// The merge engine facade. Cheap to clone and share with the HTTP layer;
/// all state lives behind an `Arc`.
#[derive(Clone)]
pub struct MergeEngine {
    inner: Arc<Inner>,
}

impl MergeEngine {
    /// Create an engine. No object-store connection is made here; the
    /// client is built lazily by the first job that needs it.
    pub fn new(settings: AppSettings) -> Self {
        Self {
            inner: Arc::new(Inner::new(settings)),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.inner.settings
    }

    /// Register a merge job and start it on its own background task.
    /// Returns immediately with the queued job snapshot.
    pub fn submit_merge_job(&self, request: MergeRequest) -> MergeJob {
        let now = Utc::now();
        let job = MergeJob {
            id: Uuid::new_v4().to_string(),
            state: JobState::Queued,
            progress: 0,
            message: "Merge job queued".to_string(),
            output_key: request.output_key.clone(),
            error: None,
            created_at: now,
            updated_at: now,
        };
        state::insert_job(&self.inner, job.clone());

        tracing::info!(
            job_id = %job.id,
            bucket = %request.bucket,
            prefix = %request.chunk_prefix,
            output_key = %request.output_key,
            "merge job submitted"
        );
        tokio::spawn(job_runner::run_merge_job(
            self.inner.clone(),
            job.id.clone(),
            request,
        ));
        job
    }

    /// Snapshot of a single job.
    pub fn job(&self, job_id: &str) -> Option<MergeJob> {
        state::job_snapshot(&self.inner, job_id)
    }

    /// Snapshot of all jobs, newest first.
    pub fn jobs(&self) -> Vec<MergeJob> {
        state::jobs_snapshot_sorted(&self.inner)
    }
}
