use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::merge_core::domain::{JobState, MergeJob};
use crate::merge_core::settings::AppSettings;
use crate::merge_core::storage::ObjectStore;
use crate::sync_ext::MutexExt;

/// Shared engine internals. The registry is written only by the task that
/// owns each job id; readers always get a fully written clone taken under
/// the lock, so no intermediate state is ever observable.
pub(crate) struct Inner {
    pub(crate) settings: AppSettings,
    pub(crate) store: ObjectStore,
    pub(crate) jobs: Mutex<HashMap<String, MergeJob>>,
}

impl Inner {
    pub(crate) fn new(settings: AppSettings) -> Self {
        let store = ObjectStore::new(settings.aws_region.clone());
        Self {
            settings,
            store,
            jobs: Mutex::new(HashMap::new()),
        }
    }
}

pub(crate) fn insert_job(inner: &Inner, job: MergeJob) {
    let mut jobs = inner.jobs.lock_unpoisoned();
    jobs.insert(job.id.clone(), job);
}

/// Apply a mutation to one job and stamp `updated_at`.
pub(crate) fn update_job(inner: &Inner, job_id: &str, apply: impl FnOnce(&mut MergeJob)) {
    let mut jobs = inner.jobs.lock_unpoisoned();
    if let Some(job) = jobs.get_mut(job_id) {
        apply(job);
        job.updated_at = Utc::now();
    }
}

/// Advance a job to a new phase. Progress is clamped to be non-decreasing:
/// a job's reported progress never moves backwards, whatever order the
/// pipeline's bookkeeping lands in.
pub(crate) fn advance_job(
    inner: &Inner,
    job_id: &str,
    state: JobState,
    progress: u8,
    message: &str,
) {
    update_job(inner, job_id, |job| {
        job.state = state;
        job.progress = job.progress.max(progress.min(100));
        job.message = message.to_string();
    });
}

pub(crate) fn job_snapshot(inner: &Inner, job_id: &str) -> Option<MergeJob> {
    let jobs = inner.jobs.lock_unpoisoned();
    jobs.get(job_id).cloned()
}

/// All jobs, newest submissions first.
pub(crate) fn jobs_snapshot_sorted(inner: &Inner) -> Vec<MergeJob> {
    let jobs = inner.jobs.lock_unpoisoned();
    let mut all: Vec<MergeJob> = jobs.values().cloned().collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    all
}

#[cfg(test)]
pub(crate) fn test_job(id: &str) -> MergeJob {
    let now = Utc::now();
    MergeJob {
        id: id.to_string(),
        state: JobState::Queued,
        progress: 0,
        message: "Merge job queued".to_string(),
        output_key: "merged/out.mp4".to_string(),
        error: None,
        created_at: now,
        updated_at: now,
    }
}
