use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};

use super::concat::concat_segments;
use super::normalize::{normalize_chunk, synthesize_gap};
use super::state::{advance_job, update_job, Inner};
use crate::merge_core::domain::{
    JobState, MergeRequest, SegmentKind, SourceChunk, TimelineSegment, VideoProfile,
};
use crate::merge_core::error::MergeError;
use crate::merge_core::ffprobe::{probe_duration_seconds, probe_profile};
use crate::merge_core::timeline::build_timeline;
use crate::merge_core::timestamp::parse_capture_instant;

/// Drive one merge job end to end on its own task. Every exit path,
/// success or failure, removes the job's temp directory before the record
/// is marked terminal.
pub(crate) async fn run_merge_job(inner: Arc<Inner>, job_id: String, request: MergeRequest) {
    let job_dir = inner.settings.temp_root.join(&job_id);
    let outcome = execute(&inner, &job_id, &request, &job_dir).await;
    finish_job(&inner, &job_id, &job_dir, outcome);
}

/// Terminal bookkeeping shared by all exit paths: unconditional temp-dir
/// removal, then the final record update. On failure the progress value is
/// left frozen where the pipeline stopped.
pub(crate) fn finish_job(
    inner: &Inner,
    job_id: &str,
    job_dir: &Path,
    outcome: Result<(), MergeError>,
) {
    if job_dir.exists() {
        if let Err(error) = std::fs::remove_dir_all(job_dir) {
            tracing::warn!(
                job_id,
                dir = %job_dir.display(),
                %error,
                "failed to remove job temp directory"
            );
        }
    }

    match outcome {
        Ok(()) => {
            tracing::info!(job_id, "merge job completed");
            advance_job(inner, job_id, JobState::Completed, 100, "Merge completed");
        }
        Err(error) => {
            tracing::error!(job_id, error = %error, "merge job failed");
            update_job(inner, job_id, |job| {
                job.state = JobState::Failed;
                job.message = "Merge failed".to_string();
                job.error = Some(error.to_string());
            });
        }
    }
}

async fn execute(
    inner: &Inner,
    job_id: &str,
    request: &MergeRequest,
    job_dir: &Path,
) -> Result<(), MergeError> {
    let settings = &inner.settings;

    // Discover and order the chunks.
    advance_job(inner, job_id, JobState::Downloading, 5, "Listing chunks");
    let keys = inner
        .store
        .list_video_keys(&request.bucket, &request.chunk_prefix)
        .await
        .map_err(|source| MergeError::Storage { source })?;
    if keys.is_empty() {
        return Err(MergeError::EmptyPrefix {
            prefix: request.chunk_prefix.clone(),
        });
    }
    advance_job(
        inner,
        job_id,
        JobState::Downloading,
        10,
        &format!("Found {} chunks", keys.len()),
    );

    let mut chunks = Vec::with_capacity(keys.len());
    for key in keys {
        let capture_instant_ms = parse_capture_instant(&key)?;
        chunks.push(SourceChunk {
            key,
            capture_instant_ms,
            duration_seconds: 0.0,
            local_path: None,
        });
    }
    // Stable sort: chunks with identical instants keep listing order.
    chunks.sort_by_key(|chunk| chunk.capture_instant_ms);

    // Download in timestamp order.
    let total = chunks.len();
    let chunks_dir = job_dir.join("chunks");
    for (index, chunk) in chunks.iter_mut().enumerate() {
        let dest = chunks_dir.join(format!("{index:04}.{}", chunk_extension(&chunk.key)));
        inner
            .store
            .download_to(&request.bucket, &chunk.key, &dest)
            .await
            .map_err(|source| MergeError::Storage { source })?;
        chunk.local_path = Some(dest);
        advance_job(
            inner,
            job_id,
            JobState::Downloading,
            download_progress(index + 1, total),
            &format!("Downloaded chunk {}/{total}", index + 1),
        );
    }

    // Probe durations in the same order, then the reference profile from
    // the first chunk.
    advance_job(inner, job_id, JobState::Analyzing, 40, "Probing chunk durations");
    for (index, chunk) in chunks.iter_mut().enumerate() {
        let path = local_path(chunk)?;
        chunk.duration_seconds = probe_duration_seconds(&settings.ffprobe_path, &path)
            .await
            .map_err(|source| MergeError::Probe {
                path: path.display().to_string(),
                source,
            })?;
        advance_job(
            inner,
            job_id,
            JobState::Analyzing,
            probe_progress(index + 1, total),
            &format!("Probed chunk {}/{total}", index + 1),
        );
    }

    let first_path = local_path(&chunks[0])?;
    let profile = probe_profile(&settings.ffprobe_path, &first_path)
        .await
        .map_err(|source| MergeError::Probe {
            path: first_path.display().to_string(),
            source,
        })?;
    tracing::info!(
        job_id,
        width = profile.width,
        height = profile.height,
        frame_rate = profile.frame_rate,
        video_codec = %profile.video_codec_name,
        has_audio = profile.audio.is_some(),
        "reference profile probed"
    );

    // Plan the timeline.
    advance_job(inner, job_id, JobState::Merging, 55, "Building merge timeline");
    let timeline = build_timeline(
        &chunks,
        settings.gap_threshold_seconds,
        settings.budget_seconds(),
    );
    let gap_count = timeline
        .iter()
        .filter(|s| s.kind == SegmentKind::Gap)
        .count();
    advance_job(
        inner,
        job_id,
        JobState::Merging,
        60,
        &format!(
            "Timeline has {} segments ({gap_count} gaps)",
            timeline.len()
        ),
    );

    // Materialize every segment in timeline order.
    advance_job(inner, job_id, JobState::Merging, 65, "Normalizing segments");
    let inputs = materialize_timeline(inner, job_id, job_dir, &timeline, &profile).await?;

    // Concatenate into the final container.
    let manifest_path = job_dir.join("concat_list.txt");
    let output_path = job_dir.join("merged_output.mp4");
    concat_segments(&settings.ffmpeg_path, &manifest_path, &inputs, &output_path)
        .await
        .map_err(|source| MergeError::Concat { source })?;

    // Upload the result.
    advance_job(inner, job_id, JobState::Uploading, 90, "Uploading merged output");
    inner
        .store
        .upload_file(&request.bucket, &request.output_key, &output_path, "video/mp4")
        .await
        .map_err(|source| MergeError::Storage { source })?;

    Ok(())
}

async fn materialize_timeline(
    inner: &Inner,
    job_id: &str,
    job_dir: &Path,
    timeline: &[TimelineSegment],
    profile: &VideoProfile,
) -> Result<Vec<PathBuf>, MergeError> {
    let settings = &inner.settings;
    let normalized_dir = job_dir.join("normalized");
    let gaps_dir = job_dir.join("gaps");
    for dir in [&normalized_dir, &gaps_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create {}", dir.display()))
            .map_err(|source| MergeError::Workspace { source })?;
    }

    // Zero-length segments never reach the encoder: a frameless output
    // would make the concat demuxer fail.
    let producible = timeline
        .iter()
        .filter(|s| s.duration_seconds > 0.0)
        .count();
    let mut inputs = Vec::with_capacity(producible);
    let mut chunk_seq = 0usize;
    let mut gap_seq = 0usize;

    for segment in timeline {
        if segment.duration_seconds <= 0.0 {
            continue;
        }
        let output = match segment.kind {
            SegmentKind::Chunk => {
                let input = segment.source_path.clone().ok_or_else(|| {
                    MergeError::Encoder {
                        phase: "chunk normalization",
                        source: anyhow!("chunk segment has no downloaded file"),
                    }
                })?;
                let output = normalized_dir.join(format!("chunk_{chunk_seq:04}.mp4"));
                chunk_seq += 1;
                normalize_chunk(
                    &settings.ffmpeg_path,
                    &input,
                    &output,
                    profile,
                    segment.duration_seconds,
                )
                .await
                .map_err(|source| MergeError::Encoder {
                    phase: "chunk normalization",
                    source,
                })?;
                output
            }
            SegmentKind::Gap => {
                let output = gaps_dir.join(format!("gap_{gap_seq:04}.mp4"));
                gap_seq += 1;
                synthesize_gap(
                    &settings.ffmpeg_path,
                    &output,
                    profile,
                    segment.duration_seconds,
                )
                .await
                .map_err(|source| MergeError::Encoder {
                    phase: "gap synthesis",
                    source,
                })?;
                output
            }
        };
        inputs.push(output);
        advance_job(
            inner,
            job_id,
            JobState::Merging,
            materialize_progress(inputs.len(), producible),
            &format!("Materialized segment {}/{producible}", inputs.len()),
        );
    }

    Ok(inputs)
}

fn local_path(chunk: &SourceChunk) -> Result<PathBuf, MergeError> {
    chunk
        .local_path
        .clone()
        .ok_or_else(|| MergeError::Probe {
            path: chunk.key.clone(),
            source: anyhow!("chunk was never downloaded"),
        })
}

/// Extension the downloaded copy keeps so probe and encoder see the
/// container the recorder produced.
fn chunk_extension(key: &str) -> String {
    key.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

fn download_progress(done: usize, total: usize) -> u8 {
    10 + span_progress(done, total, 30)
}

fn probe_progress(done: usize, total: usize) -> u8 {
    40 + span_progress(done, total, 15)
}

fn materialize_progress(done: usize, total: usize) -> u8 {
    (65 + span_progress(done, total, 25)).min(90)
}

fn span_progress(done: usize, total: usize, span: u8) -> u8 {
    if total == 0 {
        return span;
    }
    ((done as f64 / total as f64) * span as f64).round() as u8
}
