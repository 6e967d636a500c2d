use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Downloading,
    Analyzing,
    Merging,
    Uploading,
    Completed,
    Failed,
}

impl JobState {
    /// Whether the job has reached a state it can never leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One merge submission and its observable lifecycle. Records live in the
/// in-process registry for the process lifetime and are mutated only by the
/// task that owns the job id; the HTTP layer reads cloned snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeJob {
    pub id: String,
    pub state: JobState,
    /// Overall progress percentage in the 0-100 range. Non-decreasing for
    /// the lifetime of the job; frozen at its last value on failure.
    pub progress: u8,
    pub message: String,
    /// Destination key the merged output is (or would be) uploaded to.
    pub output_key: String,
    /// Failure detail, present only once the job has entered `failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated submit payload handed from the HTTP layer to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub bucket: String,
    pub chunk_prefix: String,
    pub output_key: String,
}

/// One recorded fragment discovered under the chunk prefix.
///
/// `local_path` is populated once the object has been downloaded into the
/// job workspace and `duration_seconds` once the file has been probed; both
/// share the lifetime of the job's temp directory.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub key: String,
    pub capture_instant_ms: i64,
    pub duration_seconds: f64,
    pub local_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Chunk,
    Gap,
}

/// An element of the merge plan: either a real chunk or synthesized filler
/// covering a detected gap. `source_path` points at the downloaded chunk for
/// chunk segments and is filled in by the materializer for gaps.
#[derive(Debug, Clone)]
pub struct TimelineSegment {
    pub kind: SegmentKind,
    pub source_path: Option<PathBuf>,
    /// Offset from the timeline origin (the first chunk's capture instant).
    pub start_second: f64,
    pub duration_seconds: f64,
}

/// Audio parameters of the reference profile, present iff the first chunk
/// carries an audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioProfile {
    pub codec_name: String,
    pub sample_rate_hz: u32,
    pub channel_count: u32,
}

/// Reference codec/resolution/frame-rate parameters, probed exactly once
/// per job from the first chunk in timestamp order and read-only after.
/// Every materialized segment is encoded to these parameters so the final
/// stream-copy concatenation is legal.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub video_codec_name: String,
    pub audio: Option<AudioProfile>,
}

impl VideoProfile {
    /// Frame rate rounded to the nearest whole number, as passed to the
    /// encoder for both normalized chunks and gap filler. Never below 1.
    pub fn integer_frame_rate(&self) -> u32 {
        let rounded = self.frame_rate.round();
        if rounded < 1.0 { 1 } else { rounded as u32 }
    }
}
