//! Core merge pipeline: object-store access, chunk ordering, probing,
//! timeline planning, segment materialization and the job engine that
//! drives them (`domain`, `storage`, `timestamp`, `timeline`, `ffprobe`,
//! `engine`).
pub mod domain;
pub mod engine;
pub mod error;
pub mod ffprobe;
pub mod settings;
pub mod storage;
pub mod timeline;
pub mod timestamp;

pub use domain::{JobState, MergeJob, MergeRequest};
pub use engine::MergeEngine;
pub use error::MergeError;
pub use settings::AppSettings;
