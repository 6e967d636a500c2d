//! video-merger: reconstructs one continuous, progressively playable video
//! from timestamp-named chunks in object storage, exposed as pollable
//! asynchronous merge jobs over a small HTTP API.
pub mod http;
pub mod merge_core;
pub(crate) mod sync_ext;

pub use merge_core::domain::{JobState, MergeJob, MergeRequest};
pub use merge_core::engine::MergeEngine;
pub use merge_core::error::MergeError;
pub use merge_core::settings::AppSettings;
