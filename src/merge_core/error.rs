use thiserror::Error;

/// Fatal job failures, one variant per failure class the pipeline can hit.
/// Nothing is retried; every variant converges on temp-directory removal
/// and a `failed` job record whose error text is this error's display form.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no video chunks found under prefix {prefix}")]
    EmptyPrefix { prefix: String },

    #[error("cannot parse capture timestamp from chunk key {key}")]
    Timestamp { key: String },

    /// Object-store list/download/upload failure, propagated verbatim.
    #[error("{source:#}")]
    Storage { source: anyhow::Error },

    /// Local workspace filesystem failure (temp directories, manifests).
    #[error("{source:#}")]
    Workspace { source: anyhow::Error },

    #[error("probe failed for {path}: {source:#}")]
    Probe { path: String, source: anyhow::Error },

    /// Normalization or gap synthesis exited non-zero or overran its
    /// deadline; `phase` names which.
    #[error("{phase} failed: {source:#}")]
    Encoder {
        phase: &'static str,
        source: anyhow::Error,
    },

    #[error("concat failed: {source:#}")]
    Concat { source: anyhow::Error },
}
