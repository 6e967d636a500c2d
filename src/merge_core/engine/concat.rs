use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use super::ffmpeg::run_encoder;

/// Wall-clock deadline for the final stream-copy concatenation.
pub(crate) const CONCAT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Concatenate the materialized segment files into the final container.
///
/// Inputs must already share codec parameters exactly (the materializer
/// guarantees this); the demuxer stream-copies them and relocates the moov
/// atom to the front for progressive playback.
pub(crate) async fn concat_segments(
    ffmpeg_path: &Path,
    manifest_path: &Path,
    inputs: &[PathBuf],
    output: &Path,
) -> Result<()> {
    write_manifest(manifest_path, inputs)?;
    let args = concat_args(manifest_path, output);
    run_encoder(ffmpeg_path, &args, CONCAT_TIMEOUT, "concat").await
}

/// Write the concat-demuxer manifest: one entry per input, in timeline
/// order, regardless of where the files live on disk.
pub(crate) fn write_manifest(manifest_path: &Path, inputs: &[PathBuf]) -> Result<()> {
    let mut manifest = String::new();
    for input in inputs {
        manifest.push_str(&manifest_entry(input));
        manifest.push('\n');
    }
    std::fs::write(manifest_path, manifest)
        .with_context(|| format!("failed to write {}", manifest_path.display()))
}

fn manifest_entry(path: &Path) -> String {
    // The demuxer reads single-quoted paths; embedded quotes close the
    // string, emit an escaped quote, and reopen it.
    let escaped = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{escaped}'")
}

fn concat_args(manifest_path: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest_path.to_string_lossy().into_owned(),
        "-c".to_string(),
        "copy".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}
