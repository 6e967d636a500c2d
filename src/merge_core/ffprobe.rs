use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio::process::Command;

use super::domain::{AudioProfile, VideoProfile};

/// Probe the container duration in seconds.
///
/// Fails when the container reports no (or a non-positive) duration; a
/// chunk without a measurable duration cannot be placed on the timeline.
pub async fn probe_duration_seconds(ffprobe_path: &Path, source: &Path) -> Result<f64> {
    let output = Command::new(ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=nw=1:nk=1")
        .arg(source.as_os_str())
        .output()
        .await
        .with_context(|| format!("failed to run ffprobe for duration on {}", source.display()))?;

    if !output.status.success() {
        bail!(
            "ffprobe failed for {}: {}",
            source.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    duration_from_stdout(&String::from_utf8_lossy(&output.stdout))
}

fn duration_from_stdout(stdout: &str) -> Result<f64> {
    let first = stdout.lines().next().unwrap_or_default().trim();
    let duration: f64 = first
        .parse()
        .with_context(|| format!("container reports no duration (got {first:?})"))?;
    if !(duration > 0.0) {
        bail!("container reports no duration (got {first:?})");
    }
    Ok(duration)
}

/// Probe the reference profile from the first video stream and the first
/// audio stream (if any). Fails when the file has no video stream.
pub async fn probe_profile(ffprobe_path: &Path, source: &Path) -> Result<VideoProfile> {
    let output = Command::new(ffprobe_path)
        .arg("-v")
        .arg("error")
        .arg("-print_format")
        .arg("json")
        .arg("-show_streams")
        .arg(source.as_os_str())
        .output()
        .await
        .with_context(|| format!("failed to run ffprobe for profile on {}", source.display()))?;

    if !output.status.success() {
        bail!(
            "ffprobe failed for {}: {}",
            source.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let probed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("failed to parse ffprobe output for {}", source.display()))?;
    profile_from_streams(probed)
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

fn profile_from_streams(probed: FfprobeOutput) -> Result<VideoProfile> {
    let video = probed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .context("no video track")?;
    let audio = probed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoProfile {
        width: video.width.unwrap_or(1920),
        height: video.height.unwrap_or(1080),
        frame_rate: video
            .avg_frame_rate
            .as_deref()
            .and_then(parse_rational_rate)
            .or_else(|| video.r_frame_rate.as_deref().and_then(parse_rational_rate))
            .unwrap_or(30.0),
        video_codec_name: video
            .codec_name
            .clone()
            .unwrap_or_else(|| "h264".to_string()),
        audio: audio.map(|stream| AudioProfile {
            codec_name: stream
                .codec_name
                .clone()
                .unwrap_or_else(|| "aac".to_string()),
            sample_rate_hz: stream
                .sample_rate
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(48_000),
            channel_count: stream.channels.unwrap_or(2),
        }),
    })
}

/// Parse a `num/den` frame-rate literal; `den` must be positive.
fn parse_rational_rate(rate: &str) -> Option<f64> {
    let (num, den) = rate.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if den > 0.0 { Some(num / den) } else { None }
}
