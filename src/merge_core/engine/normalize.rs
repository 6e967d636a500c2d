use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use super::ffmpeg::run_encoder;
use crate::merge_core::domain::VideoProfile;

/// Wall-clock deadline for re-encoding a single chunk.
pub(crate) const NORMALIZE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Re-encode one downloaded chunk to the reference profile.
///
/// Every chunk is forced through the encoder even when it already appears
/// uniform: the concat step stream-copies and requires byte-identical codec
/// parameters across inputs. The output is trimmed to the segment's
/// effective duration, which is what enforces the budget on disk.
pub(crate) async fn normalize_chunk(
    ffmpeg_path: &Path,
    input: &Path,
    output: &Path,
    profile: &VideoProfile,
    duration_seconds: f64,
) -> Result<()> {
    let args = normalize_args(input, output, profile, duration_seconds);
    run_encoder(ffmpeg_path, &args, NORMALIZE_TIMEOUT, "chunk normalization").await
}

/// Synthesize black (and, when the profile has audio, silent) filler for a
/// gap, encoded with the same parameters as normalized chunks.
pub(crate) async fn synthesize_gap(
    ffmpeg_path: &Path,
    output: &Path,
    profile: &VideoProfile,
    duration_seconds: f64,
) -> Result<()> {
    let args = gap_args(output, profile, duration_seconds);
    run_encoder(ffmpeg_path, &args, NORMALIZE_TIMEOUT, "gap synthesis").await
}

fn normalize_args(
    input: &Path,
    output: &Path,
    profile: &VideoProfile,
    duration_seconds: f64,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        profile.video_codec_name.clone(),
        "-s".to_string(),
        format!("{}x{}", profile.width, profile.height),
        "-r".to_string(),
        profile.integer_frame_rate().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];
    match &profile.audio {
        Some(audio) => {
            args.push("-c:a".to_string());
            args.push(audio.codec_name.clone());
            args.push("-ar".to_string());
            args.push(audio.sample_rate_hz.to_string());
            args.push("-ac".to_string());
            args.push(audio.channel_count.to_string());
        }
        None => args.push("-an".to_string()),
    }
    args.push("-t".to_string());
    args.push(format_seconds(duration_seconds));
    args.push(output.to_string_lossy().into_owned());
    args
}

fn gap_args(output: &Path, profile: &VideoProfile, duration_seconds: f64) -> Vec<String> {
    let duration = format_seconds(duration_seconds);
    let mut args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        format!(
            "color=c=black:s={}x{}:r={}:d={}",
            profile.width,
            profile.height,
            profile.integer_frame_rate(),
            duration
        ),
    ];
    if let Some(audio) = &profile.audio {
        let layout = if audio.channel_count == 1 { "mono" } else { "stereo" };
        args.push("-f".to_string());
        args.push("lavfi".to_string());
        args.push("-i".to_string());
        args.push(format!(
            "anullsrc=channel_layout={layout}:sample_rate={}",
            audio.sample_rate_hz
        ));
    }
    args.push("-c:v".to_string());
    args.push(profile.video_codec_name.clone());
    args.push("-pix_fmt".to_string());
    args.push("yuv420p".to_string());
    if let Some(audio) = &profile.audio {
        args.push("-c:a".to_string());
        args.push(audio.codec_name.clone());
        args.push("-ac".to_string());
        args.push(audio.channel_count.to_string());
    }
    args.push("-t".to_string());
    args.push(duration);
    args.push(output.to_string_lossy().into_owned());
    args
}

fn format_seconds(seconds: f64) -> String {
    format!("{seconds:.3}")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::merge_core::domain::AudioProfile;

    fn profile_with_audio() -> VideoProfile {
        VideoProfile {
            width: 1280,
            height: 720,
            frame_rate: 29.97,
            video_codec_name: "h264".to_string(),
            audio: Some(AudioProfile {
                codec_name: "aac".to_string(),
                sample_rate_hz: 44_100,
                channel_count: 2,
            }),
        }
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    }

    #[test]
    fn normalization_targets_the_reference_profile() {
        let args = normalize_args(
            &PathBuf::from("/job/chunks/0001.webm"),
            &PathBuf::from("/job/normalized/chunk_0001.mp4"),
            &profile_with_audio(),
            12.5,
        );

        assert_eq!(window(&args, "-c:v").as_deref(), Some("h264"));
        assert_eq!(window(&args, "-s").as_deref(), Some("1280x720"));
        assert_eq!(window(&args, "-r").as_deref(), Some("30"));
        assert_eq!(window(&args, "-pix_fmt").as_deref(), Some("yuv420p"));
        assert_eq!(window(&args, "-c:a").as_deref(), Some("aac"));
        assert_eq!(window(&args, "-ar").as_deref(), Some("44100"));
        assert_eq!(window(&args, "-ac").as_deref(), Some("2"));
        assert_eq!(window(&args, "-t").as_deref(), Some("12.500"));
        assert_eq!(args.last().map(String::as_str), Some("/job/normalized/chunk_0001.mp4"));
    }

    #[test]
    fn normalization_drops_audio_for_silent_profiles() {
        let mut profile = profile_with_audio();
        profile.audio = None;
        let args = normalize_args(
            &PathBuf::from("in.mp4"),
            &PathBuf::from("out.mp4"),
            &profile,
            5.0,
        );
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn gap_filler_matches_the_profile() {
        let args = gap_args(&PathBuf::from("/job/gaps/gap_0000.mp4"), &profile_with_audio(), 10.0);

        let color = window(&args, "-i").unwrap();
        assert!(color.contains("color=c=black"));
        assert!(color.contains("s=1280x720"));
        assert!(color.contains("r=30"));
        assert!(color.contains("d=10.000"));
        assert!(args.iter().any(|a| a.contains("anullsrc")));
        assert!(args.iter().any(|a| a.contains("channel_layout=stereo")));
        assert!(args.iter().any(|a| a.contains("sample_rate=44100")));
        assert_eq!(window(&args, "-t").as_deref(), Some("10.000"));
    }

    #[test]
    fn mono_profiles_get_mono_silence() {
        let mut profile = profile_with_audio();
        profile.audio.as_mut().unwrap().channel_count = 1;
        let args = gap_args(&PathBuf::from("gap.mp4"), &profile, 2.0);
        assert!(args.iter().any(|a| a.contains("channel_layout=mono")));
        assert_eq!(window(&args, "-ac").as_deref(), Some("1"));
    }

    #[test]
    fn video_only_gaps_carry_no_audio_input() {
        let mut profile = profile_with_audio();
        profile.audio = None;
        let args = gap_args(&PathBuf::from("gap.mp4"), &profile, 2.0);
        assert!(!args.iter().any(|a| a.contains("anullsrc")));
        assert!(!args.contains(&"-c:a".to_string()));
    }
}
