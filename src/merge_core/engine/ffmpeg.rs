use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;

/// Bound kept on captured stderr so a chatty encoder cannot balloon the
/// job's error text.
const STDERR_TAIL_BYTES: usize = 2048;

/// Spawn the encoder and wait for it under a wall-clock deadline.
///
/// A non-zero exit surfaces the stderr tail; overrunning the deadline kills
/// the child (the process handle is dropped with kill-on-drop set) and
/// fails with the phase name.
pub(crate) async fn run_encoder(
    ffmpeg_path: &Path,
    args: &[String],
    deadline: Duration,
    phase: &'static str,
) -> Result<()> {
    tracing::info!(
        phase,
        command = %render_command_line(ffmpeg_path, args),
        "spawning encoder"
    );

    let child = Command::new(ffmpeg_path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {} for {phase}", ffmpeg_path.display()))?;

    let waited = tokio::time::timeout(deadline, child.wait_with_output()).await;
    let output = match waited {
        Err(_elapsed) => bail!("exceeded the {}s deadline", deadline.as_secs()),
        Ok(result) => result.with_context(|| format!("failed waiting on {phase} encoder"))?,
    };

    if !output.status.success() {
        bail!(
            "encoder exited with {}: {}",
            output.status,
            stderr_tail(&output.stderr)
        );
    }
    Ok(())
}

/// Human-pasteable rendering of the exact invocation, quoted where needed.
pub(crate) fn render_command_line(program: &Path, args: &[String]) -> String {
    let mut line = quote_argument(&program.to_string_lossy());
    for arg in args {
        line.push(' ');
        line.push_str(&quote_argument(arg));
    }
    line
}

fn quote_argument(arg: &str) -> String {
    if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        format!("\"{}\"", arg.replace('"', "\\\""))
    } else {
        arg.to_string()
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    if trimmed.len() <= STDERR_TAIL_BYTES {
        return trimmed.to_string();
    }
    let start = trimmed.len() - STDERR_TAIL_BYTES;
    // Avoid slicing mid-codepoint.
    let start = (start..trimmed.len())
        .find(|i| trimmed.is_char_boundary(*i))
        .unwrap_or(start);
    format!("…{}", &trimmed[start..])
}
