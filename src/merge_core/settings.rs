use std::env;
use std::path::PathBuf;

/// Runtime configuration, sourced from the environment at startup.
///
/// Object-store credentials are deliberately absent: the SDK picks them up
/// from the ambient credential chain (environment, profile, instance role).
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// HTTP listening port (`PORT`).
    pub port: u16,
    /// Object-store region (`AWS_REGION`).
    pub aws_region: String,
    /// Encoder binary (`FFMPEG_PATH`), resolved via PATH when relative.
    pub ffmpeg_path: PathBuf,
    /// Probe binary (`FFPROBE_PATH`), resolved via PATH when relative.
    pub ffprobe_path: PathBuf,
    /// Root under which each job gets its own working directory (`TEMP_DIR`).
    pub temp_root: PathBuf,
    /// Hard cap on the reconstructed timeline length
    /// (`MAX_MERGE_DURATION_MINUTES`).
    pub merge_budget_minutes: u64,
    /// Inter-chunk skew below this is treated as recorder jitter, not a gap.
    /// Fixed per run.
    pub gap_threshold_seconds: f64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            port: 3000,
            aws_region: "us-east-1".to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            temp_root: PathBuf::from("/tmp/video-merger"),
            merge_budget_minutes: 60,
            gap_threshold_seconds: 0.5,
        }
    }
}

impl AppSettings {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset or unparseable. Unparseable values are logged and
    /// ignored rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: env_parsed("PORT", defaults.port),
            aws_region: env_string("AWS_REGION", defaults.aws_region),
            ffmpeg_path: env_path("FFMPEG_PATH", defaults.ffmpeg_path),
            ffprobe_path: env_path("FFPROBE_PATH", defaults.ffprobe_path),
            temp_root: env_path("TEMP_DIR", defaults.temp_root),
            merge_budget_minutes: env_parsed(
                "MAX_MERGE_DURATION_MINUTES",
                defaults.merge_budget_minutes,
            ),
            gap_threshold_seconds: defaults.gap_threshold_seconds,
        }
    }

    pub fn budget_seconds(&self) -> f64 {
        self.merge_budget_minutes as f64 * 60.0
    }
}

fn env_string(name: &str, default: String) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default,
    }
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default,
    }
}

fn env_parsed<T: std::str::FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(%name, %value, "ignoring unparseable environment value");
                default
            }
        },
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Environment mutation is process-global; serialize the tests that do it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear(names: &[&str]) {
        for name in names {
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn defaults_match_the_documented_contract() {
        let settings = AppSettings::default();
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.aws_region, "us-east-1");
        assert_eq!(settings.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(settings.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(settings.temp_root, PathBuf::from("/tmp/video-merger"));
        assert_eq!(settings.merge_budget_minutes, 60);
        assert_eq!(settings.budget_seconds(), 3600.0);
        assert_eq!(settings.gap_threshold_seconds, 0.5);
    }

    #[test]
    fn from_env_reads_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            env::set_var("PORT", "8080");
            env::set_var("AWS_REGION", "eu-west-1");
            env::set_var("FFMPEG_PATH", "/opt/ffmpeg/bin/ffmpeg");
            env::set_var("TEMP_DIR", "/var/tmp/merges");
            env::set_var("MAX_MERGE_DURATION_MINUTES", "90");
        }

        let settings = AppSettings::from_env();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.aws_region, "eu-west-1");
        assert_eq!(settings.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(settings.temp_root, PathBuf::from("/var/tmp/merges"));
        assert_eq!(settings.merge_budget_minutes, 90);

        clear(&[
            "PORT",
            "AWS_REGION",
            "FFMPEG_PATH",
            "TEMP_DIR",
            "MAX_MERGE_DURATION_MINUTES",
        ]);
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            env::set_var("PORT", "not-a-port");
            env::set_var("MAX_MERGE_DURATION_MINUTES", "soon");
        }

        let settings = AppSettings::from_env();
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.merge_budget_minutes, 60);

        clear(&["PORT", "MAX_MERGE_DURATION_MINUTES"]);
    }
}
