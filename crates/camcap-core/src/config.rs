use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,

    // Poll loop
    pub poll_timeout: Duration,
    pub poll_idle_delay: Duration,
    pub poll_error_backoff: Duration,

    // Persisted state
    pub offset_file: PathBuf,

    // Capture
    pub capture_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub camera_input_format: String,
    pub camera_device: String,
    pub video_duration: Duration,

    // Motion detection
    pub motion_sample_interval: Duration,
    pub motion_cooldown: Duration,
    pub motion_threshold: f32,
    pub motion_pixel_delta: u8,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        // The bot token is the only hard requirement: nothing can proceed
        // without it, so a missing credential fails the whole startup.
        let telegram_bot_token = resolve_bot_token()?;

        let poll_timeout = Duration::from_secs(env_u64("CAMCAP_POLL_TIMEOUT_SECS").unwrap_or(25));
        let poll_idle_delay =
            Duration::from_millis(env_u64("CAMCAP_IDLE_DELAY_MS").unwrap_or(1000));
        let poll_error_backoff =
            Duration::from_secs(env_u64("CAMCAP_ERROR_BACKOFF_SECS").unwrap_or(10));

        let offset_file = env_path("CAMCAP_OFFSET_FILE")
            .unwrap_or_else(|| PathBuf::from("camcap-offset.json"));

        let capture_dir =
            env_path("CAMCAP_CAPTURE_DIR").unwrap_or_else(|| PathBuf::from("captures"));
        let ffmpeg_path = env_path("CAMCAP_FFMPEG_PATH")
            .or_else(|| which_in_path("ffmpeg"))
            .unwrap_or_else(|| PathBuf::from("/usr/bin/ffmpeg"));
        let camera_input_format =
            env_str("CAMCAP_CAMERA_INPUT_FORMAT").unwrap_or_else(|| "v4l2".to_string());
        let camera_device =
            env_str("CAMCAP_CAMERA_DEVICE").unwrap_or_else(|| "/dev/video0".to_string());
        let video_duration = Duration::from_secs(
            env_u64("CAMCAP_VIDEO_DURATION_SECS").unwrap_or(5).clamp(1, 60),
        );

        let motion_sample_interval =
            Duration::from_millis(env_u64("CAMCAP_MOTION_INTERVAL_MS").unwrap_or(1000));
        let motion_cooldown =
            Duration::from_secs(env_u64("CAMCAP_MOTION_COOLDOWN_SECS").unwrap_or(10));
        let motion_threshold = env_f32("CAMCAP_MOTION_THRESHOLD")
            .unwrap_or(0.08)
            .clamp(0.0, 1.0);
        let motion_pixel_delta = env_u8("CAMCAP_MOTION_PIXEL_DELTA").unwrap_or(25);

        Ok(Self {
            telegram_bot_token,
            poll_timeout,
            poll_idle_delay,
            poll_error_backoff,
            offset_file,
            capture_dir,
            ffmpeg_path,
            camera_input_format,
            camera_device,
            video_duration,
            motion_sample_interval,
            motion_cooldown,
            motion_threshold,
            motion_pixel_delta,
        })
    }
}

fn resolve_bot_token() -> Result<String> {
    if let Some(token) = env_str("TELEGRAM_BOT_TOKEN").and_then(non_empty) {
        return Ok(token.trim().to_string());
    }
    if let Some(path) = env_path("TELEGRAM_BOT_TOKEN_FILE") {
        return read_token_file(&path);
    }
    Err(Error::Credential(
        "TELEGRAM_BOT_TOKEN or TELEGRAM_BOT_TOKEN_FILE is required".to_string(),
    ))
}

/// Reads the first line of a token file. The deployment convention keeps the
/// token alone in a dedicated file.
fn read_token_file(path: &Path) -> Result<String> {
    let contents = fs::read_to_string(path).map_err(|e| {
        Error::Credential(format!(
            "unable to read bot token from {}: {e}",
            path.display()
        ))
    })?;
    let token = contents.lines().next().unwrap_or("").trim().to_string();
    if token.is_empty() {
        return Err(Error::Credential(format!(
            "bot token file {} is empty",
            path.display()
        )));
    }
    Ok(token)
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let Some((key, val)) = parse_env_line(raw) else {
            continue;
        };
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(&key, val);
    }
}

fn parse_env_line(raw: &str) -> Option<(String, String)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (k, v) = line.split_once('=')?;
    let key = k.trim();
    if key.is_empty() {
        return None;
    }

    let mut val = v.trim().to_string();
    // Strip optional surrounding quotes.
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        val = val[1..val.len() - 1].to_string();
    }

    Some((key.to_string(), val))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u8(key: &str) -> Option<u8> {
    env_str(key).and_then(|s| s.trim().parse::<u8>().ok())
}

fn env_f32(key: &str) -> Option<f32> {
    env_str(key).and_then(|s| s.trim().parse::<f32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn which_in_path(binary: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    for dir in env::split_paths(&path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}
