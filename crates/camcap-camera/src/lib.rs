//! Camera adapters.
//!
//! [`FfmpegCamera`] implements the capture gateway by driving an `ffmpeg`
//! subprocess against the configured camera device; [`FrameDiffDetector`]
//! implements the motion event source by sampling that same backend and
//! scoring frame-to-frame change. The camera hardware itself stays behind
//! ffmpeg; this crate never touches the device directly.

mod detector;

pub use detector::FrameDiffDetector;

use std::{
    path::PathBuf,
    process::Stdio,
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Local;
use tokio::process::Command;

use camcap_core::{config::Config, domain::ChatId, ports::CapturePort, Error, Result};

const STDERR_TAIL_MAX_CHARS: usize = 500;

/// Capture gateway backed by an `ffmpeg` subprocess.
///
/// Artifacts land under `<capture_dir>/<chat_id>/<timestamp>.<ext>`, and the
/// returned path is what gets handed to the messaging gateway.
pub struct FfmpegCamera {
    cfg: Arc<Config>,
}

impl FfmpegCamera {
    pub fn new(cfg: Arc<Config>) -> Self {
        Self { cfg }
    }

    async fn chat_dir(&self, chat_id: ChatId) -> Result<PathBuf> {
        let dir = self.cfg.capture_dir.join(chat_id.0.to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::Capture(format!("unable to create {}: {e}", dir.display())))?;
        Ok(dir)
    }

    fn artifact_name(ext: &str) -> String {
        format!("{}.{ext}", Local::now().format("%Y%m%d-%H-%M-%S%.3f"))
    }

    fn input_args(&self) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            self.cfg.camera_input_format.clone(),
            "-i".to_string(),
            self.cfg.camera_device.clone(),
        ]
    }

    async fn run_ffmpeg(&self, args: &[String]) -> Result<()> {
        let output = Command::new(&self.cfg.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::Capture(format!(
                    "unable to run {}: {e}",
                    self.cfg.ffmpeg_path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(Error::Capture(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        Ok(())
    }

    /// Grabs one encoded frame into memory. Used by the motion detector,
    /// which wants pixels rather than files.
    pub(crate) async fn grab_frame(&self) -> Result<Vec<u8>> {
        let mut args = self.input_args();
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2".to_string(),
            "-".to_string(),
        ]);

        let output = Command::new(&self.cfg.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                Error::Capture(format!(
                    "unable to run {}: {e}",
                    self.cfg.ffmpeg_path.display()
                ))
            })?;

        if !output.status.success() {
            return Err(Error::Capture(format!(
                "frame grab failed: {}",
                stderr_tail(&output.stderr)
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Capture("frame grab produced no data".to_string()));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl CapturePort for FfmpegCamera {
    async fn capture_image(&self, chat_id: ChatId) -> Result<PathBuf> {
        let path = self.chat_dir(chat_id).await?.join(Self::artifact_name("jpg"));
        let mut args = self.input_args();
        args.extend([
            "-frames:v".to_string(),
            "1".to_string(),
            "-y".to_string(),
            path.display().to_string(),
        ]);
        self.run_ffmpeg(&args).await?;
        Ok(path)
    }

    async fn capture_video(&self, chat_id: ChatId) -> Result<PathBuf> {
        let path = self.chat_dir(chat_id).await?.join(Self::artifact_name("mp4"));
        let mut args = self.input_args();
        args.extend([
            "-t".to_string(),
            self.cfg.video_duration.as_secs().to_string(),
            "-y".to_string(),
            path.display().to_string(),
        ]);
        self.run_ffmpeg(&args).await?;
        Ok(path)
    }

    async fn store_frame(&self, chat_id: ChatId, frame: &[u8]) -> Result<PathBuf> {
        let path = self.chat_dir(chat_id).await?.join(Self::artifact_name("jpg"));
        tokio::fs::write(&path, frame)
            .await
            .map_err(|e| Error::Capture(format!("unable to write {}: {e}", path.display())))?;
        Ok(path)
    }
}

/// Last part of a subprocess stderr, bounded so errors stay loggable.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let trimmed = text.trim();
    match trimmed.char_indices().rev().nth(STDERR_TAIL_MAX_CHARS - 1) {
        Some((idx, _)) => format!("...{}", &trimmed[idx..]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use camcap_core::ports::CapturePort;
    use std::path::Path;
    use std::time::Duration;

    pub(crate) fn test_config(dir: &Path) -> Config {
        Config {
            telegram_bot_token: "123456:test".to_string(),
            poll_timeout: Duration::from_secs(1),
            poll_idle_delay: Duration::from_millis(10),
            poll_error_backoff: Duration::from_millis(10),
            offset_file: dir.join("offset.json"),
            capture_dir: dir.join("captures"),
            ffmpeg_path: PathBuf::from("/nonexistent/ffmpeg"),
            camera_input_format: "v4l2".to_string(),
            camera_device: "/dev/video0".to_string(),
            video_duration: Duration::from_secs(1),
            motion_sample_interval: Duration::from_millis(5),
            motion_cooldown: Duration::from_millis(5),
            motion_threshold: 0.5,
            motion_pixel_delta: 25,
        }
    }

    #[tokio::test]
    async fn stored_frames_land_in_the_chat_directory() {
        let dir = tempfile::tempdir().unwrap();
        let camera = FfmpegCamera::new(Arc::new(test_config(dir.path())));

        let path = camera.store_frame(ChatId(42), &[1, 2, 3]).await.unwrap();

        assert!(path.starts_with(dir.path().join("captures").join("42")));
        assert_eq!(path.extension().unwrap(), "jpg");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_a_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = FfmpegCamera::new(Arc::new(test_config(dir.path())));

        let err = camera.capture_image(ChatId(1)).await.unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
    }

    #[test]
    fn stderr_tail_is_bounded() {
        let long = "x".repeat(10_000);
        let tail = stderr_tail(long.as_bytes());
        assert!(tail.len() <= STDERR_TAIL_MAX_CHARS + 3);
        assert!(tail.starts_with("..."));

        assert_eq!(stderr_tail(b" short \n"), "short");
    }
}
