//! Frame-differencing motion detector.

use std::sync::Arc;

use async_trait::async_trait;
use image::GrayImage;
use tokio::sync::{mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use camcap_core::{
    config::Config,
    domain::MotionEvent,
    ports::MotionEventSource,
    Result,
};

use crate::FfmpegCamera;

const EVENT_QUEUE_DEPTH: usize = 8;
const MAX_SAMPLE_FAILURES: u32 = 5;

/// Motion event source that samples the camera at a fixed interval and
/// compares consecutive frames. A frame whose changed-pixel fraction exceeds
/// the configured threshold is pushed to the subscriber, followed by a
/// cooldown so one burst of motion does not flood the chat.
pub struct FrameDiffDetector {
    cfg: Arc<Config>,
    camera: Arc<FfmpegCamera>,
    state: Mutex<Option<CancellationToken>>,
}

impl FrameDiffDetector {
    pub fn new(cfg: Arc<Config>, camera: Arc<FfmpegCamera>) -> Self {
        Self {
            cfg,
            camera,
            state: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MotionEventSource for FrameDiffDetector {
    async fn subscribe(&self) -> Result<mpsc::Receiver<MotionEvent>> {
        let mut state = self.state.lock().await;

        // Replace any live sampling loop; two loops would race on the camera
        // device.
        if let Some(prev) = state.take() {
            prev.cancel();
        }

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let cancel = CancellationToken::new();
        tokio::spawn(sample_loop(
            self.cfg.clone(),
            self.camera.clone(),
            tx,
            cancel.clone(),
        ));
        *state = Some(cancel);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<()> {
        if let Some(cancel) = self.state.lock().await.take() {
            cancel.cancel();
        }
        Ok(())
    }
}

async fn sample_loop(
    cfg: Arc<Config>,
    camera: Arc<FfmpegCamera>,
    tx: mpsc::Sender<MotionEvent>,
    cancel: CancellationToken,
) {
    let mut previous: Option<GrayImage> = None;
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(cfg.motion_sample_interval) => {}
        }

        let frame = match camera.grab_frame().await {
            Ok(frame) => {
                consecutive_failures = 0;
                frame
            }
            Err(e) => {
                consecutive_failures += 1;
                warn!(consecutive_failures, "motion sampling failed: {}", e);
                if consecutive_failures >= MAX_SAMPLE_FAILURES {
                    // Returning drops `tx`; the closed stream tells the
                    // session the detector is gone.
                    warn!("camera unreachable, stopping motion sampling");
                    return;
                }
                continue;
            }
        };

        let current = match image::load_from_memory(&frame) {
            Ok(img) => img.to_luma8(),
            Err(e) => {
                warn!("undecodable frame: {}", e);
                continue;
            }
        };

        let score = previous
            .as_ref()
            .map(|prev| motion_score(prev, &current, cfg.motion_pixel_delta));
        previous = Some(current);

        let Some(score) = score else { continue };
        if score < cfg.motion_threshold {
            continue;
        }

        debug!(score = %score, "motion detected");
        if tx.send(MotionEvent { frame }).await.is_err() {
            // Subscriber went away.
            return;
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep(cfg.motion_cooldown) => {}
        }
        // Re-baseline after the pause so the settled scene becomes the new
        // reference.
        previous = None;
    }
}

/// Fraction of pixels whose luma changed by more than `pixel_delta`.
/// Differently sized frames count as full change (device reconfigured).
fn motion_score(prev: &GrayImage, next: &GrayImage, pixel_delta: u8) -> f32 {
    if prev.dimensions() != next.dimensions() {
        return 1.0;
    }
    let total = prev.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let changed = prev
        .as_raw()
        .iter()
        .zip(next.as_raw())
        .filter(|&(a, b)| a.abs_diff(*b) > pixel_delta)
        .count();
    changed as f32 / total as f32
}
