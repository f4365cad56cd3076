use std::sync::Arc;

use teloxide::Bot;
use tracing::info;

use camcap_camera::{FfmpegCamera, FrameDiffDetector};
use camcap_core::{
    config::Config,
    dispatch::CommandDispatcher,
    motion::MotionSession,
    offset::OffsetStore,
    poller::UpdatePoller,
    ports::{CapturePort, MessagingPort, MotionEventSource},
};
use camcap_telegram::TelegramMessenger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    camcap_core::logging::init("camcap")?;

    // Credential and startup-persistence failures are the only fatal paths;
    // everything past this point retries or reports instead of exiting.
    let cfg = Arc::new(Config::load()?);

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(
        bot,
        cfg.poll_timeout.as_secs() as u32,
    ));

    let camera = Arc::new(FfmpegCamera::new(cfg.clone()));
    let detector: Arc<dyn MotionEventSource> =
        Arc::new(FrameDiffDetector::new(cfg.clone(), camera.clone()));
    let capture: Arc<dyn CapturePort> = camera;

    let motion = MotionSession::new(detector, capture.clone(), messenger.clone());
    let dispatcher = CommandDispatcher::new(messenger.clone(), capture, motion);

    let store = OffsetStore::new(cfg.offset_file.clone());
    let offset = store.load()?;
    info!(offset, device = %cfg.camera_device, "camcap started");

    UpdatePoller::new(messenger, dispatcher, store, offset)
        .with_intervals(cfg.poll_idle_delay, cfg.poll_error_backoff)
        .run()
        .await;

    Ok(())
}
