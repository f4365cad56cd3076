//! Per-update command dispatch.

use std::sync::Arc;

use tracing::warn;

use crate::{
    commands::{self, Command},
    domain::ChatId,
    motion::MotionSession,
    ports::{CapturePort, MessagingPort},
    Error, Result,
};

/// Translates one update into exactly one action.
///
/// Capture failures are reported to the requesting chat instead of
/// propagating; the errors that do escape (transport) are logged by the
/// poller without aborting the rest of the batch.
pub struct CommandDispatcher {
    messenger: Arc<dyn MessagingPort>,
    capture: Arc<dyn CapturePort>,
    motion: MotionSession,
}

impl CommandDispatcher {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        capture: Arc<dyn CapturePort>,
        motion: MotionSession,
    ) -> Self {
        Self {
            messenger,
            capture,
            motion,
        }
    }

    pub async fn dispatch(&self, chat_id: ChatId, raw_text: &str) -> Result<()> {
        let normalized = commands::normalize(raw_text);
        if normalized.is_empty() {
            // Non-text updates occupy offset slots but carry no command.
            return Ok(());
        }

        match Command::parse(&normalized) {
            Some(Command::CaptureImage) => self.send_image(chat_id).await,
            Some(Command::CaptureVideo) => self.send_video(chat_id).await,
            Some(Command::MotionOn) => self.motion_on(chat_id).await,
            Some(Command::MotionOff) => {
                self.motion.stop().await;
                self.messenger
                    .send_message(chat_id, "Motion detection off")
                    .await
            }
            None => self.messenger.send_message(chat_id, commands::HELP_TEXT).await,
        }
    }

    async fn send_image(&self, chat_id: ChatId) -> Result<()> {
        self.messenger
            .send_message(chat_id, "Sending image...")
            .await?;
        match self.capture.capture_image(chat_id).await {
            Ok(path) => self.messenger.send_photo(chat_id, &path).await,
            Err(Error::Capture(reason)) => {
                warn!(chat_id = chat_id.0, "image capture failed: {}", reason);
                self.messenger
                    .send_message(chat_id, "Unable to capture image, camera unavailable.")
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn send_video(&self, chat_id: ChatId) -> Result<()> {
        self.messenger
            .send_message(chat_id, "Sending video...")
            .await?;
        match self.capture.capture_video(chat_id).await {
            Ok(path) => self.messenger.send_video(chat_id, &path).await,
            Err(Error::Capture(reason)) => {
                warn!(chat_id = chat_id.0, "video capture failed: {}", reason);
                self.messenger
                    .send_message(chat_id, "Unable to capture video, camera unavailable.")
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn motion_on(&self, chat_id: ChatId) -> Result<()> {
        match self.motion.start(chat_id).await {
            Ok(()) => {
                self.messenger
                    .send_message(chat_id, "Motion detection on")
                    .await
            }
            Err(Error::Capture(reason)) => {
                warn!(chat_id = chat_id.0, "motion start failed: {}", reason);
                self.messenger
                    .send_message(chat_id, "Unable to start motion detection, camera unavailable.")
                    .await
            }
            Err(e) => Err(e),
        }
    }
}
