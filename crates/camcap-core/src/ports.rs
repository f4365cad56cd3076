use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatId, MotionEvent, Update},
    Result,
};

/// Messaging gateway port (Telegram today).
///
/// `get_updates` long-polls for updates with ids >= `offset`; implementations
/// map all wire failures to [`Error::Transport`](crate::Error::Transport) so
/// the poll loop can retry them uniformly.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>>;
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()>;
    async fn send_photo(&self, chat_id: ChatId, file: &Path) -> Result<()>;
    async fn send_video(&self, chat_id: ChatId, file: &Path) -> Result<()>;
}

/// Capture gateway port. Artifacts are written to chat-scoped storage and
/// returned as paths, not raw bytes.
#[async_trait]
pub trait CapturePort: Send + Sync {
    async fn capture_image(&self, chat_id: ChatId) -> Result<PathBuf>;
    async fn capture_video(&self, chat_id: ChatId) -> Result<PathBuf>;

    /// Persist an already-captured frame (the one that triggered a motion
    /// event) into the chat's capture directory.
    async fn store_frame(&self, chat_id: ChatId, frame: &[u8]) -> Result<PathBuf>;
}

/// Push interface for motion events.
///
/// At most one live subscription exists at a time; `subscribe` replaces any
/// previous one. The returned channel closing without an `unsubscribe` means
/// the detector died.
#[async_trait]
pub trait MotionEventSource: Send + Sync {
    async fn subscribe(&self) -> Result<mpsc::Receiver<MotionEvent>>;
    async fn unsubscribe(&self) -> Result<()>;
}
