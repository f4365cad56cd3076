//! Shared fakes for core tests.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    domain::{ChatId, MotionEvent, Update, UpdateId},
    ports::{CapturePort, MessagingPort, MotionEventSource},
    Error, Result,
};

pub fn update(id: i64, chat: i64, text: &str) -> Update {
    Update {
        id: UpdateId(id),
        chat_id: ChatId(chat),
        text: text.to_string(),
    }
}

/// Polls `cond` for up to a second, panicking on timeout. Used to observe
/// work done by spawned tasks.
pub async fn wait_for(cond: impl Fn() -> bool) {
    for _ in 0..100 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 1s");
}

#[derive(Default)]
pub struct FakeMessenger {
    batches: Mutex<VecDeque<Result<Vec<Update>>>>,
    fetched_offsets: Mutex<Vec<i64>>,
    messages: Mutex<Vec<(ChatId, String)>>,
    photos: Mutex<Vec<(ChatId, PathBuf)>>,
    videos: Mutex<Vec<(ChatId, PathBuf)>>,
    fail_sends: AtomicBool,
}

impl FakeMessenger {
    pub fn push_batch(&self, batch: Result<Vec<Update>>) {
        self.batches.lock().unwrap().push_back(batch);
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fetched_offsets(&self) -> Vec<i64> {
        self.fetched_offsets.lock().unwrap().clone()
    }

    pub fn sent_messages(&self) -> Vec<(ChatId, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn sent_photos(&self) -> Vec<(ChatId, PathBuf)> {
        self.photos.lock().unwrap().clone()
    }

    pub fn sent_videos(&self) -> Vec<(ChatId, PathBuf)> {
        self.videos.lock().unwrap().clone()
    }

    fn check_sends(&self) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("send failed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.fetched_offsets.lock().unwrap().push(offset);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.check_sends()?;
        self.messages
            .lock()
            .unwrap()
            .push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, file: &Path) -> Result<()> {
        self.check_sends()?;
        self.photos
            .lock()
            .unwrap()
            .push((chat_id, file.to_path_buf()));
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, file: &Path) -> Result<()> {
        self.check_sends()?;
        self.videos
            .lock()
            .unwrap()
            .push((chat_id, file.to_path_buf()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCapture {
    image_calls: Mutex<Vec<ChatId>>,
    video_calls: Mutex<Vec<ChatId>>,
    stored_frames: Mutex<Vec<(ChatId, Vec<u8>)>>,
    frame_attempts: AtomicUsize,
    fail_captures: AtomicBool,
    fail_frames: AtomicBool,
}

impl FakeCapture {
    pub fn set_fail_captures(&self, fail: bool) {
        self.fail_captures.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_frames(&self, fail: bool) {
        self.fail_frames.store(fail, Ordering::SeqCst);
    }

    pub fn image_calls(&self) -> Vec<ChatId> {
        self.image_calls.lock().unwrap().clone()
    }

    pub fn video_calls(&self) -> Vec<ChatId> {
        self.video_calls.lock().unwrap().clone()
    }

    pub fn stored_frames(&self) -> Vec<(ChatId, Vec<u8>)> {
        self.stored_frames.lock().unwrap().clone()
    }

    pub fn frame_attempts(&self) -> usize {
        self.frame_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CapturePort for FakeCapture {
    async fn capture_image(&self, chat_id: ChatId) -> Result<PathBuf> {
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(Error::Capture("camera unavailable".to_string()));
        }
        self.image_calls.lock().unwrap().push(chat_id);
        Ok(PathBuf::from(format!("captures/{}/image.jpg", chat_id.0)))
    }

    async fn capture_video(&self, chat_id: ChatId) -> Result<PathBuf> {
        if self.fail_captures.load(Ordering::SeqCst) {
            return Err(Error::Capture("camera unavailable".to_string()));
        }
        self.video_calls.lock().unwrap().push(chat_id);
        Ok(PathBuf::from(format!("captures/{}/video.mp4", chat_id.0)))
    }

    async fn store_frame(&self, chat_id: ChatId, frame: &[u8]) -> Result<PathBuf> {
        self.frame_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_frames.load(Ordering::SeqCst) {
            return Err(Error::Capture("disk full".to_string()));
        }
        self.stored_frames
            .lock()
            .unwrap()
            .push((chat_id, frame.to_vec()));
        Ok(PathBuf::from(format!("captures/{}/frame.jpg", chat_id.0)))
    }
}

#[derive(Default)]
pub struct FakeMotionSource {
    tx: Mutex<Option<mpsc::Sender<MotionEvent>>>,
    subscribes: AtomicUsize,
    unsubscribes: AtomicUsize,
    fail_subscribe: AtomicBool,
}

impl FakeMotionSource {
    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.load(Ordering::SeqCst)
    }

    /// Pushes an event into the live subscription, if any. Returns whether
    /// the event was accepted.
    pub async fn emit(&self, frame: Vec<u8>) -> bool {
        let tx = self.tx.lock().unwrap().clone();
        match tx {
            Some(tx) => tx.send(MotionEvent { frame }).await.is_ok(),
            None => false,
        }
    }

    /// Simulates the detector dying: the event stream ends without an
    /// unsubscribe.
    pub fn kill_stream(&self) {
        *self.tx.lock().unwrap() = None;
    }
}

#[async_trait]
impl MotionEventSource for FakeMotionSource {
    async fn subscribe(&self) -> Result<mpsc::Receiver<MotionEvent>> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(Error::Capture("detector unavailable".to_string()));
        }
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(8);
        *self.tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.unsubscribes.fetch_add(1, Ordering::SeqCst);
        *self.tx.lock().unwrap() = None;
        Ok(())
    }
}
