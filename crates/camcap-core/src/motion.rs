//! Motion-watch session lifecycle.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    domain::{ChatId, MotionEvent},
    ports::{CapturePort, MessagingPort, MotionEventSource},
    Result,
};

/// Process-wide owner of the single motion-watch subscription.
///
/// All lifecycle transitions go through one async mutex, and the event pump
/// re-checks its binding under that same mutex before sending anything, so a
/// `stop` or retarget racing an in-flight event can never route a
/// notification to a stale or cleared target.
#[derive(Clone)]
pub struct MotionSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    source: Arc<dyn MotionEventSource>,
    capture: Arc<dyn CapturePort>,
    messenger: Arc<dyn MessagingPort>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    target: Option<ChatId>,
    pump_cancel: Option<CancellationToken>,
}

impl MotionSession {
    pub fn new(
        source: Arc<dyn MotionEventSource>,
        capture: Arc<dyn CapturePort>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                source,
                capture,
                messenger,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Binds motion detection to `chat_id`, atomically replacing any
    /// previous target. A repeated start for the already-bound chat is a
    /// no-op.
    pub async fn start(&self, chat_id: ChatId) -> Result<()> {
        let mut state = self.inner.state.lock().await;
        if state.target == Some(chat_id) {
            return Ok(());
        }

        // Tear down the previous subscription before rebinding; the event
        // source is not assumed to tolerate double-subscription.
        if let Some(cancel) = state.pump_cancel.take() {
            cancel.cancel();
        }
        if state.target.take().is_some() {
            if let Err(e) = self.inner.source.unsubscribe().await {
                warn!("unable to unsubscribe previous motion listener: {}", e);
            }
        }

        let events = self.inner.source.subscribe().await?;
        let cancel = CancellationToken::new();
        state.target = Some(chat_id);
        state.pump_cancel = Some(cancel.clone());
        tokio::spawn(pump(self.inner.clone(), chat_id, events, cancel));

        info!(chat_id = chat_id.0, "motion detection started");
        Ok(())
    }

    /// Stops motion detection. Safe to call when already inactive.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(cancel) = state.pump_cancel.take() {
            cancel.cancel();
        }
        if state.target.take().is_some() {
            if let Err(e) = self.inner.source.unsubscribe().await {
                warn!("unable to unsubscribe motion listener: {}", e);
            }
            info!("motion detection stopped");
        }
    }

    /// Currently bound chat, if a session is active.
    pub async fn active_target(&self) -> Option<ChatId> {
        self.inner.state.lock().await.target
    }
}

/// Drains motion events for the chat bound at spawn time. Exits when
/// cancelled or when the detector stream ends; a stream that dies on its own
/// clears the session.
async fn pump(
    inner: Arc<SessionInner>,
    chat_id: ChatId,
    mut events: mpsc::Receiver<MotionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => match event {
                Some(event) => handle_event(&inner, chat_id, event).await,
                None => break,
            },
        }
    }

    // Stream ended without an explicit stop/retarget: detector failure.
    if !cancel.is_cancelled() {
        let mut state = inner.state.lock().await;
        if state.target == Some(chat_id) {
            state.target = None;
            state.pump_cancel = None;
            warn!(chat_id = chat_id.0, "motion event stream ended, session cleared");
        }
    }
}

async fn handle_event(inner: &Arc<SessionInner>, chat_id: ChatId, event: MotionEvent) {
    // An event may already be in flight when the session is stopped or
    // retargeted; it must be dropped, not delivered to the old chat.
    if inner.state.lock().await.target != Some(chat_id) {
        return;
    }

    let path = match inner.capture.store_frame(chat_id, &event.frame).await {
        Ok(path) => path,
        Err(e) => {
            warn!(chat_id = chat_id.0, "unable to store motion frame: {}", e);
            return;
        }
    };
    if let Err(e) = inner.messenger.send_message(chat_id, "Motion detected!").await {
        warn!(chat_id = chat_id.0, "unable to send motion notification: {}", e);
    }
    if let Err(e) = inner.messenger.send_photo(chat_id, &path).await {
        warn!(chat_id = chat_id.0, "unable to send motion capture: {}", e);
    }
}
