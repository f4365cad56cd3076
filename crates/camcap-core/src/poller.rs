//! The update-poll/dispatch loop.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    dispatch::CommandDispatcher, domain::Update, offset::OffsetStore, ports::MessagingPort,
    Result,
};

/// The single authoritative driver of the system.
///
/// Each iteration fetches updates at the current offset, dispatches them in
/// arrival order and only then advances and persists the cursor. A crash
/// between dispatch and persist re-delivers the batch on restart
/// (at-least-once); persisting earlier would instead risk silently dropping
/// the tail of a batch, which is the worse trade.
pub struct UpdatePoller {
    messenger: Arc<dyn MessagingPort>,
    dispatcher: CommandDispatcher,
    store: OffsetStore,
    offset: i64,
    idle_delay: Duration,
    error_backoff: Duration,
}

impl UpdatePoller {
    pub fn new(
        messenger: Arc<dyn MessagingPort>,
        dispatcher: CommandDispatcher,
        store: OffsetStore,
        offset: i64,
    ) -> Self {
        Self {
            messenger,
            dispatcher,
            store,
            offset,
            idle_delay: Duration::from_secs(1),
            error_backoff: Duration::from_secs(10),
        }
    }

    pub fn with_intervals(mut self, idle_delay: Duration, error_backoff: Duration) -> Self {
        self.idle_delay = idle_delay;
        self.error_backoff = error_backoff;
        self
    }

    /// Runs until the hosting process is terminated. Nothing inside the loop
    /// is fatal: transport failures retry with the same offset after a fixed
    /// back-off.
    pub async fn run(mut self) {
        info!(offset = self.offset, "update poller started");
        loop {
            match self.poll_once().await {
                Ok(0) => sleep(self.idle_delay).await,
                Ok(count) => {
                    debug!(count, offset = self.offset, "processed update batch");
                }
                Err(e) => {
                    warn!("unable to fetch updates: {}", e);
                    sleep(self.error_backoff).await;
                }
            }
        }
    }

    /// One fetch/dispatch/advance iteration. Returns the number of updates
    /// processed; an error means the fetch failed and the offset is
    /// untouched.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self.messenger.get_updates(self.offset).await?;
        if updates.is_empty() {
            return Ok(0);
        }
        self.process_batch(&updates).await;
        Ok(updates.len())
    }

    /// Current offset cursor (the id of the next update to request).
    pub fn offset(&self) -> i64 {
        self.offset
    }

    async fn process_batch(&mut self, updates: &[Update]) {
        for update in updates {
            if let Err(e) = self.dispatcher.dispatch(update.chat_id, &update.text).await {
                warn!(update_id = update.id.0, "dispatch failed: {}", e);
            }
        }

        if let Some(last) = updates.last() {
            self.offset = self.offset.max(last.id.0 + 1);
            if let Err(e) = self.store.store(self.offset) {
                // The in-memory cursor stays authoritative until the next
                // successful write.
                warn!(offset = self.offset, "unable to persist offset: {}", e);
            }
        }
    }
}
