//! Telegram adapter (teloxide).
//!
//! Implements the `camcap-core` MessagingPort over the Telegram Bot API.
//! One `Bot` (and thus one pooled HTTP client) is constructed at startup and
//! reused for every fetch and send.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    payloads::GetUpdatesSetters,
    prelude::*,
    types::{InputFile, UpdateKind},
};

use tokio::time::sleep;

use camcap_core::{
    domain::{ChatId, Update, UpdateId},
    errors::Error,
    ports::MessagingPort,
    Result,
};

pub struct TelegramMessenger {
    bot: Bot,
    poll_timeout_secs: u32,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, poll_timeout_secs: u32) -> Self {
        Self {
            bot,
            poll_timeout_secs,
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

/// Maps a wire update to the domain model.
///
/// Updates without usable text (media, service messages, non-message update
/// kinds) keep their slot in the offset sequence with empty text; dropping
/// them here would leave the cursor stuck on them forever.
fn to_domain(update: teloxide::types::Update) -> Update {
    let (chat_id, text) = match &update.kind {
        UpdateKind::Message(msg) => (
            msg.chat.id.0,
            msg.text().unwrap_or_default().to_string(),
        ),
        _ => (0, String::new()),
    };
    Update {
        id: UpdateId(update.id as i64),
        chat_id: ChatId(chat_id),
        text,
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let updates = self
            .bot
            .get_updates()
            .offset(offset as i32)
            .timeout(self.poll_timeout_secs)
            .await
            .map_err(Self::map_err)?;
        Ok(updates.into_iter().map(to_domain).collect())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.with_retry(|| self.bot.send_message(Self::tg_chat(chat_id), text.to_string()))
            .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, file: &Path) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_photo(Self::tg_chat(chat_id), InputFile::file(file.to_path_buf()))
        })
        .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: ChatId, file: &Path) -> Result<()> {
        self.with_retry(|| {
            self.bot
                .send_video(Self::tg_chat(chat_id), InputFile::file(file.to_path_buf()))
        })
        .await?;
        Ok(())
    }
}
