/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Update id (numeric, ascending within a poll sequence per the Bot API
/// contract).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub i64);

/// One incoming update, consumed exactly once.
///
/// `text` is empty for updates that carry no usable text (media, service
/// messages); those still occupy a slot in the offset sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub id: UpdateId,
    pub chat_id: ChatId,
    pub text: String,
}

/// One motion event pushed by the detector while a subscription is live.
#[derive(Clone, Debug)]
pub struct MotionEvent {
    /// Encoded frame that triggered the event.
    pub frame: Vec<u8>,
}
