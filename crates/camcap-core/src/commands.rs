//! The command vocabulary understood by the bot.

/// The closed set of chat commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Capture a still image and send it to the chat.
    CaptureImage,
    /// Capture a short video clip and send it to the chat.
    CaptureVideo,
    /// Start motion detection, bound to the requesting chat.
    MotionOn,
    /// Stop motion detection.
    MotionOff,
}

impl Command {
    /// Parses normalized command text. Returns `None` for anything outside
    /// the closed command set.
    pub fn parse(normalized: &str) -> Option<Self> {
        match normalized {
            "image" => Some(Self::CaptureImage),
            "video" => Some(Self::CaptureVideo),
            "detecton" => Some(Self::MotionOn),
            "detectoff" => Some(Self::MotionOff),
            _ => None,
        }
    }
}

/// Normalizes raw message text into a command token: trims whitespace,
/// strips one pair of surrounding quotes, strips a leading `/`, lowercases.
pub fn normalize(raw: &str) -> String {
    let mut s = raw.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s = s[1..s.len() - 1].trim();
    }
    let s = s.strip_prefix('/').unwrap_or(s);
    s.to_lowercase()
}

/// Sent for any unrecognized command.
pub const HELP_TEXT: &str = "Command not recognized. Please speak Bot to me.\n\
Available commands:\n\
/image - capture a still image\n\
/video - capture a short video\n\
/detecton - turn motion detection on\n\
/detectoff - turn motion detection off";
