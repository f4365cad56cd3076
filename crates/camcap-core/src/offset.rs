//! Durable offset cursor.

use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Serialize, Deserialize)]
struct OffsetState {
    offset: i64,
}

/// File-backed store for the single offset scalar.
///
/// The cursor is read once at startup and rewritten only after a whole
/// fetched batch has been dispatched; a crash between dispatch and the write
/// re-delivers that batch on restart (at-least-once). A missing file means a
/// fresh start; an unreadable or corrupt file is a fatal startup condition.
pub struct OffsetStore {
    path: PathBuf,
}

impl OffsetStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<i64> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(self.error(format!("read failed: {e}"))),
        };
        let state: OffsetState = serde_json::from_str(&contents)
            .map_err(|e| self.error(format!("invalid offset state: {e}")))?;
        Ok(state.offset)
    }

    pub fn store(&self, offset: i64) -> Result<()> {
        let body = serde_json::to_string(&OffsetState { offset })?;
        fs::write(&self.path, body).map_err(|e| self.error(format!("write failed: {e}")))
    }

    fn error(&self, reason: String) -> Error {
        Error::Persistence {
            path: self.path.clone(),
            reason,
        }
    }
}
