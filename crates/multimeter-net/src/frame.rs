//! Relay wire frames: one JSON object per line, tagged by `type`.
//!
//! ```text
//! -> {"type":"auth","token":"..."}
//! <- {"type":"auth","ok":true}
//! -> {"type":"subscribe","channel":"console"}
//! -> {"type":"console","expression":"Game.time","shard":"shard3"}
//! -> {"type":"me"}
//! <- {"type":"me","cpu":20}
//! <- {"type":"event","channel":"cpu","data":{"cpu":3,"memory":1024}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use multimeter_types::error::{MultimeterError, Result};

/// Maximum bytes in a single inbound frame.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Frames sent to the relay.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound<'a> {
    Auth {
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<&'a str>,
    },
    Subscribe {
        channel: &'a str,
    },
    /// Account profile request.
    Me,
    Console {
        expression: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        shard: Option<&'a str>,
    },
}

/// Frames received from the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Inbound {
    Auth {
        ok: bool,
        #[serde(default)]
        reason: Option<String>,
    },
    Me {
        cpu: f64,
    },
    Event {
        channel: String,
        #[serde(default)]
        data: Value,
    },
}

impl Outbound<'_> {
    /// Serialize as a single newline-terminated line.
    pub fn encode(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

impl Inbound {
    pub fn decode(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Accumulates bytes between reads and yields complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    /// Append received bytes. Fails, discarding the partial frame, once an
    /// unterminated frame grows past [`MAX_FRAME_LEN`].
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(bytes);
        let tail = match self.buf.iter().rposition(|&b| b == b'\n') {
            Some(pos) => self.buf.len() - pos - 1,
            None => self.buf.len(),
        };
        if tail > MAX_FRAME_LEN {
            let complete = self.buf.len() - tail;
            self.buf.truncate(complete);
            return Err(MultimeterError::Transport(format!(
                "frame exceeds {MAX_FRAME_LEN} bytes"
            )));
        }
        Ok(())
    }

    /// Next complete, non-blank line with surrounding whitespace trimmed.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes).trim().to_string();
            if !line.is_empty() {
                return Some(line);
            }
        }
        None
    }

    /// Bytes of an incomplete trailing line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
