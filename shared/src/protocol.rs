//! Wire protocol between server and client.
//!
//! The protocol is asymmetric. Clients send bare command bytes (`L`, `R`,
//! `U`, `D`) with no framing at all. The server sends newline-terminated
//! JSON records tagged by a `type` field:
//!
//! ```text
//! {"type":"UPDATE","timestamp":1234.56,"players":{"1":{"x":120.0,"y":80.0,"score":2,"color":[0,255,0]}},"coin":{"x":400.0,"y":300.0}}
//! {"type":"SYSTEM","msg":"START"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

const UPDATE_TAG: &str = "UPDATE";
const SYSTEM_TAG: &str = "SYSTEM";
const START_MSG: &str = "START";
const RESET_MSG: &str = "RESET";

/// Longest partial line a [`LineBuffer`] holds before giving up on it.
pub const MAX_LINE_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed record: {0}")]
    Malformed(serde_json::Error),
    #[error("failed to encode record: {0}")]
    Encode(serde_json::Error),
    #[error("unknown messages cannot be encoded")]
    NotEncodable,
}

/// Opaque per-connection player identity, assigned by the server at accept.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub color: [u8; 3],
}

impl PlayerState {
    pub fn new(x: f32, y: f32, color: [u8; 3]) -> Self {
        Self {
            x,
            y,
            score: 0,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coin {
    pub x: f32,
    pub y: f32,
}

/// One authoritative, timestamped copy of the whole world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Server wall clock in seconds when the snapshot was taken.
    pub timestamp: f64,
    pub players: BTreeMap<PlayerId, PlayerState>,
    pub coin: Coin,
}

/// A decoded server → client record.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Update(Snapshot),
    /// Lobby filled up and the round began.
    SystemStart,
    /// A player left and the round was voided.
    SystemReset,
    /// Well-formed record of a type this build does not know.
    Unknown,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
enum Record<'a> {
    Update(&'a Snapshot),
    System { msg: &'static str },
}

impl ServerMessage {
    /// Encodes the message as one JSON line, trailing newline included.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        let record = match self {
            ServerMessage::Update(snapshot) => Record::Update(snapshot),
            ServerMessage::SystemStart => Record::System { msg: START_MSG },
            ServerMessage::SystemReset => Record::System { msg: RESET_MSG },
            ServerMessage::Unknown => return Err(ProtocolError::NotEncodable),
        };

        let mut line = serde_json::to_string(&record).map_err(ProtocolError::Encode)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes a single record.
    ///
    /// Missing or unrecognized `type` (or `msg` on a system record) decodes
    /// to [`ServerMessage::Unknown`]. Only text that is not JSON, or an
    /// `UPDATE` that does not match the snapshot layout, is an error.
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim()).map_err(ProtocolError::Malformed)?;

        match value.get("type").and_then(Value::as_str) {
            Some(UPDATE_TAG) => serde_json::from_value(value)
                .map(ServerMessage::Update)
                .map_err(ProtocolError::Malformed),
            Some(SYSTEM_TAG) => Ok(match value.get("msg").and_then(Value::as_str) {
                Some(START_MSG) => ServerMessage::SystemStart,
                Some(RESET_MSG) => ServerMessage::SystemReset,
                _ => ServerMessage::Unknown,
            }),
            _ => Ok(ServerMessage::Unknown),
        }
    }
}

/// Directional input sent by a client, one byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Left,
    Right,
    Up,
    Down,
}

impl Command {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'L' => Some(Command::Left),
            b'R' => Some(Command::Right),
            b'U' => Some(Command::Up),
            b'D' => Some(Command::Down),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Command::Left => b'L',
            Command::Right => b'R',
            Command::Up => b'U',
            Command::Down => b'D',
        }
    }

    /// Parses every command byte in a raw read, skipping anything else.
    pub fn parse_bytes(bytes: &[u8]) -> Vec<Command> {
        bytes.iter().copied().filter_map(Command::from_byte).collect()
    }

    /// Unit step on screen axes: y grows downwards.
    pub fn direction(self) -> (f32, f32) {
        match self {
            Command::Left => (-1.0, 0.0),
            Command::Right => (1.0, 0.0),
            Command::Up => (0.0, -1.0),
            Command::Down => (0.0, 1.0),
        }
    }
}

/// Reassembles newline-delimited records from arbitrary stream reads.
///
/// A read may carry no record, several records, or part of one; the
/// unterminated tail is kept for the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one read and returns every line it completed, blank lines skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for chunk in bytes.split_inclusive(|b| *b == b'\n') {
            let complete = chunk.last() == Some(&b'\n');
            let body = if complete {
                &chunk[..chunk.len() - 1]
            } else {
                chunk
            };

            if self.discarding {
                // Rest of an oversized line.
                if complete {
                    self.discarding = false;
                }
                continue;
            }

            self.pending.extend_from_slice(body);

            if complete {
                let raw = std::mem::take(&mut self.pending);
                let text = String::from_utf8_lossy(&raw);
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text.to_string());
                }
            } else if self.pending.len() > MAX_LINE_LEN {
                self.pending.clear();
                self.discarding = true;
            }
        }

        lines
    }

    /// Bytes waiting for their terminating newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
