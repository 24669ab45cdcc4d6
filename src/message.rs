//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Every message is one
//! JSON object per newline-terminated line; the `type` field selects
//! the variant. A missing or mistyped required field is a decode
//! failure, which the server treats separately from game-rule failures.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::board::BOARD_SIZE;

/// Client → Server message
///
/// Move coordinates are 1-indexed on the wire; the all-zero quadruple
/// is the reserved pass sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register a username (required before play)
    Register { username: String },
    /// Play a move, or pass with (0,0,0,0)
    Move {
        username: String,
        sx: i32,
        sy: i32,
        tx: i32,
        ty: i32,
    },
}

/// Server → Client message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Registration accepted
    RegisterAck,
    /// Registration rejected
    RegisterNack { reason: String },
    /// Both players registered; the session begins
    GameStart {
        players: [String; 2],
        first_player: String,
    },
    /// Sent to the active player: current board and turn budget in seconds
    YourTurn {
        board: [String; BOARD_SIZE],
        timeout: f64,
    },
    /// Move (or pass) accepted; board after the move
    MoveOk {
        board: [String; BOARD_SIZE],
        next_player: String,
    },
    /// Move rejected; board unchanged
    InvalidMove {
        board: [String; BOARD_SIZE],
        next_player: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    /// A pass was synthesized for the recipient (turn timeout)
    Pass { next_player: String },
    /// Session over; final piece counts per username
    GameOver { scores: BTreeMap<String, u32> },
}

/// Payload of the per-connection outbound channel
///
/// Almost everything is a protocol message; `Refusal` carries the terse
/// plain-text line sent to a connection rejected at capacity, after
/// which the write task closes the socket.
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    Refusal(&'static str),
}
