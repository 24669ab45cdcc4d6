//! Player struct definition
//!
//! Represents a connected player slot with lifecycle state, assigned
//! color, and the outbound communication channel.

use std::time::Instant;

use tokio::sync::mpsc;

use crate::board::Color;
use crate::error::SendError;
use crate::message::{Outbound, ServerMessage};
use crate::types::ConnId;

/// Lifecycle state of an occupied player slot
///
/// `Connected → Registered → Playing → Disconnected`; a vacant slot is
/// the implicit initial state. `Disconnected` is terminal - the slot is
/// freed once teardown completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// Socket accepted, not yet registered
    Connected,
    /// Username accepted and unique; waiting for the second player
    Registered,
    /// Session active, color assigned
    Playing,
    /// Terminal
    Disconnected,
}

/// Connected player information
#[derive(Debug)]
pub struct Player {
    /// Connection this slot belongs to
    pub id: ConnId,
    /// Username (None before registration)
    pub username: Option<String>,
    /// Server → Client message channel
    pub sender: mpsc::Sender<Outbound>,
    /// Lifecycle state
    pub state: PlayerState,
    /// Assigned color (None until the session starts)
    pub color: Option<Color>,
    /// Order in which this player registered, for color assignment
    pub reg_seq: Option<u64>,
    /// Time of the last message received from this connection
    pub last_activity: Instant,
}

impl Player {
    /// Create a freshly connected player
    pub fn new(id: ConnId, sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            username: None,
            sender,
            state: PlayerState::Connected,
            color: None,
            reg_seq: None,
            last_activity: Instant::now(),
        }
    }

    /// Send a protocol message to this player without blocking
    ///
    /// The actor never waits on a peer: a closed channel means the
    /// connection handler is already tearing down, a full one means the
    /// peer has stopped draining. Either way the caller treats the
    /// player as unreachable.
    pub fn try_send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender
            .try_send(Outbound::Message(msg))
            .map_err(|err| match err {
                mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
                mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            })
    }

    /// Get the display name for this player
    ///
    /// Returns the username if registered, otherwise "unregistered".
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unregistered")
    }

    /// Is this player part of the active session?
    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    /// Note that a message just arrived from this connection
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
