//! Error types for the game server
//!
//! Defines application-level errors, framing errors, and the typed
//! rejection reasons for registration and move validation.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers fatal errors that terminate a connection handler. Rule-level
/// rejections are modeled separately ([`RegistrationError`], [`MoveError`])
/// because they are replied to, not propagated.
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal for the affected connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Framing error on the inbound byte stream
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,
}

/// Errors raised by the line framing layer
///
/// Any framing error tears down the offending connection without a reply.
#[derive(Debug, Error)]
pub enum FramingError {
    /// Peer exceeded the per-connection receive buffer cap without
    /// terminating a line
    #[error("receive buffer overflow (limit {limit} bytes)")]
    BufferOverflow { limit: usize },

    /// Socket-level read failure
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a registration request was rejected
///
/// The Display string is sent verbatim as the `register_nack` reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Sender is not in the Connected state
    #[error("invalid state for registration")]
    InvalidState,

    /// Username was empty
    #[error("username cannot be empty")]
    EmptyUsername,

    /// Username collides with another registered or playing player
    #[error("username already taken")]
    UsernameTaken,

    /// Both player slots are already filled
    #[error("server is full")]
    ServerFull,
}

/// Why a move request was rejected
///
/// The Display string is sent as the optional `invalid_move` reason.
/// Board geometry failures come out of [`crate::board::Board::apply`];
/// the pass-legality variants are produced by the session rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Source or destination outside the 8x8 grid
    #[error("coordinates out of bounds")]
    OutOfBounds,

    /// Source cell does not hold the mover's piece
    #[error("source cell is not yours")]
    SourceNotOwned,

    /// Destination cell is not empty
    #[error("destination cell is not empty")]
    DestinationOccupied,

    /// Offset is neither a 1-step clone nor a 2-step straight/diagonal jump
    #[error("illegal move offset")]
    IllegalOffset,

    /// Pass attempted while at least one legal move exists
    #[error("pass not allowed while legal moves exist")]
    PassNotAllowed,

    /// Non-pass move attempted while no legal move exists
    #[error("no legal moves available, must pass")]
    MustPass,
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed or
/// backed-up channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The peer stopped draining its outbound channel
    #[error("Channel full")]
    ChannelFull,
}
