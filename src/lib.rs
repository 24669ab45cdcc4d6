//! Two-Player Board-Game Session Server Library
//!
//! A turn-based session server for a clone/jump-and-flip game on an
//! 8x8 grid, speaking newline-delimited JSON over TCP.
//!
//! # Features
//! - Connection admission for exactly two players
//! - Registration handshake with username uniqueness
//! - Move validation (clone/jump geometry, 8-neighbor flips)
//! - Turn timeouts that synthesize a pass
//! - Termination detection (full board, elimination, double pass)
//! - Disconnect handling with a configurable forfeit policy
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `GameServer` is the central actor owning the registry, session,
//!   and board; a 1-second tick in the same loop enforces deadlines
//! - Each connection has a handler task that frames newline-delimited
//!   payloads and exchanges typed commands with the actor
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use gridflip_server::{GameServer, ServerConfig, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(config.bind_addr()).await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(GameServer::new(cmd_rx, config).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod board;
pub mod config;
pub mod error;
pub mod framing;
pub mod handler;
pub mod message;
pub mod player;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use board::{Board, Cell, Color, Move, MoveRequest, BOARD_SIZE};
pub use config::{DisconnectPolicy, ServerConfig};
pub use error::{AppError, FramingError, MoveError, RegistrationError, SendError};
pub use framing::LineReader;
pub use handler::handle_connection;
pub use message::{ClientMessage, Outbound, ServerMessage};
pub use player::{Player, PlayerState};
pub use registry::{Registry, MAX_PLAYERS};
pub use server::{GameServer, ServerCommand};
pub use session::{GameOverReason, Session, TurnOutcome};
pub use types::ConnId;
