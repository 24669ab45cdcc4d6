//! TCP connection handler
//!
//! Handles one client connection: splits the stream, frames and
//! decodes inbound lines into server commands, and writes outbound
//! messages back as JSON lines.

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::framing::LineReader;
use crate::message::{ClientMessage, Outbound};
use crate::server::ServerCommand;
use crate::types::ConnId;

/// Handle a new TCP connection
///
/// Announces the connection to the GameServer actor, pumps messages in
/// both directions, and announces the disconnect when either direction
/// ends. Admission (or refusal, at capacity) is the actor's decision;
/// this function treats every accepted socket the same way.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    let conn_id = ConnId::new();
    info!("Connection {} from {}", conn_id, peer_addr);

    let (read_half, mut write_half) = stream.into_split();

    // Channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<Outbound>(64);

    // Announce to the GameServer
    if cmd_tx
        .send(ServerCommand::Connect {
            conn_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to announce connection {} - server closed", conn_id);
        return Err(AppError::ChannelSend);
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (framed lines -> ServerCommand)
    let read_task = tokio::spawn(async move {
        let mut lines = LineReader::new(read_half);
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let cmd = match serde_json::from_str::<ClientMessage>(&line) {
                        Ok(msg) => client_message_to_command(conn_id, msg),
                        Err(e) => {
                            warn!("Undecodable payload from {}: {}", conn_id, e);
                            ServerCommand::Malformed { conn_id }
                        }
                    };
                    if cmd_tx_read.send(cmd).await.is_err() {
                        debug!("Server closed, ending read task for {}", conn_id);
                        break;
                    }
                }
                Ok(None) => {
                    debug!("Connection {} closed by peer", conn_id);
                    break;
                }
                Err(e) => {
                    warn!("Framing error on {}: {}", conn_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    // Spawn write task (Outbound -> JSON lines)
    let write_task = tokio::spawn(async move {
        while let Some(out) = msg_rx.recv().await {
            match out {
                Outbound::Message(msg) => match serde_json::to_string(&msg) {
                    Ok(mut json) => {
                        json.push('\n');
                        if write_half.write_all(json.as_bytes()).await.is_err() {
                            debug!("Socket write failed, ending write task");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize message: {}", e);
                        // Continue - don't break on serialization errors
                    }
                },
                Outbound::Refusal(text) => {
                    let _ = write_half.write_all(text.as_bytes()).await;
                    let _ = write_half.write_all(b"\n").await;
                    break;
                }
            }
        }
        let _ = write_half.shutdown().await;
        debug!("Write task ended");
    });

    // Wait for either task to complete
    tokio::select! {
        _ = read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }

    // Send disconnect command
    let _ = cmd_tx.send(ServerCommand::Disconnect { conn_id }).await;

    info!("Connection {} torn down", conn_id);

    Ok(())
}

/// Convert a ClientMessage to a ServerCommand
fn client_message_to_command(conn_id: ConnId, msg: ClientMessage) -> ServerCommand {
    match msg {
        ClientMessage::Register { username } => ServerCommand::Register { conn_id, username },
        ClientMessage::Move {
            username,
            sx,
            sy,
            tx,
            ty,
        } => ServerCommand::Move {
            conn_id,
            username,
            sx,
            sy,
            tx,
            ty,
        },
    }
}
