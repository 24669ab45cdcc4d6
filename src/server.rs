//! GameServer Actor implementation
//!
//! The central actor that owns all mutable state: the player registry,
//! the active session, and the board inside it. Connection handlers
//! talk to it through an mpsc command channel; a one-second tick is
//! multiplexed into the same loop and is used exclusively to detect
//! turn-timeout expiry. Every state mutation happens inside a single
//! command dispatch, so the whole state graph has exactly one writer
//! and needs no locks.
//!
//! Send failures are not handled here: an unreachable peer means its
//! connection handler is already shutting down and will enqueue a
//! `Disconnect` command on the same queue.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::board::{Color, MoveRequest};
use crate::config::{DisconnectPolicy, ServerConfig};
use crate::message::{Outbound, ServerMessage};
use crate::player::Player;
use crate::registry::Registry;
use crate::session::{GameOverReason, Session, TurnOutcome};
use crate::types::ConnId;

/// How often the actor wakes up to check the turn deadline
pub const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Terse refusal line for connections beyond the two player slots
const REFUSAL_LINE: &str = "server full";

/// Commands sent from connection handlers to the GameServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection accepted
    Connect {
        conn_id: ConnId,
        sender: mpsc::Sender<Outbound>,
    },
    /// Connection closed or its handler failed
    Disconnect { conn_id: ConnId },
    /// Registration request
    Register { conn_id: ConnId, username: String },
    /// Move request, 1-indexed wire coordinates (all-zero = pass)
    Move {
        conn_id: ConnId,
        username: String,
        sx: i32,
        sy: i32,
        tx: i32,
        ty: i32,
    },
    /// A payload on this connection failed to decode
    Malformed { conn_id: ConnId },
}

/// The main GameServer actor
pub struct GameServer {
    registry: Registry,
    session: Option<Session>,
    receiver: mpsc::Receiver<ServerCommand>,
    config: ServerConfig,
}

impl GameServer {
    /// Create a new GameServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, config: ServerConfig) -> Self {
        Self {
            registry: Registry::new(),
            session: None,
            receiver,
            config,
        }
    }

    /// Run the GameServer event loop
    ///
    /// Processes commands until all senders are dropped, waking up on
    /// the tick interval to enforce turn deadlines.
    pub async fn run(mut self) {
        info!("GameServer started");

        let mut tick = interval(TIMEOUT_CHECK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = tick.tick() => self.check_turn_timeout(),
            }
        }

        info!("GameServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { conn_id, sender } => {
                self.handle_connect(conn_id, sender);
            }
            ServerCommand::Disconnect { conn_id } => {
                self.handle_disconnect(conn_id);
            }
            ServerCommand::Register { conn_id, username } => {
                self.handle_register(conn_id, username);
            }
            ServerCommand::Move {
                conn_id,
                username,
                sx,
                sy,
                tx,
                ty,
            } => {
                self.handle_move(conn_id, &username, sx, sy, tx, ty);
            }
            ServerCommand::Malformed { conn_id } => {
                self.handle_malformed(conn_id);
            }
        }
    }

    /// Handle a new connection: admit into a free slot or refuse
    fn handle_connect(&mut self, conn_id: ConnId, sender: mpsc::Sender<Outbound>) {
        if !self.registry.has_vacancy() {
            warn!("Connection {} refused: both player slots taken", conn_id);
            let _ = sender.try_send(Outbound::Refusal(REFUSAL_LINE));
            return;
        }

        self.registry.admit(Player::new(conn_id, sender));
        info!(
            "Connection {} admitted ({} occupied)",
            conn_id,
            self.registry.players().count()
        );
    }

    /// Handle a registration request
    fn handle_register(&mut self, conn_id: ConnId, username: String) {
        if let Some(player) = self.registry.get_mut(conn_id) {
            player.touch();
        }

        match self.registry.register(conn_id, &username) {
            Ok(ready) => {
                info!("Connection {} registered as '{}'", conn_id, username);
                if let Some(player) = self.registry.get(conn_id) {
                    let _ = player.try_send(ServerMessage::RegisterAck);
                }
                if ready {
                    self.start_game();
                }
            }
            Err(reason) => {
                warn!(
                    "Registration '{}' on {} rejected: {}",
                    username, conn_id, reason
                );
                if let Some(player) = self.registry.get(conn_id) {
                    let _ = player.try_send(ServerMessage::RegisterNack {
                        reason: reason.to_string(),
                    });
                }
            }
        }
    }

    /// Both players registered: reset the board, assign colors in
    /// registration order, broadcast game_start, arm the first turn
    fn start_game(&mut self) {
        let Some((first, second)) = self.registry.start_session() else {
            return;
        };
        let first_name = self.slot_name(first);
        let second_name = self.slot_name(second);
        info!(
            "Game starting: '{}' ({}) vs '{}' ({})",
            first_name,
            Color::Red,
            second_name,
            Color::Blue
        );

        let session = Session::new(first, self.config.turn_budget());
        debug!("initial board:\n{}", session.board());

        let msg = ServerMessage::GameStart {
            players: [first_name.clone(), second_name],
            first_player: first_name,
        };
        for player in self.registry.players().filter(|p| p.is_playing()) {
            let _ = player.try_send(msg.clone());
        }

        self.session = Some(session);
        self.start_turn(first);
    }

    /// Arm a turn for `idx` and tell that player to move
    fn start_turn(&mut self, idx: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.arm_turn(idx);
        let board = session.board().to_rows();
        let timeout = session.turn_budget().as_secs_f64();

        if let Some(player) = self.registry.player_at(idx) {
            debug!("your_turn -> '{}'", player.display_name());
            let _ = player.try_send(ServerMessage::YourTurn { board, timeout });
        }
    }

    /// Handle a move request
    fn handle_move(&mut self, conn_id: ConnId, username: &str, sx: i32, sy: i32, tx: i32, ty: i32) {
        if let Some(player) = self.registry.get_mut(conn_id) {
            player.touch();
            if player.username.as_deref().is_some_and(|u| u != username) {
                debug!(
                    "Move on {} names '{}' but the connection registered '{}'",
                    conn_id,
                    username,
                    player.display_name()
                );
            }
        }

        let Some(session) = self.session.as_ref() else {
            debug!("Move from {} with no active session; dropped", conn_id);
            return;
        };
        let turn_idx = session.turn();

        let sender_is_active = self.registry.slot_of(conn_id) == Some(turn_idx)
            && self.registry.get(conn_id).is_some_and(|p| p.is_playing());

        // Move from a non-active player: reject, change nothing.
        if !sender_is_active {
            let board = session.board().to_rows();
            let next_player = self.slot_name(turn_idx);
            warn!(
                "Move from {} out of turn; next mover is '{}'",
                conn_id, next_player
            );
            if let Some(player) = self.registry.get(conn_id) {
                let _ = player.try_send(ServerMessage::InvalidMove {
                    board,
                    next_player,
                    reason: Some("not your turn".to_string()),
                });
            }
            return;
        }

        let Some(color) = self.registry.player_at(turn_idx).and_then(|p| p.color) else {
            return;
        };
        let request = MoveRequest::from_wire(sx, sy, tx, ty);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = session.play(color, request);
        let board = session.board().to_rows();
        let next_player = self
            .registry
            .next_playing_after(turn_idx)
            .map(|idx| self.slot_name(idx))
            .unwrap_or_default();

        let mover = self.slot_name(turn_idx);
        let reply = match outcome {
            TurnOutcome::Applied => {
                info!(
                    "'{}' played ({},{}) -> ({},{})",
                    mover, sx, sy, tx, ty
                );
                ServerMessage::MoveOk { board, next_player }
            }
            TurnOutcome::Passed => {
                info!("'{}' passed", mover);
                ServerMessage::MoveOk { board, next_player }
            }
            TurnOutcome::Rejected(err) => {
                info!("'{}' move rejected: {}", mover, err);
                ServerMessage::InvalidMove {
                    board,
                    next_player,
                    reason: Some(err.to_string()),
                }
            }
        };
        if let Some(player) = self.registry.player_at(turn_idx) {
            let _ = player.try_send(reply);
        }
        if let Some(session) = self.session.as_ref() {
            debug!("board after turn {}:\n{}", session.turns_played(), session.board());
        }

        self.advance_turn();
    }

    /// Handle an undecodable payload
    ///
    /// Dropped silently unless it came from the active player, in
    /// which case the turn is forfeited.
    fn handle_malformed(&mut self, conn_id: ConnId) {
        let Some(session) = self.session.as_ref() else {
            debug!("Malformed payload from {} outside a game; dropped", conn_id);
            return;
        };
        let turn_idx = session.turn();
        let sender_is_active = self.registry.slot_of(conn_id) == Some(turn_idx)
            && self.registry.get(conn_id).is_some_and(|p| p.is_playing());
        if !sender_is_active {
            debug!(
                "Malformed payload from non-active connection {}; dropped",
                conn_id
            );
            return;
        }

        warn!(
            "Malformed payload from active player '{}'; turn forfeited",
            self.slot_name(turn_idx)
        );
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.forfeit_turn();
        let board = session.board().to_rows();
        let next_player = self
            .registry
            .next_playing_after(turn_idx)
            .map(|idx| self.slot_name(idx))
            .unwrap_or_default();
        if let Some(player) = self.registry.player_at(turn_idx) {
            let _ = player.try_send(ServerMessage::InvalidMove {
                board,
                next_player,
                reason: Some("malformed move payload".to_string()),
            });
        }

        self.advance_turn();
    }

    /// Fire the turn timeout if the deadline has passed
    ///
    /// Synthesizes a pass for the active player. Advancing the turn
    /// re-arms the deadline, so a timeout fires at most once per turn.
    fn check_turn_timeout(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if !session.deadline_expired(Instant::now()) {
            return;
        }
        let turn_idx = session.turn();
        session.forfeit_turn();

        info!("Turn timeout for '{}'", self.slot_name(turn_idx));
        let next_player = self
            .registry
            .next_playing_after(turn_idx)
            .map(|idx| self.slot_name(idx))
            .unwrap_or_default();
        if let Some(player) = self.registry.player_at(turn_idx) {
            let _ = player.try_send(ServerMessage::Pass { next_player });
        }

        self.advance_turn();
    }

    /// After an advancing action: finish the game if terminated,
    /// otherwise hand the turn to the next playing player
    fn advance_turn(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if let Some(reason) = session.termination() {
            self.finish_game(reason);
            return;
        }
        match self.registry.next_playing_after(session.turn()) {
            Some(next) => self.start_turn(next),
            None => {
                warn!("No playing player left to take the turn; resetting session");
                self.session = None;
            }
        }
    }

    /// Normal termination: score by piece count and conclude
    fn finish_game(&mut self, reason: GameOverReason) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        info!("Game over: {}", reason);
        debug!("final board:\n{}", session.board());

        let mut scores = BTreeMap::new();
        for player in self.registry.players().filter(|p| p.is_playing()) {
            if let (Some(name), Some(color)) = (player.username.clone(), player.color) {
                scores.insert(name, session.board().piece_count(color));
            }
        }
        self.conclude_session(scores);
    }

    /// Broadcast game_over and tear the session down
    ///
    /// Playing slots are freed and their connections dropped; the
    /// turn pointer and counters go away with the session value.
    fn conclude_session(&mut self, scores: BTreeMap<String, u32>) {
        let msg = ServerMessage::GameOver { scores };
        let participants: Vec<ConnId> = self
            .registry
            .players()
            .filter(|p| p.is_playing())
            .map(|p| p.id)
            .collect();
        for id in &participants {
            if let Some(player) = self.registry.get(*id) {
                let _ = player.try_send(msg.clone());
            }
        }
        for id in participants {
            self.registry.remove(id);
        }
        self.session = None;
        info!("Session concluded and reset");
    }

    /// Handle a connection going away
    ///
    /// If the leaver held the active turn, a forced pass is credited
    /// first; if the game then terminates normally that result stands,
    /// otherwise the configured disconnect policy decides between an
    /// immediate forfeit and continuing with the remaining player.
    fn handle_disconnect(&mut self, conn_id: ConnId) {
        let slot = self.registry.slot_of(conn_id);
        let was_playing = self.registry.get(conn_id).is_some_and(|p| p.is_playing());
        let Some(leaver) = self.registry.remove(conn_id) else {
            return;
        };
        info!(
            "Connection {} ('{}') disconnected",
            conn_id,
            leaver.display_name()
        );

        if !was_playing {
            return;
        }
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let held_turn = Some(session.turn()) == slot;
        if held_turn {
            debug!("Departing player held the turn; forced pass");
            session.forfeit_turn();
        }
        if let Some(reason) = session.termination() {
            self.finish_game(reason);
            return;
        }

        match self.config.on_disconnect {
            DisconnectPolicy::Forfeit => {
                let remaining = self
                    .registry
                    .players()
                    .find(|p| p.is_playing())
                    .map(|p| (p.username.clone().unwrap_or_default(), p.color));
                let Some((winner, color)) = remaining else {
                    info!("Both players gone; resetting session");
                    self.session = None;
                    return;
                };
                info!("'{}' wins by forfeit", winner);
                let winner_score = self
                    .session
                    .as_ref()
                    .zip(color)
                    .map(|(session, color)| session.board().piece_count(color))
                    .unwrap_or_default();
                let mut scores = BTreeMap::new();
                scores.insert(winner, winner_score);
                scores.insert(leaver.display_name().to_string(), 0);
                self.conclude_session(scores);
            }
            DisconnectPolicy::Continue => {
                if self.registry.playing_count() == 0 {
                    info!("Both players gone; resetting session");
                    self.session = None;
                    return;
                }
                info!("Game continues with the remaining player");
                if held_turn {
                    self.advance_turn();
                }
            }
        }
    }

    /// Username of the player in `idx`, or an empty string
    fn slot_name(&self, idx: usize) -> String {
        self.registry
            .player_at(idx)
            .and_then(|p| p.username.clone())
            .unwrap_or_default()
    }
}
