//! Integration tests for the game session server
//!
//! These tests drive two real TCP clients through the line-delimited
//! JSON protocol against an in-process server: registration, moves,
//! rejections, timeouts, termination, and disconnect handling.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;

use gridflip_server::{handle_connection, DisconnectPolicy, GameServer, ServerConfig};

/// How long a test waits for any single expected message
const RECV_BUDGET: Duration = Duration::from_secs(10);

/// Start a server on an ephemeral port and return its address
async fn spawn_server(config: ServerConfig) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().unwrap();

    let (cmd_tx, cmd_rx) = mpsc::channel(256);
    tokio::spawn(GameServer::new(cmd_rx, config).run());
    tokio::spawn(async move {
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(handle_connection(stream, cmd_tx));
            }
        }
    });
    addr
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send_json(&mut self, value: Value) {
        let mut line = value.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn register(&mut self, username: &str) {
        self.send_json(json!({"type": "register", "username": username}))
            .await;
    }

    async fn send_move(&mut self, username: &str, m: (i32, i32, i32, i32)) {
        self.send_json(json!({
            "type": "move",
            "username": username,
            "sx": m.0, "sy": m.1, "tx": m.2, "ty": m.3,
        }))
        .await;
    }

    /// Next raw line from the server
    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(RECV_BUDGET, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for server message")
            .expect("Read failed");
        assert!(n > 0, "Server closed the connection unexpectedly");
        line.trim_end().to_string()
    }

    /// Next message, asserting its `type` field
    async fn expect(&mut self, msg_type: &str) -> Value {
        let line = self.recv_line().await;
        let value: Value = serde_json::from_str(&line).expect("Server sent invalid JSON");
        assert_eq!(value["type"], msg_type, "Unexpected message: {}", line);
        value
    }

    /// Assert the server closed the connection
    async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = timeout(RECV_BUDGET, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for connection close")
            .expect("Read failed");
        assert_eq!(n, 0, "Expected EOF, got: {}", line);
    }
}

/// Register both players and consume the handshake up to game_start.
/// `alice` registers first and therefore moves first.
async fn start_game(addr: SocketAddr) -> (TestClient, TestClient) {
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    alice.register("alice").await;
    alice.expect("register_ack").await;

    bob.register("bob").await;
    bob.expect("register_ack").await;

    let start = alice.expect("game_start").await;
    assert_eq!(start["players"], json!(["alice", "bob"]));
    assert_eq!(start["first_player"], "alice");
    bob.expect("game_start").await;

    (alice, bob)
}

mod registration_tests {
    use super::*;

    #[tokio::test]
    async fn handshake_and_first_turn() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, _bob) = start_game(addr).await;

        let turn = alice.expect("your_turn").await;
        assert_eq!(turn["timeout"], 5.0);
        let board = turn["board"].as_array().unwrap();
        assert_eq!(board.len(), 8);
        assert_eq!(board[0], "R......B");
        assert_eq!(board[7], "B......R");
    }

    #[tokio::test]
    async fn duplicate_username_is_nacked() {
        let addr = spawn_server(ServerConfig::default()).await;
        let mut alice = TestClient::connect(addr).await;
        let mut imposter = TestClient::connect(addr).await;

        alice.register("alice").await;
        alice.expect("register_ack").await;

        imposter.register("alice").await;
        let nack = imposter.expect("register_nack").await;
        assert_eq!(nack["reason"], "username already taken");

        // The connection survives; a unique name still works.
        imposter.register("bob").await;
        imposter.expect("register_ack").await;
    }

    #[tokio::test]
    async fn empty_username_is_nacked() {
        let addr = spawn_server(ServerConfig::default()).await;
        let mut client = TestClient::connect(addr).await;

        client.register("").await;
        let nack = client.expect("register_nack").await;
        assert_eq!(nack["reason"], "username cannot be empty");
    }

    #[tokio::test]
    async fn third_connection_is_refused() {
        let addr = spawn_server(ServerConfig::default()).await;
        let _alice = TestClient::connect(addr).await;
        let _bob = TestClient::connect(addr).await;

        // Give the first two connections time to claim both slots.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut third = TestClient::connect(addr).await;
        let line = third.recv_line().await;
        assert_eq!(line, "server full");
        third.expect_eof().await;
    }
}

mod gameplay_tests {
    use super::*;

    #[tokio::test]
    async fn clone_move_and_turn_rotation() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, mut bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        // Clone from the top-left corner one cell to the right.
        alice.send_move("alice", (1, 1, 1, 2)).await;
        let ok = alice.expect("move_ok").await;
        assert_eq!(ok["board"][0], "RR.....B");
        assert_eq!(ok["next_player"], "bob");

        let turn = bob.expect("your_turn").await;
        assert_eq!(turn["board"][0], "RR.....B");

        // Blue jumps from its top-right corner two rows down.
        bob.send_move("bob", (1, 8, 3, 8)).await;
        let ok = bob.expect("move_ok").await;
        assert_eq!(ok["board"][0], "RR......");
        assert_eq!(ok["board"][2], ".......B");
        assert_eq!(ok["next_player"], "alice");

        alice.expect("your_turn").await;
    }

    #[tokio::test]
    async fn illegal_move_is_rejected_but_consumes_the_turn() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, mut bob) = start_game(addr).await;
        let turn = alice.expect("your_turn").await;
        let board_before = turn["board"].clone();

        // Knight-shaped offset: rejected, board unchanged.
        alice.send_move("alice", (1, 1, 2, 3)).await;
        let invalid = alice.expect("invalid_move").await;
        assert_eq!(invalid["reason"], "illegal move offset");
        assert_eq!(invalid["board"], board_before);
        assert_eq!(invalid["next_player"], "bob");

        bob.expect("your_turn").await;
    }

    #[tokio::test]
    async fn move_out_of_turn_changes_nothing() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, mut bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        bob.send_move("bob", (1, 8, 2, 8)).await;
        let invalid = bob.expect("invalid_move").await;
        assert_eq!(invalid["reason"], "not your turn");
        assert_eq!(invalid["next_player"], "alice");

        // Alice still holds the turn and can move normally.
        alice.send_move("alice", (1, 1, 2, 2)).await;
        let ok = alice.expect("move_ok").await;
        assert_eq!(ok["next_player"], "bob");
        bob.expect("your_turn").await;
    }

    #[tokio::test]
    async fn pass_with_legal_moves_is_rejected() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, mut bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        alice.send_move("alice", (0, 0, 0, 0)).await;
        let invalid = alice.expect("invalid_move").await;
        assert_eq!(invalid["reason"], "pass not allowed while legal moves exist");

        bob.expect("your_turn").await;
    }

    #[tokio::test]
    async fn two_malformed_turns_end_the_game() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, mut bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        // Undecodable payload from the active player forfeits the turn.
        alice.send_raw("this is not json\n").await;
        let invalid = alice.expect("invalid_move").await;
        assert_eq!(invalid["reason"], "malformed move payload");

        bob.expect("your_turn").await;
        bob.send_raw("{\"type\": \"move\"}\n").await;
        bob.expect("invalid_move").await;

        // Two consecutive non-progress turns terminate the session.
        let over = alice.expect("game_over").await;
        assert_eq!(over["scores"]["alice"], 2);
        assert_eq!(over["scores"]["bob"], 2);
        bob.expect("game_over").await;

        // Teardown closes both connections.
        alice.expect_eof().await;
        bob.expect_eof().await;
    }
}

mod timeout_tests {
    use super::*;

    #[tokio::test]
    async fn silent_turn_becomes_a_pass() {
        let config = ServerConfig {
            turn_timeout: 1.0,
            ..ServerConfig::default()
        };
        let addr = spawn_server(config).await;
        let (mut alice, mut bob) = start_game(addr).await;
        let turn = alice.expect("your_turn").await;
        assert_eq!(turn["timeout"], 1.0);

        // Alice says nothing; the server passes on her behalf.
        let pass = alice.expect("pass").await;
        assert_eq!(pass["next_player"], "bob");

        let turn = bob.expect("your_turn").await;
        // The board is untouched by the synthesized pass.
        assert_eq!(turn["board"][0], "R......B");
    }
}

mod disconnect_tests {
    use super::*;

    #[tokio::test]
    async fn disconnect_forfeits_to_the_remaining_player() {
        let addr = spawn_server(ServerConfig::default()).await;
        let (mut alice, bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        // Bob (not on turn) drops mid-game.
        drop(bob);

        let over = alice.expect("game_over").await;
        assert_eq!(over["scores"]["alice"], 2);
        assert_eq!(over["scores"]["bob"], 0);
        alice.expect_eof().await;
    }

    #[tokio::test]
    async fn continue_policy_plays_on_with_one_player() {
        let config = ServerConfig {
            on_disconnect: DisconnectPolicy::Continue,
            ..ServerConfig::default()
        };
        let addr = spawn_server(config).await;
        let (mut alice, bob) = start_game(addr).await;
        alice.expect("your_turn").await;

        drop(bob);
        // Give the server time to process the disconnect.
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Alice keeps the turn; with Bob gone she is also next.
        alice.send_move("alice", (1, 1, 1, 2)).await;
        let ok = alice.expect("move_ok").await;
        assert_eq!(ok["next_player"], "alice");
        alice.expect("your_turn").await;
    }
}
