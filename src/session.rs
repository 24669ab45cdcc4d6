//! Turn/session state machine
//!
//! Owns the live board, the whose-turn pointer, the turn deadline, and
//! the non-progress counter. Pure state logic: the server actor feeds
//! it decoded requests and turns its outcomes into wire messages. A
//! turn that ends without a real applied move (pass, timeout, malformed
//! payload, rejected move) counts as non-progress; two of those in a
//! row end the game.

use std::time::{Duration, Instant};

use crate::board::{Board, Color, MoveRequest};
use crate::error::MoveError;

/// How the active player's turn resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A real move was applied; the non-progress counter resets
    Applied,
    /// A legal pass (mover had no legal move)
    Passed,
    /// Request rejected; board untouched, turn still consumed
    Rejected(MoveError),
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOverReason {
    /// No empty cell remains
    BoardFull,
    /// This color owns zero pieces
    Eliminated(Color),
    /// Two consecutive turns without progress
    DoublePass,
}

impl std::fmt::Display for GameOverReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOverReason::BoardFull => write!(f, "no empty cells left"),
            GameOverReason::Eliminated(color) => write!(f, "player {} has no pieces", color),
            GameOverReason::DoublePass => write!(f, "two consecutive passes"),
        }
    }
}

/// One active game between the two playing slots
#[derive(Debug)]
pub struct Session {
    board: Board,
    turn: usize,
    deadline: Instant,
    consecutive_passes: u32,
    turns_played: u32,
    turn_budget: Duration,
}

impl Session {
    /// Start a session on the fixed starting layout
    pub fn new(first_turn: usize, turn_budget: Duration) -> Self {
        Self::with_board(Board::starting(), first_turn, turn_budget)
    }

    /// Start a session on an arbitrary board
    pub fn with_board(board: Board, first_turn: usize, turn_budget: Duration) -> Self {
        Self {
            board,
            turn: first_turn,
            deadline: Instant::now() + turn_budget,
            consecutive_passes: 0,
            turns_played: 0,
            turn_budget,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Slot index of the player whose turn it is
    pub fn turn(&self) -> usize {
        self.turn
    }

    pub fn turns_played(&self) -> u32 {
        self.turns_played
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    /// Per-turn time budget, as sent in `your_turn`
    pub fn turn_budget(&self) -> Duration {
        self.turn_budget
    }

    /// Hand the turn to `idx` and restart the deadline clock
    pub fn arm_turn(&mut self, idx: usize) {
        self.turn = idx;
        self.deadline = Instant::now() + self.turn_budget;
    }

    /// Has the current turn's deadline passed?
    pub fn deadline_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Resolve the active player's request against the board
    ///
    /// Passing is permitted only when the mover holds no legal move,
    /// and mandatory when that is the case. Every outcome consumes the
    /// turn; only an applied move counts as progress.
    pub fn play(&mut self, color: Color, request: MoveRequest) -> TurnOutcome {
        self.turns_played += 1;
        match request {
            MoveRequest::Pass => {
                self.consecutive_passes += 1;
                if self.board.has_any_legal_move(color) {
                    TurnOutcome::Rejected(MoveError::PassNotAllowed)
                } else {
                    TurnOutcome::Passed
                }
            }
            MoveRequest::Play(mv) => {
                if !self.board.has_any_legal_move(color) {
                    self.consecutive_passes += 1;
                    return TurnOutcome::Rejected(MoveError::MustPass);
                }
                match self.board.apply(mv, color) {
                    Ok(()) => {
                        self.consecutive_passes = 0;
                        TurnOutcome::Applied
                    }
                    Err(err) => {
                        self.consecutive_passes += 1;
                        TurnOutcome::Rejected(err)
                    }
                }
            }
        }
    }

    /// Consume the turn without a request: timeout, malformed payload,
    /// or a disconnecting player holding the turn
    pub fn forfeit_turn(&mut self) {
        self.turns_played += 1;
        self.consecutive_passes += 1;
    }

    /// Check the termination predicate
    pub fn termination(&self) -> Option<GameOverReason> {
        if self.board.is_full() {
            return Some(GameOverReason::BoardFull);
        }
        for color in [Color::Red, Color::Blue] {
            if self.board.piece_count(color) == 0 {
                return Some(GameOverReason::Eliminated(color));
            }
        }
        if self.consecutive_passes >= 2 {
            return Some(GameOverReason::DoublePass);
        }
        None
    }
}
