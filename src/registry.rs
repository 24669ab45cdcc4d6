//! Player registry
//!
//! Owns the two player slots, their lifecycle transitions, and username
//! uniqueness. A vacant slot is `None`; occupied slots go through
//! `Connected → Registered → Playing → Disconnected` and are freed on
//! removal. The registry never touches sockets or the board - the
//! server actor orchestrates both.

use crate::board::Color;
use crate::error::RegistrationError;
use crate::player::{Player, PlayerState};
use crate::types::ConnId;

/// Maximum simultaneous players
pub const MAX_PLAYERS: usize = 2;

/// The two player slots
#[derive(Debug, Default)]
pub struct Registry {
    slots: [Option<Player>; MAX_PLAYERS],
    next_reg_seq: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            next_reg_seq: 0,
        }
    }

    /// Is there a free slot for a new connection?
    pub fn has_vacancy(&self) -> bool {
        self.slots.iter().any(|slot| slot.is_none())
    }

    /// Place a freshly connected player into the first free slot
    ///
    /// Returns the slot index, or None when both slots are occupied
    /// (the caller refuses the connection).
    pub fn admit(&mut self, player: Player) -> Option<usize> {
        let idx = self.slots.iter().position(|slot| slot.is_none())?;
        self.slots[idx] = Some(player);
        Some(idx)
    }

    /// Slot index for a connection id
    pub fn slot_of(&self, id: ConnId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|p| p.id == id))
    }

    pub fn get(&self, id: ConnId) -> Option<&Player> {
        self.slots
            .iter()
            .filter_map(|slot| slot.as_ref())
            .find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: ConnId) -> Option<&mut Player> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.as_mut())
            .find(|p| p.id == id)
    }

    pub fn player_at(&self, idx: usize) -> Option<&Player> {
        self.slots.get(idx).and_then(|slot| slot.as_ref())
    }

    /// All occupied slots
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    /// Players counted toward the session (Registered or Playing)
    pub fn registered_count(&self) -> usize {
        self.players()
            .filter(|p| matches!(p.state, PlayerState::Registered | PlayerState::Playing))
            .count()
    }

    pub fn playing_count(&self) -> usize {
        self.players().filter(|p| p.is_playing()).count()
    }

    /// Handle a registration request for the given connection
    ///
    /// On acceptance the player moves to `Registered` and the return
    /// value says whether both slots are now registered (session ready).
    pub fn register(&mut self, id: ConnId, username: &str) -> Result<bool, RegistrationError> {
        let state = self
            .get(id)
            .map(|p| p.state)
            .ok_or(RegistrationError::InvalidState)?;
        if state != PlayerState::Connected {
            return Err(RegistrationError::InvalidState);
        }
        if username.is_empty() {
            return Err(RegistrationError::EmptyUsername);
        }
        let taken = self.players().any(|p| {
            p.id != id
                && matches!(p.state, PlayerState::Registered | PlayerState::Playing)
                && p.username.as_deref() == Some(username)
        });
        if taken {
            return Err(RegistrationError::UsernameTaken);
        }
        if self.registered_count() >= MAX_PLAYERS {
            return Err(RegistrationError::ServerFull);
        }

        let seq = self.next_reg_seq;
        if let Some(player) = self.get_mut(id) {
            player.username = Some(username.to_string());
            player.state = PlayerState::Registered;
            player.reg_seq = Some(seq);
            self.next_reg_seq += 1;
        }

        Ok(self.registered_count() == MAX_PLAYERS)
    }

    /// Promote both registered players to Playing and assign colors
    /// in registration order
    ///
    /// Returns (first slot, second slot) where the first registrant
    /// plays Red and takes the first turn. None unless exactly two
    /// players are Registered.
    pub fn start_session(&mut self) -> Option<(usize, usize)> {
        let mut registered: Vec<(usize, u64)> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| {
                let p = slot.as_ref()?;
                (p.state == PlayerState::Registered).then_some((idx, p.reg_seq?))
            })
            .collect();
        if registered.len() != MAX_PLAYERS {
            return None;
        }
        registered.sort_by_key(|&(_, seq)| seq);

        let (first, second) = (registered[0].0, registered[1].0);
        for (idx, color) in [(first, Color::Red), (second, Color::Blue)] {
            if let Some(player) = self.slots[idx].as_mut() {
                player.state = PlayerState::Playing;
                player.color = Some(color);
            }
        }
        Some((first, second))
    }

    /// Remove a connection, freeing its slot for reuse
    pub fn remove(&mut self, id: ConnId) -> Option<Player> {
        let idx = self.slot_of(id)?;
        let mut player = self.slots[idx].take()?;
        player.state = PlayerState::Disconnected;
        Some(player)
    }

    /// Next Playing slot after `idx`, wrapping; may return `idx` itself
    /// when it holds the only remaining player
    pub fn next_playing_after(&self, idx: usize) -> Option<usize> {
        (1..=MAX_PLAYERS)
            .map(|offset| (idx + offset) % MAX_PLAYERS)
            .find(|&cand| self.player_at(cand).is_some_and(|p| p.is_playing()))
    }
}
