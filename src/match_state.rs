//! Authoritative per-match state.
//!
//! One instance exists per match and is owned exclusively by the match loop;
//! nothing outside the loop's tick mutates it.

use crate::games::tictactoe::{Board, Mark};
use crate::messages::MatchLabel;
use crate::presence::Presence;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashMap;

/// One of the two reservable player slots.
///
/// A slot walks `Empty -> Reserved -> Occupied`, drops to `Disconnected`
/// when the player's socket goes away, and returns to `Occupied` on rejoin
/// or to `Empty` when purged between games.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerSlot {
    /// Nobody holds this slot.
    Empty,
    /// An admission attempt reserved the slot but has not finalized.
    Reserved {
        /// Identifier the reservation is bound to.
        user_id: String,
    },
    /// A participant holds the slot and is connected.
    Occupied(Presence),
    /// The participant disconnected; the slot is retained so they can
    /// rejoin an in-progress game (or be told how it ended).
    Disconnected {
        /// Identifier of the disconnected participant.
        user_id: String,
    },
}

impl PlayerSlot {
    /// Identifier bound to this slot, if any.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            PlayerSlot::Empty => None,
            PlayerSlot::Reserved { user_id } | PlayerSlot::Disconnected { user_id } => {
                Some(user_id)
            }
            PlayerSlot::Occupied(presence) => Some(presence.user_id()),
        }
    }
}

/// The authoritative record for one match.
pub struct MatchState {
    /// Per-match randomness, seeded at init. Reserved for symmetry-breaking
    /// extensions; mark assignment is deterministic by slot order.
    #[allow(dead_code)]
    pub(crate) rng: StdRng,
    /// Metadata advertised to the matchmaking index.
    pub(crate) label: MatchLabel,
    /// Consecutive ticks with nobody connected or joining.
    pub(crate) empty_ticks: u32,
    /// The two reservable slots. Slot order decides mark assignment.
    pub(crate) slots: [PlayerSlot; 2],
    /// Admission attempts accepted but not yet finalized.
    pub(crate) joins_in_progress: u8,
    /// True while a game round is in progress.
    pub(crate) playing: bool,
    /// Current state of the board.
    pub(crate) board: Board,
    /// Mark assignments per player identifier, fixed for one round.
    pub(crate) marks: HashMap<String, Mark>,
    /// Mark whose move is currently expected.
    pub(crate) turn: Mark,
    /// Ticks until the player on turn forfeits.
    pub(crate) deadline_remaining_ticks: i64,
    /// Winner of the finished round, if any.
    pub(crate) winner: Option<Mark>,
    /// The line that won the finished round, if the win came from a move.
    pub(crate) winning_line: Option<[usize; 3]>,
    /// Ticks until the next round may start.
    pub(crate) next_game_remaining_ticks: i64,
}

impl MatchState {
    /// Creates the initial waiting-for-players state.
    ///
    /// An AI-enabled match seats the virtual player in the second slot at
    /// creation, leaving the first slot (and mark X) for the human.
    pub fn new(fast: bool, ai: bool) -> Self {
        let slots = if ai {
            [PlayerSlot::Empty, PlayerSlot::Occupied(Presence::Ai)]
        } else {
            [PlayerSlot::Empty, PlayerSlot::Empty]
        };
        Self {
            rng: StdRng::from_entropy(),
            label: MatchLabel::new(fast),
            empty_ticks: 0,
            slots,
            joins_in_progress: 0,
            playing: false,
            board: Board::new(),
            marks: HashMap::with_capacity(2),
            turn: Mark::X,
            deadline_remaining_ticks: 0,
            winner: None,
            winning_line: None,
            next_game_remaining_ticks: 0,
        }
    }

    /// Slots currently bound to a participant (connected or disconnected).
    /// Reservations are tracked separately through `joins_in_progress`.
    pub fn bound_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                matches!(
                    slot,
                    PlayerSlot::Occupied(_) | PlayerSlot::Disconnected { .. }
                )
            })
            .count()
    }

    /// Participants present and connected, including the virtual player.
    pub fn occupied_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, PlayerSlot::Occupied(_)))
            .count()
    }

    /// Connected human players. The virtual player does not keep an
    /// otherwise-empty match alive.
    pub fn connected_humans(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, PlayerSlot::Occupied(p) if !p.is_ai()))
            .count()
    }

    /// Index of the slot bound to `user_id`, if any.
    pub(crate) fn slot_of(&self, user_id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.user_id() == Some(user_id))
    }

    /// Index of the first empty slot, if any.
    pub(crate) fn first_empty(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, PlayerSlot::Empty))
    }

    /// Connected presences, in slot order.
    pub(crate) fn occupants(&self) -> impl Iterator<Item = &Presence> {
        self.slots.iter().filter_map(|slot| match slot {
            PlayerSlot::Occupied(presence) => Some(presence),
            _ => None,
        })
    }

    /// True while a game round is in progress.
    pub fn playing(&self) -> bool {
        self.playing
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Mark whose move is currently expected.
    pub fn turn(&self) -> Mark {
        self.turn
    }

    /// Mark assigned to `user_id` in the current or just-finished round.
    pub fn mark_of(&self, user_id: &str) -> Option<Mark> {
        self.marks.get(user_id).copied()
    }

    /// Currently advertised label.
    pub fn label(&self) -> MatchLabel {
        self.label
    }

    /// Winner of the just-finished round, if any.
    pub fn winner(&self) -> Option<Mark> {
        self.winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_open_and_idle() {
        let state = MatchState::new(false, false);
        assert_eq!(state.label.open, 1);
        assert_eq!(state.label.fast, 0);
        assert!(!state.playing);
        assert_eq!(state.bound_count(), 0);
        assert_eq!(state.connected_humans(), 0);
    }

    #[test]
    fn test_ai_match_seats_virtual_player_in_second_slot() {
        let state = MatchState::new(true, true);
        assert_eq!(state.label.fast, 1);
        assert_eq!(state.slots[0], PlayerSlot::Empty);
        assert_eq!(state.slots[1], PlayerSlot::Occupied(Presence::Ai));
        assert_eq!(state.occupied_count(), 1);
        // The virtual player never counts toward idle eviction.
        assert_eq!(state.connected_humans(), 0);
    }

    #[test]
    fn test_slot_user_ids() {
        let slot = PlayerSlot::Disconnected {
            user_id: "u1".into(),
        };
        assert_eq!(slot.user_id(), Some("u1"));
        assert_eq!(PlayerSlot::Empty.user_id(), None);
    }
}
