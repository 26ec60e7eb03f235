//! Wire messages exchanged over the match transport boundary.
//!
//! Inbound messages carry an opcode and a JSON payload; outbound broadcasts
//! are encoded the same way. Payload encoding failures are logged by the
//! match loop and never abort a tick.

use crate::games::tictactoe::{Board, Mark};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation codes used between clients and the match loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::FromRepr)]
#[repr(i64)]
pub enum OpCode {
    /// New game round starting.
    Start = 1,
    /// Update to the state of an ongoing round.
    Update = 2,
    /// A game round has just completed.
    Done = 3,
    /// A move the player wishes to make.
    Move = 4,
    /// Move or message was rejected. Carries no payload.
    Rejected = 5,
}

/// Metadata advertised to the matchmaking index.
///
/// Republished whenever either bit changes. `open` flips to 0 once both
/// player slots are taken and back to 1 when a slot frees up between games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchLabel {
    /// 1 if the match can admit another player.
    pub open: u8,
    /// 1 if the match uses the short per-move deadline.
    pub fast: u8,
}

impl MatchLabel {
    /// Label for a freshly created match: open, with the requested speed.
    pub fn new(fast: bool) -> Self {
        Self {
            open: 1,
            fast: u8::from(fast),
        }
    }
}

/// Broadcast when a new game round starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMessage {
    /// The (empty) board the round starts from.
    pub board: Board,
    /// Mark assignment per player identifier for this round.
    pub marks: HashMap<String, Mark>,
    /// Whose turn it is to play.
    pub mark: Mark,
    /// Unix time by which the player on turn must move or forfeit.
    pub deadline: i64,
}

/// Broadcast after each accepted move while the round continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMessage {
    /// Current state of the board.
    pub board: Board,
    /// Whose turn it is to play.
    pub mark: Mark,
    /// Unix time by which the player on turn must move or forfeit.
    pub deadline: i64,
}

/// Broadcast when a round ends by win, tie, or forfeit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoneMessage {
    /// Final state of the board.
    pub board: Board,
    /// The winning mark, absent on a tie.
    pub winner: Option<Mark>,
    /// The line that won, absent on a tie or a forfeit.
    pub winner_positions: Option<[usize; 3]>,
    /// Unix time the next round starts.
    pub next_game_start: i64,
}

/// A player's intent to place their mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveMessage {
    /// Target cell, 0-8 row-major. Validated by the rules engine.
    pub position: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_repr() {
        assert_eq!(OpCode::from_repr(4), Some(OpCode::Move));
        assert_eq!(OpCode::from_repr(5), Some(OpCode::Rejected));
        assert_eq!(OpCode::from_repr(0), None);
        assert_eq!(OpCode::from_repr(99), None);
    }

    #[test]
    fn test_label_round_trips_exactly() {
        for open in [0u8, 1] {
            for fast in [0u8, 1] {
                let label = MatchLabel { open, fast };
                let json = serde_json::to_string(&label).unwrap();
                let back: MatchLabel = serde_json::from_str(&json).unwrap();
                assert_eq!(back, label);
            }
        }
        assert_eq!(
            serde_json::to_string(&MatchLabel::new(true)).unwrap(),
            r#"{"open":1,"fast":1}"#
        );
    }

    #[test]
    fn test_done_message_field_names() {
        let msg = DoneMessage {
            board: Board::new(),
            winner: Some(Mark::X),
            winner_positions: Some([0, 1, 2]),
            next_game_start: 1700000000,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["winner"], "x");
        assert_eq!(json["winnerPositions"][2], 2);
        assert!(json["nextGameStart"].is_i64());
    }

    #[test]
    fn test_move_message_decodes_negative_positions() {
        // Range validation happens in the rules engine, not at decode time.
        let msg: MoveMessage = serde_json::from_str(r#"{"position":-3}"#).unwrap();
        assert_eq!(msg.position, -3);
    }
}
