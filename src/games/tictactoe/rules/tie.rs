//! Tie detection logic for tic-tac-toe.

use super::super::types::Board;
use super::win::check_win;
use tracing::instrument;

/// Checks if the game is a tie: every cell occupied and no winning line.
///
/// The match loop checks for a win first and only falls through to this
/// when no line is owned, so a filled winning board is a win, not a tie.
#[instrument]
pub fn check_tie(board: &Board) -> bool {
    board.is_full() && check_win(board).is_none()
}
