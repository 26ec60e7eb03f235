//! Game rules for tic-tac-toe.
//!
//! Pure functions for applying moves and evaluating game state. Rules carry
//! no state of their own; the match loop owns the board and calls in here.

pub mod tie;
pub mod win;

pub use tie::check_tie;
pub use win::{WINNING_LINES, check_win};

use super::types::{Board, Mark};
use derive_more::Display;

/// Error raised when a move cannot be applied to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MoveError {
    /// The position is outside the 0-8 range.
    #[display("position {_0} is not on the board")]
    InvalidPosition(i64),

    /// The cell at the position already holds a mark.
    #[display("cell {_0} is already occupied")]
    OccupiedCell(usize),
}

impl std::error::Error for MoveError {}

/// Places `mark` at `position` on the board.
///
/// # Errors
///
/// Returns [`MoveError::InvalidPosition`] if the position is outside `[0, 8]`
/// and [`MoveError::OccupiedCell`] if the cell is taken.
pub fn apply_move(board: &mut Board, position: i64, mark: Mark) -> Result<usize, MoveError> {
    let index = usize::try_from(position).map_err(|_| MoveError::InvalidPosition(position))?;
    match board.get(index) {
        None => Err(MoveError::InvalidPosition(position)),
        Some(Some(_)) => Err(MoveError::OccupiedCell(index)),
        Some(None) => {
            board.set(index, mark);
            Ok(index)
        }
    }
}
