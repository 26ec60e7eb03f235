//! Win detection logic for tic-tac-toe.

use super::super::types::{Board, Mark};
use tracing::instrument;

/// The 8 line triples that decide a game: 3 rows, 3 columns, 2 diagonals.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Checks if either mark fully owns one of the 8 lines.
///
/// Returns the winning mark together with the line that won. A board can
/// hold at most one winner, so the first fully-matched line decides.
#[instrument]
pub fn check_win(board: &Board) -> Option<(Mark, [usize; 3])> {
    for line in WINNING_LINES {
        let [a, b, c] = line;
        if let Some(mark) = board.cells()[a] {
            if board.cells()[b] == Some(mark) && board.cells()[c] == Some(mark) {
                return Some((mark, line));
            }
        }
    }

    None
}
