//! Core domain types for tic-tac-toe.

use serde::{Deserialize, Serialize};

/// One of the two marks assigned to players for a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Mark X (goes first).
    X,
    /// Mark O (goes second).
    O,
}

impl Mark {
    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// 3x3 tic-tac-toe board.
///
/// Cells are stored in row-major order (0-8). An unoccupied cell is `None`.
/// Once a cell holds a mark it never changes until the board is reset for
/// the next game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [Option<Mark>; 9],
}

impl Board {
    /// Number of cells on the board.
    pub const SIZE: usize = 9;

    /// Creates a new empty board.
    pub fn new() -> Self {
        Self { cells: [None; 9] }
    }

    /// Gets the cell at the given position, or `None` if out of range.
    pub fn get(&self, position: usize) -> Option<Option<Mark>> {
        self.cells.get(position).copied()
    }

    /// Checks if a position is on the board and unoccupied.
    pub fn is_vacant(&self, position: usize) -> bool {
        matches!(self.get(position), Some(None))
    }

    /// Checks if no cell remains unoccupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    /// Returns all cells as a slice.
    pub fn cells(&self) -> &[Option<Mark>; 9] {
        &self.cells
    }

    /// Writes a mark into a cell without validation.
    ///
    /// Callers go through [`crate::games::tictactoe::rules::apply_move`],
    /// which validates the position first.
    pub(crate) fn set(&mut self, position: usize, mark: Mark) {
        self.cells[position] = Some(mark);
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
