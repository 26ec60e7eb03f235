//! HTTP adapter for the external move-prediction service.
//!
//! The board is encoded as a 3x3 grid of two-channel one-hot cells and sent
//! to the model server; the reply scores all 9 positions and the strictly
//! highest score wins. The adapter only ever injects its choice as an
//! ordinary queued move, never by mutating match state directly.

use crate::games::tictactoe::{Board, Mark};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Cell encoding expected by the model: `[1,0]` AI, `[0,1]` opponent,
/// `[0,0]` empty.
type OracleCell = [u8; 2];
type OracleBoard = [[OracleCell; 3]; 3];

#[derive(Debug, Serialize)]
struct PredictRequest {
    instances: [OracleBoard; 1],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    predictions: Vec<Vec<f64>>,
}

/// Client for the move-prediction service.
#[derive(Debug, Clone)]
pub struct MoveOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl MoveOracle {
    /// Creates a client for the given prediction endpoint.
    ///
    /// The timeout bounds the whole request so a slow model server delays at
    /// most one tick; a timed-out turn falls back to the forfeit countdown.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::new(format!("failed to build oracle client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Asks the model for a move and returns the chosen board position.
    ///
    /// # Errors
    ///
    /// Returns [`OracleError`] when the request fails, the service answers
    /// with a non-success status, or the response shape is not the expected
    /// single instance. Callers treat any failure as a skipped turn.
    #[instrument(skip(self, board), fields(endpoint = %self.endpoint))]
    pub async fn select_move(&self, board: &Board, ai_mark: Mark) -> Result<usize, OracleError> {
        let request = PredictRequest {
            instances: [encode_board(board, ai_mark)],
        };

        debug!("requesting move prediction");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| OracleError::new(format!("prediction request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::new(format!(
                "prediction service returned {status}"
            )));
        }

        let scores: PredictResponse = response
            .json()
            .await
            .map_err(|e| OracleError::new(format!("failed to parse prediction response: {e}")))?;

        if scores.predictions.len() != 1 {
            return Err(OracleError::new(format!(
                "expected 1 prediction instance, got {}",
                scores.predictions.len()
            )));
        }

        let position = pick_position(&scores.predictions[0])
            .ok_or_else(|| OracleError::new("prediction instance was empty".to_owned()))?;

        debug!(position, "oracle selected move");
        Ok(position)
    }
}

/// Encodes the board from the AI's point of view.
fn encode_board(board: &Board, ai_mark: Mark) -> OracleBoard {
    let mut grid = [[[0, 0]; 3]; 3];
    for (index, cell) in board.cells().iter().enumerate() {
        let encoded = match cell {
            Some(mark) if *mark == ai_mark => [1, 0],
            Some(_) => [0, 1],
            None => [0, 0],
        };
        grid[index / 3][index % 3] = encoded;
    }
    grid
}

/// Index of the strictly highest score; the first seen wins ties.
fn pick_position(scores: &[f64]) -> Option<usize> {
    let mut best = f64::NEG_INFINITY;
    let mut position = None;
    for (index, &score) in scores.iter().enumerate() {
        if score > best {
            best = score;
            position = Some(index);
        }
    }
    position
}

/// The prediction service failed or answered with an unexpected shape.
#[derive(Debug, Clone, Display, Error)]
#[display("oracle unavailable: {} at {}:{}", message, file, line)]
pub struct OracleError {
    /// What went wrong.
    pub message: String,
    /// Line number where the error was created.
    pub line: u32,
    /// Source file where the error was created.
    pub file: &'static str,
}

impl OracleError {
    /// Creates a new oracle error, capturing the caller's location.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        error!(error_message = %message, "oracle error");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::tictactoe::apply_move;

    #[test]
    fn test_pick_position_first_strict_maximum() {
        let scores = [0.1, 0.9, 0.9, 0.2, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(pick_position(&scores), Some(1));
    }

    #[test]
    fn test_pick_position_empty_scores() {
        assert_eq!(pick_position(&[]), None);
    }

    #[test]
    fn test_encode_board_one_hot_channels() {
        let mut board = Board::new();
        apply_move(&mut board, 0, Mark::O).unwrap();
        apply_move(&mut board, 4, Mark::X).unwrap();
        apply_move(&mut board, 8, Mark::O).unwrap();

        let grid = encode_board(&board, Mark::O);
        assert_eq!(grid[0][0], [1, 0]); // AI-occupied
        assert_eq!(grid[1][1], [0, 1]); // opponent-occupied
        assert_eq!(grid[2][2], [1, 0]);
        assert_eq!(grid[0][1], [0, 0]); // empty

        // Same board from the opponent's perspective flips the channels.
        let flipped = encode_board(&board, Mark::X);
        assert_eq!(flipped[0][0], [0, 1]);
        assert_eq!(flipped[1][1], [1, 0]);
    }

    #[test]
    fn test_request_body_shape() {
        let request = PredictRequest {
            instances: [encode_board(&Board::new(), Mark::O)],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instances"].as_array().unwrap().len(), 1);
        assert_eq!(json["instances"][0][0][0], serde_json::json!([0, 0]));
    }
}
