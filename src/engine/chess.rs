//! Standard chess backed by `shakmaty`.
//!
//! Moves use UCI coordinate notation (`e2e4`, `e7e8q`, `e1g1` for castling).
//! Positions are serialized as FEN.

use shakmaty::fen::Fen;
use shakmaty::uci::Uci;
use shakmaty::{Chess, Color, EnPassantMode, Position};

use super::{IllegalMove, Outcome, RuleEngine};

#[derive(Debug, Default, Clone, Copy)]
pub struct ChessEngine;

impl ChessEngine {
    pub fn new() -> Self {
        Self
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

impl RuleEngine for ChessEngine {
    type Board = Chess;

    fn new_game(&self) -> Chess {
        Chess::default()
    }

    fn apply_move(&self, board: &mut Chess, notation: &str) -> Result<(), IllegalMove> {
        if board.is_game_over() {
            return Err(IllegalMove::new(notation, "game is over"));
        }
        let uci: Uci = notation
            .trim()
            .parse()
            .map_err(|_| IllegalMove::new(notation, "not UCI notation"))?;
        let m = uci
            .to_move(&*board)
            .map_err(|_| IllegalMove::new(notation, "not legal in this position"))?;
        board.play_unchecked(&m);
        Ok(())
    }

    fn serialize_position(&self, board: &Chess) -> String {
        Fen::from_position(board.clone(), EnPassantMode::Legal).to_string()
    }

    fn outcome(&self, board: &Chess) -> Outcome {
        if board.is_checkmate() {
            // The side to move is the one that got mated
            return Outcome::Decisive {
                winner: color_name(board.turn().other()).to_string(),
                method: "checkmate".to_string(),
            };
        }
        if board.is_stalemate() {
            return Outcome::Draw {
                method: "stalemate".to_string(),
            };
        }
        if board.is_insufficient_material() {
            return Outcome::Draw {
                method: "insufficient material".to_string(),
            };
        }
        Outcome::Ongoing
    }
}
