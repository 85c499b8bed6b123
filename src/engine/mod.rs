//! # Rule Engine
//!
//! The relay never interprets game rules itself. Boards are owned by the
//! engine and reached only through [`RuleEngine`], so another game can be
//! plugged in without touching the registries or the dispatcher.
//!
//! ## Components
//! - **RuleEngine**: move legality, position serialization, outcome detection
//! - **ChessEngine**: standard chess with UCI move notation

pub mod chess;

use std::fmt;

pub use chess::ChessEngine;

/// A rejected move. The board is left as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalMove {
    pub notation: String,
    pub reason: &'static str,
}

impl IllegalMove {
    pub fn new(notation: impl Into<String>, reason: &'static str) -> Self {
        Self {
            notation: notation.into(),
            reason,
        }
    }
}

impl fmt::Display for IllegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.notation, self.reason)
    }
}

impl std::error::Error for IllegalMove {}

/// State of a game after the last move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ongoing,
    Decisive { winner: String, method: String },
    Draw { method: String },
}

impl Outcome {
    pub fn is_over(&self) -> bool {
        !matches!(self, Outcome::Ongoing)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Ongoing => f.write_str("ongoing"),
            Outcome::Decisive { winner, method } => write!(f, "{winner} wins by {method}"),
            Outcome::Draw { method } => write!(f, "draw by {method}"),
        }
    }
}

/// Game rules consumed by the relay.
pub trait RuleEngine: Send + Sync + 'static {
    type Board: Send + 'static;

    /// Starting position.
    fn new_game(&self) -> Self::Board;

    /// Apply `notation` to `board`. On error the board must be unchanged.
    fn apply_move(&self, board: &mut Self::Board, notation: &str) -> Result<(), IllegalMove>;

    fn serialize_position(&self, board: &Self::Board) -> String;

    fn outcome(&self, board: &Self::Board) -> Outcome;
}
