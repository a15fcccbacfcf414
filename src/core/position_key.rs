use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of FEN fields that identify a position for learning purposes:
/// piece placement, side to move, castling rights and en passant target.
pub const KEY_FIELDS: usize = 4;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum PositionKeyError {
    #[error("FEN `{0}` has fewer than {KEY_FIELDS} fields")]
    InvalidFen(String),
}

/// A FEN with the halfmove and fullmove counters stripped.
///
/// Positions reached through different move orders (transpositions), or at
/// different points in the game, share a key.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedPositionKey(String);

impl NormalizedPositionKey {
    pub fn from_fen(fen: &str) -> Result<Self, PositionKeyError> {
        let fields = fen.split_whitespace().take(KEY_FIELDS).collect::<Vec<_>>();

        if fields.len() < KEY_FIELDS {
            return Err(PositionKeyError::InvalidFen(fen.to_string()));
        }

        Ok(NormalizedPositionKey(fields.join(" ")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NormalizedPositionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plies already played in the game the FEN was taken from.
///
/// A FEN without move counters is treated as the start of a game.
pub fn plies_played(fen: &str) -> u32 {
    let mut fields = fen.split_whitespace();
    let black_to_move = fields.nth(1) == Some("b");
    let fullmove = fields
        .nth(3)
        .and_then(|x| x.parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);

    let plies = 2 * (fullmove as u64 - 1) + black_to_move as u64;
    u32::try_from(plies).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_counters_are_ignored() {
        let early = NormalizedPositionKey::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1").unwrap();
        let late = NormalizedPositionKey::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 17 42").unwrap();

        assert_eq!(early, late);
        assert_eq!(early.as_str(), "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3");
    }

    #[test]
    fn check_relevant_fields_are_kept() {
        let white = NormalizedPositionKey::from_fen("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap();
        let black = NormalizedPositionKey::from_fen("8/8/8/8/8/8/8/K6k b - - 0 1").unwrap();
        assert_ne!(white, black);

        let castle = NormalizedPositionKey::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let no_castle = NormalizedPositionKey::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
        assert_ne!(castle, no_castle);
    }

    #[test]
    fn check_short_fen_rejected() {
        assert_eq!(
            NormalizedPositionKey::from_fen("8/8/8/8/8/8/8/K6k w"),
            Err(PositionKeyError::InvalidFen("8/8/8/8/8/8/8/K6k w".to_string())),
        );
        assert!(NormalizedPositionKey::from_fen("8/8/8/8/8/8/8/K6k w - -").is_ok());
    }

    #[test]
    fn check_plies_played() {
        assert_eq!(plies_played("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"), 0);
        assert_eq!(plies_played("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"), 1);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k w - - 0 8"), 14);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k b - - 3 8"), 15);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k b - -"), 1);
    }

    #[test]
    fn check_huge_move_counter_saturates() {
        assert_eq!(plies_played("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 3000000000"), u32::MAX);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k b - - 0 4294967295"), u32::MAX);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k w - - 0 2147483648"), u32::MAX - 1);
        assert_eq!(plies_played("8/8/8/8/8/8/8/K6k w - - 0 0"), 0);
    }
}
