use std::str::FromStr;
use chess::{Board, ChessMove, Color, MoveGen};
use thiserror::Error;

pub const START_POSITION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum RulesError {
    #[error("invalid FEN `{0}`")]
    InvalidFen(String),
    #[error("`{0}` is not a coordinate move")]
    InvalidMove(String),
    #[error("`{mv}` is not legal in `{fen}`")]
    IllegalMove {
        fen: String,
        mv: String,
    },
}

/// The chess rules the decision engine relies on but never implements itself.
///
/// Moves are UCI coordinate tokens (`e2e4`, `e7e8q`), positions are FEN strings.
pub trait RulesEngine: Send + Sync {
    fn start_position(&self) -> String {
        START_POSITION.to_string()
    }

    fn legal_moves(&self, fen: &str) -> Result<Vec<String>, RulesError>;

    fn apply_move(&self, fen: &str, uci: &str) -> Result<String, RulesError>;

    /// Re-serializes a FEN, so that equal positions produce equal strings.
    fn canonical_fen(&self, fen: &str) -> Result<String, RulesError>;

    fn san_to_uci(&self, fen: &str, san: &str) -> Result<String, RulesError>;

    fn is_legal(&self, fen: &str, uci: &str) -> Result<bool, RulesError> {
        Ok(self.legal_moves(fen)?.iter().any(|x| x == uci))
    }
}

/// Rules backed by the `chess` crate's move generator.
#[derive(Copy, Clone, Debug, Default)]
pub struct ChessRules;

impl ChessRules {
    fn board(fen: &str) -> Result<Board, RulesError> {
        let fields = fen.split_whitespace().count();

        // counters are optional for the caller, not for the parser
        let full_fen = match fields {
            4 => format!("{} 0 1", fen.trim()),
            5 => format!("{} 1", fen.trim()),
            _ => fen.trim().to_string(),
        };

        Board::from_str(&full_fen).map_err(|_| RulesError::InvalidFen(fen.to_string()))
    }

    fn chess_move(uci: &str) -> Result<ChessMove, RulesError> {
        if !is_move_token(uci) {
            return Err(RulesError::InvalidMove(uci.to_string()));
        }

        ChessMove::from_str(uci).map_err(|_| RulesError::InvalidMove(uci.to_string()))
    }
}

impl RulesEngine for ChessRules {
    fn legal_moves(&self, fen: &str) -> Result<Vec<String>, RulesError> {
        let board = ChessRules::board(fen)?;

        Ok(MoveGen::new_legal(&board).map(|x| x.to_string()).collect())
    }

    fn apply_move(&self, fen: &str, uci: &str) -> Result<String, RulesError> {
        let board = ChessRules::board(fen)?;
        let chess_move = ChessRules::chess_move(uci)?;

        if !board.legal(chess_move) {
            return Err(RulesError::IllegalMove {
                fen: fen.to_string(),
                mv: uci.to_string(),
            });
        }

        let next = board.make_move_new(chess_move);

        // `Board` does not track counters: carry the fullmove number over ourselves
        let fullmove = fen
            .split_whitespace()
            .nth(5)
            .and_then(|x| x.parse::<u32>().ok())
            .unwrap_or(1);
        let fullmove = match board.side_to_move() {
            Color::Black => fullmove.saturating_add(1),
            Color::White => fullmove,
        };

        Ok(with_fullmove(&next.to_string(), fullmove))
    }

    fn canonical_fen(&self, fen: &str) -> Result<String, RulesError> {
        let board = ChessRules::board(fen)?;
        let fullmove = fen
            .split_whitespace()
            .nth(5)
            .and_then(|x| x.parse::<u32>().ok())
            .unwrap_or(1);

        Ok(with_fullmove(&board.to_string(), fullmove))
    }

    fn san_to_uci(&self, fen: &str, san: &str) -> Result<String, RulesError> {
        let board = ChessRules::board(fen)?;
        let san = san.trim_end_matches(|c| c == '+' || c == '#' || c == '!' || c == '?');

        ChessMove::from_san(&board, san)
            .map(|x| x.to_string())
            .map_err(|_| RulesError::IllegalMove {
                fen: fen.to_string(),
                mv: san.to_string(),
            })
    }
}

/// Whether `token` looks like a UCI coordinate move, e.g. `e2e4` or `e7e8q`.
pub fn is_move_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    let is_square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);

    match bytes.len() {
        4 => is_square(bytes[0], bytes[1]) && is_square(bytes[2], bytes[3]),
        5 => is_square(bytes[0], bytes[1]) && is_square(bytes[2], bytes[3]) && b"qrbn".contains(&bytes[4]),
        _ => false,
    }
}

fn with_fullmove(fen: &str, fullmove: u32) -> String {
    let mut fields = fen.split_whitespace().take(5).collect::<Vec<_>>();
    let fullmove = fullmove.to_string();
    fields.push(&fullmove);
    fields.join(" ")
}
