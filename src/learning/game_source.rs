use std::fmt::{Display, Formatter};
use std::str::FromStr;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::core::score::MATE_SCORE_PAWNS;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum GameResult {
    WhiteWon,
    BlackWon,
    Draw,
    Undetermined,
}

impl GameResult {
    /// 1 for a win, 0.5 for a draw, 0 for a loss, seen from `side`.
    /// Unfinished games have no outcome.
    pub fn outcome_for(&self, side: Side) -> Option<f64> {
        match (self, side) {
            (GameResult::WhiteWon, Side::White) | (GameResult::BlackWon, Side::Black) => Some(1.0),
            (GameResult::WhiteWon, Side::Black) | (GameResult::BlackWon, Side::White) => Some(0.0),
            (GameResult::Draw, _) => Some(0.5),
            (GameResult::Undetermined, _) => None,
        }
    }
}

impl FromStr for GameResult {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1-0" => Ok(GameResult::WhiteWon),
            "0-1" => Ok(GameResult::BlackWon),
            "1/2-1/2" | "½-½" => Ok(GameResult::Draw),
            "*" | "" => Ok(GameResult::Undetermined),
            other => Err(IngestError::MalformedResult(other.to_string())),
        }
    }
}

impl Display for GameResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameResult::WhiteWon => write!(f, "1-0"),
            GameResult::BlackWon => write!(f, "0-1"),
            GameResult::Draw => write!(f, "1/2-1/2"),
            GameResult::Undetermined => write!(f, "*"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// The side to move field of a FEN.
    pub fn from_fen(fen: &str) -> Option<Side> {
        match fen.split_whitespace().nth(1)? {
            "w" => Some(Side::White),
            "b" => Some(Side::Black),
            _ => None,
        }
    }
}

impl FromStr for Side {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "w" | "white" => Ok(Side::White),
            "b" | "black" => Ok(Side::Black),
            other => Err(IngestError::MalformedSide(other.to_string())),
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::White => write!(f, "white"),
            Side::Black => write!(f, "black"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalMove {
    pub move_number: u32,
    pub side: Side,
    pub san: String,
    pub uci: Option<String>,
    /// As stored with the game, e.g. `+0.35`, `-1.2` or `#-3`, from White's perspective.
    pub evaluation: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoricalGame {
    pub id: String,
    pub result: GameResult,
    pub moves: Vec<HistoricalMove>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("unknown game result `{0}`")]
    MalformedResult(String),
    #[error("unknown side `{0}`")]
    MalformedSide(String),
    #[error("game {game}: unreadable record: {reason}")]
    MalformedRecord {
        game: String,
        reason: String,
    },
    #[error("game {game}, ply {ply}: unreadable evaluation `{text}`")]
    MalformedEvaluation {
        game: String,
        ply: usize,
        text: String,
    },
    #[error("game {game}, ply {ply}: move `{mv}` rejected: {reason}")]
    MalformedMove {
        game: String,
        ply: usize,
        mv: String,
        reason: String,
    },
    #[error("game {game}, ply {ply}: recorded for {recorded} but {expected} is to move")]
    WrongSide {
        game: String,
        ply: usize,
        recorded: Side,
        expected: Side,
    },
}

/// Reads a stored evaluation in pawns. A missing evaluation counts as equal.
pub fn parse_evaluation(text: Option<&str>) -> Option<f64> {
    let text = match text.map(str::trim) {
        None | Some("") => return Some(0.0),
        Some(text) => text,
    };

    let mate = text
        .strip_prefix('#')
        .or_else(|| text.strip_prefix("+M"))
        .or_else(|| text.strip_prefix('M'));
    if let Some(distance) = mate {
        let distance = distance.parse::<i32>().ok()?;
        return Some(if distance < 0 { -MATE_SCORE_PAWNS } else { MATE_SCORE_PAWNS });
    }

    if let Some(distance) = text.strip_prefix("-M") {
        distance.parse::<u32>().ok()?;
        return Some(-MATE_SCORE_PAWNS);
    }

    text.parse::<f64>().ok().filter(|x| x.is_finite())
}

/// A game as read from a source: unreadable games are kept as errors, so that
/// they can be skipped without losing the rest.
pub type GameRecord = Result<HistoricalGame, IngestError>;

/// One move as a source stores it, before any field has been interpreted.
#[derive(Clone, Debug, Default)]
pub struct StoredMove {
    pub move_number: String,
    pub side: String,
    pub san: String,
    pub uci: Option<String>,
    pub evaluation: Option<String>,
}

/// Reads the stored fields of one game.
pub fn assemble_game(id: String, result: &str, moves: Vec<StoredMove>) -> GameRecord {
    let malformed = |reason: String| IngestError::MalformedRecord {
        game: id.clone(),
        reason,
    };

    let result = result.parse::<GameResult>().map_err(|e| malformed(e.to_string()))?;

    let moves = moves.into_iter().map(|stored| -> Result<HistoricalMove, IngestError> {
        let move_number = stored.move_number.trim().parse::<u32>()
            .map_err(|_| malformed(format!("move number `{}` out of range", stored.move_number)))?;

        Ok(HistoricalMove {
            move_number,
            side: stored.side.parse::<Side>().map_err(|e| malformed(e.to_string()))?,
            san: stored.san,
            uci: stored.uci.filter(|x| !x.is_empty()),
            evaluation: stored.evaluation.filter(|x| !x.is_empty()),
        })
    }).collect::<Result<Vec<_>, IngestError>>()?;

    Ok(HistoricalGame {
        id,
        result,
        moves,
    })
}

/// Somewhere historical games can be read from.
#[async_trait]
pub trait GameSource: Send + Sync {
    /// Games in the order they should be replayed. Fails only when the source
    /// as a whole cannot be read.
    async fn load_games(&self) -> anyhow::Result<Vec<GameRecord>>;
}

#[async_trait]
impl GameSource for Vec<HistoricalGame> {
    async fn load_games(&self) -> anyhow::Result<Vec<GameRecord>> {
        Ok(self.iter().cloned().map(Ok).collect())
    }
}
