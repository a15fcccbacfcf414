use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use crate::core::score::EngineScore;

/// Frames below this depth are never treated as the engine's verdict on a position.
pub const MIN_AUTHORITATIVE_DEPTH: u32 = 10;
pub const DEFAULT_EVALUATION_DEPTH: u32 = 15;

// Absorbs the rounding of pawn differences such as 0.35 - 0.25
const CLASSIFICATION_EPSILON: f64 = 1e-9;

/// One `info` frame of an engine search, converted to pawns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineEvaluation {
    pub score: f64,
    pub mate: Option<i32>,
    pub best_move: String,
    pub principal_variation: Vec<String>,
    pub depth: u32,
}

impl EngineEvaluation {
    pub fn from_frame(depth: u32, score: EngineScore, principal_variation: Vec<String>) -> Self {
        EngineEvaluation {
            score: score.to_pawns(),
            mate: score.mate(),
            best_move: principal_variation.first().cloned().unwrap_or_default(),
            principal_variation,
            depth,
        }
    }

    pub fn is_authoritative(&self) -> bool {
        self.depth >= MIN_AUTHORITATIVE_DEPTH
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveClassification {
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl MoveClassification {
    /// Upper bound (inclusive) of the pawn loss for each bucket, best first.
    pub const THRESHOLDS: [(f64, MoveClassification); 5] = [
        (0.10, MoveClassification::Best),
        (0.25, MoveClassification::Excellent),
        (0.50, MoveClassification::Good),
        (1.00, MoveClassification::Inaccuracy),
        (2.00, MoveClassification::Mistake),
    ];

    pub fn from_pawn_loss(loss: f64) -> Self {
        MoveClassification::THRESHOLDS
            .iter()
            .find(|(bound, _)| loss <= bound + CLASSIFICATION_EPSILON)
            .map(|(_, classification)| *classification)
            .unwrap_or(MoveClassification::Blunder)
    }
}

impl Display for MoveClassification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveClassification::Best => write!(f, "best"),
            MoveClassification::Excellent => write!(f, "excellent"),
            MoveClassification::Good => write!(f, "good"),
            MoveClassification::Inaccuracy => write!(f, "inaccuracy"),
            MoveClassification::Mistake => write!(f, "mistake"),
            MoveClassification::Blunder => write!(f, "blunder"),
        }
    }
}

/// Buckets how far `actual` strays from `reference`, regardless of direction.
pub fn classify(actual: &EngineEvaluation, reference: &EngineEvaluation) -> MoveClassification {
    MoveClassification::from_pawn_loss((actual.score - reference.score).abs())
}
