use std::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// Pawn value reported for a forced mate, signed by who is mating.
pub const MATE_SCORE_PAWNS: f64 = 100.0;

// Engine scores are reported in 100ths of a pawn
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Centipawns(pub i64);

impl Centipawns {
    pub fn new(val: i64) -> Centipawns {
        Centipawns(val)
    }

    pub fn to_pawns(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Display for Centipawns {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A score as reported by the engine, from the side to move's perspective.
///
/// `Mate(3)`: the side to move mates in 3. `Mate(-2)`: the side to move gets mated in 2.
/// `Mate(0)`: the side to move is already mated.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum EngineScore {
    Centipawns(Centipawns),
    Mate(i32),
}

impl EngineScore {
    pub fn to_pawns(self) -> f64 {
        match self {
            EngineScore::Centipawns(cp) => cp.to_pawns(),
            EngineScore::Mate(x) if x <= 0 => -MATE_SCORE_PAWNS,
            EngineScore::Mate(_) => MATE_SCORE_PAWNS,
        }
    }

    pub fn mate(self) -> Option<i32> {
        match self {
            EngineScore::Centipawns(_) => None,
            EngineScore::Mate(x) => Some(x),
        }
    }
}

impl Display for EngineScore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Centipawns(x) if *x > Centipawns::new(0) => write!(f, "+{}", x),
            Self::Centipawns(x) => write!(f, "{}", x),
            Self::Mate(x) if *x <= 0 => write!(f, "-M{}", -x),
            Self::Mate(x) => write!(f, "+M{}", x),
        }
    }
}
