//! Statistics over the first plies of the historical games, and the policy that
//! picks a book move from them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::core::position_key::NormalizedPositionKey;
use crate::learning::fold_running_mean;

/// Plies `0..OPENING_HORIZON` of a game feed the book.
pub const OPENING_HORIZON: u32 = 15;

/// Rank 1 is played below the first bound, rank 2 below the second, rank 3 otherwise.
pub const RANK_PROBABILITIES: [f64; 2] = [0.70, 0.90];

const WIN_RATE_WEIGHT: f64 = 0.5;
const FREQUENCY_WEIGHT: f64 = 0.3;
const EVALUATION_WEIGHT: f64 = 0.2;
const FREQUENCY_SATURATION: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpeningMoveStat {
    pub position_key: NormalizedPositionKey,
    #[serde(rename = "move")]
    pub mv: String,
    pub count: u32,
    /// From the mover's perspective.
    pub win_rate: f64,
    /// From the mover's perspective, in pawns.
    pub avg_evaluation: f64,
}

impl OpeningMoveStat {
    pub fn score(&self) -> f64 {
        WIN_RATE_WEIGHT * self.win_rate
            + FREQUENCY_WEIGHT * (self.count as f64 / FREQUENCY_SATURATION).min(1.0)
            + EVALUATION_WEIGHT * (self.avg_evaluation / 2.0).tanh()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OpeningBookExport {
    pub horizon: u32,
    pub positions: BTreeMap<NormalizedPositionKey, Vec<OpeningMoveStat>>,
}

#[derive(Clone, Debug)]
pub struct OpeningBookStore {
    horizon: u32,
    // moves per position, in order of first appearance
    positions: HashMap<NormalizedPositionKey, Vec<OpeningMoveStat>>,
}

impl Default for OpeningBookStore {
    fn default() -> Self {
        OpeningBookStore::with_horizon(OPENING_HORIZON)
    }
}

impl OpeningBookStore {
    pub fn with_horizon(horizon: u32) -> Self {
        OpeningBookStore {
            horizon,
            positions: HashMap::new(),
        }
    }

    /// Plies from this one on are out of book.
    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// `outcome` is 1 for a win, 0.5 for a draw and 0 for a loss of the side that played `chess_move`.
    pub fn record(&mut self, position_key: &NormalizedPositionKey, chess_move: &str, outcome: f64, evaluation: f64) {
        let moves = self.positions.entry(position_key.clone()).or_default();

        match moves.iter_mut().find(|x| x.mv == chess_move) {
            None => moves.push(OpeningMoveStat {
                position_key: position_key.clone(),
                mv: chess_move.to_string(),
                count: 1,
                win_rate: outcome,
                avg_evaluation: evaluation,
            }),
            Some(stat) => {
                stat.count += 1;
                stat.win_rate = fold_running_mean(stat.win_rate, stat.count, outcome);
                stat.avg_evaluation = fold_running_mean(stat.avg_evaluation, stat.count, evaluation);
            },
        }
    }

    /// The moves stored for a position, best score first. Ties keep first-appearance order.
    pub fn candidates(&self, position_key: &NormalizedPositionKey) -> Vec<(&OpeningMoveStat, f64)> {
        let mut candidates = match self.positions.get(position_key) {
            None => return Vec::new(),
            Some(moves) => moves.iter().map(|x| (x, x.score())).collect::<Vec<_>>(),
        };

        // `sort_by` is stable
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        candidates
    }

    pub fn select_move<R: Rng + ?Sized>(&self, position_key: &NormalizedPositionKey, rng: &mut R) -> Option<&str> {
        let candidates = self.candidates(position_key);
        if candidates.is_empty() {
            return None;
        }

        let r: f64 = rng.gen();
        let rank = if r < RANK_PROBABILITIES[0] {
            0
        } else if r < RANK_PROBABILITIES[1] {
            1
        } else {
            2
        };

        let (stat, _) = candidates.get(rank).unwrap_or(&candidates[0]);
        Some(stat.mv.as_str())
    }

    /// Number of positions in the book.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of distinct (position, move) pairs.
    pub fn total_moves(&self) -> usize {
        self.positions.values().map(Vec::len).sum()
    }

    pub fn export(&self) -> OpeningBookExport {
        OpeningBookExport {
            horizon: self.horizon,
            positions: self.positions
                .iter()
                .map(|(key, moves)| (key.clone(), moves.clone()))
                .collect(),
        }
    }
}
