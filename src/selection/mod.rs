//! Picks one move per position: learned statistics first, the engine next,
//! a random legal move when everything else fails.

use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, warn};
use crate::core::evaluation::{classify, EngineEvaluation, MoveClassification, DEFAULT_EVALUATION_DEPTH};
use crate::core::rules::RulesEngine;
use crate::engine::{EngineError, MoveEngine};
use crate::learning::game_source::GameSource;
use crate::learning::opening_book::OpeningBookExport;
use crate::learning::{LearningService, LearningStatistics, ReloadReport};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveSource {
    Book,
    PositionStore,
    Engine,
    Random,
}

impl Display for MoveSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveSource::Book => write!(f, "book"),
            MoveSource::PositionStore => write!(f, "position_store"),
            MoveSource::Engine => write!(f, "engine"),
            MoveSource::Random => write!(f, "random"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct SelectedMove {
    pub uci: String,
    pub source: MoveSource,
}

impl SelectedMove {
    pub fn new(uci: impl Into<String>, source: MoveSource) -> Self {
        SelectedMove {
            uci: uci.into(),
            source,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SelectionConfig {
    /// `None` seeds from the operating system.
    pub seed: Option<u64>,
    pub min_thinking_time_ms: u64,
    pub max_thinking_time_ms: u64,
    pub evaluation_depth: u32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            seed: None,
            min_thinking_time_ms: 500,
            max_thinking_time_ms: 3000,
            evaluation_depth: DEFAULT_EVALUATION_DEPTH,
        }
    }
}

impl SelectionConfig {
    /// Stronger settings think longer, within bounds.
    pub fn thinking_time_ms(&self, difficulty: u32) -> u64 {
        (difficulty as u64).clamp(self.min_thinking_time_ms, self.max_thinking_time_ms)
    }
}

pub struct MoveSelector {
    learning: Arc<LearningService>,
    engine: Arc<dyn MoveEngine>,
    rules: Arc<dyn RulesEngine>,
    config: SelectionConfig,
    rng: Mutex<StdRng>,
}

impl MoveSelector {
    pub fn new(
        learning: Arc<LearningService>,
        engine: Arc<dyn MoveEngine>,
        rules: Arc<dyn RulesEngine>,
        config: SelectionConfig,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        MoveSelector {
            learning,
            engine,
            rules,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    pub fn learning(&self) -> &Arc<LearningService> {
        &self.learning
    }

    /// A legal move for the side to move, or `None` when there is none.
    ///
    /// `difficulty` is an ELO-like rating, nominally 800 to 2400.
    pub async fn select_move(&self, fen: &str, difficulty: u32) -> Option<SelectedMove> {
        let legal_moves = match self.rules.legal_moves(fen) {
            Ok(moves) => moves,
            Err(error) => {
                warn!(fen, %error, "cannot select a move");
                return None;
            },
        };

        if legal_moves.is_empty() {
            debug!(fen, "no legal move available");
            return None;
        }

        let learned = {
            let mut rng = self.rng();
            self.learning.select_learned_move(fen, &legal_moves, difficulty, &mut *rng)
        };
        if let Some(selected) = learned {
            debug!(fen, mv = selected.uci.as_str(), source = %selected.source, "move selected");
            return Some(selected);
        }

        let thinking_time_ms = self.config.thinking_time_ms(difficulty);
        match self.engine.best_move(fen, thinking_time_ms).await {
            Ok(mv) if legal_moves.contains(&mv) => {
                debug!(fen, mv = mv.as_str(), source = %MoveSource::Engine, "move selected");
                return Some(SelectedMove::new(mv, MoveSource::Engine));
            },
            Ok(mv) => debug!(fen, mv = mv.as_str(), "illegal engine candidate"),
            Err(error) => warn!(fen, %error, "engine failed, falling back to a random move"),
        }

        let mut rng = self.rng();
        legal_moves
            .choose(&mut *rng)
            .map(|mv| SelectedMove::new(mv.as_str(), MoveSource::Random))
    }

    pub async fn evaluate_position(&self, fen: &str) -> Result<EngineEvaluation, EngineError> {
        self.engine.evaluate(fen, self.config.evaluation_depth).await
    }

    pub fn classify_move(&self, actual: &EngineEvaluation, reference: &EngineEvaluation) -> MoveClassification {
        classify(actual, reference)
    }

    pub async fn reload(&self, source: &dyn GameSource) -> anyhow::Result<ReloadReport> {
        self.learning.reload(source).await
    }

    pub fn statistics(&self) -> LearningStatistics {
        self.learning.statistics()
    }

    pub fn export_opening_book(&self) -> OpeningBookExport {
        self.learning.export_opening_book()
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
