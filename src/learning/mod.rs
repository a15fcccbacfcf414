//! Learning from historical games.
//!
//! A reload replays every game from the start position, collecting one
//! observation per ply, and folds the observations of the games that replayed
//! cleanly into a fresh [`LearningSnapshot`]. Readers keep using the previous
//! snapshot until the new one is swapped in.

use std::sync::{Arc, PoisonError, RwLock};
use anyhow::{Context, Result};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};
use crate::core::position_key::{plies_played, NormalizedPositionKey};
use crate::core::rules::{is_move_token, RulesEngine};
use crate::learning::game_source::{parse_evaluation, GameSource, HistoricalGame, IngestError, Side};
use crate::learning::opening_book::{OpeningBookExport, OpeningBookStore, OPENING_HORIZON};
use crate::learning::position_store::PositionStatisticsStore;
use crate::selection::{MoveSource, SelectedMove};

pub mod database;
pub mod game_source;
pub mod games_dataset;
pub mod opening_book;
pub mod position_store;

/// Folds `value` into a mean over `count` values, `count` already including `value`.
pub fn fold_running_mean(mean: f64, count: u32, value: f64) -> f64 {
    let count = count as f64;
    (mean * (count - 1.0) + value) / count
}

#[derive(Copy, Clone, Debug)]
pub struct LearningConfig {
    pub opening_horizon: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        LearningConfig {
            opening_horizon: OPENING_HORIZON,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LearningSnapshot {
    pub opening_book: OpeningBookStore,
    pub positions: PositionStatisticsStore,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct ReloadReport {
    pub games_ingested: usize,
    pub games_skipped: usize,
    pub plies_ingested: usize,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LearningStatistics {
    pub book_size: usize,
    pub position_store_size: usize,
    pub total_book_moves: usize,
}

/// One ply of a replayed game.
#[derive(Clone, Debug)]
struct Observation {
    ply: u32,
    position_key: NormalizedPositionKey,
    uci: String,
    side: Side,
    /// White's perspective, in pawns.
    evaluation: f64,
}

impl LearningSnapshot {
    fn with_horizon(opening_horizon: u32) -> Self {
        LearningSnapshot {
            opening_book: OpeningBookStore::with_horizon(opening_horizon),
            positions: PositionStatisticsStore::default(),
        }
    }

    fn commit(&mut self, game: &HistoricalGame, observations: &[Observation]) {
        let horizon = self.opening_book.horizon();

        for observation in observations {
            self.positions.ingest(&observation.position_key, &observation.uci, observation.evaluation);

            if observation.ply >= horizon {
                continue;
            }

            // unfinished games say nothing about which moves win
            if let Some(outcome) = game.result.outcome_for(observation.side) {
                let evaluation = match observation.side {
                    Side::White => observation.evaluation,
                    Side::Black => -observation.evaluation,
                };
                self.opening_book.record(&observation.position_key, &observation.uci, outcome, evaluation);
            }
        }
    }

    pub fn statistics(&self) -> LearningStatistics {
        LearningStatistics {
            book_size: self.opening_book.len(),
            position_store_size: self.positions.len(),
            total_book_moves: self.opening_book.total_moves(),
        }
    }
}

pub struct LearningService {
    rules: Arc<dyn RulesEngine>,
    config: LearningConfig,
    snapshot: RwLock<Arc<LearningSnapshot>>,
    reload_lock: tokio::sync::Mutex<()>,
}

impl LearningService {
    /// Starts out empty: nothing is learned before the first [`LearningService::reload`].
    pub fn new(rules: Arc<dyn RulesEngine>, config: LearningConfig) -> Self {
        LearningService {
            rules,
            config,
            snapshot: RwLock::new(Arc::new(LearningSnapshot::with_horizon(config.opening_horizon))),
            reload_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    /// The stores as of the last completed reload.
    pub fn snapshot(&self) -> Arc<LearningSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuilds both stores from `source`. Games that cannot be read or do not replay
    /// are skipped whole; only a source that cannot be read at all fails the reload.
    pub async fn reload(&self, source: &dyn GameSource) -> Result<ReloadReport> {
        let _reloading = self.reload_lock.lock().await;

        let games = source.load_games().await.context("failed to load historical games")?;
        let mut snapshot = LearningSnapshot::with_horizon(self.config.opening_horizon);
        let mut report = ReloadReport::default();

        for record in &games {
            let replayed = record
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|game| Ok((game, self.replay(game)?)));

            match replayed {
                Ok((game, observations)) => {
                    snapshot.commit(game, &observations);
                    report.games_ingested += 1;
                    report.plies_ingested += observations.len();
                },
                Err(error) => {
                    warn!(%error, "skipping malformed game");
                    report.games_skipped += 1;
                },
            }
        }

        let statistics = snapshot.statistics();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        info!(
            games = report.games_ingested,
            skipped = report.games_skipped,
            plies = report.plies_ingested,
            book_size = statistics.book_size,
            positions = statistics.position_store_size,
            "learning stores reloaded"
        );

        Ok(report)
    }

    /// Book move first (early in the game), then a move from the position store with
    /// probability `min(difficulty / 2000, 1)`. Only moves in `legal_moves` are returned.
    pub fn select_learned_move<R: Rng + ?Sized>(
        &self,
        fen: &str,
        legal_moves: &[String],
        difficulty: u32,
        rng: &mut R,
    ) -> Option<SelectedMove> {
        let position_key = self.rules
            .canonical_fen(fen)
            .ok()
            .and_then(|x| NormalizedPositionKey::from_fen(&x).ok())?;
        let is_legal = |mv: &str| legal_moves.iter().any(|x| x == mv);
        let snapshot = self.snapshot();

        if plies_played(fen) < snapshot.opening_book.horizon() {
            if let Some(mv) = snapshot.opening_book.select_move(&position_key, rng) {
                if is_legal(mv) {
                    return Some(SelectedMove::new(mv, MoveSource::Book));
                }
                debug!(fen, mv, "illegal book candidate");
            }
        }

        let record = snapshot.positions.lookup(&position_key)?;
        let trust = (difficulty as f64 / 2000.0).min(1.0);
        if rng.gen::<f64>() >= trust {
            return None;
        }

        for mv in &record.moves {
            if is_legal(mv.as_str()) {
                return Some(SelectedMove::new(mv, MoveSource::PositionStore));
            }
            debug!(fen, mv = mv.as_str(), "illegal position store candidate");
        }

        None
    }

    pub fn statistics(&self) -> LearningStatistics {
        self.snapshot().statistics()
    }

    pub fn export_opening_book(&self) -> OpeningBookExport {
        self.snapshot().opening_book.export()
    }

    fn replay(&self, game: &HistoricalGame) -> Result<Vec<Observation>, IngestError> {
        let rejected = |ply: usize, mv: &str, reason: String| IngestError::MalformedMove {
            game: game.id.clone(),
            ply,
            mv: mv.to_string(),
            reason,
        };

        let start = self.rules.start_position();
        let mut fen = self.rules
            .canonical_fen(&start)
            .map_err(|e| rejected(0, "", e.to_string()))?;
        let mut observations = Vec::with_capacity(game.moves.len());

        for (ply, historical_move) in game.moves.iter().enumerate() {
            let expected = Side::from_fen(&fen)
                .ok_or_else(|| rejected(ply, &historical_move.san, format!("no side to move in `{fen}`")))?;
            if historical_move.side != expected {
                return Err(IngestError::WrongSide {
                    game: game.id.clone(),
                    ply,
                    recorded: historical_move.side,
                    expected,
                });
            }

            let uci = match historical_move.uci.as_deref().map(str::trim) {
                Some(uci) if !uci.is_empty() => uci.to_string(),
                _ => self.rules
                    .san_to_uci(&fen, &historical_move.san)
                    .map_err(|e| rejected(ply, &historical_move.san, e.to_string()))?,
            };
            if !is_move_token(&uci) {
                return Err(rejected(ply, &uci, "not a coordinate move".to_string()));
            }

            let evaluation = parse_evaluation(historical_move.evaluation.as_deref())
                .ok_or_else(|| IngestError::MalformedEvaluation {
                    game: game.id.clone(),
                    ply,
                    text: historical_move.evaluation.clone().unwrap_or_default(),
                })?;

            let position_key = NormalizedPositionKey::from_fen(&fen)
                .map_err(|e| rejected(ply, &uci, e.to_string()))?;
            let next = self.rules
                .apply_move(&fen, &uci)
                .map_err(|e| rejected(ply, &uci, e.to_string()))?;

            observations.push(Observation {
                ply: ply as u32,
                position_key,
                uci,
                side: expected,
                evaluation,
            });
            fen = next;
        }

        Ok(observations)
    }
}
