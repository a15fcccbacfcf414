use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::core::position_key::NormalizedPositionKey;
use crate::learning::fold_running_mean;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub position_key: NormalizedPositionKey,
    /// In order of first appearance.
    pub moves: Vec<String>,
    pub avg_evaluation: f64,
    pub games_played: u32,
}

/// Every position seen in the historical games, regardless of game phase.
#[derive(Clone, Debug, Default)]
pub struct PositionStatisticsStore {
    records: HashMap<NormalizedPositionKey, PositionRecord>,
}

impl PositionStatisticsStore {
    pub fn ingest(&mut self, position_key: &NormalizedPositionKey, chess_move: &str, evaluation: f64) {
        match self.records.get_mut(position_key) {
            None => {
                self.records.insert(position_key.clone(), PositionRecord {
                    position_key: position_key.clone(),
                    moves: vec![chess_move.to_string()],
                    avg_evaluation: evaluation,
                    games_played: 1,
                });
            },
            Some(record) => {
                if !record.moves.iter().any(|x| x == chess_move) {
                    record.moves.push(chess_move.to_string());
                }

                // count first, then fold with the new count
                record.games_played += 1;
                record.avg_evaluation = fold_running_mean(record.avg_evaluation, record.games_played, evaluation);
            },
        }
    }

    pub fn lookup(&self, position_key: &NormalizedPositionKey) -> Option<&PositionRecord> {
        self.records.get(position_key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fen: &str) -> NormalizedPositionKey {
        NormalizedPositionKey::from_fen(fen).unwrap()
    }

    #[test]
    fn check_first_observation() {
        let mut store = PositionStatisticsStore::default();
        let start = key("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");

        assert!(store.lookup(&start).is_none());
        store.ingest(&start, "e2e4", 0.3);

        let record = store.lookup(&start).unwrap();
        assert_eq!(record.moves, vec!["e2e4"]);
        assert_eq!(record.avg_evaluation, 0.3);
        assert_eq!(record.games_played, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn check_moves_keep_first_appearance_order() {
        let mut store = PositionStatisticsStore::default();
        let start = key("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1");

        store.ingest(&start, "d2d4", 0.0);
        store.ingest(&start, "e2e4", 0.0);
        store.ingest(&start, "d2d4", 0.0);
        store.ingest(&start, "c2c4", 0.0);

        let record = store.lookup(&start).unwrap();
        assert_eq!(record.moves, vec!["d2d4", "e2e4", "c2c4"]);
        assert_eq!(record.games_played, 4);
    }

    #[test]
    fn check_running_mean() {
        let mut store = PositionStatisticsStore::default();
        let position = key("8/8/8/8/8/8/8/K6k w - - 0 1");

        store.ingest(&position, "a1a2", 1.0);
        store.ingest(&position, "a1a2", 2.0);
        store.ingest(&position, "a1b1", 6.0);

        let record = store.lookup(&position).unwrap();
        assert!((record.avg_evaluation - 3.0).abs() < 1e-12);
        assert_eq!(record.games_played, 3);
    }

    #[test]
    fn check_transpositions_share_a_record() {
        let mut store = PositionStatisticsStore::default();

        store.ingest(&key("8/8/8/8/8/8/8/K6k w - - 0 10"), "a1a2", 1.0);
        store.ingest(&key("8/8/8/8/8/8/8/K6k w - - 4 31"), "a1b1", 3.0);

        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup(&key("8/8/8/8/8/8/8/K6k w - - 0 1")).unwrap().games_played, 2);

        let moves = store.iter().flat_map(|x| x.moves.iter().cloned()).collect::<Vec<_>>();
        assert_eq!(moves, vec!["a1a2", "a1b1"]);
    }
}
