use proptest::prelude::*;
use crate::core::position_key::NormalizedPositionKey;
use crate::core::rules::START_POSITION;
use crate::learning::opening_book::OpeningBookStore;
use crate::learning::position_store::PositionStatisticsStore;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

proptest! {
    #[test]
    fn book_statistics_are_exact_means(
        observations in prop::collection::vec((prop::sample::select(vec![0.0, 0.5, 1.0]), -20.0f64..20.0), 1..60)
    ) {
        let key = NormalizedPositionKey::from_fen(START_POSITION).unwrap();
        let mut book = OpeningBookStore::default();
        for (outcome, evaluation) in &observations {
            book.record(&key, "e2e4", *outcome, *evaluation);
        }

        let outcomes = observations.iter().map(|x| x.0).collect::<Vec<_>>();
        let evaluations = observations.iter().map(|x| x.1).collect::<Vec<_>>();
        let candidates = book.candidates(&key);
        let (stat, _) = candidates[0];

        prop_assert_eq!(stat.count as usize, observations.len());
        prop_assert!((stat.win_rate - mean(&outcomes)).abs() < 1e-9);
        prop_assert!((stat.avg_evaluation - mean(&evaluations)).abs() < 1e-9);
    }

    #[test]
    fn position_evaluation_is_exact_mean(evaluations in prop::collection::vec(-100.0f64..100.0, 1..60)) {
        let key = NormalizedPositionKey::from_fen(START_POSITION).unwrap();
        let mut store = PositionStatisticsStore::default();
        for (index, evaluation) in evaluations.iter().enumerate() {
            let mv = if index % 2 == 0 { "e2e4" } else { "d2d4" };
            store.ingest(&key, mv, *evaluation);
        }

        let record = store.lookup(&key).unwrap();
        prop_assert_eq!(record.games_played as usize, evaluations.len());
        prop_assert!((record.avg_evaluation - mean(&evaluations)).abs() < 1e-9);
        prop_assert_eq!(record.moves.len(), evaluations.len().min(2));
    }
}
