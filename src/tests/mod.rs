use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use crate::core::evaluation::EngineEvaluation;
use crate::engine::{EngineConfig, EngineError, MoveEngine};
use crate::learning::game_source::{GameResult, HistoricalGame, HistoricalMove, Side};

mod running_mean;

/// Answers every request the same way and remembers what it was asked.
pub struct ScriptedEngine {
    answer: Result<String, EngineError>,
    requests: Arc<Mutex<Vec<u64>>>,
    evaluation_depths: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedEngine {
    pub fn answering(answer: Result<String, EngineError>) -> Self {
        ScriptedEngine {
            answer,
            requests: Arc::new(Mutex::new(Vec::new())),
            evaluation_depths: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Thinking times of the `best_move` calls so far.
    pub fn requests(&self) -> Arc<Mutex<Vec<u64>>> {
        self.requests.clone()
    }

    pub fn evaluation_depths(&self) -> Arc<Mutex<Vec<u32>>> {
        self.evaluation_depths.clone()
    }
}

#[async_trait]
impl MoveEngine for ScriptedEngine {
    async fn best_move(&self, _fen: &str, thinking_time_ms: u64) -> Result<String, EngineError> {
        self.requests.lock().unwrap().push(thinking_time_ms);
        self.answer.clone()
    }

    async fn evaluate(&self, _fen: &str, depth: u32) -> Result<EngineEvaluation, EngineError> {
        self.evaluation_depths.lock().unwrap().push(depth);
        let best_move = self.answer.clone()?;

        Ok(EngineEvaluation {
            score: 0.2,
            mate: None,
            best_move: best_move.clone(),
            principal_variation: vec![best_move],
            depth,
        })
    }
}

/// An engine played by `/bin/sh` running `script`, which reads UCI commands line by line.
pub fn shell_engine(script: &str) -> EngineConfig {
    EngineConfig {
        path: "/bin/sh".into(),
        args: vec!["-c".to_string(), script.to_string()],
        options: Vec::new(),
        handshake_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(5),
    }
}

/// Builds a game from `(san, uci, evaluation)` triples, White moving first.
pub fn game(id: &str, result: GameResult, moves: &[(&str, &str, &str)]) -> HistoricalGame {
    let moves = moves
        .iter()
        .enumerate()
        .map(|(ply, (san, uci, evaluation))| HistoricalMove {
            move_number: ply as u32 / 2 + 1,
            side: if ply % 2 == 0 { Side::White } else { Side::Black },
            san: san.to_string(),
            uci: Some(uci.to_string()),
            evaluation: Some(evaluation.to_string()),
        })
        .collect();

    HistoricalGame {
        id: id.to_string(),
        result,
        moves,
    }
}
