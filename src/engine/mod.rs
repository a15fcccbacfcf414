//! Client for an external UCI engine process.
//!
//! One [`EngineClient`] owns one process. Requests are queued to a single worker
//! task, which keeps at most one search running and routes the engine's output
//! back to the caller that asked for it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};
use crate::core::evaluation::{classify, EngineEvaluation, MoveClassification, MIN_AUTHORITATIVE_DEPTH};
use crate::engine::pending::{PendingKind, PendingRequest, RequestId};
use crate::engine::process::WorkerMessage;
use crate::input::protocol_interpreter::CalculateOptions;

pub mod pending;
pub mod process;

/// Played when the engine could not be started.
pub const DEFAULT_OPENING_MOVE: &str = "e2e4";

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum EngineError {
    #[error("engine could not be started: {0}")]
    Unavailable(String),
    #[error("engine did not answer within {0:?}")]
    Unresponsive(Duration),
    #[error("engine process is not running")]
    Dead,
    #[error("engine search ended before reaching an authoritative depth (deepest frame: {reached:?})")]
    InsufficientDepth {
        reached: Option<u32>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineState {
    Starting,  // handshake not finished yet
    Ready,
    Busy,  // a search is outstanding
    Dead,
    Degraded,  // no process: fixed answers only
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    /// Sent as `setoption` during the handshake, e.g. `("Hash", "64")`.
    pub options: Vec<(String, String)>,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            path: PathBuf::from("stockfish"),
            args: Vec::new(),
            options: Vec::new(),
            handshake_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Anything that can be asked for moves and evaluations the way a UCI engine can.
#[async_trait]
pub trait MoveEngine: Send + Sync {
    async fn best_move(&self, fen: &str, thinking_time_ms: u64) -> Result<String, EngineError>;

    async fn evaluate(&self, fen: &str, depth: u32) -> Result<EngineEvaluation, EngineError>;
}

pub struct EngineClient {
    config: EngineConfig,
    requests: Option<mpsc::UnboundedSender<WorkerMessage>>,
    state: watch::Receiver<EngineState>,
    next_id: AtomicU64,
    destroyed: AtomicBool,
}

impl EngineClient {
    /// Spawns the engine process. Never fails: an engine that cannot be spawned
    /// leaves the client degraded.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: EngineConfig) -> Self {
        match process::spawn_engine(&config) {
            Ok((requests, state)) => {
                info!(path = %config.path.display(), "engine process spawned");

                EngineClient {
                    config,
                    requests: Some(requests),
                    state,
                    next_id: AtomicU64::new(0),
                    destroyed: AtomicBool::new(false),
                }
            },
            Err(error) => {
                warn!(path = %config.path.display(), %error, "engine unavailable, running degraded");
                EngineClient::degraded(config)
            },
        }
    }

    pub fn degraded(config: EngineConfig) -> Self {
        let (_, state) = watch::channel(EngineState::Degraded);

        EngineClient {
            config,
            requests: None,
            state,
            next_id: AtomicU64::new(0),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Resolves once the handshake is over, with the state it ended in.
    pub async fn wait_ready(&self) -> EngineState {
        let mut state = self.state.clone();

        loop {
            let current = *state.borrow_and_update();
            if current != EngineState::Starting {
                return current;
            }

            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }

    pub fn new_game(&self) -> Result<(), EngineError> {
        self.send(WorkerMessage::NewGame)
    }

    /// Kills the engine process. Every later request fails with [`EngineError::Dead`].
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.send(WorkerMessage::Quit).is_ok() {
            let mut state = self.state.clone();
            loop {
                let current = *state.borrow_and_update();
                if matches!(current, EngineState::Dead | EngineState::Degraded) {
                    break;
                }

                if state.changed().await.is_err() {
                    break;
                }
            }
        }

        info!("engine destroyed");
    }

    pub fn classify(actual: &EngineEvaluation, reference: &EngineEvaluation) -> MoveClassification {
        classify(actual, reference)
    }

    fn is_degraded(&self) -> bool {
        self.state() == EngineState::Degraded
    }

    fn send(&self, message: WorkerMessage) -> Result<(), EngineError> {
        if self.destroyed.load(Ordering::SeqCst) && !matches!(message, WorkerMessage::Quit) {
            return Err(EngineError::Dead);
        }

        match &self.requests {
            Some(requests) => requests.send(message).map_err(|_| EngineError::Dead),
            None => Ok(()),
        }
    }

    async fn request<T>(
        &self,
        fen: &str,
        options: CalculateOptions,
        kind: impl FnOnce(oneshot::Sender<Result<T, EngineError>>) -> PendingKind,
    ) -> Result<T, EngineError> {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (reply, answer) = oneshot::channel();

        self.send(WorkerMessage::Request(PendingRequest {
            id,
            fen: fen.to_string(),
            options,
            kind: kind(reply),
        }))?;

        match tokio::time::timeout(self.config.request_timeout, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(EngineError::Dead),
            Err(_) => {
                warn!(id = id.0, timeout = ?self.config.request_timeout, "engine request timed out");
                let _ = self.send(WorkerMessage::Cancel(id));
                Err(EngineError::Unresponsive(self.config.request_timeout))
            },
        }
    }
}

#[async_trait]
impl MoveEngine for EngineClient {
    async fn best_move(&self, fen: &str, thinking_time_ms: u64) -> Result<String, EngineError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Dead);
        }

        if self.is_degraded() {
            return Ok(DEFAULT_OPENING_MOVE.to_string());
        }

        self.request(fen, CalculateOptions::MoveTime(thinking_time_ms), PendingKind::BestMove).await
    }

    async fn evaluate(&self, fen: &str, depth: u32) -> Result<EngineEvaluation, EngineError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Dead);
        }

        if self.is_degraded() {
            return Ok(degraded_evaluation());
        }

        self.request(fen, CalculateOptions::Depth(depth), |reply| PendingKind::Evaluation {
            depth_floor: MIN_AUTHORITATIVE_DEPTH,
            reply,
        }).await
    }
}

/// What a degraded engine reports for any position.
pub fn degraded_evaluation() -> EngineEvaluation {
    EngineEvaluation {
        score: 0.0,
        mate: None,
        best_move: DEFAULT_OPENING_MOVE.to_string(),
        principal_variation: Vec::new(),
        depth: 0,
    }
}
