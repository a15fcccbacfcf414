//! Parsing for the command line at startup

use std::path::PathBuf;
use std::time::Duration;
use anyhow::{anyhow, Result};
use clap::Parser;
use crate::core::evaluation::DEFAULT_EVALUATION_DEPTH;
use crate::core::rules::START_POSITION;
use crate::engine::EngineConfig;
use crate::learning::opening_book::OPENING_HORIZON;
use crate::learning::LearningConfig;
use crate::selection::SelectionConfig;

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Learns from historical games, then picks a move for a position.")]
pub struct Cli {
    /// The UCI engine executable.
    #[arg(short, long, default_value = "stockfish")]
    pub engine: PathBuf,

    /// Extra arguments for the engine executable.
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    pub engine_args: Vec<String>,

    /// Engine options to set during the handshake, as `Name=value`.
    #[arg(long = "engine-option", value_parser = parse_engine_option)]
    pub engine_options: Vec<(String, String)>,

    /// Tab separated games dataset to learn from.
    #[arg(short, long, conflicts_with = "db_path")]
    pub games: Option<PathBuf>,

    /// SQLite database to learn from, e.g. `sqlite://games.db`.
    #[arg(long)]
    pub db_path: Option<String>,

    /// The position to pick a move for.
    #[arg(short, long, default_value = START_POSITION)]
    pub fen: String,

    /// ELO-like playing strength, nominally 800 to 2400.
    #[arg(short, long, default_value_t = 1500)]
    pub difficulty: u32,

    /// Seed for move selection. Random when left out.
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Plies per game that feed the opening book.
    #[arg(long, default_value_t = OPENING_HORIZON)]
    pub opening_horizon: u32,

    /// Depth to evaluate positions to.
    #[arg(long, default_value_t = DEFAULT_EVALUATION_DEPTH)]
    pub evaluation_depth: u32,

    #[arg(long, default_value_t = 10_000)]
    pub handshake_timeout_ms: u64,

    #[arg(long, default_value_t = 30_000)]
    pub request_timeout_ms: u64,

    /// Writes the opening book to this file as JSON.
    #[arg(long)]
    pub export_book: Option<PathBuf>,

    /// Also asks the engine to evaluate the position.
    #[arg(long, default_value_t = false)]
    pub evaluate: bool,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            path: self.engine.clone(),
            args: self.engine_args.clone(),
            options: self.engine_options.clone(),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    pub fn selection_config(&self) -> SelectionConfig {
        SelectionConfig {
            seed: self.seed,
            evaluation_depth: self.evaluation_depth,
            ..SelectionConfig::default()
        }
    }

    pub fn learning_config(&self) -> LearningConfig {
        LearningConfig {
            opening_horizon: self.opening_horizon,
        }
    }
}

fn parse_engine_option(s: &str) -> Result<(String, String)> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected `Name=value`, got `{s}`"))?;

    if name.trim().is_empty() {
        return Err(anyhow!("engine option `{s}` has no name"));
    }

    Ok((name.trim().to_string(), value.trim().to_string()))
}

#[test]
fn check_defaults() {
    let cli = Cli::parse_from(["chesslearn"]);

    assert_eq!(cli.fen, START_POSITION);
    assert_eq!(cli.difficulty, 1500);
    assert_eq!(cli.learning_config().opening_horizon, OPENING_HORIZON);
    assert_eq!(cli.engine_config().request_timeout, Duration::from_secs(30));
    assert!(cli.games.is_none());
}

#[test]
fn check_engine_options() {
    let cli = Cli::parse_from([
        "chesslearn",
        "--engine-option", "Hash=64",
        "--engine-option", "Skill Level = 5",
        "--seed", "7",
    ]);

    assert_eq!(cli.engine_config().options, vec![
        ("Hash".to_string(), "64".to_string()),
        ("Skill Level".to_string(), "5".to_string()),
    ]);
    assert_eq!(cli.selection_config().seed, Some(7));
    assert!(Cli::try_parse_from(["chesslearn", "--engine-option", "Hash"]).is_err());
}

#[test]
fn check_single_games_source() {
    let result = Cli::try_parse_from(["chesslearn", "--games", "games.tsv", "--db-path", "sqlite://games.db"]);

    assert!(result.is_err());
}
