use std::fs::File;
use std::io::BufWriter;
use std::sync::Arc;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chesslearn::core::rules::{ChessRules, RulesEngine};
use chesslearn::engine::EngineClient;
use chesslearn::input::command_line::Cli;
use chesslearn::learning::database::SqliteGameSource;
use chesslearn::learning::game_source::{GameSource, HistoricalGame};
use chesslearn::learning::games_dataset::TsvGameSource;
use chesslearn::learning::LearningService;
use chesslearn::selection::MoveSelector;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let rules: Arc<dyn RulesEngine> = Arc::new(ChessRules);
    let learning = Arc::new(LearningService::new(rules.clone(), cli.learning_config()));
    let engine = Arc::new(EngineClient::start(cli.engine_config()));
    let selector = MoveSelector::new(learning, engine.clone(), rules, cli.selection_config());

    let source: Box<dyn GameSource> = match (&cli.games, &cli.db_path) {
        (Some(path), _) => Box::new(TsvGameSource::new(path)),
        (None, Some(url)) => Box::new(SqliteGameSource::connect(url).await?),
        (None, None) => {
            warn!("no games to learn from, only the engine will be consulted");
            Box::new(Vec::<HistoricalGame>::new())
        },
    };

    let report = selector.reload(source.as_ref()).await?;
    println!("{}", serde_json::to_string(&report)?);
    println!("{}", serde_json::to_string(&selector.statistics())?);

    if let Some(path) = &cli.export_book {
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &selector.export_opening_book())?;
        info!(path = %path.display(), "opening book exported");
    }

    engine.wait_ready().await;

    match selector.select_move(&cli.fen, cli.difficulty).await {
        Some(selected) => println!("{}", serde_json::to_string(&selected)?),
        None => println!("null"),
    }

    if cli.evaluate {
        match selector.evaluate_position(&cli.fen).await {
            Ok(evaluation) => println!("{}", serde_json::to_string(&evaluation)?),
            Err(error) => warn!(%error, "position could not be evaluated"),
        }
    }

    engine.destroy().await;

    Ok(())
}
