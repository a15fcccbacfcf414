use std::path::PathBuf;
use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use chesslearn::learning::database::{SqliteGameSource, DB_URL};
use chesslearn::learning::games_dataset::read_games;

/// Copies a tab separated games dataset into an SQLite database, which
/// `chesslearn --db-path` can then learn from.
#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Imports a games dataset into an SQLite database.")]
struct Args {
    /// The tab separated games dataset.
    games: PathBuf,

    /// The DB to write to. Created when missing.
    #[arg(short, long, default_value = DB_URL)]
    db_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let games = read_games(&args.games)?;
    let db = SqliteGameSource::connect(&args.db_path).await?;

    let mut imported = 0;
    for record in &games {
        let game = match record {
            Ok(game) => game,
            Err(error) => {
                warn!(%error, "unreadable game not imported");
                continue;
            },
        };

        match db.insert_game(game).await {
            Ok(()) => imported += 1,
            Err(error) => warn!(game = %game.id, %error, "game not imported"),
        }
    }

    info!(imported, total = games.len(), db = %args.db_path, "games imported");

    Ok(())
}
