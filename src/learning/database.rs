use std::str::FromStr;
use anyhow::{Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;
use crate::learning::game_source::{assemble_game, GameRecord, GameSource, HistoricalGame, StoredMove};

pub const DB_URL: &str = "sqlite://games.db";
pub const GAMES_TABLE: &str = "games";
pub const MOVES_TABLE: &str = "game_moves";

// game id, result, move number, side, san, uci, evaluation; all read back as text
type GameMoveRow = (String, String, String, String, String, Option<String>, Option<String>);

/// Historical games kept in SQLite by whoever records them.
#[derive(Clone, Debug)]
pub struct SqliteGameSource {
    pool: SqlitePool,
}

impl SqliteGameSource {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {url}"))?;

        info!(url, "connected to games database");

        SqliteGameSource::from_pool(pool).await
    }

    /// A private database that lives as long as the source.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        SqliteGameSource::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        create_tables_if_not_exists(&pool).await?;

        Ok(SqliteGameSource { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn insert_game(&self, game: &HistoricalGame) -> Result<()> {
        let mut transaction = self.pool.begin().await?;

        sqlx::query(&format!(r"
            INSERT INTO {} (id, result) VALUES (?, ?);
        ", GAMES_TABLE))
            .bind(&game.id)
            .bind(game.result.to_string())
            .execute(&mut transaction)
            .await
            .with_context(|| format!("failed to insert game {}", game.id))?;

        for (ply, historical_move) in game.moves.iter().enumerate() {
            sqlx::query(&format!(r"
                INSERT INTO {} (
                    game_id,
                    ply,
                    move_number,
                    side,
                    san,
                    uci,
                    evaluation
                ) VALUES (
                    ?,
                    ?,
                    ?,
                    ?,
                    ?,
                    ?,
                    ?
                );
            ", MOVES_TABLE))
                .bind(&game.id)
                .bind(ply as i64)
                .bind(historical_move.move_number as i64)
                .bind(historical_move.side.to_string())
                .bind(&historical_move.san)
                .bind(historical_move.uci.as_deref())
                .bind(historical_move.evaluation.as_deref())
                .execute(&mut transaction)
                .await?;
        }

        transaction.commit().await?;

        Ok(())
    }
}

pub async fn create_tables_if_not_exists(db: &SqlitePool) -> Result<()> {
    sqlx::query(&format!(r"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY NOT NULL,
            result TEXT NOT NULL
        );
    ", GAMES_TABLE)).execute(db).await?;

    sqlx::query(&format!(r"
        CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY NOT NULL,
            game_id TEXT NOT NULL,
            ply INTEGER NOT NULL,
            move_number INTEGER NOT NULL,
            side TEXT NOT NULL,
            san TEXT NOT NULL,
            uci TEXT,
            evaluation TEXT,
            FOREIGN KEY(game_id) REFERENCES {}(id)
        );
    ", MOVES_TABLE, GAMES_TABLE)).execute(db).await?;

    Ok(())
}

#[async_trait]
impl GameSource for SqliteGameSource {
    async fn load_games(&self) -> Result<Vec<GameRecord>> {
        // other writers may have stored anything in these columns: values are
        // interpreted per game, so one bad row only spoils its own game
        let rows: Vec<GameMoveRow> = sqlx::query_as(&format!(r"
            SELECT
                g.id,
                COALESCE(CAST(g.result AS TEXT), ''),
                COALESCE(CAST(m.move_number AS TEXT), ''),
                COALESCE(CAST(m.side AS TEXT), ''),
                COALESCE(CAST(m.san AS TEXT), ''),
                CAST(m.uci AS TEXT),
                CAST(m.evaluation AS TEXT)
            FROM {} g
            JOIN {} m ON m.game_id = g.id
            ORDER BY g.rowid, m.ply;
        ", GAMES_TABLE, MOVES_TABLE))
            .fetch_all(&self.pool)
            .await
            .context("failed to read games")?;

        let mut games = Vec::new();
        for (game_id, rows) in &rows.into_iter().group_by(|x| x.0.clone()) {
            let rows = rows.collect::<Vec<_>>();
            let result = rows[0].1.clone();

            let moves = rows
                .into_iter()
                .map(|(_, _, move_number, side, san, uci, evaluation)| StoredMove {
                    move_number,
                    side,
                    san,
                    uci,
                    evaluation,
                })
                .collect();

            games.push(assemble_game(game_id, &result, moves));
        }

        info!(games = games.len(), "loaded games from database");

        Ok(games)
    }
}

#[cfg(test)]
mod tests {
    use crate::learning::game_source::{GameResult, HistoricalMove, IngestError, Side};
    use super::*;

    fn game(id: &str, result: GameResult, moves: &[(&str, &str)]) -> HistoricalGame {
        HistoricalGame {
            id: id.to_string(),
            result,
            moves: moves.iter().enumerate().map(|(ply, (san, uci))| HistoricalMove {
                move_number: ply as u32 / 2 + 1,
                side: if ply % 2 == 0 { Side::White } else { Side::Black },
                san: san.to_string(),
                uci: Some(uci.to_string()),
                evaluation: Some(format!("{}", ply as f64 / 10.0)),
            }).collect(),
        }
    }

    #[tokio::test]
    async fn check_games_round_trip_in_order() -> Result<()> {
        let source = SqliteGameSource::in_memory().await?;
        let second = game("b", GameResult::BlackWon, &[("d4", "d2d4"), ("d5", "d7d5")]);
        let first = game("a", GameResult::WhiteWon, &[("e4", "e2e4"), ("e5", "e7e5"), ("Nf3", "g1f3")]);

        // insertion order, not id order
        source.insert_game(&second).await?;
        source.insert_game(&first).await?;

        let games = source.load_games().await?;
        assert_eq!(games, vec![Ok(second), Ok(first)]);

        Ok(())
    }

    #[tokio::test]
    async fn check_duplicate_game_rejected() -> Result<()> {
        let source = SqliteGameSource::in_memory().await?;
        let game = game("a", GameResult::Draw, &[("e4", "e2e4")]);

        source.insert_game(&game).await?;
        assert!(source.insert_game(&game).await.is_err());
        assert_eq!(source.load_games().await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn check_unreadable_rows_spoil_only_their_game() -> Result<()> {
        let source = SqliteGameSource::in_memory().await?;
        source.insert_game(&game("good", GameResult::WhiteWon, &[("e4", "e2e4")])).await?;

        for (id, result, move_number) in [("negative", "1-0", "-3"), ("huge", "1-0", "4294967296"), ("result", "3-0", "1")] {
            sqlx::query(&format!("INSERT INTO {} (id, result) VALUES (?, ?);", GAMES_TABLE))
                .bind(id)
                .bind(result)
                .execute(source.pool())
                .await?;
            sqlx::query(&format!(
                "INSERT INTO {} (game_id, ply, move_number, side, san) VALUES (?, 0, CAST(? AS INTEGER), 'white', 'd4');",
                MOVES_TABLE,
            ))
                .bind(id)
                .bind(move_number)
                .execute(source.pool())
                .await?;
        }

        let games = source.load_games().await?;

        assert_eq!(games.len(), 4);
        assert!(games[0].is_ok());
        for (record, id) in games[1..].iter().zip(["negative", "huge", "result"]) {
            assert!(matches!(record, Err(IngestError::MalformedRecord { game, .. }) if game == id));
        }

        Ok(())
    }
}
