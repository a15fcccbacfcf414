use std::path::{Path, PathBuf};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use csv::StringRecord;
use itertools::Itertools;
use serde::Deserialize;
use tracing::info;
use crate::learning::game_source::{assemble_game, GameRecord, GameSource, IngestError, StoredMove};

/// One move of one game, as a row of the games dataset.
///
/// Rows of the same game are consecutive and in play order.
#[derive(Clone, Debug, Deserialize)]
struct GameMoveRecord {
    move_number: String,
    side: String,
    san: String,
    uci: Option<String>,
    evaluation: Option<String>,
    result: String,
}

/// Tab separated file with columns
/// `game_id move_number side san uci evaluation result`.
#[derive(Clone, Debug)]
pub struct TsvGameSource {
    pub path: PathBuf,
}

impl TsvGameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TsvGameSource {
            path: path.into(),
        }
    }
}

#[async_trait]
impl GameSource for TsvGameSource {
    async fn load_games(&self) -> Result<Vec<GameRecord>> {
        read_games(&self.path)
    }
}

/// Reads every game of the dataset. A row that does not deserialize only spoils its own game.
pub fn read_games(path: &Path) -> Result<Vec<GameRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open games dataset {}", path.display()))?;

    let headers = reader.headers()
        .with_context(|| format!("misformatted games dataset {}", path.display()))?
        .clone();
    let id_column = headers
        .iter()
        .position(|x| x == "game_id")
        .ok_or_else(|| anyhow!("games dataset {} has no game_id column", path.display()))?;

    let rows = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to read games dataset {}", path.display()))?;

    let mut games = Vec::new();
    for (game_id, rows) in &rows.into_iter().group_by(|x| x.get(id_column).unwrap_or_default().to_string()) {
        let rows = rows.collect::<Vec<_>>();
        games.push(read_game(game_id, &rows, &headers));
    }

    info!(games = games.len(), path = %path.display(), "loaded games dataset");

    Ok(games)
}

fn read_game(game_id: String, rows: &[StringRecord], headers: &StringRecord) -> GameRecord {
    let records = rows
        .iter()
        .map(|x| x.deserialize::<GameMoveRecord>(Some(headers)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| IngestError::MalformedRecord {
            game: game_id.clone(),
            reason: e.to_string(),
        })?;

    let result = records.first().map(|x| x.result.clone()).unwrap_or_default();
    let moves = records
        .into_iter()
        .map(|x| StoredMove {
            move_number: x.move_number,
            side: x.side,
            san: x.san,
            uci: x.uci,
            evaluation: x.evaluation,
        })
        .collect();

    assemble_game(game_id, &result, moves)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use crate::learning::game_source::{GameResult, Side};
    use super::*;

    const DATASET: &str = "game_id\tmove_number\tside\tsan\tuci\tevaluation\tresult
g1\t1\twhite\te4\te2e4\t0.3\t1-0
g1\t1\tblack\te5\te7e5\t0.25\t1-0
g1\t2\twhite\tNf3\t\t\t1-0
g2\t1\twhite\td4\td2d4\t#3\t1/2-1/2
";

    #[tokio::test]
    async fn check_games_are_grouped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("games.tsv");
        std::fs::File::create(&path)?.write_all(DATASET.as_bytes())?;

        let games = TsvGameSource::new(&path)
            .load_games()
            .await?
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "g1");
        assert_eq!(games[0].result, GameResult::WhiteWon);
        assert_eq!(games[0].moves.len(), 3);
        assert_eq!(games[0].moves[1].side, Side::Black);
        assert_eq!(games[0].moves[1].uci.as_deref(), Some("e7e5"));
        assert_eq!(games[0].moves[2].uci, None);
        assert_eq!(games[0].moves[2].evaluation, None);
        assert_eq!(games[1].result, GameResult::Draw);
        assert_eq!(games[1].moves[0].evaluation.as_deref(), Some("#3"));

        Ok(())
    }

    #[test]
    fn check_bad_rows_spoil_only_their_game() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("games.tsv");
        std::fs::File::create(&path)?.write_all(b"game_id\tmove_number\tside\tsan\tuci\tevaluation\tresult
g1\t1\twhite\te4\te2e4\t0.3\t1-0
g2\t1\twhite\td4\td2d4\t0.1
g3\t1\tred\tc4\tc2c4\t0.1\t0-1
g4\t1\twhite\tNf3\tg1f3\t0.2\t1/2-1/2
")?;

        let games = read_games(&path)?;

        assert_eq!(games.len(), 4);
        assert_eq!(games[0].as_ref().map(|x| x.id.as_str()), Ok("g1"));
        assert!(matches!(&games[1], Err(IngestError::MalformedRecord { game, .. }) if game == "g2"));
        assert!(matches!(&games[2], Err(IngestError::MalformedRecord { game, .. }) if game == "g3"));
        assert_eq!(games[3].as_ref().map(|x| x.result), Ok(GameResult::Draw));

        Ok(())
    }

    #[test]
    fn check_missing_file() {
        assert!(read_games(Path::new("./does/not/exist.tsv")).is_err());
    }
}
