use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::normalize::{Match, Player, Team};
use crate::stats::TeamStat;

/// Prefix applied to every response cache key.
pub const CACHE_PREFIX: &str = "cache:";

pub const STANDINGS_CACHE_KEY: &str = "reports:standings";
pub const SUMMARY_CACHE_KEY: &str = "reports:stats:summary";

pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CycleRecord {
    pub id: Option<i64>,
    pub teams: i64,
    pub players: i64,
    pub matches: i64,
    pub team_stats: i64,
    pub duration_ms: Option<i64>,
    pub created_at: Option<String>,
}

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Private in-memory database. One connection, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // sqlx executes one statement per call
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- Upserts by natural key ---

    /// Insert or update teams by id. Records with an empty id are skipped.
    /// Returns the number of rows written.
    pub async fn upsert_teams(&self, teams: &[Team]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut written = 0;
        for team in teams.iter().filter(|t| !t.id.is_empty()) {
            sqlx::query(
                "INSERT INTO teams (id, name, city, coach) VALUES (?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name, city = excluded.city, coach = excluded.coach,
                    updated_at = datetime('now')",
            )
            .bind(&team.id)
            .bind(&team.name)
            .bind(&team.city)
            .bind(&team.coach)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert team {}", team.id))?;
            written += 1;
        }
        tx.commit().await.context("Failed to commit teams")?;
        Ok(written)
    }

    pub async fn upsert_players(&self, players: &[Player]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut written = 0;
        for player in players.iter().filter(|p| !p.id.is_empty()) {
            sqlx::query(
                "INSERT INTO players (id, name, age, position, team_id, team_name)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name, age = excluded.age, position = excluded.position,
                    team_id = excluded.team_id, team_name = excluded.team_name,
                    updated_at = datetime('now')",
            )
            .bind(&player.id)
            .bind(&player.name)
            .bind(player.age)
            .bind(&player.position)
            .bind(&player.team_id)
            .bind(&player.team_name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert player {}", player.id))?;
            written += 1;
        }
        tx.commit().await.context("Failed to commit players")?;
        Ok(written)
    }

    pub async fn upsert_matches(&self, matches: &[Match]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let mut written = 0;
        for m in matches.iter().filter(|m| !m.id.is_empty()) {
            sqlx::query(
                "INSERT INTO matches (id, date, status, home_team_id, away_team_id, home_team_name,
                    away_team_name, home_score, away_score, period, quarter_duration_seconds)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    date = excluded.date, status = excluded.status,
                    home_team_id = excluded.home_team_id, away_team_id = excluded.away_team_id,
                    home_team_name = excluded.home_team_name, away_team_name = excluded.away_team_name,
                    home_score = excluded.home_score, away_score = excluded.away_score,
                    period = excluded.period,
                    quarter_duration_seconds = excluded.quarter_duration_seconds,
                    updated_at = datetime('now')",
            )
            .bind(&m.id)
            .bind(&m.date)
            .bind(&m.status)
            .bind(&m.home_team_id)
            .bind(&m.away_team_id)
            .bind(&m.home_team_name)
            .bind(&m.away_team_name)
            .bind(m.home_score)
            .bind(m.away_score)
            .bind(&m.period)
            .bind(m.quarter_duration_seconds)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert match {}", m.id))?;
            written += 1;
        }
        tx.commit().await.context("Failed to commit matches")?;
        Ok(written)
    }

    /// Replace the team_stats snapshot with a freshly computed one.
    pub async fn replace_team_stats(&self, stats: &[TeamStat]) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        sqlx::query("DELETE FROM team_stats")
            .execute(&mut *tx)
            .await
            .context("Failed to clear team stats")?;
        for s in stats {
            sqlx::query(
                "INSERT INTO team_stats (team_id, team_name, played, wins, losses, pf, pa)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&s.team_id)
            .bind(&s.team_name)
            .bind(s.played)
            .bind(s.wins)
            .bind(s.losses)
            .bind(s.pf)
            .bind(s.pa)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert team stats for {}", s.team_id))?;
        }
        tx.commit().await.context("Failed to commit team stats")?;
        Ok(stats.len())
    }

    // --- Read side ---

    pub async fn get_teams(&self) -> Result<Vec<Team>> {
        let teams = sqlx::query_as::<_, Team>(
            "SELECT id, name, city, coach FROM teams ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch teams")?;
        Ok(teams)
    }

    /// All players, or only one team's when `team_id` is given.
    pub async fn get_players(&self, team_id: Option<&str>) -> Result<Vec<Player>> {
        let players = match team_id {
            Some(team_id) => {
                sqlx::query_as::<_, Player>(
                    "SELECT id, name, age, position, team_id, team_name FROM players
                     WHERE team_id = ? ORDER BY name, id",
                )
                .bind(team_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, Player>(
                    "SELECT id, name, age, position, team_id, team_name FROM players
                     ORDER BY name, id",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to fetch players")?;
        Ok(players)
    }

    pub async fn get_matches(&self) -> Result<Vec<Match>> {
        let matches = sqlx::query_as::<_, Match>(
            "SELECT id, date, status, home_team_id, away_team_id, home_team_name, away_team_name,
                    home_score, away_score, period, quarter_duration_seconds
             FROM matches ORDER BY date, id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch matches")?;
        Ok(matches)
    }

    /// Persisted snapshot ordered as standings: most wins first, then name.
    pub async fn get_standings_rows(&self) -> Result<Vec<TeamStat>> {
        let rows = sqlx::query_as::<_, TeamStat>(
            "SELECT team_id, team_name, played, wins, losses, pf, pa FROM team_stats
             ORDER BY wins DESC, team_name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch standings")?;
        Ok(rows)
    }

    // --- Cycle operations ---

    pub async fn insert_cycle(&self, cycle: &CycleRecord) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO etl_cycles (teams, players, matches, team_stats, duration_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(cycle.teams)
        .bind(cycle.players)
        .bind(cycle.matches)
        .bind(cycle.team_stats)
        .bind(cycle.duration_ms)
        .execute(&self.pool)
        .await
        .context("Failed to insert cycle")?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_latest_cycle(&self) -> Result<Option<CycleRecord>> {
        let cycle = sqlx::query_as::<_, CycleRecord>(
            "SELECT * FROM etl_cycles ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest cycle")?;
        Ok(cycle)
    }

    // --- Response cache ---

    /// Cached body for `key` if it is younger than `ttl_seconds`.
    /// A zero TTL never hits.
    pub async fn cache_get(&self, key: &str, ttl_seconds: u64) -> Result<Option<Value>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT body FROM response_cache
             WHERE cache_key = ?
             AND CAST((julianday('now') - julianday(cached_at)) * 86400 AS INTEGER) < ?",
        )
        .bind(format!("{CACHE_PREFIX}{key}"))
        .bind(ttl_seconds as i64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read response cache")?;

        match row {
            Some((body,)) => Ok(Some(
                serde_json::from_str(&body).context("Corrupt response cache entry")?,
            )),
            None => Ok(None),
        }
    }

    pub async fn cache_set(&self, key: &str, body: &Value) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO response_cache (cache_key, body, cached_at)
             VALUES (?, ?, datetime('now'))",
        )
        .bind(format!("{CACHE_PREFIX}{key}"))
        .bind(serde_json::to_string(body)?)
        .execute(&self.pool)
        .await
        .context("Failed to write response cache")?;
        Ok(())
    }
}
