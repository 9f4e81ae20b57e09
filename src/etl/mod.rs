//! Scheduled aggregation cycle: fetch, normalize, aggregate, persist.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::db::store::{CycleRecord, Store, STANDINGS_CACHE_KEY, SUMMARY_CACHE_KEY};
use crate::monitoring::health::{CycleCounts, HealthState};
use crate::normalize::TeamDirectory;
use crate::stats::{aggregate, standings, summary, Leaderboard, TeamStat};
use crate::upstream::{AuthOverrides, DateRange, UpstreamClient};

/// Run one full cycle with the configured service tokens.
///
/// All three fetches complete before the first write, so an upstream failure
/// leaves the store untouched. The writes that follow are separate
/// transactions: a store error part way through can leave newer teams next
/// to older matches. Upserts never delete, so records that disappeared
/// upstream stay until removed by hand.
#[instrument(skip_all)]
pub async fn run_once(client: &UpstreamClient, store: &Store) -> Result<CycleCounts> {
    let started = Instant::now();
    let auth = AuthOverrides::default();

    let teams = client.fetch_teams(&auth).await.context("Failed to fetch teams")?;
    let directory = TeamDirectory::from_teams(&teams);
    let players = client
        .fetch_players(None, &directory, &auth)
        .await
        .context("Failed to fetch players")?;
    let matches = client
        .fetch_matches(&DateRange::default(), &directory, &auth)
        .await
        .context("Failed to fetch matches")?;

    let teams_written = store.upsert_teams(&teams).await?;
    let players_written = store.upsert_players(&players).await?;
    let matches_written = store.upsert_matches(&matches).await?;

    let skipped = teams.len() + players.len() + matches.len()
        - teams_written
        - players_written
        - matches_written;
    if skipped > 0 {
        warn!(skipped, "Records without an id were not stored");
    }

    let stats: Vec<TeamStat> =
        Leaderboard::MostWins.rank(aggregate(&matches, &directory).values());
    let stats_written = store.replace_team_stats(&stats).await?;

    if let Err(e) = refresh_report_cache(store, &stats).await {
        warn!(error = %e, "Failed to refresh report cache");
    }

    let counts = CycleCounts {
        teams: teams_written,
        players: players_written,
        matches: matches_written,
        team_stats: stats_written,
    };

    let duration_ms = started.elapsed().as_millis() as i64;
    store
        .insert_cycle(&CycleRecord {
            id: None,
            teams: counts.teams as i64,
            players: counts.players as i64,
            matches: counts.matches as i64,
            team_stats: counts.team_stats as i64,
            duration_ms: Some(duration_ms),
            created_at: None,
        })
        .await?;

    info!(
        teams = counts.teams,
        players = counts.players,
        matches = counts.matches,
        team_stats = counts.team_stats,
        duration_ms,
        "ETL cycle complete"
    );

    Ok(counts)
}

/// Seed the standings and summary responses from the fresh snapshot.
async fn refresh_report_cache(store: &Store, stats: &[TeamStat]) -> Result<()> {
    store
        .cache_set(STANDINGS_CACHE_KEY, &serde_json::to_value(standings(stats))?)
        .await?;
    store
        .cache_set(SUMMARY_CACHE_KEY, &serde_json::to_value(summary(stats))?)
        .await?;
    Ok(())
}

/// Run cycles forever on `interval`. A failed cycle is logged and recorded
/// in `health`; the loop carries on.
pub async fn run(client: &UpstreamClient, store: &Store, health: &HealthState, interval: Duration) {
    info!(interval_s = interval.as_secs(), "ETL loop starting");

    loop {
        match run_once(client, store).await {
            Ok(counts) => health.record_cycle(counts).await,
            Err(e) => {
                error!(error = format!("{e:#}"), "ETL cycle failed");
                health.record_failure(&format!("{e:#}")).await;
            }
        }

        tokio::time::sleep(interval).await;
    }
}
