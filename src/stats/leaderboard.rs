//! Ordered views over aggregated team statistics.

use std::cmp::Ordering;

use serde::Serialize;

use crate::stats::aggregate::TeamStat;

/// How many rows each summary section keeps.
pub const SUMMARY_TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaderboard {
    /// Standings: `(-wins, name)`.
    MostWins,
    /// `(-pf, name)`.
    MostPointsFor,
    /// `(pf, name)`.
    FewestPointsFor,
    /// `(losses, -wins, name)`.
    FewestLosses,
}

impl Leaderboard {
    pub fn compare(&self, a: &TeamStat, b: &TeamStat) -> Ordering {
        let primary = match self {
            Leaderboard::MostWins => b.wins.cmp(&a.wins),
            Leaderboard::MostPointsFor => b.pf.cmp(&a.pf),
            Leaderboard::FewestPointsFor => a.pf.cmp(&b.pf),
            Leaderboard::FewestLosses => a.losses.cmp(&b.losses).then(b.wins.cmp(&a.wins)),
        };
        primary.then_with(|| a.team_name.cmp(&b.team_name))
    }

    pub fn rank<'a, I>(&self, stats: I) -> Vec<TeamStat>
    where
        I: IntoIterator<Item = &'a TeamStat>,
    {
        let mut rows: Vec<TeamStat> = stats.into_iter().cloned().collect();
        rows.sort_by(|a, b| self.compare(a, b));
        rows
    }
}

/// One row of a standings or summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsRow {
    pub team_id: String,
    pub team: String,
    pub played: i64,
    pub wins: i64,
    pub losses: i64,
    pub pf: i64,
    pub pa: i64,
    pub diff: i64,
}

impl From<&TeamStat> for StandingsRow {
    fn from(s: &TeamStat) -> Self {
        Self {
            team_id: s.team_id.clone(),
            team: s.team_name.clone(),
            played: s.played,
            wins: s.wins,
            losses: s.losses,
            pf: s.pf,
            pa: s.pa,
            diff: s.diff(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Standings {
    pub total: usize,
    pub data: Vec<StandingsRow>,
}

pub fn standings<'a, I>(stats: I) -> Standings
where
    I: IntoIterator<Item = &'a TeamStat>,
{
    let data: Vec<StandingsRow> = Leaderboard::MostWins
        .rank(stats)
        .iter()
        .map(StandingsRow::from)
        .collect();
    Standings {
        total: data.len(),
        data,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub top_wins: Vec<StandingsRow>,
    #[serde(rename = "topPF")]
    pub top_pf: Vec<StandingsRow>,
    #[serde(rename = "minPF")]
    pub min_pf: Vec<StandingsRow>,
    pub min_losses: Vec<StandingsRow>,
}

pub fn summary(stats: &[TeamStat]) -> StatsSummary {
    let section = |board: Leaderboard| -> Vec<StandingsRow> {
        board
            .rank(stats)
            .iter()
            .take(SUMMARY_TOP_N)
            .map(StandingsRow::from)
            .collect()
    };

    StatsSummary {
        top_wins: section(Leaderboard::MostWins),
        top_pf: section(Leaderboard::MostPointsFor),
        min_pf: section(Leaderboard::FewestPointsFor),
        min_losses: section(Leaderboard::FewestLosses),
    }
}
