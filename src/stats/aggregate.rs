//! Per-team win/loss and points accumulation over a match set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::normalize::{Match, TeamDirectory};

/// Derived record for one team, rebuilt from scratch on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TeamStat {
    pub team_id: String,
    pub team_name: String,
    pub played: i64,
    pub wins: i64,
    pub losses: i64,
    /// Points scored.
    pub pf: i64,
    /// Points conceded.
    pub pa: i64,
}

impl TeamStat {
    fn new(team_id: &str, teams: &TeamDirectory) -> Self {
        Self {
            team_id: team_id.to_string(),
            team_name: teams.display_name(team_id).to_string(),
            ..Self::default()
        }
    }

    pub fn ties(&self) -> i64 {
        self.played.saturating_sub(self.wins).saturating_sub(self.losses)
    }

    pub fn diff(&self) -> i64 {
        self.pf.saturating_sub(self.pa)
    }
}

/// Accumulate team statistics in one pass.
///
/// Matches missing either team id are skipped without creating a slot.
/// Equal scores count as played for both sides but as neither win nor loss.
/// Counters saturate at `i64::MAX`.
pub fn aggregate(matches: &[Match], teams: &TeamDirectory) -> HashMap<String, TeamStat> {
    let mut stats: HashMap<String, TeamStat> = HashMap::new();

    for m in matches {
        let (home_id, away_id) = (m.home_team_id.as_str(), m.away_team_id.as_str());
        if home_id.is_empty() || away_id.is_empty() {
            continue;
        }
        let (hs, aws) = (m.home_score, m.away_score);

        let home = stats
            .entry(home_id.to_string())
            .or_insert_with(|| TeamStat::new(home_id, teams));
        home.played = home.played.saturating_add(1);
        home.pf = home.pf.saturating_add(hs);
        home.pa = home.pa.saturating_add(aws);
        if hs > aws {
            home.wins = home.wins.saturating_add(1);
        } else if aws > hs {
            home.losses = home.losses.saturating_add(1);
        }

        let away = stats
            .entry(away_id.to_string())
            .or_insert_with(|| TeamStat::new(away_id, teams));
        away.played = away.played.saturating_add(1);
        away.pf = away.pf.saturating_add(aws);
        away.pa = away.pa.saturating_add(hs);
        if aws > hs {
            away.wins = away.wins.saturating_add(1);
        } else if hs > aws {
            away.losses = away.losses.saturating_add(1);
        }
    }

    stats
}
