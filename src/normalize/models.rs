use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Canonical team record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    pub city: String,
    pub coach: String,
}

/// Canonical player record. `team_name` is a snapshot taken at
/// normalization time and is not kept in sync with later renames.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub name: String,
    pub age: i64,
    pub position: String,
    pub team_id: String,
    pub team_name: String,
}

/// Canonical match record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: String,
    pub date: String,
    pub status: String,
    pub home_team_id: String,
    pub away_team_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: i64,
    pub away_score: i64,
    pub period: String,
    pub quarter_duration_seconds: i64,
}

/// `teamId -> teamName` lookup built from normalized teams.
#[derive(Debug, Clone, Default)]
pub struct TeamDirectory {
    names: HashMap<String, String>,
}

impl TeamDirectory {
    pub fn from_teams(teams: &[Team]) -> Self {
        let names = teams
            .iter()
            .filter(|t| !t.id.is_empty())
            .map(|t| {
                let name = if t.name.is_empty() { &t.id } else { &t.name };
                (t.id.clone(), name.clone())
            })
            .collect();
        Self { names }
    }

    pub fn get(&self, team_id: &str) -> Option<&str> {
        self.names.get(team_id).map(String::as_str)
    }

    /// Name for display; unknown ids render as themselves.
    pub fn display_name<'a>(&'a self, team_id: &'a str) -> &'a str {
        self.get(team_id).unwrap_or(team_id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(id: &str, name: &str) -> Team {
        Team {
            id: id.to_string(),
            name: name.to_string(),
            ..Team::default()
        }
    }

    #[test]
    fn test_directory_lookup_and_fallback() {
        let dir = TeamDirectory::from_teams(&[team("1", "Lions"), team("2", "Tigers")]);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.display_name("1"), "Lions");
        assert_eq!(dir.display_name("99"), "99");
        assert_eq!(dir.get("99"), None);
    }

    #[test]
    fn test_directory_skips_blank_ids_and_names() {
        let dir = TeamDirectory::from_teams(&[team("", "Ghosts"), team("3", "")]);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.display_name("3"), "3");
    }

    #[test]
    fn test_match_serializes_camel_case() {
        let m = Match {
            id: "m1".into(),
            home_team_id: "1".into(),
            quarter_duration_seconds: 600,
            ..Match::default()
        };
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["homeTeamId"], "1");
        assert_eq!(v["quarterDurationSeconds"], 600);
    }
}
