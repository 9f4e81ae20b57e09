//! Field normalization.
//!
//! Each upstream spells its fields differently (`HomeTeamId`,
//! `homeTeamId`, `home_id`, ...). Every canonical field has an ordered
//! list of accepted spellings; the first one present with a non-null
//! value is coerced to the canonical type. Normalization never fails:
//! missing or malformed values become `""` or `0`.

pub mod models;

use serde_json::{Map, Value};

pub use models::{Match, Player, Team, TeamDirectory};

// -- Accepted spellings, in priority order --

const TEAM_ID: &[&str] = &["id", "Id", "ID", "teamId", "TeamId"];
const TEAM_NAME: &[&str] = &["name", "Name", "teamName", "TeamName"];
const TEAM_CITY: &[&str] = &["city", "City"];
const TEAM_COACH: &[&str] = &["coach", "Coach"];

const PLAYER_ID: &[&str] = &["id", "Id", "ID"];
const PLAYER_NAME: &[&str] = &["name", "Name", "fullName", "FullName"];
const PLAYER_AGE: &[&str] = &["age", "Age"];
const PLAYER_POSITION: &[&str] = &["position", "Position"];
const PLAYER_TEAM_ID: &[&str] = &["team_id", "teamId", "TeamId"];

const MATCH_ID: &[&str] = &["Id", "id", "ID"];
const MATCH_DATE: &[&str] = &["DateMatch", "dateMatch", "date", "Date"];
const MATCH_STATUS: &[&str] = &["Status", "status"];
const MATCH_HOME_ID: &[&str] = &["HomeTeamId", "homeTeamId", "home_id"];
const MATCH_AWAY_ID: &[&str] = &["AwayTeamId", "awayTeamId", "away_id"];
const MATCH_HOME_SCORE: &[&str] = &["HomeScore", "homeScore", "home_score"];
const MATCH_AWAY_SCORE: &[&str] = &["AwayScore", "awayScore", "away_score"];
const MATCH_PERIOD: &[&str] = &["Period", "period"];
const MATCH_QUARTER_SECONDS: &[&str] = &[
    "QuarterDurationSeconds",
    "quarterDurationSeconds",
    "quarter_duration_seconds",
];

/// Entity kinds understood by [`normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Team,
    Player,
    Match,
}

/// A canonical record of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    Team(Team),
    Player(Player),
    Match(Match),
}

impl Canonical {
    pub fn id(&self) -> &str {
        match self {
            Canonical::Team(t) => &t.id,
            Canonical::Player(p) => &p.id,
            Canonical::Match(m) => &m.id,
        }
    }
}

/// Normalize `raw` as `kind`, resolving team names through `teams`.
pub fn normalize(raw: &Value, kind: EntityKind, teams: &TeamDirectory) -> Canonical {
    match kind {
        EntityKind::Team => Canonical::Team(normalize_team(raw)),
        EntityKind::Player => Canonical::Player(normalize_player(raw, teams)),
        EntityKind::Match => Canonical::Match(normalize_match(raw, teams)),
    }
}

pub fn normalize_team(raw: &Value) -> Team {
    let r = Record::new(raw);
    Team {
        id: r.string(TEAM_ID),
        name: r.string(TEAM_NAME),
        city: r.string(TEAM_CITY),
        coach: r.string(TEAM_COACH),
    }
}

pub fn normalize_player(raw: &Value, teams: &TeamDirectory) -> Player {
    let r = Record::new(raw);
    let team_id = r.string(PLAYER_TEAM_ID);
    Player {
        id: r.string(PLAYER_ID),
        name: r.string(PLAYER_NAME),
        age: r.int(PLAYER_AGE),
        position: r.string(PLAYER_POSITION),
        team_name: teams.display_name(&team_id).to_string(),
        team_id,
    }
}

pub fn normalize_match(raw: &Value, teams: &TeamDirectory) -> Match {
    let r = Record::new(raw);
    let home_team_id = r.string(MATCH_HOME_ID);
    let away_team_id = r.string(MATCH_AWAY_ID);
    Match {
        id: r.string(MATCH_ID),
        date: r.string(MATCH_DATE),
        status: r.string(MATCH_STATUS),
        home_team_name: teams.display_name(&home_team_id).to_string(),
        away_team_name: teams.display_name(&away_team_id).to_string(),
        home_team_id,
        away_team_id,
        home_score: r.int(MATCH_HOME_SCORE),
        away_score: r.int(MATCH_AWAY_SCORE),
        period: r.string(MATCH_PERIOD),
        quarter_duration_seconds: r.int(MATCH_QUARTER_SECONDS),
    }
}

/// Raw upstream object with key-variant lookup.
struct Record<'a> {
    map: Option<&'a Map<String, Value>>,
}

impl<'a> Record<'a> {
    fn new(raw: &'a Value) -> Self {
        Self {
            map: raw.as_object(),
        }
    }

    fn first(&self, keys: &[&str]) -> Option<&'a Value> {
        let map = self.map?;
        keys.iter()
            .filter_map(|k| map.get(*k))
            .find(|v| !v.is_null())
    }

    fn string(&self, keys: &[&str]) -> String {
        self.first(keys).map(coerce_string).unwrap_or_default()
    }

    fn int(&self, keys: &[&str]) -> i64 {
        self.first(keys).map(coerce_int).unwrap_or(0)
    }
}

/// String conversion; numeric ids become their decimal text.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Best-effort integer conversion, 0 when nothing sensible applies.
pub fn coerce_int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}
