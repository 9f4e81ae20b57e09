//! Entity-level fetch operations over the teams, players and matches services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::{Secrets, UpstreamConfig};
use crate::error::UpstreamError;
use crate::normalize::{normalize_match, normalize_player, normalize_team};
use crate::normalize::{Match, Player, Team, TeamDirectory};
use crate::upstream::auth::{AuthOverrides, Service, TokenSet};
use crate::upstream::pagination::{PageRequest, PageWalker};
use crate::upstream::transport::{HttpGet, ReqwestTransport};

/// Optional `[from, to]` bounds on match dates, as ISO-8601 strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRange {
    pub fn new(from: Option<String>, to: Option<String>) -> Self {
        let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            from: clean(from),
            to: clean(to),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Keep matches whose date falls inside the range. When a bound is
    /// set, matches with an unparseable date are dropped.
    pub fn retain(&self, matches: &mut Vec<Match>) {
        let from = self.from.as_deref().and_then(parse_bound);
        let to = self.to.as_deref().and_then(parse_bound);
        if from.is_none() && to.is_none() {
            return;
        }

        matches.retain(|m| {
            let Some(date) = parse_iso(&m.date) else {
                return false;
            };
            from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
        });
    }
}

fn parse_bound(raw: &str) -> Option<NaiveDateTime> {
    let parsed = parse_iso(raw);
    if parsed.is_none() {
        warn!(bound = raw, "Ignoring unparseable date bound");
    }
    parsed
}

/// Parse an ISO-8601 date or date-time; offsets are converted to UTC.
pub fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A match with both rosters attached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRoster {
    #[serde(rename = "match")]
    pub game: Option<Match>,
    pub home_players: Vec<Player>,
    pub away_players: Vec<Player>,
}

pub struct UpstreamClient {
    http: Arc<dyn HttpGet>,
    walker: PageWalker,
    tokens: TokenSet,
    teams_base_url: String,
    players_base_url: String,
    matches_base_url: String,
    walk_deadline: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig, secrets: &Secrets, http: Arc<dyn HttpGet>) -> Self {
        Self {
            walker: PageWalker::new(http.clone(), config),
            http,
            tokens: TokenSet::from_secrets(secrets),
            teams_base_url: config.teams_base_url.trim_end_matches('/').to_string(),
            players_base_url: config.players_base_url.trim_end_matches('/').to_string(),
            matches_base_url: config.matches_base_url.trim_end_matches('/').to_string(),
            walk_deadline: Duration::from_secs(config.walk_deadline_seconds.max(1)),
        }
    }

    /// Client over the real network transport.
    pub fn from_config(config: &UpstreamConfig, secrets: &Secrets) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::new(config, secrets, Arc::new(transport)))
    }

    fn collection_url(&self, service: Service) -> String {
        let base = match service {
            Service::Teams => &self.teams_base_url,
            Service::Players => &self.players_base_url,
            Service::Matches => &self.matches_base_url,
        };
        format!("{base}/api/{}", service.as_str())
    }

    async fn fetch_raw(
        &self,
        service: Service,
        auth: &AuthOverrides,
        filters: &[(&str, &str)],
    ) -> Result<Vec<Value>, UpstreamError> {
        let mut request = PageRequest::new(self.collection_url(service))
            .with_headers(self.tokens.choose_header(service, auth));
        for (name, value) in filters {
            request = request.with_query(name, *value);
        }
        self.walker.fetch_all_within(&request, self.walk_deadline).await
    }

    /// GET `<collection>/<id>`. `None` on 404.
    async fn fetch_one(
        &self,
        service: Service,
        id: &str,
        auth: &AuthOverrides,
    ) -> Result<Option<Value>, UpstreamError> {
        let url = format!("{}/{id}", self.collection_url(service));
        let headers = self.tokens.choose_header(service, auth);
        let response = self.http.get(&url, &headers, &[]).await?;
        match response.status {
            404 => Ok(None),
            s if s >= 400 => Err(response.into_error()),
            _ => Ok(Some(response.json()).filter(|v| v.is_object())),
        }
    }

    #[instrument(skip(self, auth))]
    pub async fn fetch_teams(&self, auth: &AuthOverrides) -> Result<Vec<Team>, UpstreamError> {
        let raw = self.fetch_raw(Service::Teams, auth, &[]).await?;
        let teams: Vec<Team> = raw.iter().map(normalize_team).collect();
        info!(count = teams.len(), "Teams fetched");
        Ok(teams)
    }

    pub async fn team_directory(&self, auth: &AuthOverrides) -> Result<TeamDirectory, UpstreamError> {
        let teams = self.fetch_teams(auth).await?;
        Ok(TeamDirectory::from_teams(&teams))
    }

    #[instrument(skip(self, teams, auth))]
    pub async fn fetch_players(
        &self,
        team_id: Option<&str>,
        teams: &TeamDirectory,
        auth: &AuthOverrides,
    ) -> Result<Vec<Player>, UpstreamError> {
        let filters: Vec<(&str, &str)> = team_id
            .filter(|id| !id.is_empty())
            .map(|id| vec![("teamId", id)])
            .unwrap_or_default();

        let raw = self.fetch_raw(Service::Players, auth, &filters).await?;
        let players: Vec<Player> = raw.iter().map(|p| normalize_player(p, teams)).collect();
        info!(count = players.len(), "Players fetched");
        Ok(players)
    }

    /// Fetch matches, passing the range upstream and re-applying it locally
    /// since upstream filtering is not trusted to be exact.
    #[instrument(skip(self, teams, auth))]
    pub async fn fetch_matches(
        &self,
        range: &DateRange,
        teams: &TeamDirectory,
        auth: &AuthOverrides,
    ) -> Result<Vec<Match>, UpstreamError> {
        let mut filters: Vec<(&str, &str)> = Vec::new();
        if let Some(from) = range.from.as_deref() {
            filters.push(("from", from));
        }
        if let Some(to) = range.to.as_deref() {
            filters.push(("to", to));
        }

        let raw = self.fetch_raw(Service::Matches, auth, &filters).await?;
        let mut matches: Vec<Match> = raw.iter().map(|m| normalize_match(m, teams)).collect();
        let fetched = matches.len();
        if !range.is_unbounded() {
            range.retain(&mut matches);
        }
        info!(fetched, kept = matches.len(), "Matches fetched");
        Ok(matches)
    }

    pub async fn fetch_team_by_id(
        &self,
        team_id: &str,
        auth: &AuthOverrides,
    ) -> Result<Option<Team>, UpstreamError> {
        let raw = self.fetch_one(Service::Teams, team_id, auth).await?;
        Ok(raw.as_ref().map(normalize_team))
    }

    pub async fn fetch_player_by_id(
        &self,
        player_id: &str,
        teams: &TeamDirectory,
        auth: &AuthOverrides,
    ) -> Result<Option<Player>, UpstreamError> {
        let raw = self.fetch_one(Service::Players, player_id, auth).await?;
        Ok(raw.map(|p| normalize_player(&p, teams)))
    }

    pub async fn fetch_match_by_id(
        &self,
        match_id: &str,
        teams: &TeamDirectory,
        auth: &AuthOverrides,
    ) -> Result<Option<Match>, UpstreamError> {
        let raw = self.fetch_one(Service::Matches, match_id, auth).await?;
        Ok(raw.map(|m| normalize_match(&m, teams)))
    }

    /// A match with resolved team names and each side's players.
    #[instrument(skip(self, auth))]
    pub async fn match_roster(
        &self,
        match_id: &str,
        auth: &AuthOverrides,
    ) -> Result<MatchRoster, UpstreamError> {
        let teams = self.team_directory(auth).await?;
        let Some(game) = self.fetch_match_by_id(match_id, &teams, auth).await? else {
            return Ok(MatchRoster {
                game: None,
                home_players: Vec::new(),
                away_players: Vec::new(),
            });
        };

        let home_players = self.side_players(&game.home_team_id, &teams, auth).await?;
        let away_players = self.side_players(&game.away_team_id, &teams, auth).await?;

        Ok(MatchRoster {
            game: Some(game),
            home_players,
            away_players,
        })
    }

    async fn side_players(
        &self,
        team_id: &str,
        teams: &TeamDirectory,
        auth: &AuthOverrides,
    ) -> Result<Vec<Player>, UpstreamError> {
        if team_id.is_empty() {
            return Ok(Vec::new());
        }
        self.fetch_players(Some(team_id), teams, auth).await
    }
}
