//! JSON reporting API over the upstream services and the local store.

pub mod auth;

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::api::auth::{header_str, AdminGate, API_AUTHORIZATION_HEADER};
use crate::config::{ApiConfig, Secrets};
use crate::db::store::{Store, STANDINGS_CACHE_KEY, SUMMARY_CACHE_KEY};
use crate::error::UpstreamError;
use crate::monitoring::health::HealthState;
use crate::normalize::TeamDirectory;
use crate::stats::{aggregate, standings, summary, TeamStat};
use crate::upstream::{AuthOverrides, DateRange, UpstreamClient};

/// Shared state accessible by all route handlers.
#[derive(Clone)]
pub struct AppState {
    client: Arc<UpstreamClient>,
    store: Arc<Store>,
    health: HealthState,
    gate: Arc<AdminGate>,
    cache_ttl_seconds: u64,
    read_from_store: bool,
}

impl AppState {
    pub fn new(
        client: Arc<UpstreamClient>,
        store: Arc<Store>,
        health: HealthState,
        secrets: &Secrets,
        config: &ApiConfig,
    ) -> Self {
        Self {
            client,
            store,
            health,
            gate: Arc::new(AdminGate::new(secrets.internal_secret.as_ref())),
            cache_ttl_seconds: config.cache_ttl_seconds,
            read_from_store: config.read_from_store,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Upstream(UpstreamError),
    Unauthorized(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Upstream(UpstreamError::Status { url, status, body }) => (
                StatusCode::BAD_GATEWAY,
                json!({"upstream_url": url, "status_code": status, "body": body}),
            ),
            ApiError::Upstream(e) => {
                warn!(error = %e, url = e.url(), "Upstream request failed");
                (StatusCode::BAD_GATEWAY, json!({"message": e.to_string()}))
            }
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, json!(message)),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!(message)),
            ApiError::Internal(e) => {
                error!(error = format!("{e:#}"), "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, json!("Internal error"))
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Upstream credentials forwarded by the caller.
fn auth_overrides(headers: &HeaderMap) -> AuthOverrides {
    let get = |name: &str| header_str(headers, name).map(str::to_string);
    AuthOverrides {
        generic: get(API_AUTHORIZATION_HEADER),
        teams: get("x-teams-authorization"),
        players: get("x-players-authorization"),
        matches: get("x-matches-authorization"),
    }
}

pub fn router(state: AppState) -> Router {
    let reports = Router::new()
        .route("/standings", get(standings_handler))
        .route("/stats/summary", get(summary_handler))
        .route("/teams", get(teams_handler))
        .route("/teams/{team_id}/players", get(team_players_handler))
        .route("/players", get(players_handler))
        .route("/players/{player_id}", get(player_handler))
        .route("/matches/history", get(history_handler))
        .route("/matches/{match_id}/roster", get(roster_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/reports", reports)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawn the API server. Returns a handle that can be aborted.
pub fn spawn_api(state: AppState, bind: &str, port: u16) -> JoinHandle<()> {
    let addr = format!("{bind}:{port}");

    tokio::spawn(async move {
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Report API listening");
                l
            }
            Err(e) => {
                error!(error = %e, addr = %addr, "Failed to bind report API");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, router(state)).await {
            error!(error = %e, "Report API server error");
        }
    })
}

// -- Route Handlers --

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.to_json().await)
}

impl AppState {
    /// Serve a stats report from the response cache, or compute it and cache
    /// it. The stats come from the stored snapshot when `read_from_store` is
    /// set, otherwise from a live match fetch.
    async fn cached_report<F>(
        &self,
        key: &str,
        headers: &HeaderMap,
        build: F,
    ) -> Result<Json<Value>, ApiError>
    where
        F: FnOnce(&[TeamStat]) -> serde_json::Result<Value>,
    {
        match self.store.cache_get(key, self.cache_ttl_seconds).await {
            Ok(Some(hit)) => return Ok(Json(hit)),
            Ok(None) => {}
            Err(e) => warn!(error = %e, key, "Response cache read failed"),
        }

        let stats = if self.read_from_store {
            self.store
                .get_standings_rows()
                .await
                .map_err(ApiError::Internal)?
        } else {
            let auth = auth_overrides(headers);
            let teams = self.client.team_directory(&auth).await?;
            let matches = self
                .client
                .fetch_matches(&DateRange::default(), &teams, &auth)
                .await?;
            aggregate(&matches, &teams).into_values().collect::<Vec<TeamStat>>()
        };

        let body = build(&stats).map_err(|e| ApiError::Internal(e.into()))?;
        if let Err(e) = self.store.cache_set(key, &body).await {
            warn!(error = %e, key, "Response cache write failed");
        }
        Ok(Json(body))
    }

    async fn stored_directory(&self) -> Result<TeamDirectory, ApiError> {
        let teams = self.store.get_teams().await.map_err(ApiError::Internal)?;
        Ok(TeamDirectory::from_teams(&teams))
    }
}

async fn standings_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state
        .cached_report(STANDINGS_CACHE_KEY, &headers, |stats| {
            serde_json::to_value(standings(stats))
        })
        .await
}

async fn summary_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    state
        .cached_report(SUMMARY_CACHE_KEY, &headers, |stats| {
            serde_json::to_value(summary(stats))
        })
        .await
}

async fn teams_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let teams = if state.read_from_store {
        state.store.get_teams().await.map_err(ApiError::Internal)?
    } else {
        state.client.fetch_teams(&auth_overrides(&headers)).await?
    };
    Ok(Json(json!({"total": teams.len(), "data": teams})))
}

async fn team_players_handler(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let (teams, players) = if state.read_from_store {
        let players = state
            .store
            .get_players(Some(&team_id))
            .await
            .map_err(ApiError::Internal)?;
        (state.stored_directory().await?, players)
    } else {
        let auth = auth_overrides(&headers);
        let teams = state.client.team_directory(&auth).await?;
        let players = state
            .client
            .fetch_players(Some(&team_id), &teams, &auth)
            .await?;
        (teams, players)
    };
    Ok(Json(json!({
        "teamId": team_id,
        "teamName": teams.get(&team_id),
        "total": players.len(),
        "data": players,
    })))
}

async fn players_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let players = if state.read_from_store {
        state.store.get_players(None).await.map_err(ApiError::Internal)?
    } else {
        let auth = auth_overrides(&headers);
        let teams = state.client.team_directory(&auth).await?;
        state.client.fetch_players(None, &teams, &auth).await?
    };
    Ok(Json(json!({"total": players.len(), "data": players})))
}

async fn player_handler(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let player = if state.read_from_store {
        let players = state.store.get_players(None).await.map_err(ApiError::Internal)?;
        players.into_iter().find(|p| p.id == player_id)
    } else {
        let auth = auth_overrides(&headers);
        let teams = state.client.team_directory(&auth).await?;
        state
            .client
            .fetch_player_by_id(&player_id, &teams, &auth)
            .await?
    };

    match player {
        Some(player) => {
            let body = serde_json::to_value(&player).map_err(|e| ApiError::Internal(e.into()))?;
            Ok(Json(body))
        }
        None => Err(ApiError::NotFound("Player not found".to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    from: Option<String>,
    to: Option<String>,
}

async fn history_handler(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let range = DateRange::new(query.from, query.to);
    let matches = if state.read_from_store {
        let mut matches = state.store.get_matches().await.map_err(ApiError::Internal)?;
        range.retain(&mut matches);
        matches
    } else {
        let auth = auth_overrides(&headers);
        let teams = state.client.team_directory(&auth).await?;
        state.client.fetch_matches(&range, &teams, &auth).await?
    };
    Ok(Json(json!({
        "from": range.from,
        "to": range.to,
        "total": matches.len(),
        "data": matches,
    })))
}

async fn roster_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let roster = state
        .client
        .match_roster(&match_id, &auth_overrides(&headers))
        .await?;
    let body = serde_json::to_value(&roster).map_err(|e| ApiError::Internal(e.into()))?;
    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::time::Duration;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_status_error_maps_to_502_detail() {
        let err = ApiError::from(UpstreamError::status(
            "http://teams/api/teams",
            503,
            &"x".repeat(500),
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(response).await;
        assert_eq!(json["detail"]["upstream_url"], "http://teams/api/teams");
        assert_eq!(json["detail"]["status_code"], 503);
        assert_eq!(json["detail"]["body"].as_str().unwrap().len(), 200);
    }

    #[tokio::test]
    async fn test_transport_errors_map_to_message() {
        let err = ApiError::from(UpstreamError::Cancelled {
            url: "http://matches/api/matches".to_string(),
            after: Duration::from_secs(120),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(response).await;
        assert!(json["detail"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_unauthorized_shape() {
        let response = ApiError::Unauthorized("Missing Authorization".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["detail"], "Missing Authorization");
    }

    #[tokio::test]
    async fn test_not_found_shape() {
        let response = ApiError::NotFound("Player not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["detail"], "Player not found");
    }

    #[test]
    fn test_auth_overrides_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-authorization", HeaderValue::from_static("Bearer generic"));
        headers.insert("x-matches-authorization", HeaderValue::from_static("m-token"));
        headers.insert("x-teams-authorization", HeaderValue::from_static("   "));

        let auth = auth_overrides(&headers);
        assert_eq!(auth.generic.as_deref(), Some("Bearer generic"));
        assert_eq!(auth.matches.as_deref(), Some("m-token"));
        assert_eq!(auth.teams, None);
        assert_eq!(auth.players, None);
    }
}
