//! Full ETL cycles against mock upstream services.

use std::sync::Arc;

use scoreboard_reports::config::{Secrets, UpstreamConfig};
use scoreboard_reports::db::store::{Store, STANDINGS_CACHE_KEY, SUMMARY_CACHE_KEY};
use scoreboard_reports::etl;
use scoreboard_reports::upstream::{ReqwestTransport, UpstreamClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> UpstreamClient {
    let config = UpstreamConfig {
        teams_base_url: server.uri(),
        players_base_url: server.uri(),
        matches_base_url: server.uri(),
        requests_per_second: 1000,
        burst_size: 1000,
        ..UpstreamConfig::default()
    };
    let transport = ReqwestTransport::new(&config).expect("transport");
    UpstreamClient::new(&config, &Secrets::default(), Arc::new(transport))
}

async fn mount_league(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/teams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"id": 1, "name": "Lions", "city": "Lima"},
                {"id": 2, "name": "Tigers", "city": "Quito"},
                {"id": 3, "name": "Bears"}
            ],
            "last": true
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/players"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"items": [
                {"id": 10, "name": "Ana", "team_id": 1},
                {"id": 20, "name": "Ben", "teamId": 2},
                {"name": "No Id", "team_id": 3}
            ]}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/matches"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Id": 100, "DateMatch": "2025-10-01", "HomeTeamId": 1, "AwayTeamId": 2, "HomeScore": 80, "AwayScore": 70},
            {"Id": 101, "DateMatch": "2025-10-08", "HomeTeamId": 2, "AwayTeamId": 1, "HomeScore": 90, "AwayScore": 95},
            {"Id": 102, "DateMatch": "2025-10-15", "HomeTeamId": 3, "AwayTeamId": 2, "HomeScore": 60, "AwayScore": 60}
        ])))
        .mount(server)
        .await;
}

// ── Cycle ──────────────────────────────────────────────────────────

#[tokio::test]
async fn cycle_persists_and_aggregates() {
    let server = MockServer::start().await;
    mount_league(&server).await;

    let store = Store::in_memory().await.unwrap();
    let counts = etl::run_once(&client_for(&server), &store).await.expect("cycle");

    assert_eq!(counts.teams, 3);
    assert_eq!(counts.players, 2);
    assert_eq!(counts.matches, 3);
    assert_eq!(counts.team_stats, 3);

    let players = store.get_players(Some("2")).await.unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].team_name, "Tigers");

    let rows = store.get_standings_rows().await.unwrap();
    let lions = &rows[0];
    assert_eq!(lions.team_name, "Lions");
    assert_eq!((lions.played, lions.wins, lions.losses, lions.pf, lions.pa), (2, 2, 0, 175, 160));
    let tigers = rows.iter().find(|r| r.team_id == "2").unwrap();
    assert_eq!((tigers.played, tigers.wins, tigers.losses), (3, 0, 2));

    let cycle = store.get_latest_cycle().await.unwrap().expect("cycle recorded");
    assert_eq!(cycle.matches, 3);
}

#[tokio::test]
async fn cycle_seeds_report_cache() {
    let server = MockServer::start().await;
    mount_league(&server).await;

    let store = Store::in_memory().await.unwrap();
    etl::run_once(&client_for(&server), &store).await.unwrap();

    let standings = store.cache_get(STANDINGS_CACHE_KEY, 300).await.unwrap().expect("standings cached");
    assert_eq!(standings["total"], 3);
    assert_eq!(standings["data"][0]["team"], "Lions");
    assert_eq!(standings["data"][0]["diff"], 15);

    let summary = store.cache_get(SUMMARY_CACHE_KEY, 300).await.unwrap().expect("summary cached");
    assert_eq!(summary["minLosses"][0]["team"], "Lions");
}

#[tokio::test]
async fn repeated_cycles_upsert_in_place() {
    let server = MockServer::start().await;
    mount_league(&server).await;

    let store = Store::in_memory().await.unwrap();
    let client = client_for(&server);
    etl::run_once(&client, &store).await.unwrap();
    etl::run_once(&client, &store).await.unwrap();

    assert_eq!(store.get_teams().await.unwrap().len(), 3);
    assert_eq!(store.get_matches().await.unwrap().len(), 3);
    assert_eq!(store.get_standings_rows().await.unwrap().len(), 3);
}

#[tokio::test]
async fn upstream_failure_writes_nothing() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/teams"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store = Store::in_memory().await.unwrap();
    let err = etl::run_once(&client_for(&server), &store).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to fetch teams"));

    assert!(store.get_teams().await.unwrap().is_empty());
    assert!(store.get_latest_cycle().await.unwrap().is_none());
}
