//! ETL cycle health, reported by the API's `/health` route.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

pub const SERVICE_NAME: &str = "report-service";

/// Shared health state updated by the ETL loop.
#[derive(Clone)]
pub struct HealthState {
    inner: Arc<RwLock<HealthData>>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthData {
    status: String,
    service: String,
    cycle_number: u64,
    started_at: DateTime<Utc>,
    last_cycle_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    consecutive_failures: u32,
    teams: usize,
    players: usize,
    matches: usize,
    uptime_seconds: i64,
}

/// Row counts written by one successful cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleCounts {
    pub teams: usize,
    pub players: usize,
    pub matches: usize,
    pub team_stats: usize,
}

impl HealthState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HealthData {
                status: "ok".to_string(),
                service: SERVICE_NAME.to_string(),
                cycle_number: 0,
                started_at: Utc::now(),
                last_cycle_at: None,
                last_error: None,
                consecutive_failures: 0,
                teams: 0,
                players: 0,
                matches: 0,
                uptime_seconds: 0,
            })),
        }
    }

    pub async fn record_cycle(&self, counts: CycleCounts) {
        let mut data = self.inner.write().await;
        data.cycle_number += 1;
        data.last_cycle_at = Some(Utc::now());
        data.last_error = None;
        data.consecutive_failures = 0;
        data.teams = counts.teams;
        data.players = counts.players;
        data.matches = counts.matches;
        data.status = "ok".to_string();
    }

    /// A failed cycle degrades the status; the previous counts stay visible.
    pub async fn record_failure(&self, error: &str) {
        let mut data = self.inner.write().await;
        data.cycle_number += 1;
        data.last_error = Some(error.to_string());
        data.consecutive_failures += 1;
        data.status = "degraded".to_string();
    }

    pub async fn to_json(&self) -> serde_json::Value {
        let mut data = self.inner.read().await.clone();
        data.uptime_seconds = (Utc::now() - data.started_at).num_seconds();
        serde_json::to_value(&data).unwrap_or_else(|_| {
            serde_json::json!({"status": "error", "message": "serialization failed"})
        })
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_state_is_ok() {
        let json = HealthState::new().to_json().await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], SERVICE_NAME);
        assert_eq!(json["cycle_number"], 0);
        assert!(json["last_cycle_at"].is_null());
    }

    #[tokio::test]
    async fn test_health_state_update() {
        let state = HealthState::new();
        state
            .record_cycle(CycleCounts {
                teams: 2,
                players: 24,
                matches: 6,
                team_stats: 2,
            })
            .await;

        let json = state.to_json().await;
        assert_eq!(json["cycle_number"], 1);
        assert_eq!(json["matches"], 6);
        assert!(json["last_cycle_at"].is_string());
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let state = HealthState::new();
        state.record_failure("teams service unreachable").await;
        state.record_failure("teams service unreachable").await;

        let json = state.to_json().await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["consecutive_failures"], 2);

        state.record_cycle(CycleCounts::default()).await;
        let json = state.to_json().await;
        assert_eq!(json["status"], "ok");
        assert!(json["last_error"].is_null());
    }
}
