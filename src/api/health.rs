//! Service health
//!
//! `/health` and `/health/live` only say the process answers. The detailed
//! report and readiness also check the database and the structure of the
//! loaded hostgroup tree: rows whose parent chain loops, or two hostgroups
//! sharing a title, make the service unready because lookup value matchers
//! and title lookups would be ambiguous.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{db, models::TreeIntegrity, AppState};

/// Ordered from best to worst so the overall state is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    fn status_code(self) -> StatusCode {
        match self {
            HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::OK,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub status: HealthState,
    pub version: &'static str,
    pub hostgroups: usize,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub status: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TreeHealth {
    pub status: HealthState,
    #[serde(flatten)]
    pub integrity: TreeIntegrity,
}

impl From<TreeIntegrity> for TreeHealth {
    fn from(integrity: TreeIntegrity) -> Self {
        let status = if !integrity.is_consistent() {
            HealthState::Unhealthy
        } else if !integrity.reattached.is_empty() {
            HealthState::Degraded
        } else {
            HealthState::Healthy
        };
        Self { status, integrity }
    }
}

#[derive(Debug, Serialize)]
pub struct DetailedHealth {
    pub status: HealthState,
    pub version: &'static str,
    pub database: DatabaseHealth,
    pub tree: TreeHealth,
}

async fn database_health(state: &AppState) -> DatabaseHealth {
    match db::check_health(&state.db).await {
        Ok(()) => DatabaseHealth {
            status: HealthState::Healthy,
            error: None,
        },
        Err(e) => DatabaseHealth {
            status: HealthState::Unhealthy,
            error: Some(format!("{:#}", e)),
        },
    }
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthSummary> {
    Json(HealthSummary {
        status: HealthState::Healthy,
        version: env!("CARGO_PKG_VERSION"),
        hostgroups: state.hostgroups.count().await,
    })
}

/// Database and tree report; 503 when either is unhealthy
pub async fn health_check_detailed(
    State(state): State<AppState>,
) -> (StatusCode, Json<DetailedHealth>) {
    let database = database_health(&state).await;
    let tree = TreeHealth::from(state.hostgroups.integrity().await);
    let status = database.status.max(tree.status);

    if status != HealthState::Healthy {
        tracing::warn!(
            database = ?database.status,
            tree = ?tree.status,
            unreachable = tree.integrity.unreachable.len(),
            duplicate_titles = tree.integrity.duplicate_titles.len(),
            "Health check reports problems"
        );
    }

    let report = DetailedHealth {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        tree,
    };
    (status.status_code(), Json(report))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if db::check_health(&state.db).await.is_err() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    if !state.hostgroups.integrity().await.is_consistent() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    StatusCode::OK
}
