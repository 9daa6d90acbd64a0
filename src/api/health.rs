use axum::{extract::State, Json};
use serde::Serialize;

use crate::runner::JobStatus;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub workflows: usize,
    pub topics: usize,
    pub subscribers: usize,
    pub notifications: usize,
    pub messages: usize,
    pub log_entries: usize,
    pub jobs: JobStats,
}

#[derive(Debug, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        workflows: state.workflows.count(),
        topics: state.topics.count(),
        subscribers: state.subscribers.count(),
        notifications: state.notifications.count(),
        messages: state.messages.count(),
        log_entries: state.execution_log.count(),
        jobs: JobStats {
            pending: state.jobs.count_by_status(JobStatus::Pending),
            running: state.jobs.count_by_status(JobStatus::Running),
            completed: state.jobs.count_by_status(JobStatus::Completed),
            failed: state.jobs.count_by_status(JobStatus::Failed),
        },
    })
}
