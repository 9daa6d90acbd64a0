//! Trigger endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::server::AppState;
use crate::trigger::TriggerRequest;

use super::Data;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub status: String,
    pub acknowledged: bool,
    pub transaction_id: Uuid,
}

/// POST /v1/events/trigger - Run a workflow against a recipient list.
///
/// Responds once every job is enqueued; delivery happens asynchronously.
#[tracing::instrument(
    name = "http.trigger_event",
    skip(state, request),
    fields(workflow = %request.name)
)]
pub async fn trigger_event(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> Result<Json<Data<TriggerResponse>>, AppError> {
    let outcome = state.pipeline.execute(&state.context, request)?;

    Ok(Json(Data::new(TriggerResponse {
        status: "processed".to_string(),
        acknowledged: true,
        transaction_id: outcome.transaction_id,
    })))
}
