//! Topic endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::server::AppState;
use crate::topic::Topic;

use super::Data;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateTopicResponse {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub key: String,
}

/// POST /v1/topics - Create a topic
#[tracing::instrument(name = "http.create_topic", skip(state, request), fields(key = %request.key))]
pub async fn create_topic(
    State(state): State<AppState>,
    Json(request): Json<CreateTopicRequest>,
) -> Result<(StatusCode, Json<Data<CreateTopicResponse>>), AppError> {
    let topic = state.topics.create(
        &state.context.organization_id,
        &state.context.environment_id,
        &request.key,
        &request.name,
    )?;

    Ok((
        StatusCode::CREATED,
        Json(Data::new(CreateTopicResponse {
            id: topic.id,
            key: topic.key,
        })),
    ))
}

/// GET /v1/topics/{key} - Inspect a topic
#[tracing::instrument(name = "http.get_topic", skip(state))]
pub async fn get_topic(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Data<Topic>>, AppError> {
    let topic = state.topics.get(&state.context.environment_id, &key)?;
    Ok(Json(Data::new(topic)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubscribersRequest {
    pub subscribers: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSubscribersResponse {
    pub succeeded: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// POST /v1/topics/{key}/subscribers - Register subscribers on a topic.
///
/// Only ids with an existing subscriber record are added; unknown ids are
/// reported under `failed` without failing the call.
#[tracing::instrument(
    name = "http.add_topic_subscribers",
    skip(state, request),
    fields(count = request.subscribers.len())
)]
pub async fn add_topic_subscribers(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<AddSubscribersRequest>,
) -> Result<Json<Data<AddSubscribersResponse>>, AppError> {
    let environment_id = &state.context.environment_id;

    let (known, failed): (Vec<String>, Vec<String>) = request
        .subscribers
        .into_iter()
        .partition(|id| state.subscribers.exists(environment_id, id));

    let succeeded = state.topics.add_subscribers(environment_id, &key, &known)?;

    Ok(Json(Data::new(AddSubscribersResponse { succeeded, failed })))
}
