//! Verification surfaces: notifications, messages, and execution logs.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::execution::ExecutionLogEntry;
use crate::notification::{ChannelKind, Message, MessageQuery, Notification};
use crate::server::AppState;

use super::Data;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFilter {
    pub subscriber_id: String,
}

/// GET /v1/notifications?subscriberId= - Notifications for one subscriber
#[tracing::instrument(name = "http.list_notifications", skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(filter): Query<NotificationFilter>,
) -> Json<Data<Vec<Notification>>> {
    let notifications = state
        .notifications
        .for_subscriber(&state.context.environment_id, &filter.subscriber_id);
    Json(Data::new(notifications))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    pub subscriber_id: Option<String>,
    pub channel: Option<ChannelKind>,
    pub transaction_id: Option<Uuid>,
}

/// GET /v1/messages - Messages filtered by subscriber, channel, transaction
#[tracing::instrument(name = "http.list_messages", skip(state))]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(filter): Query<MessageFilter>,
) -> Json<Data<Vec<Message>>> {
    let messages = state.messages.query(
        &state.context.environment_id,
        &MessageQuery {
            subscriber_id: filter.subscriber_id,
            channel: filter.channel,
            transaction_id: filter.transaction_id,
        },
    );
    Json(Data::new(messages))
}

/// POST /v1/messages/{id}/seen - Mark an in-app message as seen
#[tracing::instrument(name = "http.mark_message_seen", skip(state))]
pub async fn mark_message_seen(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Data<Message>>, AppError> {
    let environment_id = &state.context.environment_id;
    if !state.messages.mark_seen(environment_id, id) {
        return Err(AppError::NotFound(format!("message {id}")));
    }

    let message = state
        .messages
        .get(environment_id, id)
        .ok_or_else(|| AppError::NotFound(format!("message {id}")))?;
    Ok(Json(Data::new(message)))
}

/// GET /v1/logs - Execution log for this environment/organization
#[tracing::instrument(name = "http.list_logs", skip(state))]
pub async fn list_logs(State(state): State<AppState>) -> Json<Data<Vec<ExecutionLogEntry>>> {
    let entries = state.execution_log.query(
        &state.context.environment_id,
        &state.context.organization_id,
    );
    Json(Data::new(entries))
}
