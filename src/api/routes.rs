use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::activity::{list_logs, list_messages, list_notifications, mark_message_seen};
use super::events::trigger_event;
use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::topics::{add_topic_subscribers, create_topic, get_topic};
use super::workflows::{
    create_workflow, delete_workflow, get_workflow, list_workflows, update_workflow,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Trigger + registry endpoints
        .nest(
            "/v1",
            Router::new()
                // Trigger
                .route("/events/trigger", post(trigger_event))
                // Topics
                .route("/topics", post(create_topic))
                .route("/topics/{key}", get(get_topic))
                .route("/topics/{key}/subscribers", post(add_topic_subscribers))
                // Workflows
                .route("/workflows", post(create_workflow).get(list_workflows))
                .route(
                    "/workflows/{id}",
                    get(get_workflow).put(update_workflow).delete(delete_workflow),
                )
                // Verification surfaces
                .route("/notifications", get(list_notifications))
                .route("/messages", get(list_messages))
                .route("/messages/{id}/seen", post(mark_message_seen))
                .route("/logs", get(list_logs)),
        )
}
