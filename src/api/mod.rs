//! API layer - HTTP endpoint handlers organized by domain.

mod activity;
mod events;
mod health;
mod metrics;
mod routes;
mod topics;
mod workflows;

// Re-export all handlers for use in server/app.rs
pub use activity::{list_logs, list_messages, list_notifications, mark_message_seen};
pub use events::trigger_event;
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use topics::{add_topic_subscribers, create_topic, get_topic};
pub use workflows::{
    create_workflow, delete_workflow, get_workflow, list_workflows, update_workflow,
};

use serde::Serialize;

/// Response envelope used across the v1 surface.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

impl<T> Data<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
