use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ChannelKind;

/// One per (trigger, subscriber): groups all channel messages generated
/// for that subscriber by one trigger call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,

    pub organization_id: String,
    pub environment_id: String,

    /// External id of the subscriber this notification belongs to
    pub subscriber_id: String,

    /// The workflow that produced this notification
    pub workflow_id: String,

    /// Correlation id shared by every artifact of one trigger call
    pub transaction_id: Uuid,

    pub created_at: DateTime<Utc>,
}

/// One per (notification, channel step).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,

    pub notification_id: Uuid,

    pub organization_id: String,
    pub environment_id: String,
    pub subscriber_id: String,
    pub transaction_id: Uuid,

    pub channel: ChannelKind,

    /// Rendered step content
    pub content: String,

    /// Rendered subject line (email)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Rendered call-to-action data (in-app)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<serde_json::Value>,

    /// Destination phone number (SMS), copied from the subscriber record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Destination address (email), copied from the subscriber record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the in-app message has been seen
    pub seen: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_date: Option<DateTime<Utc>>,

    /// Payload view for this channel: the trigger payload, with
    /// attachments merged in only for channels that carry them
    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,
}
