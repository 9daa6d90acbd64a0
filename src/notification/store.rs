use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ChannelKind, Message, Notification};

/// In-memory notification storage, grouped per environment.
///
/// Appends preserve insertion order within an environment, which keeps
/// query results deterministic for one trigger (the pipeline materializes
/// subscribers sequentially).
pub struct NotificationStore {
    notifications: DashMap<String, Vec<Notification>>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self {
            notifications: DashMap::new(),
        }
    }

    pub fn append(&self, notification: Notification) {
        self.notifications
            .entry(notification.environment_id.clone())
            .or_default()
            .push(notification);
    }

    pub fn for_subscriber(&self, environment_id: &str, subscriber_id: &str) -> Vec<Notification> {
        self.notifications
            .get(environment_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|n| n.subscriber_id == subscriber_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn for_transaction(&self, environment_id: &str, transaction_id: Uuid) -> Vec<Notification> {
        self.notifications
            .get(environment_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|n| n.transaction_id == transaction_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.notifications.iter().map(|e| e.len()).sum()
    }
}

/// Filter for message queries; `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub subscriber_id: Option<String>,
    pub channel: Option<ChannelKind>,
    pub transaction_id: Option<Uuid>,
}

/// In-memory message storage, grouped per environment.
pub struct MessageStore {
    messages: DashMap<String, Vec<Message>>,
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageStore {
    pub fn new() -> Self {
        Self {
            messages: DashMap::new(),
        }
    }

    pub fn append(&self, message: Message) {
        self.messages
            .entry(message.environment_id.clone())
            .or_default()
            .push(message);
    }

    pub fn get(&self, environment_id: &str, id: Uuid) -> Option<Message> {
        self.messages
            .get(environment_id)
            .and_then(|entries| entries.iter().find(|m| m.id == id).cloned())
    }

    pub fn query(&self, environment_id: &str, filter: &MessageQuery) -> Vec<Message> {
        self.messages
            .get(environment_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|m| {
                        filter
                            .subscriber_id
                            .as_ref()
                            .is_none_or(|s| &m.subscriber_id == s)
                            && filter.channel.is_none_or(|c| m.channel == c)
                            && filter.transaction_id.is_none_or(|t| m.transaction_id == t)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Mark an in-app message as seen. No-op if the message is unknown.
    pub fn mark_seen(&self, environment_id: &str, id: Uuid) -> bool {
        if let Some(mut entries) = self.messages.get_mut(environment_id) {
            if let Some(message) = entries.iter_mut().find(|m| m.id == id) {
                message.seen = true;
                message.last_seen_date = Some(Utc::now());
                return true;
            }
        }
        false
    }

    pub fn count(&self) -> usize {
        self.messages.iter().map(|e| e.len()).sum()
    }
}
