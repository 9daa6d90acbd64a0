//! Topic registry.
//!
//! A topic is a named, persistent group of subscribers addressable by a
//! stable key (unique per environment). The trigger pipeline resolves
//! topic membership as a snapshot at trigger time; concurrent membership
//! changes neither block nor are blocked by an in-flight trigger.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::TOPICS_CREATED_TOTAL;

/// Topic-specific error type
#[derive(Debug, Error)]
pub enum TopicError {
    #[error("Topic not found: {0}")]
    NotFound(String),

    #[error("Topic already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid topic key: {0}")]
    InvalidKey(String),
}

/// Result type for topic operations
pub type TopicResult<T> = Result<T, TopicError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Internal identifier
    pub id: Uuid,

    /// Stable key, unique per environment
    pub key: String,

    pub name: String,

    pub organization_id: String,
    pub environment_id: String,

    /// Ordered member list of external subscriber ids
    pub subscribers: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_key(key: &str) -> TopicResult<()> {
    if key.is_empty() || key.len() > 128 {
        return Err(TopicError::InvalidKey(
            "key must be 1-128 characters".to_string(),
        ));
    }
    if !key
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.' || c == ':')
    {
        return Err(TopicError::InvalidKey(
            "key must contain only alphanumeric, dash, underscore, dot, or colon".to_string(),
        ));
    }
    Ok(())
}

/// In-memory topic storage, keyed by (environment, key).
pub struct TopicStore {
    topics: DashMap<(String, String), Topic>,
}

impl Default for TopicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TopicStore {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    pub fn create(
        &self,
        organization_id: &str,
        environment_id: &str,
        key: &str,
        name: &str,
    ) -> TopicResult<Topic> {
        validate_key(key)?;

        let map_key = (environment_id.to_string(), key.to_string());
        if self.topics.contains_key(&map_key) {
            return Err(TopicError::AlreadyExists(key.to_string()));
        }

        let now = Utc::now();
        let topic = Topic {
            id: Uuid::new_v4(),
            key: key.to_string(),
            name: name.to_string(),
            organization_id: organization_id.to_string(),
            environment_id: environment_id.to_string(),
            subscribers: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.topics.insert(map_key, topic.clone());
        TOPICS_CREATED_TOTAL.inc();

        tracing::debug!(key = %key, environment_id = %environment_id, "Topic created");

        Ok(topic)
    }

    pub fn get(&self, environment_id: &str, key: &str) -> TopicResult<Topic> {
        self.topics
            .get(&(environment_id.to_string(), key.to_string()))
            .map(|t| t.clone())
            .ok_or_else(|| TopicError::NotFound(key.to_string()))
    }

    /// Add subscribers to a topic's member list, preserving order and
    /// skipping ids that are already members. Returns the ids actually
    /// appended plus the ones that were already present (both count as
    /// succeeded from the caller's perspective).
    pub fn add_subscribers(
        &self,
        environment_id: &str,
        key: &str,
        subscriber_ids: &[String],
    ) -> TopicResult<Vec<String>> {
        let map_key = (environment_id.to_string(), key.to_string());
        let mut topic = self
            .topics
            .get_mut(&map_key)
            .ok_or_else(|| TopicError::NotFound(key.to_string()))?;

        let mut succeeded = Vec::with_capacity(subscriber_ids.len());
        for id in subscriber_ids {
            if id.trim().is_empty() {
                continue;
            }
            if !topic.subscribers.contains(id) {
                topic.subscribers.push(id.clone());
            }
            succeeded.push(id.clone());
        }
        topic.updated_at = Utc::now();

        Ok(succeeded)
    }

    pub fn remove_subscriber(
        &self,
        environment_id: &str,
        key: &str,
        subscriber_id: &str,
    ) -> TopicResult<()> {
        let map_key = (environment_id.to_string(), key.to_string());
        let mut topic = self
            .topics
            .get_mut(&map_key)
            .ok_or_else(|| TopicError::NotFound(key.to_string()))?;

        topic.subscribers.retain(|id| id != subscriber_id);
        topic.updated_at = Utc::now();

        Ok(())
    }

    /// Topic Resolver operation: a snapshot of the current ordered member
    /// list. An empty topic resolves to an empty list, not an error.
    pub fn resolve(&self, environment_id: &str, key: &str) -> TopicResult<Vec<String>> {
        self.topics
            .get(&(environment_id.to_string(), key.to_string()))
            .map(|t| t.subscribers.clone())
            .ok_or_else(|| TopicError::NotFound(key.to_string()))
    }

    pub fn list_for_environment(&self, environment_id: &str) -> Vec<Topic> {
        self.topics
            .iter()
            .filter(|entry| entry.key().0 == environment_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_create_and_resolve() {
        let store = TopicStore::new();
        store.create("org", "env", "orders", "Order updates").unwrap();
        store
            .add_subscribers("env", "orders", &ids(&["a", "b"]))
            .unwrap();

        let members = store.resolve("env", "orders").unwrap();
        assert_eq!(members, ids(&["a", "b"]));
    }

    #[test]
    fn test_resolve_missing_topic() {
        let store = TopicStore::new();
        assert!(matches!(
            store.resolve("env", "ghost"),
            Err(TopicError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_empty_topic() {
        let store = TopicStore::new();
        store.create("org", "env", "quiet", "Quiet").unwrap();
        assert!(store.resolve("env", "quiet").unwrap().is_empty());
    }

    #[test]
    fn test_create_duplicate_key() {
        let store = TopicStore::new();
        store.create("org", "env", "orders", "Orders").unwrap();
        assert!(matches!(
            store.create("org", "env", "orders", "Orders again"),
            Err(TopicError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_same_key_distinct_environments() {
        let store = TopicStore::new();
        store.create("org", "env-a", "orders", "Orders").unwrap();
        store.create("org", "env-b", "orders", "Orders").unwrap();
        assert!(store.get("env-a", "orders").is_ok());
        assert!(store.get("env-b", "orders").is_ok());
    }

    #[test]
    fn test_invalid_key_rejected() {
        let store = TopicStore::new();
        assert!(matches!(
            store.create("org", "env", "bad key!", "Bad"),
            Err(TopicError::InvalidKey(_))
        ));
        assert!(matches!(
            store.create("org", "env", "", "Empty"),
            Err(TopicError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_add_subscribers_is_idempotent() {
        let store = TopicStore::new();
        store.create("org", "env", "orders", "Orders").unwrap();
        store
            .add_subscribers("env", "orders", &ids(&["a", "b"]))
            .unwrap();
        let succeeded = store
            .add_subscribers("env", "orders", &ids(&["b", "c"]))
            .unwrap();

        assert_eq!(succeeded, ids(&["b", "c"]));
        assert_eq!(store.resolve("env", "orders").unwrap(), ids(&["a", "b", "c"]));
    }

    #[test]
    fn test_remove_subscriber() {
        let store = TopicStore::new();
        store.create("org", "env", "orders", "Orders").unwrap();
        store
            .add_subscribers("env", "orders", &ids(&["a", "b"]))
            .unwrap();
        store.remove_subscriber("env", "orders", "a").unwrap();

        assert_eq!(store.resolve("env", "orders").unwrap(), ids(&["b"]));
    }

    #[test]
    fn test_resolution_is_a_snapshot() {
        let store = TopicStore::new();
        store.create("org", "env", "orders", "Orders").unwrap();
        store
            .add_subscribers("env", "orders", &ids(&["a"]))
            .unwrap();

        let snapshot = store.resolve("env", "orders").unwrap();
        store
            .add_subscribers("env", "orders", &ids(&["b"]))
            .unwrap();

        // The earlier snapshot is unaffected by the later mutation.
        assert_eq!(snapshot, ids(&["a"]));
        assert_eq!(store.resolve("env", "orders").unwrap(), ids(&["a", "b"]));
    }
}
