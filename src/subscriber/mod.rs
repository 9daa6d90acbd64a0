//! Subscriber registry.
//!
//! Subscribers are keyed by an externally supplied `subscriber_id`, unique
//! per environment. They can be registered up front through the API or
//! lazily at trigger time when a recipient list carries an inline
//! definition. Lazy registration never overwrites an existing record:
//! trigger-time definitions only fill gaps, they are not profile updates.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::SUBSCRIBERS_REGISTERED_TOTAL;

/// Subscriber-specific error type
#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("Invalid subscriber definition: {0}")]
    InvalidDefinition(String),

    #[error("Subscriber already exists: {0}")]
    AlreadyExists(String),

    #[error("Subscriber not found: {0}")]
    NotFound(String),
}

/// Result type for subscriber operations
pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// A registered subscriber with its channel addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    /// Internal identifier
    pub id: Uuid,

    /// Externally supplied identifier, unique per environment
    pub subscriber_id: String,

    pub organization_id: String,
    pub environment_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Email channel address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// SMS channel address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Push channel device tokens
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub push_tokens: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The inline subscriber shape accepted in a trigger's recipient list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriberDefinition {
    pub subscriber_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub push_tokens: Vec<String>,
}

impl SubscriberDefinition {
    /// A definition carrying only the external id, used when a trigger
    /// references a subscriber that was never registered.
    pub fn bare(subscriber_id: impl Into<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> SubscriberResult<()> {
        if self.subscriber_id.trim().is_empty() {
            return Err(SubscriberError::InvalidDefinition(
                "subscriberId must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// In-memory subscriber storage, keyed by (environment, subscriber id).
pub struct SubscriberStore {
    subscribers: DashMap<(String, String), Subscriber>,
}

impl Default for SubscriberStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberStore {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Create a subscriber, failing if the external id is already taken
    /// within the environment.
    pub fn create(
        &self,
        organization_id: &str,
        environment_id: &str,
        definition: SubscriberDefinition,
    ) -> SubscriberResult<Subscriber> {
        definition.validate()?;

        let key = (environment_id.to_string(), definition.subscriber_id.clone());
        if self.subscribers.contains_key(&key) {
            return Err(SubscriberError::AlreadyExists(definition.subscriber_id));
        }

        let subscriber = Self::materialize(organization_id, environment_id, definition);
        self.subscribers.insert(key, subscriber.clone());
        SUBSCRIBERS_REGISTERED_TOTAL.inc();

        tracing::debug!(
            subscriber_id = %subscriber.subscriber_id,
            environment_id = %environment_id,
            "Subscriber created"
        );

        Ok(subscriber)
    }

    /// Registrar operation used by the trigger pipeline.
    ///
    /// Looks the subscriber up by external id; if absent, creates it from
    /// the supplied definition. If present, the stored record is returned
    /// untouched: inline trigger definitions never overwrite stored
    /// profile fields.
    pub fn register(
        &self,
        organization_id: &str,
        environment_id: &str,
        definition: SubscriberDefinition,
    ) -> SubscriberResult<Subscriber> {
        definition.validate()?;

        let key = (environment_id.to_string(), definition.subscriber_id.clone());
        if let Some(existing) = self.subscribers.get(&key) {
            return Ok(existing.clone());
        }

        let subscriber = Self::materialize(organization_id, environment_id, definition);
        // A concurrent register for the same id may have won the race;
        // entry() keeps the first insertion.
        let stored = self
            .subscribers
            .entry(key)
            .or_insert_with(|| {
                SUBSCRIBERS_REGISTERED_TOTAL.inc();
                subscriber
            })
            .clone();

        Ok(stored)
    }

    pub fn get(&self, environment_id: &str, subscriber_id: &str) -> SubscriberResult<Subscriber> {
        self.subscribers
            .get(&(environment_id.to_string(), subscriber_id.to_string()))
            .map(|s| s.clone())
            .ok_or_else(|| SubscriberError::NotFound(subscriber_id.to_string()))
    }

    pub fn exists(&self, environment_id: &str, subscriber_id: &str) -> bool {
        self.subscribers
            .contains_key(&(environment_id.to_string(), subscriber_id.to_string()))
    }

    pub fn list_for_environment(&self, environment_id: &str) -> Vec<Subscriber> {
        self.subscribers
            .iter()
            .filter(|entry| entry.key().0 == environment_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.subscribers.len()
    }

    fn materialize(
        organization_id: &str,
        environment_id: &str,
        definition: SubscriberDefinition,
    ) -> Subscriber {
        let now = Utc::now();
        Subscriber {
            id: Uuid::new_v4(),
            subscriber_id: definition.subscriber_id,
            organization_id: organization_id.to_string(),
            environment_id: environment_id.to_string(),
            first_name: definition.first_name,
            last_name: definition.last_name,
            email: definition.email,
            phone: definition.phone,
            push_tokens: definition.push_tokens,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str) -> SubscriberDefinition {
        SubscriberDefinition {
            subscriber_id: id.to_string(),
            first_name: Some("Ada".to_string()),
            email: Some(format!("{id}@example.com")),
            phone: Some("+15550001111".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = SubscriberStore::new();
        let created = store.create("org", "env", definition("user-1")).unwrap();
        assert_eq!(created.subscriber_id, "user-1");

        let fetched = store.get("env", "user-1").unwrap();
        assert_eq!(fetched.email.as_deref(), Some("user-1@example.com"));
    }

    #[test]
    fn test_create_duplicate_fails() {
        let store = SubscriberStore::new();
        store.create("org", "env", definition("user-1")).unwrap();
        assert!(matches!(
            store.create("org", "env", definition("user-1")),
            Err(SubscriberError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_same_id_distinct_environments() {
        let store = SubscriberStore::new();
        store.create("org", "env-a", definition("user-1")).unwrap();
        store.create("org", "env-b", definition("user-1")).unwrap();
        assert!(store.exists("env-a", "user-1"));
        assert!(store.exists("env-b", "user-1"));
    }

    #[test]
    fn test_register_creates_when_absent() {
        let store = SubscriberStore::new();
        let registered = store.register("org", "env", definition("user-2")).unwrap();
        assert_eq!(registered.subscriber_id, "user-2");
        assert!(store.exists("env", "user-2"));
    }

    #[test]
    fn test_register_leaves_existing_untouched() {
        let store = SubscriberStore::new();
        store.create("org", "env", definition("user-3")).unwrap();

        let mut changed = definition("user-3");
        changed.first_name = Some("Grace".to_string());
        changed.email = Some("other@example.com".to_string());

        let resolved = store.register("org", "env", changed).unwrap();
        assert_eq!(resolved.first_name.as_deref(), Some("Ada"));
        assert_eq!(resolved.email.as_deref(), Some("user-3@example.com"));
    }

    #[test]
    fn test_register_rejects_empty_id() {
        let store = SubscriberStore::new();
        let result = store.register("org", "env", SubscriberDefinition::bare(""));
        assert!(matches!(result, Err(SubscriberError::InvalidDefinition(_))));
    }

    #[test]
    fn test_bare_definition() {
        let definition = SubscriberDefinition::bare("user-9");
        assert_eq!(definition.subscriber_id, "user-9");
        assert!(definition.email.is_none());
    }
}
