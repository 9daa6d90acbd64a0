//! Execution log.
//!
//! An append-only audit trail of trigger processing. The pipeline only
//! writes entries; it never reads them back. Entries become visible to
//! readers when `append` returns and are never mutated or deleted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metrics::LOG_ENTRIES_TOTAL;

/// Stage classification for a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    /// The trigger request was accepted (one per trigger, organization-scoped)
    TriggerReceived,
    /// Fan-out reached a subscriber (one per deduplicated subscriber)
    RequestProcessed,
    /// A channel message record was durably created
    MessageCreated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub id: Uuid,

    pub organization_id: String,
    pub environment_id: String,

    /// Absent for trigger-scoped entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,

    pub transaction_id: Uuid,

    pub kind: LogKind,

    /// Free-text stage description ("Request processed", "In App message
    /// created", ...)
    pub text: String,

    pub created_at: DateTime<Utc>,
}

/// Append-only log storage, grouped per environment.
pub struct ExecutionLogStore {
    entries: DashMap<String, Vec<ExecutionLogEntry>>,
}

impl Default for ExecutionLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLogStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn append(&self, entry: ExecutionLogEntry) {
        tracing::debug!(
            transaction_id = %entry.transaction_id,
            kind = ?entry.kind,
            text = %entry.text,
            "Execution log entry appended"
        );

        self.entries
            .entry(entry.environment_id.clone())
            .or_default()
            .push(entry);
        LOG_ENTRIES_TOTAL.inc();
    }

    /// Query entries by environment and organization, in append order.
    pub fn query(&self, environment_id: &str, organization_id: &str) -> Vec<ExecutionLogEntry> {
        self.entries
            .get(environment_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.organization_id == organization_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn for_transaction(
        &self,
        environment_id: &str,
        transaction_id: Uuid,
    ) -> Vec<ExecutionLogEntry> {
        self.entries
            .get(environment_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.transaction_id == transaction_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.entries.iter().map(|e| e.len()).sum()
    }
}
