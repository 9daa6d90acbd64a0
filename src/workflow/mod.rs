//! Workflow definition store.
//!
//! A workflow is the template a trigger runs: an ordered list of channel
//! steps, each carrying content with `{{variable}}` placeholders. The
//! trigger payload and subscriber profile fields form the variable scope
//! at render time.
//!
//! # Example
//!
//! ```ignore
//! let store = WorkflowStore::new();
//!
//! let workflow = Workflow::new(
//!     "order-shipped",
//!     "Order Shipped",
//!     vec![
//!         StepTemplate::in_app("Order {{orderId}} is on its way"),
//!         StepTemplate::email("Shipping update", "Hi {{firstName}}, order {{orderId}} shipped."),
//!     ],
//! );
//!
//! store.create(workflow)?;
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notification::ChannelKind;

/// Workflow-specific error type
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Workflow already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid workflow ID: {0}")]
    InvalidId(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Variable substitution failed: {0}")]
    SubstitutionFailed(String),
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// One channel step of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTemplate {
    pub channel: ChannelKind,

    /// Step content with {{variable}} placeholders
    pub content: String,

    /// Subject line template (email)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Call-to-action template (in-app), rendered alongside the content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cta: Option<serde_json::Value>,
}

impl StepTemplate {
    pub fn in_app(content: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::InApp,
            content: content.into(),
            subject: None,
            cta: None,
        }
    }

    pub fn email(subject: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Email,
            content: content.into(),
            subject: Some(subject.into()),
            cta: None,
        }
    }

    pub fn sms(content: impl Into<String>) -> Self {
        Self {
            channel: ChannelKind::Sms,
            content: content.into(),
            subject: None,
            cta: None,
        }
    }

    pub fn with_cta(mut self, cta: serde_json::Value) -> Self {
        self.cta = Some(cta);
        self
    }
}

/// A workflow definition, triggered by its `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Unique workflow identifier (alphanumeric, dash, underscore); this
    /// is the `name` a trigger request references
    pub id: String,

    /// Human-readable workflow name
    pub name: String,

    /// Ordered channel steps
    pub steps: Vec<StepTemplate>,

    /// Workflow description (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            steps,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the workflow
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.id.is_empty() || self.id.len() > 64 {
            return Err(WorkflowError::InvalidId(
                "ID must be 1-64 characters".to_string(),
            ));
        }

        if !self.id.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
            return Err(WorkflowError::InvalidId(
                "ID must contain only alphanumeric, dash, or underscore".to_string(),
            ));
        }

        if self.name.is_empty() || self.name.len() > 256 {
            return Err(WorkflowError::InvalidWorkflow(
                "Name must be 1-256 characters".to_string(),
            ));
        }

        if self.steps.is_empty() {
            return Err(WorkflowError::InvalidWorkflow(
                "Workflow must define at least one step".to_string(),
            ));
        }

        Ok(())
    }
}

/// Request to create a new workflow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowRequest {
    pub id: String,
    pub name: String,
    pub steps: Vec<StepTemplate>,
    pub description: Option<String>,
}

impl From<CreateWorkflowRequest> for Workflow {
    fn from(req: CreateWorkflowRequest) -> Self {
        let now = Utc::now();
        Workflow {
            id: req.id,
            name: req.name,
            steps: req.steps,
            description: req.description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to update an existing workflow
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWorkflowRequest {
    pub name: Option<String>,
    pub steps: Option<Vec<StepTemplate>>,
    pub description: Option<Option<String>>,
}

/// Response for listing workflows
#[derive(Debug, Serialize)]
pub struct WorkflowListResponse {
    pub workflows: Vec<Workflow>,
    pub total: usize,
}

/// In-memory workflow storage
pub struct WorkflowStore {
    workflows: DashMap<String, Workflow>,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
        }
    }

    pub fn create(&self, workflow: Workflow) -> WorkflowResult<Workflow> {
        workflow.validate()?;

        if self.workflows.contains_key(&workflow.id) {
            return Err(WorkflowError::AlreadyExists(workflow.id));
        }

        let id = workflow.id.clone();
        self.workflows.insert(id.clone(), workflow.clone());

        Ok(workflow)
    }

    pub fn get(&self, id: &str) -> WorkflowResult<Workflow> {
        self.workflows
            .get(id)
            .map(|w| w.clone())
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<Workflow> {
        self.workflows
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn update(&self, id: &str, updates: UpdateWorkflowRequest) -> WorkflowResult<Workflow> {
        let mut workflow = self.get(id)?;

        if let Some(name) = updates.name {
            workflow.name = name;
        }

        if let Some(steps) = updates.steps {
            workflow.steps = steps;
        }

        if let Some(description) = updates.description {
            workflow.description = description;
        }

        workflow.updated_at = Utc::now();
        workflow.validate()?;

        self.workflows.insert(id.to_string(), workflow.clone());

        Ok(workflow)
    }

    pub fn delete(&self, id: &str) -> WorkflowResult<()> {
        self.workflows
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| WorkflowError::NotFound(id.to_string()))
    }

    pub fn exists(&self, id: &str) -> bool {
        self.workflows.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.workflows.len()
    }
}

/// Substitute `{{variable}}` placeholders in a string from a variable map.
pub fn substitute_string(template: &str, variables: &HashMap<String, serde_json::Value>) -> String {
    let mut result = template.to_string();

    for (key, value) in variables {
        let pattern = format!("{{{{{}}}}}", key);
        let replacement = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Null => "".to_string(),
            // For arrays and objects, use JSON representation
            _ => value.to_string(),
        };
        result = result.replace(&pattern, &replacement);
    }

    result
}

/// Substitute `{{variable}}` placeholders recursively through a JSON value.
pub fn substitute_value(
    value: &serde_json::Value,
    variables: &HashMap<String, serde_json::Value>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(substitute_string(s, variables)),
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(|v| substitute_value(v, variables)).collect())
        }
        serde_json::Value::Object(obj) => {
            let mut rendered = serde_json::Map::new();
            for (key, val) in obj {
                rendered.insert(
                    substitute_string(key, variables),
                    substitute_value(val, variables),
                );
            }
            serde_json::Value::Object(rendered)
        }
        // Numbers, booleans, null are passed through as-is
        _ => value.clone(),
    }
}
