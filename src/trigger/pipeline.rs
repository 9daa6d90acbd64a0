//! The fan-out pipeline.
//!
//! `TriggerPipeline::execute` runs one trigger call end to end:
//! workflow lookup, recipient normalization, topic/inline resolution,
//! deduplication, and per-subscriber materialization of notifications,
//! messages, and jobs. The call returns once every job is enqueued;
//! delivery is the runner's business.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{ContextConfig, FeatureConfig};
use crate::error::AppError;
use crate::execution::{ExecutionLogEntry, ExecutionLogStore, LogKind};
use crate::metrics::{
    FANOUT_SUBSCRIBERS, MESSAGES_CREATED_TOTAL, NOTIFICATIONS_CREATED_TOTAL,
    TRIGGERS_ACCEPTED_TOTAL, TRIGGERS_REJECTED_TOTAL,
};
use crate::notification::{ChannelKind, Message, MessageStore, Notification, NotificationStore};
use crate::runner::{Job, JobQueue, JobStatus, JobStore};
use crate::subscriber::{Subscriber, SubscriberDefinition, SubscriberStore};
use crate::topic::TopicStore;
use crate::workflow::{substitute_string, substitute_value, Workflow, WorkflowStore};

use super::recipient::{normalize_recipients, RecipientDescriptor};

/// Attribution stamped onto every artifact of a trigger call.
#[derive(Debug, Clone)]
pub struct EnvironmentContext {
    pub organization_id: String,
    pub environment_id: String,
}

impl From<&ContextConfig> for EnvironmentContext {
    fn from(config: &ContextConfig) -> Self {
        Self {
            organization_id: config.organization_id.clone(),
            environment_id: config.environment_id.clone(),
        }
    }
}

/// Body of `POST /v1/events/trigger`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    /// Workflow identifier
    pub name: String,

    /// Heterogeneous recipient list
    pub to: Vec<Value>,

    /// Variables for template rendering, passed through to messages
    #[serde(default)]
    pub payload: Value,

    /// Attachments, carried verbatim on jobs for channels that support them
    #[serde(default)]
    pub attachments: Option<Vec<Value>>,
}

/// What one accepted trigger produced.
#[derive(Debug, Clone)]
pub struct TriggerOutcome {
    pub transaction_id: Uuid,
    pub subscribers: usize,
    pub notifications: usize,
    pub messages: usize,
    pub jobs: usize,
}

/// The trigger resolution and fan-out pipeline.
pub struct TriggerPipeline {
    workflows: Arc<WorkflowStore>,
    topics: Arc<TopicStore>,
    subscribers: Arc<SubscriberStore>,
    notifications: Arc<NotificationStore>,
    messages: Arc<MessageStore>,
    jobs: Arc<JobStore>,
    execution_log: Arc<ExecutionLogStore>,
    job_queue: JobQueue,
    topic_notifications_enabled: bool,
}

impl TriggerPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workflows: Arc<WorkflowStore>,
        topics: Arc<TopicStore>,
        subscribers: Arc<SubscriberStore>,
        notifications: Arc<NotificationStore>,
        messages: Arc<MessageStore>,
        jobs: Arc<JobStore>,
        execution_log: Arc<ExecutionLogStore>,
        job_queue: JobQueue,
        features: &FeatureConfig,
    ) -> Self {
        Self {
            workflows,
            topics,
            subscribers,
            notifications,
            messages,
            jobs,
            execution_log,
            job_queue,
            topic_notifications_enabled: features.topic_notifications,
        }
    }

    /// Run one trigger call. Synchronous through job enqueue; a rejected
    /// trigger enqueues nothing and writes no execution log entries.
    #[tracing::instrument(
        name = "trigger.execute",
        skip(self, context, request),
        fields(workflow = %request.name, recipients = request.to.len())
    )]
    pub fn execute(
        &self,
        context: &EnvironmentContext,
        request: TriggerRequest,
    ) -> Result<TriggerOutcome, AppError> {
        match self.run(context, request) {
            Ok(outcome) => {
                TRIGGERS_ACCEPTED_TOTAL.inc();
                FANOUT_SUBSCRIBERS.observe(outcome.subscribers as f64);
                tracing::info!(
                    transaction_id = %outcome.transaction_id,
                    subscribers = outcome.subscribers,
                    messages = outcome.messages,
                    "Trigger accepted and jobs enqueued"
                );
                Ok(outcome)
            }
            Err(e) => {
                TRIGGERS_REJECTED_TOTAL.inc();
                Err(e)
            }
        }
    }

    fn run(
        &self,
        context: &EnvironmentContext,
        request: TriggerRequest,
    ) -> Result<TriggerOutcome, AppError> {
        let workflow = self
            .workflows
            .get(&request.name)
            .map_err(|_| AppError::WorkflowNotFound(request.name.clone()))?;

        if request.to.is_empty() {
            return Err(AppError::Validation(
                "recipient list must not be empty".to_string(),
            ));
        }

        let descriptors = normalize_recipients(&request.to)?;
        let recipients = self.resolve(context, descriptors)?;

        let transaction_id = Uuid::new_v4();
        let outcome = self.materialize(
            context,
            &workflow,
            &recipients,
            transaction_id,
            &request.payload,
            &request.attachments,
        );

        Ok(outcome)
    }

    /// Resolving stage: expand topics, register inline definitions, and
    /// reduce everything to an insertion-ordered deduplicated set.
    ///
    /// Registration side effects from earlier entries are not rolled back
    /// when a later entry fails; the trigger itself is still rejected
    /// before anything is materialized or enqueued.
    fn resolve(
        &self,
        context: &EnvironmentContext,
        descriptors: Vec<RecipientDescriptor>,
    ) -> Result<Vec<Subscriber>, AppError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut recipients: Vec<Subscriber> = Vec::new();

        for descriptor in descriptors {
            match descriptor {
                RecipientDescriptor::Subscriber(subscriber_id) => {
                    // Subscribers referenced only by id are created lazily.
                    let subscriber = self.subscribers.register(
                        &context.organization_id,
                        &context.environment_id,
                        SubscriberDefinition::bare(subscriber_id),
                    )?;
                    if seen.insert(subscriber.subscriber_id.clone()) {
                        recipients.push(subscriber);
                    }
                }
                RecipientDescriptor::Inline(definition) => {
                    let subscriber = self.subscribers.register(
                        &context.organization_id,
                        &context.environment_id,
                        definition,
                    )?;
                    if seen.insert(subscriber.subscriber_id.clone()) {
                        recipients.push(subscriber);
                    }
                }
                RecipientDescriptor::Topic(key) => {
                    if !self.topic_notifications_enabled {
                        return Err(AppError::InvalidRecipient(format!(
                            "topic recipients are disabled: {key}"
                        )));
                    }

                    // Snapshot of the member list at trigger time
                    let members = self.topics.resolve(&context.environment_id, &key)?;
                    for member_id in members {
                        match self.subscribers.get(&context.environment_id, &member_id) {
                            Ok(subscriber) => {
                                if seen.insert(subscriber.subscriber_id.clone()) {
                                    recipients.push(subscriber);
                                }
                            }
                            Err(_) => {
                                // Stale membership entry; the topic outlived
                                // the subscriber record.
                                tracing::warn!(
                                    topic_key = %key,
                                    subscriber_id = %member_id,
                                    "Topic member has no subscriber record, skipping"
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(recipients)
    }

    /// Materializing stage: sequential per subscriber, per step in
    /// template order, so record and log ordering stay reproducible.
    fn materialize(
        &self,
        context: &EnvironmentContext,
        workflow: &Workflow,
        recipients: &[Subscriber],
        transaction_id: Uuid,
        payload: &Value,
        attachments: &Option<Vec<Value>>,
    ) -> TriggerOutcome {
        self.append_log(
            context,
            transaction_id,
            None,
            LogKind::TriggerReceived,
            "Trigger request received",
        );

        let mut notifications = 0usize;
        let mut messages = 0usize;

        for subscriber in recipients {
            let notification = Notification {
                id: Uuid::new_v4(),
                organization_id: context.organization_id.clone(),
                environment_id: context.environment_id.clone(),
                subscriber_id: subscriber.subscriber_id.clone(),
                workflow_id: workflow.id.clone(),
                transaction_id,
                created_at: Utc::now(),
            };
            let notification_id = notification.id;
            self.notifications.append(notification);
            NOTIFICATIONS_CREATED_TOTAL.inc();
            notifications += 1;

            self.append_log(
                context,
                transaction_id,
                Some(subscriber.subscriber_id.clone()),
                LogKind::RequestProcessed,
                "Request processed",
            );

            let variables = render_variables(payload, subscriber);

            for step in &workflow.steps {
                let message = Message {
                    id: Uuid::new_v4(),
                    notification_id,
                    organization_id: context.organization_id.clone(),
                    environment_id: context.environment_id.clone(),
                    subscriber_id: subscriber.subscriber_id.clone(),
                    transaction_id,
                    channel: step.channel,
                    content: substitute_string(&step.content, &variables),
                    subject: step
                        .subject
                        .as_ref()
                        .map(|s| substitute_string(s, &variables)),
                    cta: step.cta.as_ref().map(|c| substitute_value(c, &variables)),
                    phone: subscriber.phone.clone(),
                    email: subscriber.email.clone(),
                    seen: false,
                    last_seen_date: None,
                    payload: channel_payload(payload, attachments, step.channel),
                    created_at: Utc::now(),
                };
                let message_id = message.id;
                let job_payload = message.payload.clone();
                self.messages.append(message);
                MESSAGES_CREATED_TOTAL
                    .with_label_values(&[step.channel.as_label()])
                    .inc();
                messages += 1;

                // In-app messages are the deliverable itself, so their
                // creation is part of the synchronous audit trail. Outbound
                // channels get logged by the runner when dispatch happens.
                if step.channel.is_in_app() {
                    self.append_log(
                        context,
                        transaction_id,
                        Some(subscriber.subscriber_id.clone()),
                        LogKind::MessageCreated,
                        &format!("{} message created", step.channel.display_name()),
                    );
                }

                let now = Utc::now();
                let job = Job {
                    id: Uuid::new_v4(),
                    message_id,
                    notification_id,
                    organization_id: context.organization_id.clone(),
                    environment_id: context.environment_id.clone(),
                    subscriber_id: subscriber.subscriber_id.clone(),
                    transaction_id,
                    channel: step.channel,
                    payload: job_payload,
                    status: JobStatus::Pending,
                    error: None,
                    created_at: now,
                    updated_at: now,
                };
                let job_id = job.id;
                self.jobs.insert(job);
                self.job_queue.enqueue(job_id);
            }
        }

        TriggerOutcome {
            transaction_id,
            subscribers: recipients.len(),
            notifications,
            messages,
            jobs: messages,
        }
    }

    fn append_log(
        &self,
        context: &EnvironmentContext,
        transaction_id: Uuid,
        subscriber_id: Option<String>,
        kind: LogKind,
        text: &str,
    ) {
        self.execution_log.append(ExecutionLogEntry {
            id: Uuid::new_v4(),
            organization_id: context.organization_id.clone(),
            environment_id: context.environment_id.clone(),
            subscriber_id,
            transaction_id,
            kind,
            text: text.to_string(),
            created_at: Utc::now(),
        });
    }
}

/// Rendering scope: trigger payload fields, with the subscriber's profile
/// fields layered on top.
fn render_variables(payload: &Value, subscriber: &Subscriber) -> HashMap<String, Value> {
    let mut variables: HashMap<String, Value> = HashMap::new();

    if let Value::Object(fields) = payload {
        variables.extend(fields.clone());
    }

    variables.insert(
        "subscriberId".to_string(),
        Value::String(subscriber.subscriber_id.clone()),
    );
    if let Some(first_name) = &subscriber.first_name {
        variables.insert("firstName".to_string(), Value::String(first_name.clone()));
    }
    if let Some(last_name) = &subscriber.last_name {
        variables.insert("lastName".to_string(), Value::String(last_name.clone()));
    }
    if let Some(email) = &subscriber.email {
        variables.insert("email".to_string(), Value::String(email.clone()));
    }
    if let Some(phone) = &subscriber.phone {
        variables.insert("phone".to_string(), Value::String(phone.clone()));
    }

    variables
}

/// The payload view a channel sees: the trigger payload, with attachments
/// merged in only for channels that carry them.
fn channel_payload(payload: &Value, attachments: &Option<Vec<Value>>, channel: ChannelKind) -> Value {
    let mut fields = match payload {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other.clone());
            map
        }
    };

    // The channel view decides attachment presence, not the raw payload.
    fields.remove("attachments");

    if channel.supports_attachments() {
        if let Some(list) = attachments {
            if !list.is_empty() {
                fields.insert("attachments".to_string(), Value::Array(list.clone()));
            }
        }
    }

    Value::Object(fields)
}
