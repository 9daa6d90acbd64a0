//! Asynchronous job runner.
//!
//! The trigger pipeline materializes one `Job` per message and hands its
//! id to the runner through an unbounded channel. From that point the
//! runner owns the job: it renders nothing (content was rendered at
//! materialization), dispatches through the channel's provider, and
//! records the terminal status. The pipeline never polls, retries, or
//! cancels a job after enqueue; execution failures mark the job `Failed`
//! and end there.

mod provider;

pub use provider::{ChannelProvider, LogChannelProvider, ProviderError, ProviderRegistry};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::metrics::{JOBS_COMPLETED_TOTAL, JOBS_ENQUEUED_TOTAL, JOBS_FAILED_TOTAL};
use crate::notification::{ChannelKind, MessageStore};

/// Job lifecycle: created pending, picked up by the runner, finished
/// either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// The unit scheduled for asynchronous execution; one per message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,

    pub message_id: Uuid,
    pub notification_id: Uuid,

    pub organization_id: String,
    pub environment_id: String,
    pub subscriber_id: String,
    pub transaction_id: Uuid,

    pub channel: ChannelKind,

    /// Channel payload view; carries trigger attachments verbatim for
    /// channels that support them
    pub payload: serde_json::Value,

    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory job storage.
pub struct JobStore {
    jobs: DashMap<Uuid, Job>,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
        }
    }

    pub fn insert(&self, job: Job) {
        self.jobs.insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.get(&id).map(|j| j.clone())
    }

    pub fn set_status(&self, id: Uuid, status: JobStatus, error: Option<String>) {
        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.status = status;
            job.error = error;
            job.updated_at = Utc::now();
        }
    }

    pub fn for_transaction(&self, transaction_id: Uuid) -> Vec<Job> {
        self.jobs
            .iter()
            .filter(|entry| entry.transaction_id == transaction_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn count_by_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|e| e.status == status).count()
    }

    pub fn count(&self) -> usize {
        self.jobs.len()
    }
}

/// Enqueue side of the runner channel, held by the trigger pipeline.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Uuid>,
}

impl JobQueue {
    pub fn enqueue(&self, job_id: Uuid) {
        JOBS_ENQUEUED_TOTAL.inc();
        if self.tx.send(job_id).is_err() {
            // Runner gone during shutdown; the job stays pending.
            tracing::warn!(job_id = %job_id, "Job runner channel closed, job not scheduled");
        }
    }
}

/// Create the queue/runner channel pair.
pub fn job_channel() -> (JobQueue, mpsc::UnboundedReceiver<Uuid>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobQueue { tx }, rx)
}

struct JobExecutor {
    jobs: Arc<JobStore>,
    messages: Arc<MessageStore>,
    providers: Arc<ProviderRegistry>,
}

impl JobExecutor {
    #[tracing::instrument(name = "runner.process", skip(self))]
    async fn process(&self, job_id: Uuid) {
        let Some(job) = self.jobs.get(job_id) else {
            tracing::warn!(job_id = %job_id, "Enqueued job not found in store");
            return;
        };

        self.jobs.set_status(job.id, JobStatus::Running, None);

        let result = match self.messages.get(&job.environment_id, job.message_id) {
            Some(message) => match self.providers.get(job.channel) {
                Ok(provider) => provider.dispatch(&job, &message).await,
                Err(e) => Err(e),
            },
            None => Err(ProviderError::Dispatch(format!(
                "message {} not found",
                job.message_id
            ))),
        };

        match result {
            Ok(()) => {
                self.jobs.set_status(job.id, JobStatus::Completed, None);
                JOBS_COMPLETED_TOTAL.inc();
                tracing::debug!(
                    job_id = %job.id,
                    channel = %job.channel,
                    transaction_id = %job.transaction_id,
                    "Job completed"
                );
            }
            Err(e) => {
                self.jobs
                    .set_status(job.id, JobStatus::Failed, Some(e.to_string()));
                JOBS_FAILED_TOTAL.inc();
                tracing::warn!(
                    job_id = %job.id,
                    channel = %job.channel,
                    error = %e,
                    "Job failed"
                );
            }
        }
    }
}

/// Drains the job channel and executes jobs with bounded concurrency.
pub struct JobRunner {
    executor: Arc<JobExecutor>,
    rx: mpsc::UnboundedReceiver<Uuid>,
    max_concurrent: usize,
}

impl JobRunner {
    pub fn new(
        jobs: Arc<JobStore>,
        messages: Arc<MessageStore>,
        providers: Arc<ProviderRegistry>,
        rx: mpsc::UnboundedReceiver<Uuid>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            executor: Arc::new(JobExecutor {
                jobs,
                messages,
                providers,
            }),
            rx,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Run until the queue side is dropped or a shutdown signal arrives.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(max_concurrent = self.max_concurrent, "Job runner started");

        let mut in_flight = FuturesUnordered::new();
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Job runner received shutdown signal");
                    break;
                }
                maybe_id = self.rx.recv() => {
                    match maybe_id {
                        Some(job_id) => {
                            while in_flight.len() >= self.max_concurrent {
                                in_flight.next().await;
                            }
                            let executor = self.executor.clone();
                            in_flight.push(async move { executor.process(job_id).await });
                        }
                        None => break,
                    }
                }
                Some(_) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }

        // Finish in-flight dispatches before returning
        while in_flight.next().await.is_some() {}
        tracing::info!("Job runner stopped");
    }

    /// Execute every job currently in the channel and wait for all of
    /// them to finish. Used by tests and shutdown paths that need the
    /// queue settled at a known point.
    pub async fn drain(&mut self) {
        let mut in_flight = FuturesUnordered::new();
        while let Ok(job_id) = self.rx.try_recv() {
            let executor = self.executor.clone();
            in_flight.push(async move { executor.process(job_id).await });
        }
        while in_flight.next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Message;
    use async_trait::async_trait;
    use serde_json::json;

    fn seed_message(messages: &MessageStore, env: &str) -> Message {
        let message = Message {
            id: Uuid::new_v4(),
            notification_id: Uuid::new_v4(),
            organization_id: "org".to_string(),
            environment_id: env.to_string(),
            subscriber_id: "user-1".to_string(),
            transaction_id: Uuid::new_v4(),
            channel: ChannelKind::Email,
            content: "hello".to_string(),
            subject: Some("hi".to_string()),
            cta: None,
            phone: None,
            email: Some("user-1@example.com".to_string()),
            seen: false,
            last_seen_date: None,
            payload: json!({}),
            created_at: Utc::now(),
        };
        messages.append(message.clone());
        message
    }

    fn seed_job(jobs: &JobStore, message: &Message) -> Job {
        let job = Job {
            id: Uuid::new_v4(),
            message_id: message.id,
            notification_id: message.notification_id,
            organization_id: message.organization_id.clone(),
            environment_id: message.environment_id.clone(),
            subscriber_id: message.subscriber_id.clone(),
            transaction_id: message.transaction_id,
            channel: message.channel,
            payload: json!({}),
            status: JobStatus::Pending,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        jobs.insert(job.clone());
        job
    }

    struct FailingProvider;

    #[async_trait]
    impl ChannelProvider for FailingProvider {
        async fn dispatch(&self, _job: &Job, _message: &Message) -> Result<(), ProviderError> {
            Err(ProviderError::Dispatch("smtp unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_drain_completes_pending_jobs() {
        let jobs = Arc::new(JobStore::new());
        let messages = Arc::new(MessageStore::new());
        let providers = Arc::new(ProviderRegistry::with_default_providers());
        let (queue, rx) = job_channel();

        let message = seed_message(&messages, "env");
        let job = seed_job(&jobs, &message);
        queue.enqueue(job.id);

        let mut runner = JobRunner::new(jobs.clone(), messages, providers, rx, 4);
        runner.drain().await;

        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_dispatch_marks_job_failed() {
        let jobs = Arc::new(JobStore::new());
        let messages = Arc::new(MessageStore::new());
        let mut providers = ProviderRegistry::with_default_providers();
        providers.register(ChannelKind::Email, Arc::new(FailingProvider));
        let (queue, rx) = job_channel();

        let message = seed_message(&messages, "env");
        let job = seed_job(&jobs, &message);
        queue.enqueue(job.id);

        let mut runner = JobRunner::new(jobs.clone(), messages, Arc::new(providers), rx, 4);
        runner.drain().await;

        let stored = jobs.get(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.error.as_deref().unwrap().contains("smtp unreachable"));
    }

    #[tokio::test]
    async fn test_missing_message_marks_job_failed() {
        let jobs = Arc::new(JobStore::new());
        let messages = Arc::new(MessageStore::new());
        let providers = Arc::new(ProviderRegistry::with_default_providers());
        let (queue, rx) = job_channel();

        let message = seed_message(&messages, "env");
        let mut job = seed_job(&jobs, &message);
        job.message_id = Uuid::new_v4(); // points nowhere
        jobs.insert(job.clone());
        queue.enqueue(job.id);

        let mut runner = JobRunner::new(jobs.clone(), messages, providers, rx, 4);
        runner.drain().await;

        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_stops_when_queue_dropped() {
        let jobs = Arc::new(JobStore::new());
        let messages = Arc::new(MessageStore::new());
        let providers = Arc::new(ProviderRegistry::with_default_providers());
        let (queue, rx) = job_channel();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let message = seed_message(&messages, "env");
        let job = seed_job(&jobs, &message);
        queue.enqueue(job.id);

        let runner = JobRunner::new(jobs.clone(), messages, providers, rx, 4);
        drop(queue);
        runner.run(shutdown_rx).await;

        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_store_counts_by_status() {
        let jobs = JobStore::new();
        let messages = MessageStore::new();
        let message = seed_message(&messages, "env");
        let job = seed_job(&jobs, &message);

        assert_eq!(jobs.count_by_status(JobStatus::Pending), 1);
        jobs.set_status(job.id, JobStatus::Completed, None);
        assert_eq!(jobs.count_by_status(JobStatus::Pending), 0);
        assert_eq!(jobs.count_by_status(JobStatus::Completed), 1);
        assert_eq!(jobs.for_transaction(job.transaction_id).len(), 1);
    }
}
