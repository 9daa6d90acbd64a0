use std::sync::Arc;

use crate::config::Settings;
use crate::execution::ExecutionLogStore;
use crate::notification::{MessageStore, NotificationStore};
use crate::runner::{job_channel, JobRunner, JobStore, ProviderRegistry};
use crate::subscriber::SubscriberStore;
use crate::topic::TopicStore;
use crate::trigger::{EnvironmentContext, TriggerPipeline};
use crate::workflow::WorkflowStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub context: EnvironmentContext,
    pub workflows: Arc<WorkflowStore>,
    pub topics: Arc<TopicStore>,
    pub subscribers: Arc<SubscriberStore>,
    pub notifications: Arc<NotificationStore>,
    pub messages: Arc<MessageStore>,
    pub jobs: Arc<JobStore>,
    pub execution_log: Arc<ExecutionLogStore>,
    pub pipeline: Arc<TriggerPipeline>,
}

impl AppState {
    /// Build the application state and the job runner wired to it.
    ///
    /// The runner is returned separately so the caller decides where it
    /// runs: `main` spawns it with a shutdown receiver, tests drive it
    /// with `drain`.
    pub fn new(settings: Settings) -> (Self, JobRunner) {
        let context = EnvironmentContext::from(&settings.context);

        let workflows = Arc::new(WorkflowStore::new());
        let topics = Arc::new(TopicStore::new());
        let subscribers = Arc::new(SubscriberStore::new());
        let notifications = Arc::new(NotificationStore::new());
        let messages = Arc::new(MessageStore::new());
        let jobs = Arc::new(JobStore::new());
        let execution_log = Arc::new(ExecutionLogStore::new());

        let (job_queue, job_rx) = job_channel();
        let providers = Arc::new(ProviderRegistry::with_default_providers());
        let runner = JobRunner::new(
            jobs.clone(),
            messages.clone(),
            providers,
            job_rx,
            settings.runner.max_concurrent_dispatches,
        );

        let pipeline = Arc::new(TriggerPipeline::new(
            workflows.clone(),
            topics.clone(),
            subscribers.clone(),
            notifications.clone(),
            messages.clone(),
            jobs.clone(),
            execution_log.clone(),
            job_queue,
            &settings.features,
        ));

        let state = Self {
            settings: Arc::new(settings),
            context,
            workflows,
            topics,
            subscribers,
            notifications,
            messages,
            jobs,
            execution_log,
            pipeline,
        };

        (state, runner)
    }
}
