//! Outbound channel provider seam.
//!
//! Actual transmission (SMTP, carrier APIs, push gateways) lives behind
//! `ChannelProvider`; the default implementation only logs, which is the
//! whole delivery story for in-app messages and a stand-in for outbound
//! channels in development and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::notification::{ChannelKind, Message};

use super::Job;

/// Provider-specific error type
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("No provider registered for channel: {0}")]
    NoProvider(ChannelKind),
}

/// A narrow interface to one outbound channel.
#[async_trait]
pub trait ChannelProvider: Send + Sync {
    async fn dispatch(&self, job: &Job, message: &Message) -> Result<(), ProviderError>;
}

/// Default provider: records the dispatch through tracing and succeeds.
pub struct LogChannelProvider;

#[async_trait]
impl ChannelProvider for LogChannelProvider {
    async fn dispatch(&self, job: &Job, message: &Message) -> Result<(), ProviderError> {
        tracing::info!(
            job_id = %job.id,
            message_id = %message.id,
            channel = %message.channel,
            subscriber_id = %message.subscriber_id,
            transaction_id = %message.transaction_id,
            "Dispatched message"
        );
        Ok(())
    }
}

/// Maps each channel kind to its provider.
pub struct ProviderRegistry {
    providers: HashMap<ChannelKind, Arc<dyn ChannelProvider>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_default_providers()
    }
}

impl ProviderRegistry {
    /// Every channel wired to the logging provider.
    pub fn with_default_providers() -> Self {
        let log_provider: Arc<dyn ChannelProvider> = Arc::new(LogChannelProvider);
        let providers = [
            ChannelKind::InApp,
            ChannelKind::Email,
            ChannelKind::Sms,
            ChannelKind::Push,
            ChannelKind::Chat,
        ]
        .into_iter()
        .map(|channel| (channel, log_provider.clone()))
        .collect();

        Self { providers }
    }

    pub fn register(&mut self, channel: ChannelKind, provider: Arc<dyn ChannelProvider>) {
        self.providers.insert(channel, provider);
    }

    pub fn get(&self, channel: ChannelKind) -> Result<Arc<dyn ChannelProvider>, ProviderError> {
        self.providers
            .get(&channel)
            .cloned()
            .ok_or(ProviderError::NoProvider(channel))
    }
}
