use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Attribution context stamped onto every artifact the pipeline produces.
///
/// Stores are keyed by environment, so a single deployment serves one
/// organization/environment pair while tests may construct others.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_organization_id")]
    pub organization_id: String,
    #[serde(default = "default_environment_id")]
    pub environment_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    /// Whether topic-type recipients are honored by the trigger pipeline.
    #[serde(default = "default_topic_notifications")]
    pub topic_notifications: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Upper bound on jobs dispatched concurrently by the runner.
    #[serde(default = "default_max_concurrent_dispatches")]
    pub max_concurrent_dispatches: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_organization_id() -> String {
    "default-org".to_string()
}

fn default_environment_id() -> String {
    "development".to_string()
}

fn default_topic_notifications() -> bool {
    true
}

fn default_max_concurrent_dispatches() -> usize {
    32
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("context.organization_id", "default-org")?
            .set_default("context.environment_id", "development")?
            .set_default("features.topic_notifications", true)?
            .set_default("runner.max_concurrent_dispatches", 32)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, FEATURES_TOPIC_NOTIFICATIONS, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            organization_id: default_organization_id(),
            environment_id: default_environment_id(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            topic_notifications: default_topic_notifications(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_dispatches: default_max_concurrent_dispatches(),
        }
    }
}
