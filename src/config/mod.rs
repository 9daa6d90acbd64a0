mod settings;

pub use settings::{
    ContextConfig, FeatureConfig, RunnerConfig, ServerConfig, Settings,
};
