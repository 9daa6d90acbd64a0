//! Trigger resolution and fan-out.
//!
//! One trigger call flows through: recipient normalization → topic
//! expansion and inline-subscriber registration → deduplication →
//! per-subscriber, per-step materialization → job enqueue. Everything up
//! to enqueue is synchronous with the caller; delivery happens in the
//! runner afterwards.

mod pipeline;
mod recipient;

pub use pipeline::{EnvironmentContext, TriggerOutcome, TriggerPipeline, TriggerRequest};
pub use recipient::{normalize_recipients, RecipientDescriptor};
