//! Notification and message records produced by the trigger pipeline.
//!
//! A `Notification` groups everything one trigger produced for one
//! subscriber; each workflow step contributes one `Message` linked to it.

mod channel;
mod store;
mod types;

pub use channel::ChannelKind;
pub use store::{MessageQuery, MessageStore, NotificationStore};
pub use types::{Message, Notification};
