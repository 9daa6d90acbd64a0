use serde::{Deserialize, Serialize};

/// A delivery medium for one workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    InApp,
    Email,
    Sms,
    Push,
    Chat,
}

impl ChannelKind {
    /// Display name used in execution-log text ("In App message created").
    pub fn display_name(&self) -> &'static str {
        match self {
            ChannelKind::InApp => "In App",
            ChannelKind::Email => "Email",
            ChannelKind::Sms => "SMS",
            ChannelKind::Push => "Push",
            ChannelKind::Chat => "Chat",
        }
    }

    /// Stable label for metrics and queries.
    pub fn as_label(&self) -> &'static str {
        match self {
            ChannelKind::InApp => "in_app",
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
            ChannelKind::Chat => "chat",
        }
    }

    /// Whether trigger attachments are carried on this channel's payload.
    /// In-app messages render inside the product and never carry them.
    pub fn supports_attachments(&self) -> bool {
        matches!(self, ChannelKind::Email)
    }

    pub fn is_in_app(&self) -> bool {
        matches!(self, ChannelKind::InApp)
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}
