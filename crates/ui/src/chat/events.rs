use crate::chat::message::ChannelId;

/// Emitted when the chat list selection changes the active channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelSelected {
    pub channel: ChannelId,
}

/// Emitted when a chat list row's delete affordance is clicked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelDeleteRequested {
    pub channel: ChannelId,
}

/// Emitted when the chat list asks for a fresh channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewChannelRequested;

/// Emitted when the user submits a message in a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub channel: ChannelId,
    pub content: String,
}

impl Submit {
    pub fn new(channel: ChannelId, content: impl Into<String>) -> Self {
        Self {
            channel,
            content: content.into(),
        }
    }
}

/// Emitted by the chat pane's back button on narrow viewports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackToChannelList;
