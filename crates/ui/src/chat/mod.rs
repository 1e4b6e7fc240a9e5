/// Channel registry persisted into local state.
pub mod channel_store;
pub mod chat_item;
pub mod debounce;
/// Event contracts for chat module wiring.
pub mod events;
pub mod message;
pub mod message_input;
pub mod message_list;
pub mod scroll_manager;
pub mod sidebar;
pub mod view;

pub use channel_store::{
    ChannelActions, ChannelRegistry, ChannelSnapshot, ChannelStore, ChannelStoreError,
    ChannelSummary, ChannelsChanged,
};
pub use chat_item::{ChatItem, ChatItemProps};
pub use debounce::Debouncer;
pub use events::{
    BackToChannelList, ChannelDeleteRequested, ChannelSelected, NewChannelRequested, Submit,
};
pub use message::{ChannelId, Mask, Message, MessageId};
pub use message_input::MessageInput;
pub use message_list::MessageList;
pub use scroll_manager::{ScrollCoordinator, ScrollManager, ScrollProbe, ScrollSample};
pub use sidebar::ChatList;
pub use view::ChannelChat;
