use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chatoor_storage::{LocalStateStore, StorageError};
use gpui::{App, Context, Entity, EventEmitter};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::message::{ChannelId, Mask, Message};

pub const CHANNEL_KEY_PREFIX: &str = "channel/";
const DEFAULT_CHANNEL_NAME_STEM: &str = "channel";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChannelStoreError {
    #[snafu(display("channel storage failed on `{stage}`: {source}"))]
    Storage {
        stage: &'static str,
        source: StorageError,
    },
    #[snafu(display("persisted channel '{key}' is unreadable on `{stage}`: {source}"))]
    DecodeChannel {
        stage: &'static str,
        key: String,
        source: serde_json::Error,
    },
    #[snafu(display("failed to encode channel '{channel}' on `{stage}`: {source}"))]
    EncodeChannel {
        stage: &'static str,
        channel: String,
        source: serde_json::Error,
    },
    #[snafu(display("channel '{channel}' does not exist (stage `{stage}`)"))]
    UnknownChannel {
        stage: &'static str,
        channel: String,
    },
}

/// Read-only view of one channel handed to the chat pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSnapshot {
    pub channel: ChannelId,
    pub total_messages: usize,
    pub messages: Arc<[Message]>,
}

/// Row data for the chat list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSummary {
    pub channel: ChannelId,
    pub total_messages: usize,
    pub last_activity: Option<i64>,
    pub mask: Option<Mask>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredChannel {
    #[serde(default)]
    mask: Option<Mask>,
    #[serde(default)]
    messages: Vec<Message>,
}

impl StoredChannel {
    fn last_activity(&self) -> Option<i64> {
        self.messages.iter().map(|message| message.created_at).max()
    }
}

/// Per-channel message store persisted into local state under `channel/<id>`.
pub struct ChannelRegistry {
    state: Arc<dyn LocalStateStore>,
    channels: BTreeMap<ChannelId, StoredChannel>,
}

impl ChannelRegistry {
    pub fn load(state: Arc<dyn LocalStateStore>) -> Result<Self, ChannelStoreError> {
        let entries = state
            .entries_with_prefix(CHANNEL_KEY_PREFIX)
            .context(StorageSnafu {
                stage: "channel-load-entries",
            })?;

        let mut channels = BTreeMap::new();
        for (key, value) in entries {
            let stored: StoredChannel =
                serde_json::from_str(&value).context(DecodeChannelSnafu {
                    stage: "channel-load-decode",
                    key: key.clone(),
                })?;
            let id = ChannelId::new(&key[CHANNEL_KEY_PREFIX.len()..]);
            channels.insert(id, stored);
        }

        tracing::debug!("loaded {} channels from local state", channels.len());
        Ok(Self { state, channels })
    }

    /// Channels ordered by most recent activity, then by id.
    pub fn summaries(&self) -> Vec<ChannelSummary> {
        let mut summaries = self
            .channels
            .iter()
            .map(|(channel, stored)| ChannelSummary {
                channel: channel.clone(),
                total_messages: stored.messages.len(),
                last_activity: stored.last_activity(),
                mask: stored.mask.clone(),
            })
            .collect::<Vec<_>>();
        summaries.sort_by(|left, right| {
            right
                .last_activity
                .cmp(&left.last_activity)
                .then_with(|| left.channel.cmp(&right.channel))
        });
        summaries
    }

    pub fn snapshot(&self, channel: &ChannelId) -> Option<ChannelSnapshot> {
        let stored = self.channels.get(channel)?;
        Some(ChannelSnapshot {
            channel: channel.clone(),
            total_messages: stored.messages.len(),
            messages: stored.messages.clone().into(),
        })
    }

    /// Creates a channel named `name`, suffixing `-2`, `-3`, ... on collision.
    pub fn create_channel(
        &mut self,
        name: &str,
        mask: Option<Mask>,
    ) -> Result<ChannelId, ChannelStoreError> {
        let mut candidate = ChannelId::new(name);
        let mut suffix = 2_usize;
        while self.channels.contains_key(&candidate) {
            candidate = ChannelId::new(format!("{name}-{suffix}"));
            suffix += 1;
        }

        self.channels.insert(
            candidate.clone(),
            StoredChannel {
                mask,
                messages: Vec::new(),
            },
        );
        self.persist(&candidate, "channel-create")?;
        Ok(candidate)
    }

    pub fn next_channel_name(&self) -> String {
        format!("{DEFAULT_CHANNEL_NAME_STEM}-{}", self.channels.len() + 1)
    }

    pub fn delete_channel(&mut self, channel: &ChannelId) -> Result<(), ChannelStoreError> {
        if self.channels.remove(channel).is_none() {
            return UnknownChannelSnafu {
                stage: "channel-delete",
                channel: channel.to_string(),
            }
            .fail();
        }

        self.state
            .remove(&channel_key(channel))
            .context(StorageSnafu {
                stage: "channel-delete-remove",
            })
    }

    pub fn append_message(
        &mut self,
        channel: &ChannelId,
        content: String,
        now: i64,
    ) -> Result<Message, ChannelStoreError> {
        let stored = self.stored_mut(channel, "channel-append")?;
        let message = Message::new(content, now);
        stored.messages.push(message.clone());
        self.persist(channel, "channel-append")?;
        Ok(message)
    }

    pub fn clear_messages(&mut self, channel: &ChannelId) -> Result<(), ChannelStoreError> {
        self.stored_mut(channel, "channel-clear")?.messages.clear();
        self.persist(channel, "channel-clear")
    }

    fn stored_mut(
        &mut self,
        channel: &ChannelId,
        stage: &'static str,
    ) -> Result<&mut StoredChannel, ChannelStoreError> {
        match self.channels.get_mut(channel) {
            Some(stored) => Ok(stored),
            None => UnknownChannelSnafu {
                stage,
                channel: channel.to_string(),
            }
            .fail(),
        }
    }

    fn persist(&self, channel: &ChannelId, stage: &'static str) -> Result<(), ChannelStoreError> {
        let Some(stored) = self.channels.get(channel) else {
            return UnknownChannelSnafu {
                stage,
                channel: channel.to_string(),
            }
            .fail();
        };

        let encoded = serde_json::to_string(stored).context(EncodeChannelSnafu {
            stage,
            channel: channel.to_string(),
        })?;
        self.state
            .set(&channel_key(channel), &encoded)
            .context(StorageSnafu { stage })
    }
}

fn channel_key(channel: &ChannelId) -> String {
    format!("{CHANNEL_KEY_PREFIX}{channel}")
}

/// Emitted after any channel or message mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelsChanged {
    pub channel: Option<ChannelId>,
}

/// Mutations the chat pane may request without holding the store itself.
pub trait ChannelActions {
    fn clear_messages(&self, channel: &ChannelId, cx: &mut App);
    fn send_message(&self, channel: &ChannelId, content: String, cx: &mut App);
}

/// UI-facing owner of the channel registry.
///
/// Load or mutation failures are kept as a fault so the error boundary can
/// surface them on the next render.
pub struct ChannelStore {
    registry: Option<ChannelRegistry>,
    fault: Option<ChannelStoreError>,
}

impl EventEmitter<ChannelsChanged> for ChannelStore {}

impl ChannelStore {
    pub fn new(state: Arc<dyn LocalStateStore>) -> Self {
        match ChannelRegistry::load(state) {
            Ok(registry) => Self {
                registry: Some(registry),
                fault: None,
            },
            Err(error) => {
                tracing::error!("failed to load channels: {error}");
                Self {
                    registry: None,
                    fault: Some(error),
                }
            }
        }
    }

    pub fn fault(&self) -> Option<&ChannelStoreError> {
        self.fault.as_ref()
    }

    pub fn summaries(&self) -> Vec<ChannelSummary> {
        self.registry
            .as_ref()
            .map(ChannelRegistry::summaries)
            .unwrap_or_default()
    }

    pub fn snapshot(&self, channel: &ChannelId) -> Option<ChannelSnapshot> {
        self.registry.as_ref()?.snapshot(channel)
    }

    pub fn create_channel(&mut self, cx: &mut Context<Self>) -> Option<ChannelId> {
        let registry = self.registry.as_mut()?;
        let name = registry.next_channel_name();
        let created = registry.create_channel(&name, None);
        let channel = self.settle(created, cx)?;
        tracing::info!("created channel {channel}");
        cx.emit(ChannelsChanged {
            channel: Some(channel.clone()),
        });
        Some(channel)
    }

    pub fn delete_channel(&mut self, channel: &ChannelId, cx: &mut Context<Self>) {
        let Some(registry) = self.registry.as_mut() else {
            return;
        };
        let deleted = registry.delete_channel(channel);
        if self.settle(deleted, cx).is_some() {
            tracing::info!("deleted channel {channel}");
            cx.emit(ChannelsChanged {
                channel: Some(channel.clone()),
            });
        }
    }

    pub fn append_message(&mut self, channel: &ChannelId, content: String, cx: &mut Context<Self>) {
        let Some(registry) = self.registry.as_mut() else {
            return;
        };
        let appended = registry.append_message(channel, content, unix_now_seconds());
        if self.settle(appended, cx).is_some() {
            cx.emit(ChannelsChanged {
                channel: Some(channel.clone()),
            });
        }
    }

    pub fn clear_messages(&mut self, channel: &ChannelId, cx: &mut Context<Self>) {
        let Some(registry) = self.registry.as_mut() else {
            return;
        };
        let cleared = registry.clear_messages(channel);
        if self.settle(cleared, cx).is_some() {
            tracing::info!("cleared messages in channel {channel}");
            cx.emit(ChannelsChanged {
                channel: Some(channel.clone()),
            });
        }
    }

    fn settle<T>(
        &mut self,
        result: Result<T, ChannelStoreError>,
        cx: &mut Context<Self>,
    ) -> Option<T> {
        match result {
            Ok(value) => {
                cx.notify();
                Some(value)
            }
            Err(error) => {
                tracing::error!("channel store mutation failed: {error}");
                self.fault = Some(error);
                cx.emit(ChannelsChanged { channel: None });
                cx.notify();
                None
            }
        }
    }
}

impl ChannelActions for Entity<ChannelStore> {
    fn clear_messages(&self, channel: &ChannelId, cx: &mut App) {
        self.update(cx, |store, cx| store.clear_messages(channel, cx));
    }

    fn send_message(&self, channel: &ChannelId, content: String, cx: &mut App) {
        self.update(cx, |store, cx| store.append_message(channel, content, cx));
    }
}

fn unix_now_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0_i64, |duration| duration.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatoor_storage::MemoryLocalState;

    fn registry_with(state: &Arc<MemoryLocalState>) -> ChannelRegistry {
        ChannelRegistry::load(state.clone()).unwrap()
    }

    #[test]
    fn messages_persist_across_reload() {
        let state = Arc::new(MemoryLocalState::new());
        let mut registry = registry_with(&state);
        let general = registry.create_channel("general", None).unwrap();
        registry
            .append_message(&general, "hello".to_string(), 100)
            .unwrap();
        registry
            .append_message(&general, "again".to_string(), 120)
            .unwrap();

        let reloaded = registry_with(&state);
        let snapshot = reloaded.snapshot(&general).unwrap();
        assert_eq!(snapshot.total_messages, 2);
        assert_eq!(snapshot.messages[1].content, "again");
        assert!(state.get("channel/general").unwrap().is_some());
    }

    #[test]
    fn clear_messages_keeps_channel_but_empties_history() {
        let state = Arc::new(MemoryLocalState::new());
        let mut registry = registry_with(&state);
        let general = registry.create_channel("general", None).unwrap();
        registry.append_message(&general, "hi".to_string(), 1).unwrap();

        registry.clear_messages(&general).unwrap();

        let snapshot = registry_with(&state).snapshot(&general).unwrap();
        assert_eq!(snapshot.total_messages, 0);
        assert!(snapshot.messages.is_empty());
    }

    #[test]
    fn summaries_order_by_latest_activity() {
        let state = Arc::new(MemoryLocalState::new());
        let mut registry = registry_with(&state);
        let quiet = registry.create_channel("quiet", None).unwrap();
        let old = registry.create_channel("old", None).unwrap();
        let busy = registry.create_channel("busy", None).unwrap();
        registry.append_message(&old, "x".to_string(), 10).unwrap();
        registry.append_message(&busy, "y".to_string(), 50).unwrap();

        let order = registry
            .summaries()
            .into_iter()
            .map(|summary| summary.channel)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![busy, old, quiet]);
    }

    #[test]
    fn colliding_names_get_numeric_suffix() {
        let state = Arc::new(MemoryLocalState::new());
        let mut registry = registry_with(&state);
        registry.create_channel("general", None).unwrap();

        let second = registry.create_channel("general", None).unwrap();
        assert_eq!(second.as_str(), "general-2");
    }

    #[test]
    fn unreadable_channel_fails_load() {
        let state = Arc::new(MemoryLocalState::with_entries([("channel/broken", "not json")]));
        let error = ChannelRegistry::load(state).err().unwrap();
        assert!(matches!(error, ChannelStoreError::DecodeChannel { .. }));
    }

    #[test]
    fn appending_to_missing_channel_is_rejected() {
        let state = Arc::new(MemoryLocalState::new());
        let mut registry = registry_with(&state);
        let error = registry
            .append_message(&ChannelId::new("ghost"), "boo".to_string(), 1)
            .unwrap_err();
        assert!(matches!(error, ChannelStoreError::UnknownChannel { .. }));
    }
}
