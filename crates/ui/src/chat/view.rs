use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::app::is_mobile_viewport;
use crate::chat::channel_store::{ChannelActions, ChannelSnapshot};
use crate::chat::debounce::Debouncer;
use crate::chat::events::{BackToChannelList, Submit};
use crate::chat::message_input::MessageInput;
use crate::chat::message_list::MessageList;
use crate::chat::scroll_manager::{ScrollManager, ScrollProbe};
use crate::settings::{AppConfig, ConfigActions};

pub const SCROLL_DEBOUNCE_MS: u64 = 100;
/// Space kept under the last message so the floating tray never covers it.
const ACTION_TRAY_CLEARANCE: f32 = 40.0;

/// How a snapshot refresh changed the rendered message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentChange {
    Unchanged,
    Grew,
    Changed,
}

impl ContentChange {
    fn between(previous: &ChannelSnapshot, next: &ChannelSnapshot) -> Self {
        if next.total_messages > previous.total_messages {
            Self::Grew
        } else if next.total_messages != previous.total_messages
            || next.messages[..] != previous.messages[..]
        {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }

    /// Any layout change can move the bottom edge, so the flags are re-derived.
    fn needs_resample(self) -> bool {
        self != Self::Unchanged
    }
}

/// Chat pane of one channel: header, message list, action tray and input.
pub struct ChannelChat {
    snapshot: ChannelSnapshot,
    config: Arc<AppConfig>,
    channel_actions: Rc<dyn ChannelActions>,
    config_actions: Rc<dyn ConfigActions>,
    message_input: Entity<MessageInput>,
    scroll: ScrollManager,
    scroll_debounce: Debouncer<ScrollProbe>,
    scroll_debounce_task: Option<Task<()>>,
    resample_after_layout: bool,
}

impl EventEmitter<BackToChannelList> for ChannelChat {}

impl ChannelChat {
    pub fn new(
        snapshot: ChannelSnapshot,
        config: Arc<AppConfig>,
        channel_actions: Rc<dyn ChannelActions>,
        config_actions: Rc<dyn ConfigActions>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let channel = snapshot.channel.clone();
        let message_input = cx.new(|cx| MessageInput::new(channel, window, cx));

        cx.subscribe(&message_input, |this, _, event: &Submit, cx| {
            this.channel_actions
                .send_message(&event.channel, event.content.clone(), cx);
        })
        .detach();

        Self {
            snapshot,
            config,
            channel_actions,
            config_actions,
            message_input,
            scroll: ScrollManager::new(),
            scroll_debounce: Debouncer::new(Duration::from_millis(SCROLL_DEBOUNCE_MS)),
            scroll_debounce_task: None,
            resample_after_layout: false,
        }
    }

    pub fn snapshot(&self) -> &ChannelSnapshot {
        &self.snapshot
    }

    pub fn set_snapshot(&mut self, snapshot: ChannelSnapshot, cx: &mut Context<Self>) {
        let change = ContentChange::between(&self.snapshot, &snapshot);
        self.snapshot = snapshot;
        if change == ContentChange::Grew {
            self.scroll.follow_new_content();
        }
        if change.needs_resample() {
            self.resample_after_layout = true;
        }
        cx.notify();
    }

    pub fn set_config(&mut self, config: Arc<AppConfig>, cx: &mut Context<Self>) {
        self.config = config;
        cx.notify();
    }

    fn on_chat_body_scroll(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let probe = ScrollProbe {
            sample: self.scroll.sample(),
            is_mobile: is_mobile_viewport(window),
        };

        if let Some(probe) = self.scroll_debounce.call(probe, Instant::now()) {
            self.apply_scroll_probe(probe, cx);
        }
        self.schedule_trailing_scroll_sample(cx);
    }

    fn schedule_trailing_scroll_sample(&mut self, cx: &mut Context<Self>) {
        let Some(deadline) = self.scroll_debounce.deadline() else {
            self.scroll_debounce_task = None;
            return;
        };
        let delay = deadline.saturating_duration_since(Instant::now());

        self.scroll_debounce_task = Some(cx.spawn(async move |this, cx| {
            cx.background_executor().timer(delay).await;
            let _ = this.update(cx, |this, cx| {
                this.scroll_debounce_task = None;
                match this.scroll_debounce.poll(Instant::now()) {
                    Some(probe) => this.apply_scroll_probe(probe, cx),
                    None if this.scroll_debounce.deadline().is_some() => {
                        this.schedule_trailing_scroll_sample(cx)
                    }
                    None => {}
                }
            });
        }));
    }

    fn apply_scroll_probe(&mut self, probe: ScrollProbe, cx: &mut Context<Self>) {
        let was_at_bottom = self.scroll.hit_bottom();
        let hit_bottom = self.scroll.apply_probe(probe);
        if was_at_bottom != hit_bottom {
            tracing::debug!(
                channel = %self.snapshot.channel,
                hit_bottom,
                "chat scroll position changed"
            );
            cx.notify();
        }
    }

    fn scroll_to_latest(&mut self, cx: &mut Context<Self>) {
        // A buffered wheel sample predates the jump and must not undo it.
        self.scroll_debounce.cancel();
        self.scroll_debounce_task = None;
        self.scroll.scroll_to_bottom();
        self.scroll.set_auto_scroll(true);
        self.resample_after_layout = true;
        cx.notify();
    }

    fn clear_context(&mut self) {
        tracing::debug!(channel = %self.snapshot.channel, "clear context requested");
    }

    fn toggle_tight_border(&mut self, cx: &mut Context<Self>) {
        self.config_actions.update_config(
            &|config: &mut AppConfig| config.tight_border = !config.tight_border,
            cx,
        );
    }

    fn render_header(&self, is_mobile: bool, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let tight_border_icon = if self.config.tight_border {
            IconName::Minimize
        } else {
            IconName::Maximize
        };

        h_flex()
            .id("chat-header")
            .w_full()
            .flex_shrink_0()
            .items_center()
            .gap_2()
            .px_4()
            .py_2()
            .border_b_1()
            .border_color(theme.border)
            .when(is_mobile, |header| {
                header.child(
                    Button::new("chat-back")
                        .ghost()
                        .small()
                        .icon(IconName::ArrowLeft)
                        .tooltip("Back to channels")
                        .on_click(cx.listener(|_, _, _window, cx| {
                            cx.emit(BackToChannelList);
                        })),
                )
            })
            .child(
                v_flex()
                    .flex_1()
                    .min_w_0()
                    .child(
                        div()
                            .truncate()
                            .child(Label::new(self.snapshot.channel.to_string())),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(format!("{} messages", self.snapshot.total_messages)),
                    ),
            )
            .child(
                Button::new("chat-clear-messages")
                    .ghost()
                    .small()
                    .icon(IconName::Delete)
                    .tooltip("Clear messages")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        let channel = this.snapshot.channel.clone();
                        this.channel_actions.clear_messages(&channel, cx);
                    })),
            )
            .when(!is_mobile, |header| {
                header.child(
                    Button::new("chat-tight-border")
                        .ghost()
                        .small()
                        .icon(tight_border_icon)
                        .tooltip("Toggle tight border")
                        .on_click(cx.listener(|this, _, _window, cx| {
                            this.toggle_tight_border(cx);
                        })),
                )
            })
    }

    fn render_action_tray(&self, cx: &Context<Self>) -> impl IntoElement {
        let at_bottom = self.scroll.hit_bottom();

        h_flex()
            .id("chat-actions")
            .absolute()
            .left(px(16.))
            .bottom(px(8.))
            .gap_2()
            .when(!at_bottom, |tray| {
                tray.child(
                    Button::new("chat-to-latest")
                        .outline()
                        .xsmall()
                        .icon(IconName::ArrowDown)
                        .child("To Latest")
                        .on_click(cx.listener(|this, _, _window, cx| {
                            this.scroll_to_latest(cx);
                        })),
                )
            })
            .child(
                Button::new("chat-clear-context")
                    .outline()
                    .xsmall()
                    .icon(IconName::Close)
                    .child("Clear context")
                    .on_click(cx.listener(|this, _, _window, _cx| {
                        this.clear_context();
                    })),
            )
    }
}

impl Render for ChannelChat {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let is_mobile = is_mobile_viewport(window);
        self.scroll.apply_pending_scroll();
        if std::mem::take(&mut self.resample_after_layout) {
            // Programmatic scrolls emit no wheel events; sample once the new layout exists.
            cx.on_next_frame(window, |this, window, cx| {
                this.on_chat_body_scroll(window, cx);
            });
        }

        let theme = cx.theme();

        v_flex()
            .id("channel-chat")
            .size_full()
            .min_h_0()
            .bg(theme.background)
            .child(self.render_header(is_mobile, cx))
            .child(
                div()
                    .relative()
                    .flex_1()
                    .min_h_0()
                    .child(
                        div()
                            .id("chat-body")
                            .size_full()
                            .pb(px(ACTION_TRAY_CLEARANCE))
                            .overflow_y_scroll()
                            .track_scroll(self.scroll.handle())
                            .on_scroll_wheel(cx.listener(
                                |_, _: &ScrollWheelEvent, window, cx| {
                                    // The container applies the wheel delta in this same dispatch.
                                    cx.defer_in(window, |this, window, cx| {
                                        this.on_chat_body_scroll(window, cx);
                                    });
                                },
                            ))
                            .child(MessageList::new(self.snapshot.messages.clone())),
                    )
                    .child(self.render_action_tray(cx)),
            )
            .child(self.message_input.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::{ChannelId, Message};

    fn snapshot(messages: Vec<Message>) -> ChannelSnapshot {
        ChannelSnapshot {
            channel: ChannelId::new("general"),
            total_messages: messages.len(),
            messages: messages.into(),
        }
    }

    #[::core::prelude::v1::test]
    fn appended_message_follows_and_resamples() {
        let first = Message::new("hello", 1);
        let before = snapshot(vec![first.clone()]);
        let after = snapshot(vec![first, Message::new("again", 2)]);

        let change = ContentChange::between(&before, &after);
        assert_eq!(change, ContentChange::Grew);
        assert!(change.needs_resample());
    }

    #[::core::prelude::v1::test]
    fn clearing_messages_resamples_without_following() {
        let before = snapshot(vec![Message::new("a", 1), Message::new("b", 2)]);
        let after = snapshot(Vec::new());

        let change = ContentChange::between(&before, &after);
        assert_eq!(change, ContentChange::Changed);
        assert!(change.needs_resample());
    }

    #[::core::prelude::v1::test]
    fn edited_content_with_same_count_resamples() {
        let original = Message::new("short", 1);
        let mut edited = original.clone();
        edited.content = "a much longer body that wraps onto several lines".to_string();

        let change = ContentChange::between(&snapshot(vec![original]), &snapshot(vec![edited]));
        assert_eq!(change, ContentChange::Changed);
        assert!(change.needs_resample());
    }

    #[::core::prelude::v1::test]
    fn identical_snapshot_leaves_scroll_state_alone() {
        let messages = vec![Message::new("a", 1)];
        let change = ContentChange::between(&snapshot(messages.clone()), &snapshot(messages));
        assert_eq!(change, ContentChange::Unchanged);
        assert!(!change.needs_resample());
    }
}
