use std::collections::HashMap;

use chrono::Local;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use crate::chat::channel_store::ChannelSummary;
use crate::chat::chat_item::{ChatItem, ChatItemProps, format_activity_time};
use crate::chat::events::{ChannelDeleteRequested, ChannelSelected, NewChannelRequested};
use crate::chat::message::ChannelId;

/// Channel list shown beside (or, on narrow viewports, instead of) the chat pane.
pub struct ChatList {
    search_input: Entity<InputState>,
    search_query: String,
    channels: Vec<ChannelSummary>,
    selected_channel: Option<ChannelId>,
    hovered_channel: Option<ChannelId>,
    row_focus: HashMap<ChannelId, FocusHandle>,
    narrow: bool,
    scroll_handle: ScrollHandle,
}

impl EventEmitter<ChannelSelected> for ChatList {}
impl EventEmitter<ChannelDeleteRequested> for ChatList {}
impl EventEmitter<NewChannelRequested> for ChatList {}

impl ChatList {
    pub fn new(channels: Vec<ChannelSummary>, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let search_input = cx.new(|cx| InputState::new(window, cx).placeholder("Search channels..."));

        cx.subscribe_in(
            &search_input,
            window,
            |this, _, _event: &InputEvent, _window, cx| {
                this.search_query = this.search_input.read(cx).value().to_string();
                cx.notify();
            },
        )
        .detach();

        Self {
            search_input,
            search_query: String::new(),
            channels,
            selected_channel: None,
            hovered_channel: None,
            row_focus: HashMap::new(),
            narrow: false,
            scroll_handle: ScrollHandle::new(),
        }
    }

    pub fn set_channels(&mut self, channels: Vec<ChannelSummary>, cx: &mut Context<Self>) {
        if self.selected_channel.as_ref().is_some_and(|selected| {
            !channels.iter().any(|summary| &summary.channel == selected)
        }) {
            self.selected_channel = None;
        }
        self.row_focus
            .retain(|channel, _| channels.iter().any(|summary| &summary.channel == channel));
        self.channels = channels;
        cx.notify();
    }

    pub fn set_narrow(&mut self, narrow: bool, cx: &mut Context<Self>) {
        if self.narrow != narrow {
            self.narrow = narrow;
            cx.notify();
        }
    }

    pub fn select_channel(&mut self, channel: ChannelId, cx: &mut Context<Self>) {
        self.selected_channel = Some(channel.clone());
        cx.emit(ChannelSelected { channel });
        cx.notify();
    }

    fn set_hovered(&mut self, channel: &ChannelId, hovered: bool, cx: &mut Context<Self>) {
        let next = if hovered {
            Some(channel.clone())
        } else if self.hovered_channel.as_ref() == Some(channel) {
            None
        } else {
            return;
        };

        if self.hovered_channel != next {
            self.hovered_channel = next;
            cx.notify();
        }
    }

    fn render_toolbar(&mut self, cx: &mut Context<Self>) -> impl IntoElement {
        h_flex()
            .w_full()
            .min_w_0()
            .gap_2()
            .px_3()
            .pt(px(8.))
            .pb_2()
            .child(Input::new(&self.search_input).w_full().small())
            .child(
                Button::new("new-channel")
                    .small()
                    .primary()
                    .icon(IconName::Plus)
                    .child("New")
                    .on_click(cx.listener(|_, _, _window, cx| {
                        cx.emit(NewChannelRequested);
                    })),
            )
    }

    fn render_empty_state(&self, cx: &mut Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let message = if self.channels.is_empty() {
            "No channels yet"
        } else {
            "No channels match your search"
        };

        v_flex()
            .flex_1()
            .items_center()
            .justify_center()
            .px_4()
            .child(
                Label::new(message)
                    .text_sm()
                    .text_color(theme.foreground.opacity(0.55)),
            )
            .into_any_element()
    }

    fn row_focus_handle(&mut self, channel: &ChannelId, cx: &mut Context<Self>) -> FocusHandle {
        self.row_focus
            .entry(channel.clone())
            .or_insert_with(|| cx.focus_handle().tab_stop(true))
            .clone()
    }

    fn render_rows(&mut self, cx: &mut Context<Self>) -> AnyElement {
        let query = self.search_query.trim().to_ascii_lowercase();
        let visible = self
            .channels
            .iter()
            .filter(|summary| matches_query(summary, &query))
            .cloned()
            .collect::<Vec<_>>();

        if visible.is_empty() {
            return self.render_empty_state(cx);
        }

        let mut rows = Vec::with_capacity(visible.len());
        for (index, summary) in visible.into_iter().enumerate() {
            let channel = summary.channel.clone();
            let focus_handle = self.row_focus_handle(&channel, cx);
            let props = ChatItemProps {
                title: channel.to_string(),
                count: summary.total_messages,
                time: format_activity_time(summary.last_activity, &Local),
                selected: self.selected_channel.as_ref() == Some(&channel),
                narrow: self.narrow,
                mask: summary.mask.clone(),
            };
            let revealed = self.hovered_channel.as_ref() == Some(&channel);
            let list = cx.entity().downgrade();
            let select_list = list.clone();
            let hover_list = list.clone();
            let select_channel = channel.clone();
            let hover_channel = channel.clone();

            let row = ChatItem::new(("chat-item", index), props)
                .revealed(revealed)
                .focus_handle(focus_handle)
                .on_select(move |cx| {
                    let channel = select_channel.clone();
                    let _ = select_list.update(cx, |this, cx| this.select_channel(channel, cx));
                })
                .on_delete(move |cx| {
                    let channel = channel.clone();
                    let _ = list.update(cx, |_, cx| cx.emit(ChannelDeleteRequested { channel }));
                })
                .on_hover(move |hovered, cx| {
                    let _ = hover_list
                        .update(cx, |this, cx| this.set_hovered(&hover_channel, hovered, cx));
                });
            rows.push(row);
        }

        v_flex()
            .id("chat-list-rows")
            .flex_1()
            .min_h_0()
            .gap_1()
            .px_2()
            .overflow_y_scroll()
            .track_scroll(&self.scroll_handle)
            .children(rows)
            .into_any_element()
    }
}

impl Render for ChatList {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme().clone();
        let narrow = self.narrow;

        v_flex()
            .size_full()
            .min_w_0()
            .overflow_hidden()
            .bg(theme.background)
            .when(!narrow, |list| list.child(self.render_toolbar(cx)))
            .child(self.render_rows(cx))
    }
}

fn matches_query(summary: &ChannelSummary, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    summary
        .channel
        .as_str()
        .to_ascii_lowercase()
        .contains(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(name: &str) -> ChannelSummary {
        ChannelSummary {
            channel: ChannelId::new(name),
            total_messages: 0,
            last_activity: None,
            mask: None,
        }
    }

    #[::core::prelude::v1::test]
    fn empty_query_matches_everything() {
        assert!(matches_query(&summary("General"), ""));
    }

    #[::core::prelude::v1::test]
    fn query_matches_case_insensitively() {
        assert!(matches_query(&summary("Release-Notes"), "notes"));
        assert!(!matches_query(&summary("random"), "notes"));
    }
}
