use std::sync::Arc;

use chrono::Local;
use gpui::*;
use gpui_component::{ActiveTheme, label::Label, v_flex};

use crate::chat::chat_item::format_activity_time;
use crate::chat::message::Message;

const MESSAGE_BUBBLE_MAX_WIDTH: Pixels = px(540.);

/// Messages of one channel, oldest first. Scrolling belongs to the enclosing pane.
#[derive(IntoElement)]
pub struct MessageList {
    messages: Arc<[Message]>,
}

impl MessageList {
    pub fn new(messages: Arc<[Message]>) -> Self {
        Self { messages }
    }
}

impl RenderOnce for MessageList {
    fn render(self, _window: &mut Window, cx: &mut App) -> impl IntoElement {
        let theme = cx.theme();

        if self.messages.is_empty() {
            return v_flex()
                .w_full()
                .py_8()
                .items_center()
                .child(
                    Label::new("No messages yet")
                        .text_sm()
                        .text_color(theme.muted_foreground),
                )
                .into_any_element();
        }

        v_flex()
            .w_full()
            .gap_3()
            .px_4()
            .py_3()
            .children(self.messages.iter().map(|message| {
                v_flex()
                    .w_full()
                    .items_end()
                    .gap_1()
                    .child(
                        div()
                            .max_w(MESSAGE_BUBBLE_MAX_WIDTH)
                            .px(px(14.))
                            .py(px(10.))
                            .rounded_lg()
                            .bg(theme.muted)
                            .text_color(theme.foreground)
                            .child(message.content.clone()),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(format_activity_time(Some(message.created_at), &Local)),
                    )
            }))
            .into_any_element()
    }
}
