use std::fmt::Display;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    tooltip::Tooltip,
    v_flex,
};

use crate::chat::message::Mask;

const ACTIVITY_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Everything a chat list row displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatItemProps {
    pub title: String,
    pub count: usize,
    pub time: String,
    pub selected: bool,
    pub narrow: bool,
    pub mask: Option<Mask>,
}

impl ChatItemProps {
    /// Message-count badge; a zero count renders no badge at all.
    pub fn badge_text(&self) -> Option<String> {
        (self.count > 0).then(|| format!("{} messages", self.count))
    }

    pub fn tooltip_text(&self) -> String {
        format!("{}\n{} messages", self.title, self.count)
    }

    /// Single glyph shown in narrow rows: the persona avatar, else the title's first character.
    pub fn compact_label(&self) -> String {
        if let Some(mask) = &self.mask
            && !mask.avatar.trim().is_empty()
        {
            return mask.avatar.clone();
        }

        self.title
            .chars()
            .next()
            .map(|first| first.to_uppercase().collect())
            .unwrap_or_default()
    }
}

/// Renders a last-activity timestamp in `tz`; empty when there has been no activity.
pub fn format_activity_time<Tz>(unix_seconds: Option<i64>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    unix_seconds
        .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
        .map(|utc| utc.with_timezone(tz).format(ACTIVITY_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Element inside a row that received a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTarget {
    Row,
    DeleteButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

pub type ItemHandler<C> = Rc<dyn Fn(&mut C)>;

/// Select/delete callbacks of one row, generic over the context they run in.
pub struct ItemHandlers<C: ?Sized> {
    on_select: Option<ItemHandler<C>>,
    on_delete: Option<ItemHandler<C>>,
}

impl<C: ?Sized> Default for ItemHandlers<C> {
    fn default() -> Self {
        Self {
            on_select: None,
            on_delete: None,
        }
    }
}

impl<C: ?Sized> ItemHandlers<C> {
    pub fn has_delete(&self) -> bool {
        self.on_delete.is_some()
    }

    /// Runs the handler for `target`. A delete click never reaches the row.
    pub fn dispatch(&self, target: ItemTarget, cx: &mut C) -> Propagation {
        match target {
            ItemTarget::Row => {
                if let Some(on_select) = &self.on_select {
                    on_select(cx);
                }
                Propagation::Continue
            }
            ItemTarget::DeleteButton => {
                if let Some(on_delete) = &self.on_delete {
                    on_delete(cx);
                }
                Propagation::Stop
            }
        }
    }
}

/// One row of the chat list.
#[derive(IntoElement)]
pub struct ChatItem {
    id: ElementId,
    props: ChatItemProps,
    revealed: bool,
    focus_handle: Option<FocusHandle>,
    handlers: ItemHandlers<App>,
    on_hover: Option<Rc<dyn Fn(bool, &mut App)>>,
}

impl ChatItem {
    pub fn new(id: impl Into<ElementId>, props: ChatItemProps) -> Self {
        Self {
            id: id.into(),
            props,
            revealed: false,
            focus_handle: None,
            handlers: ItemHandlers::default(),
            on_hover: None,
        }
    }

    /// Whether the pointer is over the row, which reveals the delete action.
    pub fn revealed(mut self, revealed: bool) -> Self {
        self.revealed = revealed;
        self
    }

    /// Makes the row a tab stop; while it holds focus the delete action is shown
    /// and Enter selects it.
    pub fn focus_handle(mut self, handle: FocusHandle) -> Self {
        self.focus_handle = Some(handle);
        self
    }

    pub fn on_select(mut self, handler: impl Fn(&mut App) + 'static) -> Self {
        self.handlers.on_select = Some(Rc::new(handler));
        self
    }

    pub fn on_delete(mut self, handler: impl Fn(&mut App) + 'static) -> Self {
        self.handlers.on_delete = Some(Rc::new(handler));
        self
    }

    pub fn on_hover(mut self, handler: impl Fn(bool, &mut App) + 'static) -> Self {
        self.on_hover = Some(Rc::new(handler));
        self
    }

    fn show_delete(&self, focused: bool) -> bool {
        self.handlers.has_delete() && (self.revealed || focused) && !self.props.narrow
    }
}

impl RenderOnce for ChatItem {
    fn render(self, window: &mut Window, cx: &mut App) -> impl IntoElement {
        let focused = self
            .focus_handle
            .as_ref()
            .is_some_and(|handle| handle.contains_focused(window, cx));
        let show_delete = self.show_delete(focused);
        let theme = cx.theme();
        let props = self.props;
        let tooltip = SharedString::from(props.tooltip_text());
        let handlers = Rc::new(self.handlers);
        let row_handlers = handlers.clone();
        let key_handlers = handlers.clone();

        let content = if props.narrow {
            div()
                .w_full()
                .flex()
                .justify_center()
                .child(Label::new(props.compact_label()).text_sm())
                .into_any_element()
        } else {
            let title = match &props.mask {
                Some(mask) => format!("{} {}", mask.avatar, props.title),
                None => props.title.clone(),
            };

            v_flex()
                .w_full()
                .min_w_0()
                .gap_1()
                .child(div().truncate().child(Label::new(title).text_sm()))
                .child(
                    h_flex()
                        .w_full()
                        .justify_between()
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .when_some(props.badge_text(), |row, badge| row.child(badge))
                        .child(div().ml_auto().child(props.time.clone())),
                )
                .into_any_element()
        };

        div()
            .id(self.id)
            .relative()
            .w_full()
            .px_3()
            .py_2()
            .rounded_md()
            .border_1()
            .cursor_pointer()
            .border_color(if props.selected {
                theme.primary
            } else {
                theme.border
            })
            .when(props.selected, |row| row.bg(theme.accent))
            .hover(|row| row.bg(theme.muted))
            .when_some(self.focus_handle, |row, handle| {
                row.track_focus(&handle)
                    .focus(|row| row.border_color(theme.ring))
                    .on_key_down(move |event: &KeyDownEvent, _window, cx| {
                        if event.keystroke.key == "enter" {
                            key_handlers.dispatch(ItemTarget::Row, cx);
                            cx.stop_propagation();
                        }
                    })
            })
            .tooltip(move |window, cx| Tooltip::new(tooltip.clone()).build(window, cx))
            .when_some(self.on_hover, |row, on_hover| {
                row.on_hover(move |hovered, _window, cx| on_hover(*hovered, cx))
            })
            .on_click(move |_, _window, cx| {
                row_handlers.dispatch(ItemTarget::Row, cx);
            })
            .child(content)
            .when(show_delete, |row| {
                row.child(
                    div().absolute().top_1().right_1().child(
                        Button::new("chat-item-delete")
                            .ghost()
                            .xsmall()
                            .icon(IconName::Delete)
                            .on_click(move |_, _window, cx| {
                                if handlers.dispatch(ItemTarget::DeleteButton, cx)
                                    == Propagation::Stop
                                {
                                    cx.stop_propagation();
                                }
                            }),
                    ),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use chrono::FixedOffset;

    use super::*;

    fn props(count: usize) -> ChatItemProps {
        ChatItemProps {
            title: "general".to_string(),
            count,
            time: String::new(),
            selected: false,
            narrow: false,
            mask: None,
        }
    }

    #[derive(Default)]
    struct Calls {
        selected: Cell<usize>,
        deleted: Cell<usize>,
    }

    fn counting_handlers() -> ItemHandlers<Calls> {
        ItemHandlers {
            on_select: Some(Rc::new(|calls: &mut Calls| {
                calls.selected.set(calls.selected.get() + 1)
            })),
            on_delete: Some(Rc::new(|calls: &mut Calls| {
                calls.deleted.set(calls.deleted.get() + 1)
            })),
        }
    }

    /// Delivers a click to `path` innermost-first, the way the element tree bubbles it.
    fn bubble_click(handlers: &ItemHandlers<Calls>, path: &[ItemTarget], calls: &mut Calls) {
        for target in path {
            if handlers.dispatch(*target, calls) == Propagation::Stop {
                break;
            }
        }
    }

    #[::core::prelude::v1::test]
    fn zero_count_renders_no_badge() {
        assert_eq!(props(0).badge_text(), None);
        assert_eq!(props(5).badge_text().as_deref(), Some("5 messages"));
    }

    #[::core::prelude::v1::test]
    fn tooltip_lists_title_and_count() {
        assert_eq!(props(0).tooltip_text(), "general\n0 messages");
    }

    #[::core::prelude::v1::test]
    fn delete_click_never_selects() {
        let handlers = counting_handlers();
        let mut calls = Calls::default();

        bubble_click(
            &handlers,
            &[ItemTarget::DeleteButton, ItemTarget::Row],
            &mut calls,
        );

        assert_eq!(calls.deleted.get(), 1);
        assert_eq!(calls.selected.get(), 0);
    }

    #[::core::prelude::v1::test]
    fn row_click_selects() {
        let handlers = counting_handlers();
        let mut calls = Calls::default();

        bubble_click(&handlers, &[ItemTarget::Row], &mut calls);

        assert_eq!(calls.selected.get(), 1);
        assert_eq!(calls.deleted.get(), 0);
    }

    #[::core::prelude::v1::test]
    fn delete_action_shows_on_hover_or_focus() {
        let item = || ChatItem::new("row", props(3)).on_delete(|_| {});

        assert!(!item().show_delete(false));
        assert!(item().revealed(true).show_delete(false));
        assert!(item().show_delete(true));

        let mut narrow = props(3);
        narrow.narrow = true;
        let narrow_item = ChatItem::new("row", narrow).on_delete(|_| {});
        assert!(!narrow_item.show_delete(true));

        assert!(!ChatItem::new("row", props(3)).show_delete(true));
    }

    #[::core::prelude::v1::test]
    fn compact_label_prefers_mask_avatar() {
        let mut with_mask = props(1);
        with_mask.mask = Some(Mask {
            name: "Helper".to_string(),
            avatar: "🤖".to_string(),
        });
        assert_eq!(with_mask.compact_label(), "🤖");
        assert_eq!(props(1).compact_label(), "G");
    }

    #[::core::prelude::v1::test]
    fn activity_time_formats_in_given_zone() {
        let utc_plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(
            format_activity_time(Some(0), &utc_plus_two),
            "1970/01/01 02:00:00"
        );
        assert_eq!(format_activity_time(None, &utc_plus_two), "");
    }
}
