use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

use chatoor_storage::LocalStateStore;
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable, ThemeMode,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

use crate::chat::{
    BackToChannelList, ChannelActions, ChannelChat, ChannelDeleteRequested, ChannelId,
    ChannelSelected, ChannelStore, ChannelsChanged, ChatList, NewChannelRequested,
};
use crate::error_boundary::{ErrorBoundary, FallibleRender, RenderFault, ResetCompleted};
use crate::settings::{AppConfig, ConfigActions, SettingsChanged, SettingsState};

/// Returns the default themes directory path.
pub fn default_themes_path() -> PathBuf {
    PathBuf::from("./themes")
}

/// Viewports at most this wide are treated as mobile.
pub const MOBILE_MAX_WIDTH: f32 = 600.0;
pub const SIDEBAR_DEFAULT_WIDTH: f32 = 280.0;
pub const SIDEBAR_MIN_WIDTH: f32 = 200.0;
pub const SIDEBAR_MAX_WIDTH: f32 = 420.0;
pub const SIDEBAR_COLLAPSED_WIDTH: f32 = 64.0;
#[cfg(target_os = "macos")]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 78.0;
#[cfg(not(target_os = "macos"))]
const WINDOW_TOOLBAR_LEFT_SAFE_PADDING: f32 = 16.0;
#[cfg(target_os = "windows")]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 120.0;
#[cfg(not(target_os = "windows"))]
const WINDOW_TOOLBAR_RIGHT_SAFE_PADDING: f32 = 16.0;
const _: () = {
    assert!(SIDEBAR_COLLAPSED_WIDTH > 0.0);
    assert!(SIDEBAR_MIN_WIDTH < SIDEBAR_DEFAULT_WIDTH);
    assert!(SIDEBAR_DEFAULT_WIDTH < SIDEBAR_MAX_WIDTH);
    assert!(SIDEBAR_MIN_WIDTH > 0.0);
};

pub fn is_mobile_width(width: f32) -> bool {
    width <= MOBILE_MAX_WIDTH
}

pub fn is_mobile_viewport(window: &Window) -> bool {
    is_mobile_width(f32::from(window.viewport_size().width))
}

/// Clamps a drag position to the allowed sidebar width range.
pub fn compute_sidebar_width(drag_x: f32) -> f32 {
    drag_x.clamp(SIDEBAR_MIN_WIDTH, SIDEBAR_MAX_WIDTH)
}

fn window_toolbar_height(window: &Window) -> Pixels {
    (1.75 * window.rem_size()).max(px(34.0))
}

gpui::actions!(shell, [NewChannel, ToggleSidebar, Quit]);

/// Drag payload of the sidebar edge; it is also its own (invisible) drag preview.
#[derive(Clone, Copy)]
struct SidebarResizeDrag;

impl Render for SidebarResizeDrag {
    fn render(&mut self, _: &mut Window, _: &mut Context<Self>) -> impl IntoElement {
        div()
    }
}

/// Caption buttons drawn by the app when the window is client-decorated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptionButton {
    Minimize,
    Maximize,
    Close,
}

impl CaptionButton {
    const ALL: [Self; 3] = [Self::Minimize, Self::Maximize, Self::Close];

    fn id(self) -> &'static str {
        match self {
            Self::Minimize => "caption-minimize",
            Self::Maximize => "caption-maximize",
            Self::Close => "caption-close",
        }
    }

    fn icon(self, maximized: bool) -> IconName {
        match self {
            Self::Minimize => IconName::WindowMinimize,
            Self::Maximize if maximized => IconName::WindowRestore,
            Self::Maximize => IconName::WindowMaximize,
            Self::Close => IconName::WindowClose,
        }
    }

    fn press(self, window: &mut Window) {
        match self {
            Self::Minimize => window.minimize_window(),
            Self::Maximize => window.zoom_window(),
            Self::Close => window.remove_window(),
        }
    }
}

/// Chat list plus the open channel's pane.
///
/// Wide viewports show both side by side; mobile viewports show one at a time
/// and navigate back from the pane to the list.
pub struct ChatAppShell {
    channel_store: Entity<ChannelStore>,
    settings: Entity<SettingsState>,
    chat_list: Entity<ChatList>,
    chat: Option<Entity<ChannelChat>>,
    showing_chat_on_mobile: bool,
    sidebar_collapsed: bool,
    sidebar_width: f32,
    title_bar_should_move: bool,
}

impl ChatAppShell {
    pub fn new(
        channel_store: Entity<ChannelStore>,
        settings: Entity<SettingsState>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let channels = channel_store.read(cx).summaries();
        let chat_list = cx.new(|cx| ChatList::new(channels, window, cx));

        cx.subscribe_in(
            &chat_list,
            window,
            |this, _, event: &ChannelSelected, window, cx| {
                this.open_channel(event.channel.clone(), window, cx);
            },
        )
        .detach();
        cx.subscribe(&chat_list, |this, _, event: &ChannelDeleteRequested, cx| {
            this.channel_store
                .update(cx, |store, cx| store.delete_channel(&event.channel, cx));
        })
        .detach();
        cx.subscribe(&chat_list, |this, _, _: &NewChannelRequested, cx| {
            this.new_channel(cx);
        })
        .detach();
        cx.subscribe(&channel_store, |this, _, _: &ChannelsChanged, cx| {
            this.sync_channels(cx);
        })
        .detach();
        cx.subscribe_in(
            &settings,
            window,
            |this, _, event: &SettingsChanged, window, cx| {
                event.config.apply_theme(Some(window), cx);
                if let Some(chat) = &this.chat {
                    chat.update(cx, |chat, cx| chat.set_config(event.config.clone(), cx));
                }
                cx.notify();
            },
        )
        .detach();

        Self {
            channel_store,
            settings,
            chat_list,
            chat: None,
            showing_chat_on_mobile: false,
            sidebar_collapsed: false,
            sidebar_width: SIDEBAR_DEFAULT_WIDTH,
            title_bar_should_move: false,
        }
    }

    fn open_channel(&mut self, channel: ChannelId, window: &mut Window, cx: &mut Context<Self>) {
        let already_open = self
            .chat
            .as_ref()
            .is_some_and(|chat| chat.read(cx).snapshot().channel == channel);
        if already_open {
            self.showing_chat_on_mobile = true;
            cx.notify();
            return;
        }

        let Some(snapshot) = self.channel_store.read(cx).snapshot(&channel) else {
            tracing::warn!("cannot open unknown channel {channel}");
            return;
        };
        let config = self.settings.read(cx).config();
        let channel_actions: Rc<dyn ChannelActions> = Rc::new(self.channel_store.clone());
        let config_actions: Rc<dyn ConfigActions> = Rc::new(self.settings.clone());

        let chat = cx.new(|cx| {
            ChannelChat::new(
                snapshot,
                config,
                channel_actions,
                config_actions,
                window,
                cx,
            )
        });
        cx.subscribe(&chat, |this, _, _: &BackToChannelList, cx| {
            this.showing_chat_on_mobile = false;
            cx.notify();
        })
        .detach();

        tracing::debug!("opened channel {channel}");
        self.chat = Some(chat);
        self.showing_chat_on_mobile = true;
        cx.notify();
    }

    fn new_channel(&mut self, cx: &mut Context<Self>) {
        let created = self
            .channel_store
            .update(cx, |store, cx| store.create_channel(cx));
        if let Some(channel) = created {
            self.chat_list
                .update(cx, |list, cx| list.select_channel(channel, cx));
        }
    }

    fn sync_channels(&mut self, cx: &mut Context<Self>) {
        let (channels, open_snapshot) = {
            let store = self.channel_store.read(cx);
            let open_snapshot = self
                .chat
                .as_ref()
                .map(|chat| store.snapshot(&chat.read(cx).snapshot().channel));
            (store.summaries(), open_snapshot)
        };

        self.chat_list
            .update(cx, |list, cx| list.set_channels(channels, cx));

        match open_snapshot {
            Some(Some(snapshot)) => {
                if let Some(chat) = &self.chat {
                    chat.update(cx, |chat, cx| chat.set_snapshot(snapshot, cx));
                }
            }
            Some(None) => {
                self.chat = None;
                self.showing_chat_on_mobile = false;
            }
            None => {}
        }
        cx.notify();
    }

    fn toggle_sidebar(&mut self, cx: &mut Context<Self>) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        cx.notify();
    }

    fn resize_sidebar(&mut self, new_width: f32, cx: &mut Context<Self>) {
        self.sidebar_width = compute_sidebar_width(new_width);
        cx.notify();
    }

    fn toggle_theme_mode(&mut self, cx: &mut Context<Self>) {
        self.settings.update_config(
            &|config: &mut AppConfig| {
                config.theme_name.clear();
                config.theme_mode = if config.theme_mode.is_dark() {
                    ThemeMode::Light
                } else {
                    ThemeMode::Dark
                };
            },
            cx,
        );
    }

    fn render_shell(&mut self, window: &mut Window, cx: &mut Context<Self>) -> AnyElement {
        let is_mobile = is_mobile_viewport(window);
        let tight_border = is_mobile || self.settings.read(cx).config().tight_border;
        let narrow_list = self.sidebar_collapsed && !is_mobile;
        self.chat_list
            .update(cx, |list, cx| list.set_narrow(narrow_list, cx));

        let toolbar_height = window_toolbar_height(window);
        let theme = cx.theme();

        let body = if is_mobile {
            let content = match (&self.chat, self.showing_chat_on_mobile) {
                (Some(chat), true) => chat.clone().into_any_element(),
                _ => self.chat_list.clone().into_any_element(),
            };
            div()
                .id("mobile-content")
                .flex_1()
                .min_h_0()
                .overflow_hidden()
                .child(content)
                .into_any_element()
        } else {
            h_flex()
                .id("app-shell-body")
                .flex_1()
                .min_w_0()
                .min_h_0()
                .overflow_hidden()
                .child(self.render_sidebar(cx))
                .when(!self.sidebar_collapsed, |body| {
                    body.child(self.render_resize_handle(cx))
                })
                .child(
                    v_flex()
                        .id("main-content")
                        .flex_1()
                        .h_full()
                        .min_w_0()
                        .min_h_0()
                        .overflow_hidden()
                        .child(self.render_main_content(cx)),
                )
                .into_any_element()
        };

        div()
            .id("app-shell")
            .size_full()
            .bg(theme.background)
            .pt(toolbar_height)
            .on_action(cx.listener(|this, _: &NewChannel, _window, cx| {
                this.new_channel(cx);
            }))
            .on_action(cx.listener(|this, _: &ToggleSidebar, _window, cx| {
                this.toggle_sidebar(cx);
            }))
            .child(
                v_flex()
                    .id("app-window-frame")
                    .size_full()
                    .when(!tight_border, |frame| frame.p_4())
                    .child(
                        v_flex()
                            .id("app-container")
                            .size_full()
                            .overflow_hidden()
                            .when(!tight_border, |container| {
                                container
                                    .rounded_lg()
                                    .border_1()
                                    .border_color(theme.border)
                                    .shadow_md()
                            })
                            .child(body),
                    ),
            )
            .child(
                div()
                    .absolute()
                    .top_0()
                    .left_0()
                    .right_0()
                    .child(self.render_top_bar(window, toolbar_height, is_mobile, cx)),
            )
            .into_any_element()
    }

    fn render_main_content(&self, cx: &Context<Self>) -> AnyElement {
        if let Some(chat) = &self.chat {
            return chat.clone().into_any_element();
        }

        let theme = cx.theme();
        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .gap_2()
            .child(
                Label::new("Select a channel or start a new one")
                    .text_sm()
                    .text_color(theme.muted_foreground),
            )
            .child(
                Button::new("empty-new-channel")
                    .small()
                    .primary()
                    .icon(IconName::Plus)
                    .child("New Channel")
                    .on_click(cx.listener(|this, _, _window, cx| {
                        this.new_channel(cx);
                    })),
            )
            .into_any_element()
    }

    fn render_top_bar(
        &self,
        window: &Window,
        toolbar_height: Pixels,
        is_mobile: bool,
        cx: &Context<Self>,
    ) -> impl IntoElement {
        let theme = cx.theme();
        let sidebar_toggle_icon = if self.sidebar_collapsed {
            IconName::PanelLeftOpen
        } else {
            IconName::PanelLeftClose
        };
        let theme_mode_icon = if theme.mode.is_dark() {
            IconName::Sun
        } else {
            IconName::Moon
        };

        h_flex()
            .id("app-top-bar")
            .window_control_area(WindowControlArea::Drag)
            .on_mouse_down_out(cx.listener(|this, _, _window, _cx| {
                this.title_bar_should_move = false;
            }))
            .on_mouse_up(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = false;
                }),
            )
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, _, _window, _cx| {
                    this.title_bar_should_move = true;
                }),
            )
            .on_mouse_move(cx.listener(|this, _, window, _cx| {
                if this.title_bar_should_move {
                    this.title_bar_should_move = false;
                    window.start_window_move();
                }
            }))
            .w_full()
            .h(toolbar_height)
            .flex_shrink_0()
            .pl(px(WINDOW_TOOLBAR_LEFT_SAFE_PADDING))
            .pr(px(WINDOW_TOOLBAR_RIGHT_SAFE_PADDING))
            .items_center()
            .justify_between()
            .bg(theme.background)
            .border_b_1()
            .border_color(theme.border)
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .when(!is_mobile, |bar| {
                        bar.child(
                            Button::new("sidebar-toggle")
                                .ghost()
                                .small()
                                .icon(sidebar_toggle_icon)
                                .on_click(cx.listener(|this, _, _window, cx| {
                                    this.toggle_sidebar(cx);
                                })),
                        )
                    })
                    .child(Label::new("Chatoor").text_sm()),
            )
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(
                        Button::new("theme-mode-toggle")
                            .ghost()
                            .small()
                            .icon(theme_mode_icon)
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.toggle_theme_mode(cx);
                            })),
                    )
                    .children(self.render_caption_buttons(window)),
            )
            .when(
                cfg!(target_os = "linux") && window.window_controls().window_menu,
                |title_bar| {
                    title_bar.on_mouse_down(MouseButton::Right, |event, window, _| {
                        window.show_window_menu(event.position);
                    })
                },
            )
    }

    fn render_caption_buttons(&self, window: &Window) -> Option<impl IntoElement> {
        if !matches!(window.window_decorations(), Decorations::Client { .. }) {
            return None;
        }
        let maximized = window.is_maximized();

        let buttons = CaptionButton::ALL.into_iter().map(move |button| {
            Button::new(button.id())
                .ghost()
                .small()
                .icon(button.icon(maximized))
                .on_click(move |_, window, _| button.press(window))
        });

        Some(
            h_flex()
                .id("caption-buttons")
                .items_center()
                .gap_2()
                .ml_2()
                // Clicks here must not start a window move from the title bar.
                .on_mouse_down(MouseButton::Left, |_, _, cx| cx.stop_propagation())
                .on_mouse_down(MouseButton::Right, |_, _, cx| cx.stop_propagation())
                .children(buttons),
        )
    }

    fn render_sidebar(&self, cx: &Context<Self>) -> impl IntoElement {
        let sidebar_width = if self.sidebar_collapsed {
            SIDEBAR_COLLAPSED_WIDTH
        } else {
            self.sidebar_width
        };
        let theme = cx.theme();

        div()
            .id("sidebar-container")
            .h_full()
            .min_w_0()
            .flex_shrink_0()
            .w(px(sidebar_width))
            .overflow_hidden()
            .bg(theme.background)
            .border_r_1()
            .border_color(theme.border)
            .child(self.chat_list.clone())
    }

    fn render_resize_handle(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        div()
            .id("sidebar-resize-handle")
            .w(px(1.0))
            .h_full()
            .flex_shrink_0()
            .cursor(CursorStyle::ResizeLeftRight)
            .bg(theme.border)
            .hover(|el| el.bg(theme.primary))
            .on_mouse_down(
                MouseButton::Left,
                cx.listener(|this, event: &MouseDownEvent, _window, cx| {
                    if event.click_count >= 2 {
                        this.resize_sidebar(SIDEBAR_DEFAULT_WIDTH, cx);
                    }
                }),
            )
            .on_drag(SidebarResizeDrag, |drag, _, _, cx| cx.new(|_| *drag))
            .on_drag_move::<SidebarResizeDrag>(cx.listener(
                |this, event: &DragMoveEvent<SidebarResizeDrag>, _window, cx| {
                    this.resize_sidebar(event.event.position.x.into(), cx);
                },
            ))
    }
}

impl FallibleRender for ChatAppShell {
    fn try_render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Result<AnyElement, RenderFault> {
        if let Some(error) = self.channel_store.read(cx).fault() {
            return Err(RenderFault::new(error.to_string())
                .within("ChannelStore")
                .within("ChatAppShell"));
        }

        Ok(self.render_shell(window, cx))
    }
}

/// Owns the error boundary and rebuilds everything beneath it after a reset.
pub struct AppRoot {
    local_state: Arc<dyn LocalStateStore>,
    boundary: Entity<ErrorBoundary<ChatAppShell>>,
    _boundary_subscription: Subscription,
}

impl AppRoot {
    pub fn new(
        local_state: Arc<dyn LocalStateStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let (boundary, subscription) = Self::mount(&local_state, window, cx);
        Self {
            local_state,
            boundary,
            _boundary_subscription: subscription,
        }
    }

    fn mount(
        local_state: &Arc<dyn LocalStateStore>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> (Entity<ErrorBoundary<ChatAppShell>>, Subscription) {
        let settings = cx.new(|_| SettingsState::new(local_state.clone()));
        let config = settings.read(cx).config();
        config.apply_theme(Some(window), cx);

        let channel_store = cx.new(|_| ChannelStore::new(local_state.clone()));
        let shell = {
            let settings = settings.clone();
            cx.new(|cx| ChatAppShell::new(channel_store, settings, window, cx))
        };
        let boundary = cx.new(|_| ErrorBoundary::new(shell, settings, local_state.clone()));
        let subscription = cx.subscribe_in(
            &boundary,
            window,
            |this, _, _: &ResetCompleted, window, cx| {
                this.remount(window, cx);
            },
        );

        (boundary, subscription)
    }

    fn remount(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        let (boundary, subscription) = Self::mount(&self.local_state, window, cx);
        self.boundary = boundary;
        self._boundary_subscription = subscription;
        tracing::info!("remounted app after local data reset");
        cx.notify();
    }
}

impl Render for AppRoot {
    fn render(&mut self, _window: &mut Window, _cx: &mut Context<Self>) -> impl IntoElement {
        div().size_full().child(self.boundary.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[::core::prelude::v1::test]
    fn mobile_cutoff_is_inclusive() {
        assert!(is_mobile_width(375.0));
        assert!(is_mobile_width(MOBILE_MAX_WIDTH));
        assert!(!is_mobile_width(MOBILE_MAX_WIDTH + 1.0));
        assert!(!is_mobile_width(1200.0));
    }

    #[::core::prelude::v1::test]
    fn sidebar_width_is_clamped() {
        assert_eq!(compute_sidebar_width(10.0), SIDEBAR_MIN_WIDTH);
        assert_eq!(compute_sidebar_width(300.0), 300.0);
        assert_eq!(compute_sidebar_width(2000.0), SIDEBAR_MAX_WIDTH);
    }

    #[::core::prelude::v1::test]
    fn maximize_caption_swaps_to_restore_when_maximized() {
        assert!(matches!(
            CaptionButton::Maximize.icon(false),
            IconName::WindowMaximize
        ));
        assert!(matches!(
            CaptionButton::Maximize.icon(true),
            IconName::WindowRestore
        ));
        assert!(matches!(CaptionButton::Close.icon(true), IconName::WindowClose));

        let ids = CaptionButton::ALL.map(CaptionButton::id);
        assert_eq!(ids, ["caption-minimize", "caption-maximize", "caption-close"]);
    }

    #[::core::prelude::v1::test]
    fn themes_live_next_to_the_binary() {
        assert_eq!(default_themes_path(), PathBuf::from("./themes"));
    }
}
