//! Top-level fault containment with a destructive local data reset.

pub mod fault;
pub mod reset;

use std::sync::Arc;

use chatoor_storage::LocalStateStore;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    v_flex,
};

pub use fault::{BoundaryState, FallibleRender, RenderFault};
pub use reset::{
    DownloadsDirSink, RESET_CONFIRM_MESSAGE, ResetError, ResetOutcome, SnapshotSink,
    clear_and_save,
};

use crate::settings::SettingsState;

/// Emitted once local state has been wiped; the host must remount the subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetCompleted;

/// Renders `child` until it reports a fault, then shows a recovery screen for good.
pub struct ErrorBoundary<V: FallibleRender> {
    child: Entity<V>,
    state: BoundaryState,
    settings: Entity<SettingsState>,
    local_state: Arc<dyn LocalStateStore>,
    reset_in_flight: bool,
}

impl<V: FallibleRender> EventEmitter<ResetCompleted> for ErrorBoundary<V> {}

impl<V: FallibleRender> ErrorBoundary<V> {
    pub fn new(
        child: Entity<V>,
        settings: Entity<SettingsState>,
        local_state: Arc<dyn LocalStateStore>,
    ) -> Self {
        Self {
            child,
            state: BoundaryState::Healthy,
            settings,
            local_state,
            reset_in_flight: false,
        }
    }

    fn capture(&mut self, fault: RenderFault) {
        let summary = fault.to_string();
        let trace = fault.view_trace().join(" <- ");
        if self.state.capture(fault) {
            tracing::error!(%trace, "render fault captured: {summary}");
        } else {
            tracing::debug!(%trace, "ignoring render fault while already faulted: {summary}");
        }
    }

    fn report_issue(&self, cx: &mut App) {
        let Some(url) = self.settings.read(cx).config().issue_url.clone() else {
            return;
        };
        tracing::info!("opening issue tracker at {url}");
        cx.open_url(&url);
    }

    fn confirm_reset(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        if self.reset_in_flight {
            return;
        }
        self.reset_in_flight = true;

        let answer = window.prompt(
            PromptLevel::Warning,
            RESET_CONFIRM_MESSAGE,
            None,
            &["Confirm", "Cancel"],
            cx,
        );

        cx.spawn(async move |this, cx| {
            let confirmed = matches!(answer.await, Ok(0));
            let _ = this.update(cx, |this, cx| {
                this.reset_in_flight = false;
                if confirmed {
                    this.reset(cx);
                } else {
                    tracing::info!("local data reset cancelled");
                    cx.notify();
                }
            });
        })
        .detach();
        cx.notify();
    }

    fn reset(&mut self, cx: &mut Context<Self>) {
        let sink = DownloadsDirSink::new();
        let outcome = clear_and_save(self.local_state.as_ref(), &sink, || {
            cx.emit(ResetCompleted)
        });
        tracing::info!(
            snapshot_saved = outcome.snapshot.is_ok(),
            state_cleared = outcome.cleared.is_ok(),
            "local data reset finished"
        );
    }

    fn render_fallback(&self, fault: &RenderFault, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let can_report = self.settings.read(cx).config().issue_url.is_some();

        v_flex()
            .id("error-boundary")
            .size_full()
            .items_center()
            .justify_center()
            .gap_4()
            .p_8()
            .bg(theme.background)
            .child(Label::new("Oops, something went wrong!").text_xl())
            .child(
                v_flex()
                    .id("error-boundary-details")
                    .w_full()
                    .max_w(px(720.))
                    .max_h(px(360.))
                    .overflow_y_scroll()
                    .gap_2()
                    .p_3()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .child(
                        div()
                            .text_sm()
                            .text_color(theme.danger)
                            .child(fault.message().to_string()),
                    )
                    .child(
                        div()
                            .text_xs()
                            .text_color(theme.muted_foreground)
                            .child(fault.trace_text()),
                    ),
            )
            .child(
                h_flex()
                    .gap_3()
                    .child(
                        Button::new("error-report")
                            .outline()
                            .small()
                            .icon(IconName::GitHub)
                            .child("Report This Error")
                            .disabled(!can_report)
                            .on_click(cx.listener(|this, _, _window, cx| {
                                this.report_issue(cx);
                            })),
                    )
                    .child(
                        Button::new("error-reset")
                            .danger()
                            .small()
                            .icon(IconName::Delete)
                            .child("Clear All Data")
                            .disabled(self.reset_in_flight)
                            .on_click(cx.listener(|this, _, window, cx| {
                                this.confirm_reset(window, cx);
                            })),
                    ),
            )
            .into_any_element()
    }
}

impl<V: FallibleRender> Render for ErrorBoundary<V> {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if !self.state.is_faulted() {
            match self.child.update(cx, |child, cx| child.try_render(window, cx)) {
                Ok(element) => return element,
                Err(fault) => self.capture(fault),
            }
        }

        match self.state.fault() {
            Some(fault) => self.render_fallback(fault, cx),
            None => div().into_any_element(),
        }
    }
}
