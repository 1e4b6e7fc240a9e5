use gpui::{AnyElement, Context, Window};
use snafu::Snafu;

/// A render failure and the views it passed through, innermost first.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("{message}"))]
pub struct RenderFault {
    message: String,
    view_trace: Vec<String>,
}

impl RenderFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            view_trace: Vec::new(),
        }
    }

    /// Records that the fault surfaced through `view`.
    pub fn within(mut self, view: impl Into<String>) -> Self {
        self.view_trace.push(view.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn view_trace(&self) -> &[String] {
        &self.view_trace
    }

    pub fn trace_text(&self) -> String {
        self.view_trace
            .iter()
            .map(|view| format!("    in {view}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A view whose render can fail instead of drawing.
pub trait FallibleRender: Sized + 'static {
    fn try_render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Result<AnyElement, RenderFault>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BoundaryState {
    #[default]
    Healthy,
    Faulted(RenderFault),
}

impl BoundaryState {
    /// Moves to `Faulted` on the first fault only; returns whether `fault` was kept.
    pub fn capture(&mut self, fault: RenderFault) -> bool {
        match self {
            Self::Healthy => {
                *self = Self::Faulted(fault);
                true
            }
            Self::Faulted(_) => false,
        }
    }

    pub fn fault(&self) -> Option<&RenderFault> {
        match self {
            Self::Healthy => None,
            Self::Faulted(fault) => Some(fault),
        }
    }

    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fault_moves_to_faulted() {
        let mut state = BoundaryState::default();
        assert!(!state.is_faulted());

        assert!(state.capture(RenderFault::new("boom")));
        assert!(state.is_faulted());
        assert_eq!(state.fault().map(RenderFault::message), Some("boom"));
    }

    #[test]
    fn later_faults_are_ignored() {
        let mut state = BoundaryState::default();
        state.capture(RenderFault::new("first"));

        assert!(!state.capture(RenderFault::new("second")));
        assert!(!state.capture(RenderFault::new("third")));
        assert_eq!(state.fault().map(RenderFault::message), Some("first"));
    }

    #[test]
    fn trace_lists_views_innermost_first() {
        let fault = RenderFault::new("unreadable channel")
            .within("ChannelStore")
            .within("ChatAppShell");

        assert_eq!(fault.view_trace(), ["ChannelStore", "ChatAppShell"]);
        assert_eq!(
            fault.trace_text(),
            "    in ChannelStore\n    in ChatAppShell"
        );
        assert_eq!(fault.to_string(), "unreadable channel");
    }
}
