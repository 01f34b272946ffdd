//! Block control: state machine and its reflection onto the button element.

use std::sync::{Mutex, PoisonError};

use super::document::{Document, NodeId};

/// Marker class identifying an injected control.
pub const CONTROL_CLASS: &str = "easy-block-btn";

const BUTTON_CLASSES: &str = "css-175oi2r r-1777fci r-bt1l66 r-bztko3 r-lrvibr r-1loqt21 r-1ny4l3l";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// The pipeline starts.
    Activate,
    /// Local failure before any remote call (no handle in the card).
    Reject,
    /// Identity resolved and block accepted.
    Succeeded,
    /// A remote stage failed.
    Failed,
    /// The feedback display interval ran out.
    FeedbackElapsed,
}

impl ControlState {
    /// Next state, or `None` when the event does not apply.
    ///
    /// Activation while `Loading` is ignored: one pipeline per control at a time.
    pub fn next(self, event: ControlEvent) -> Option<ControlState> {
        use ControlEvent::*;
        use ControlState::*;

        match (self, event) {
            (Loading, Activate) => None,
            (_, Activate) => Some(Loading),
            (Loading, Reject) => None,
            (_, Reject) => Some(Error),
            (Loading, Succeeded) => Some(Success),
            (Loading, Failed) => Some(Error),
            (Success | Error, FeedbackElapsed) => Some(Idle),
            _ => None,
        }
    }

    /// Class rendered on the button while in this state.
    pub fn css_class(self) -> Option<&'static str> {
        match self {
            Self::Idle => None,
            Self::Loading => Some("loading"),
            Self::Success => Some("success"),
            Self::Error => Some("error"),
        }
    }

    pub fn is_feedback(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

const STATE_CLASSES: [&str; 3] = ["loading", "success", "error"];

#[derive(Debug)]
struct ControlInner {
    state: ControlState,
    /// Bumped each time feedback is shown; a revert only applies to its own epoch.
    feedback_epoch: u64,
}

/// One injected button, bound to the post card it was created for.
#[derive(Debug)]
pub struct ActionControl {
    button: NodeId,
    card: NodeId,
    inner: Mutex<ControlInner>,
}

impl ActionControl {
    pub fn new(button: NodeId, card: NodeId) -> Self {
        Self {
            button,
            card,
            inner: Mutex::new(ControlInner {
                state: ControlState::Idle,
                feedback_epoch: 0,
            }),
        }
    }

    pub fn button(&self) -> NodeId {
        self.button
    }

    pub fn card(&self) -> NodeId {
        self.card
    }

    pub fn state(&self) -> ControlState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Apply `event` and render the result. Returns the new state and its
    /// feedback epoch, or `None` if the event was ignored.
    pub fn apply(&self, document: &Document, event: ControlEvent) -> Option<(ControlState, u64)> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let next = inner.state.next(event)?;
        inner.state = next;
        if next.is_feedback() {
            inner.feedback_epoch += 1;
        }
        self.render(document, next);
        Some((next, inner.feedback_epoch))
    }

    /// Clear feedback shown at `epoch`, unless newer state has replaced it.
    pub fn revert(&self, document: &Document, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.feedback_epoch != epoch {
            return false;
        }
        match inner.state.next(ControlEvent::FeedbackElapsed) {
            Some(next) => {
                inner.state = next;
                self.render(document, next);
                true
            }
            None => false,
        }
    }

    fn render(&self, document: &Document, state: ControlState) {
        // Writes to a detached button are harmless.
        for class in STATE_CLASSES {
            if Some(class) != state.css_class() {
                let _ = document.remove_class(self.button, class);
            }
        }
        if let Some(class) = state.css_class() {
            let _ = document.add_class(self.button, class);
        }
    }
}

/// Build a detached block button.
pub fn build_control(document: &Document) -> NodeId {
    let button = document.create_element("button");
    let icon = document.create_element("svg");

    let attrs = [
        ("class", format!("{} {}", BUTTON_CLASSES, CONTROL_CLASS)),
        ("aria-label", "Block user".to_string()),
        ("role", "button".to_string()),
        ("type", "button".to_string()),
    ];
    for (name, value) in &attrs {
        let _ = document.set_attribute(button, name, value);
    }
    let _ = document.set_attribute(icon, "viewBox", "0 0 24 24");
    let _ = document.set_attribute(icon, "aria-hidden", "true");
    let _ = document.set_attribute(icon, "class", "easy-block-icon");
    let _ = document.append_child(button, icon);

    button
}
