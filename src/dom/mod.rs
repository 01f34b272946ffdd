//! Live document model and the block control injected into it.

mod control;
mod document;
mod selector;

pub use control::{build_control, ActionControl, ControlEvent, ControlState, CONTROL_CLASS};
pub use document::{
    ClickEvent, ClickListener, Document, DomError, DomResult, Mutation, NodeId, ReadyState,
};
pub use selector::Selector;
