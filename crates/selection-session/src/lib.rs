//! Selection mode: pointer and keyboard driven picking of elements to hide.
//!
//! A [`SelectionSession`] turns picks into rules through the selector
//! generator, applies them to the page's [`hidebox_element_hider::ElementHider`]
//! right away and persists them in the background of the interaction.

pub mod events;
pub mod session;
pub mod sink;

pub use events::{EventDisposition, KeyEvent, Modifiers, PointerEvent, SessionEvent};
pub use session::{
    Highlight, PageContext, Pick, SelectionSession, SessionState, OVERLAY_SELECTED_CLASS,
};
pub use sink::{ChannelSink, SessionSink, SinkMessage, TracingSink};
