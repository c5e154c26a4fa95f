//! Input events and wire codecs.
//!
//! Each event kind has a decoder (host bytes -> event) and a mode-aware
//! serializer (event -> child bytes):
//!
//! - **key**: keyboard events, legacy and kitty CSI u forms
//! - **mouse**: mouse events across the xterm protocols and encodings
//! - **focus**: focus in/out reporting
//! - **paste**: bracketed paste
//! - **parser**: the host-input pipeline assembling semantic events

pub mod focus;
pub mod key;
pub mod mouse;
pub mod parser;
pub mod paste;

pub use focus::{serialize_focus_event, FocusEvent};
pub use key::{serialize_key_event, Key, KeyEvent, KeyEventType, Modifiers};
pub use mouse::{
    serialize_mouse_event, AlternateScroll, MouseButton, MouseCoordinate, MouseEvent,
    MouseEventType, MousePosition,
};
pub use parser::{Event, TerminalInputParser};
pub use paste::{serialize_paste_event, PasteEvent};
