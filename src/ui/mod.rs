//! User interface: frame composition and key bindings.
//!
//! - **renderer**: diff-based compositor for the host terminal
//! - **keybind**: input modes and the prefix-key binding table

pub mod keybind;
pub mod renderer;

pub use keybind::{find_bind, make_key_binds, Action, InputMode};
pub use renderer::{RenderedCursor, Renderer};
