//! Window management - panes, the split-tree layout, and the shared state.

pub mod layout;
pub mod manager;
pub mod pane;

pub use layout::{Direction, LayoutNode, LayoutPart};
pub use manager::{LayoutState, RenderEvent};
pub use pane::PaneId;
