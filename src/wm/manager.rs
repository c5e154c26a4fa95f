//! Layout state - tabs, panes, and the supervisor's shared view of them.
//!
//! One mutex guards all of this. The input thread mutates it on key binds
//! and routes events to panes; the render thread drains [`RenderEvent`]s
//! and walks the active tab's layout tree. Pane exits arrive as messages so
//! no pane callback ever re-enters the layout lock.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use thiserror::Error;

use crate::core::pty::PtyError;
use crate::core::term::WindowSize;
use crate::input::{Event, MouseEvent, MouseEventType};
use crate::ui::keybind::NavigateDirection;

use super::layout::{Direction, LayoutGroup, LayoutNode, ResizeDirection};
use super::pane::{Pane, PaneId};

/// Events drained by the render thread under the layout lock.
#[derive(Debug)]
pub enum RenderEvent {
    /// The host terminal was resized.
    WindowSize(WindowSize),
    /// A pane's child exited; remove it on the next tick.
    PaneExited(PaneId),
    /// A child or a selection produced clipboard bytes for the host.
    CopyToClipboard(Vec<u8>),
}

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("terminal has no room for another pane")]
    NoRoom,

    #[error(transparent)]
    Spawn(#[from] PtyError),
}

/// One tab: a split tree of panes with its own focus and recency order.
pub struct Tab {
    layout_root: LayoutGroup,
    layout_tree: Option<Box<LayoutNode>>,
    panes_ordered_by_recency: Vec<Arc<Pane>>,
    active: Option<Arc<Pane>>,
}

impl Tab {
    fn new() -> Self {
        Self {
            layout_root: LayoutGroup::new(),
            layout_tree: None,
            panes_ordered_by_recency: Vec::new(),
            active: None,
        }
    }

    pub fn layout_tree(&self) -> Option<&LayoutNode> {
        self.layout_tree.as_deref()
    }

    /// Recompute rectangles and push the new sizes into the panes.
    fn do_layout(&mut self, size: WindowSize) {
        self.layout_tree = self.layout_root.layout(size, 0, 0);
        if let Some(tree) = &self.layout_tree {
            for entry in tree.entries() {
                entry.pane.resize(entry.size);
            }
        }
    }

    /// Focus a pane: focus events to both sides, recency ring updated.
    fn set_active(&mut self, pane: Option<Arc<Pane>>) {
        let same = match (&self.active, &pane) {
            (Some(a), Some(b)) => a.id() == b.id(),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }

        if let Some(old) = &self.active {
            old.event(&Event::Focus(crate::input::FocusEvent::focus_out()));
        }
        self.active = pane;
        if let Some(active) = &self.active {
            let id = active.id();
            self.panes_ordered_by_recency.retain(|p| p.id() != id);
            self.panes_ordered_by_recency.insert(0, Arc::clone(active));
            active.event(&Event::Focus(crate::input::FocusEvent::focus_in()));
        }
    }

    fn invalidate_all(&self) {
        for pane in &self.panes_ordered_by_recency {
            pane.invalidate_all();
        }
    }
}

/// The supervisor's shared state.
pub struct LayoutState {
    size: WindowSize,
    tabs: Vec<Tab>,
    active_tab: usize,
}

impl LayoutState {
    pub fn new(size: WindowSize) -> Self {
        Self {
            size,
            tabs: Vec::new(),
            active_tab: 0,
        }
    }

    pub fn size(&self) -> WindowSize {
        self.size
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.get(self.active_tab)
    }

    pub fn active_pane(&self) -> Option<Arc<Pane>> {
        self.active_tab().and_then(|tab| tab.active.clone())
    }

    /// Create a tab running `command` and make it current.
    pub fn add_tab(
        &mut self,
        command: &[String],
        events: &Sender<RenderEvent>,
    ) -> Result<(), LayoutError> {
        self.tabs.push(Tab::new());
        let index = self.tabs.len() - 1;
        match self.add_pane_to_tab(index, command, Direction::None, events) {
            Ok(()) => {
                self.active_tab = index;
                Ok(())
            }
            Err(error) => {
                self.tabs.remove(index);
                Err(error)
            }
        }
    }

    /// Switch to tab `number` (1-based).
    pub fn set_active_tab(&mut self, number: usize) {
        let index = number.saturating_sub(1);
        if index < self.tabs.len() && index != self.active_tab {
            self.active_tab = index;
            // The renderer's last frame shows another tab.
            self.tabs[index].invalidate_all();
        }
    }

    /// Split the active pane of the current tab.
    pub fn add_pane(
        &mut self,
        command: &[String],
        direction: Direction,
        events: &Sender<RenderEvent>,
    ) -> Result<(), LayoutError> {
        if self.tabs.is_empty() {
            return self.add_tab(command, events);
        }
        self.add_pane_to_tab(self.active_tab, command, direction, events)
    }

    fn add_pane_to_tab(
        &mut self,
        index: usize,
        command: &[String],
        direction: Direction,
        events: &Sender<RenderEvent>,
    ) -> Result<(), LayoutError> {
        let size = self.size;
        let tab = &mut self.tabs[index];
        let reference = tab.active.clone();

        let (tree, slot) = tab
            .layout_root
            .split(size, 0, 0, reference.as_deref(), direction);
        tab.layout_tree = tree;

        let slot_size = match slot {
            Some((_, _, slot_size)) if slot_size.rows > 0 && slot_size.cols > 0 => slot_size,
            _ => {
                // The visible terminal is too small for another pane.
                tab.layout_root.remove_pane(None);
                tab.do_layout(size);
                return Err(LayoutError::NoRoom);
            }
        };

        let exit_events = events.clone();
        let clipboard_events = events.clone();
        match Pane::create(
            command,
            slot_size,
            move |pane| {
                let _ = exit_events.send(RenderEvent::PaneExited(pane.id()));
            },
            |_pane| {},
            move |bytes| {
                let _ = clipboard_events.send(RenderEvent::CopyToClipboard(bytes.to_vec()));
            },
        ) {
            Ok(pane) => {
                tab.layout_root.fill_slot(Arc::clone(&pane));
                tab.do_layout(size);
                tab.set_active(Some(pane));
                Ok(())
            }
            Err(error) => {
                tab.layout_root.remove_pane(None);
                tab.do_layout(size);
                Err(error.into())
            }
        }
    }

    /// Remove an exited pane. Returns true when no panes remain anywhere.
    pub fn remove_pane(&mut self, id: PaneId) -> bool {
        let size = self.size;
        for index in 0..self.tabs.len() {
            let tab = &mut self.tabs[index];
            let Some(pane) = tab
                .panes_ordered_by_recency
                .iter()
                .find(|p| p.id() == id)
                .cloned()
            else {
                continue;
            };

            tab.panes_ordered_by_recency.retain(|p| p.id() != id);
            if tab.active.as_ref().is_some_and(|p| p.id() == id) {
                let next = tab.panes_ordered_by_recency.first().cloned();
                tab.active = None;
                tab.set_active(next);
            }

            tab.layout_root.remove_pane(Some(&pane));
            tab.do_layout(size);
            pane.join_threads();

            if tab.layout_root.empty() {
                self.tabs.remove(index);
                if index < self.active_tab {
                    self.active_tab -= 1;
                } else if self.active_tab >= self.tabs.len() && self.active_tab > 0 {
                    self.active_tab = self.tabs.len() - 1;
                }
                if let Some(tab) = self.tabs.get(self.active_tab) {
                    tab.invalidate_all();
                }
            }
            return self.tabs.is_empty();
        }
        false
    }

    /// Adopt a new host terminal size.
    pub fn relayout(&mut self, size: WindowSize) {
        self.size = size;
        for tab in &mut self.tabs {
            tab.do_layout(size);
        }
    }

    /// Focus the nearest pane (most recently used first) across the
    /// separator in the given direction, wrapping at the screen edges.
    pub fn navigate(&mut self, direction: NavigateDirection) {
        let size = self.size;
        let Some(tab) = self.tabs.get(self.active_tab) else {
            return;
        };
        let Some(active) = tab.active.clone() else {
            return;
        };

        let candidates: Vec<PaneId> = {
            let Some(tree) = &tab.layout_tree else {
                return;
            };
            let Some(entry) = tree.find_pane(&active) else {
                return;
            };
            let (row, col, rect) = (entry.row, entry.col, entry.size);

            let entries = match direction {
                NavigateDirection::Left => {
                    let probe = if col <= 1 { size.cols - 1 } else { col - 2 };
                    tree.hit_test_vertical_line(probe, row, row + rect.rows)
                }
                NavigateDirection::Right => {
                    let probe = if size.cols < 2 || col + rect.cols >= size.cols - 1 {
                        0
                    } else {
                        col + rect.cols + 1
                    };
                    tree.hit_test_vertical_line(probe, row, row + rect.rows)
                }
                NavigateDirection::Up => {
                    let probe = if row <= 1 { size.rows - 1 } else { row - 2 };
                    tree.hit_test_horizontal_line(probe, col, col + rect.cols)
                }
                NavigateDirection::Down => {
                    let probe = if size.rows < 2 || row + rect.rows >= size.rows - 1 {
                        0
                    } else {
                        row + rect.rows + 1
                    };
                    tree.hit_test_horizontal_line(probe, col, col + rect.cols)
                }
            };
            entries.iter().map(|entry| entry.pane.id()).collect()
        };

        let next = tab
            .panes_ordered_by_recency
            .iter()
            .find(|pane| pane.id() != active.id() && candidates.contains(&pane.id()))
            .cloned();
        if let Some(next) = next {
            self.tabs[self.active_tab].set_active(Some(next));
        }
    }

    /// Resize the active pane by moving one of its edges.
    pub fn resize_active(&mut self, direction: ResizeDirection, delta: i32) {
        let size = self.size;
        let Some(tab) = self.tabs.get_mut(self.active_tab) else {
            return;
        };
        let Some(active) = tab.active.clone() else {
            return;
        };
        if tab.layout_root.resize_pane(&active, direction, delta, size) {
            tab.do_layout(size);
        }
    }

    /// Route a mouse event: clicks focus the pane under the cursor, and the
    /// active pane receives the event in its own coordinates.
    pub fn mouse_event(&mut self, event: &MouseEvent) {
        let size = self.size;
        let Some(tab) = self.tabs.get_mut(self.active_tab) else {
            return;
        };

        let cells = event.position().in_cells();
        let hits: Vec<(PaneId, u16, u16)> = {
            let Some(tree) = &tab.layout_tree else {
                return;
            };
            tree.hit_test(cells.y().min(u32::from(u16::MAX)) as u16, cells.x().min(u32::from(u16::MAX)) as u16)
                .iter()
                .map(|entry| (entry.pane.id(), entry.row, entry.col))
                .collect()
        };

        for (id, row, col) in hits {
            if event.event_type() != MouseEventType::Move {
                let pane = tab
                    .panes_ordered_by_recency
                    .iter()
                    .find(|p| p.id() == id)
                    .cloned();
                tab.set_active(pane);
            }
            if let Some(active) = &tab.active {
                if active.id() == id {
                    let translated = event.translate(-i32::from(col), -i32::from(row), size);
                    active.event(&Event::Mouse(translated));
                }
            }
        }
    }

    /// Every pane in every tab, for shutdown.
    pub fn all_panes(&self) -> Vec<Arc<Pane>> {
        self.tabs
            .iter()
            .flat_map(|tab| tab.panes_ordered_by_recency.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two side-by-side mock panes, the second squeezed to a single column
    /// at the right edge of a 10x10 tab.
    fn narrow_split_state() -> (LayoutState, Arc<Pane>, Arc<Pane>) {
        let size = WindowSize::new(10, 10);
        let mut state = LayoutState::new(size);

        let pane0 = Pane::create_mock();
        let pane1 = Pane::create_mock();

        let mut tab = Tab::new();
        let _ = tab.layout_root.split(size, 0, 0, None, Direction::None);
        assert!(tab.layout_root.fill_slot(Arc::clone(&pane0)));
        let _ = tab
            .layout_root
            .split(size, 0, 0, Some(&pane0), Direction::Horizontal);
        assert!(tab.layout_root.fill_slot(Arc::clone(&pane1)));
        // Widen pane 0 until pane 1 is one column wide.
        assert!(tab
            .layout_root
            .resize_pane(&pane0, ResizeDirection::Right, 3, size));
        tab.do_layout(size);
        tab.panes_ordered_by_recency.push(Arc::clone(&pane1));
        tab.set_active(Some(Arc::clone(&pane0)));
        state.tabs.push(tab);

        (state, pane0, pane1)
    }

    #[test]
    fn test_navigate_reaches_narrow_trailing_pane() {
        let (mut state, pane0, pane1) = narrow_split_state();

        {
            let tree = state.tabs[0].layout_tree().unwrap();
            let entry = tree.find_pane(&pane1).unwrap();
            assert_eq!((entry.col, entry.size.cols), (9, 1));
        }

        // The probe line just past the separator lands on the one-column
        // neighbor rather than wrapping.
        state.navigate(NavigateDirection::Right);
        assert_eq!(state.active_pane().unwrap().id(), pane1.id());

        // From the edge pane there is no trailing neighbor: wrap around.
        state.navigate(NavigateDirection::Right);
        assert_eq!(state.active_pane().unwrap().id(), pane0.id());

        // Leftward from the first column wraps to the right edge.
        state.navigate(NavigateDirection::Left);
        assert_eq!(state.active_pane().unwrap().id(), pane1.id());
    }
}
