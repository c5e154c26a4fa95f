//! Pane - a single child process attached to its own terminal.
//!
//! A pane owns the PTY, the child process, and the virtual terminal fed by
//! a dedicated reader thread. A second thread reaps the child and reports
//! its exit. Input events are serialized with whatever protocols the child
//! has negotiated on its terminal.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::core::pty::{Pty, Result as PtyResult};
use crate::core::term::{EscapeSequenceParser, Terminal, TerminalEvent, WindowSize};
use crate::core::utf8::Utf8StreamDecoder;
use crate::input::{
    serialize_focus_event, serialize_key_event, serialize_mouse_event, serialize_paste_event,
    AlternateScroll, Event, FocusEvent, KeyEvent, MouseButton, MouseCoordinate, MouseEvent,
    MouseEventType, MousePosition, PasteEvent,
};
use crate::ui::renderer::{RenderedCursor, Renderer};

/// Unique identifier for a pane.
pub type PaneId = u64;

static NEXT_PANE_ID: AtomicU64 = AtomicU64::new(1);

type PaneCallback = Box<dyn Fn(&Pane) + Send + Sync>;
type SelectionCallback = Box<dyn Fn(&[u8]) + Send + Sync>;

/// A single pane: child process, PTY, terminal, and selection state.
pub struct Pane {
    id: PaneId,
    pty: Option<Pty>,
    terminal: Mutex<Terminal>,
    done: AtomicBool,

    selection: Mutex<Option<(MouseCoordinate, MouseCoordinate)>>,
    last_mouse_position: Mutex<Option<MousePosition>>,

    did_exit: Option<PaneCallback>,
    did_update: Option<PaneCallback>,
    did_selection: Option<SelectionCallback>,

    reader_thread: Mutex<Option<JoinHandle<()>>>,
    waiter_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Pane {
    /// Spawn `command` on a fresh PTY of the given size and start the
    /// reader and waiter threads.
    pub fn create(
        command: &[String],
        size: WindowSize,
        did_exit: impl Fn(&Pane) + Send + Sync + 'static,
        did_update: impl Fn(&Pane) + Send + Sync + 'static,
        did_selection: impl Fn(&[u8]) + Send + Sync + 'static,
    ) -> PtyResult<Arc<Pane>> {
        let pty = Pty::spawn(command, size)?;

        let pane = Arc::new(Pane {
            id: NEXT_PANE_ID.fetch_add(1, Ordering::Relaxed),
            pty: Some(pty),
            terminal: Mutex::new(Terminal::new(size)),
            done: AtomicBool::new(false),
            selection: Mutex::new(None),
            last_mouse_position: Mutex::new(None),
            did_exit: Some(Box::new(did_exit)),
            did_update: Some(Box::new(did_update)),
            did_selection: Some(Box::new(did_selection)),
            reader_thread: Mutex::new(None),
            waiter_thread: Mutex::new(None),
        });

        let waiter = {
            let pane = Arc::clone(&pane);
            std::thread::spawn(move || {
                let _ = pane.pty.as_ref().unwrap().wait();
                pane.done.store(true, Ordering::Release);
                if let Some(did_exit) = &pane.did_exit {
                    did_exit(&pane);
                }
            })
        };

        let reader = {
            let pane = Arc::clone(&pane);
            std::thread::spawn(move || pane.reader_loop())
        };

        *pane.reader_thread.lock().unwrap() = Some(reader);
        *pane.waiter_thread.lock().unwrap() = Some(waiter);

        Ok(pane)
    }

    /// A pane with no child or threads, for layout tests.
    pub fn create_mock() -> Arc<Pane> {
        Arc::new(Pane {
            id: NEXT_PANE_ID.fetch_add(1, Ordering::Relaxed),
            pty: None,
            terminal: Mutex::new(Terminal::new(WindowSize::new(24, 80))),
            done: AtomicBool::new(false),
            selection: Mutex::new(None),
            last_mouse_position: Mutex::new(None),
            did_exit: None,
            did_update: None,
            did_selection: None,
            reader_thread: Mutex::new(None),
            waiter_thread: Mutex::new(None),
        })
    }

    fn reader_loop(&self) {
        let pty = self.pty.as_ref().unwrap();
        let mut parser = EscapeSequenceParser::new();
        let mut decoder = Utf8StreamDecoder::new();
        let mut buffer = vec![0u8; 16384];

        while !self.done.load(Ordering::Acquire) {
            let nread = match pty.read(&mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };

            let text = decoder.decode(&buffer[..nread]);
            let results = parser.parse_application_escape_sequences(&text);

            let (replies, events, old_size, new_size) = {
                let mut terminal = self.terminal.lock().unwrap();
                let old_size = terminal.size();
                terminal.on_parser_results(&results);
                (
                    terminal.take_replies(),
                    terminal.take_outgoing_events(),
                    old_size,
                    terminal.size(),
                )
            };

            if !replies.is_empty() {
                let _ = pty.write_all(&replies);
            }
            if new_size != old_size {
                let _ = pty.resize(new_size);
            }
            for event in events {
                match event {
                    TerminalEvent::SetClipboard(bytes) => {
                        if let Some(did_selection) = &self.did_selection {
                            did_selection(&bytes);
                        }
                    }
                }
            }

            if let Some(did_update) = &self.did_update {
                did_update(self);
            }
        }
    }

    pub fn id(&self) -> PaneId {
        self.id
    }

    #[allow(dead_code)]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Ask the child to hang up, as if its terminal disappeared.
    pub fn exit(&self) {
        if let Some(pty) = &self.pty {
            pty.signal_hangup();
        }
    }

    pub fn resize(&self, size: WindowSize) {
        self.terminal.lock().unwrap().set_visible_size(size);
        if let Some(pty) = &self.pty {
            let _ = pty.resize(size);
        }
    }

    pub fn invalidate_all(&self) {
        self.terminal.lock().unwrap().invalidate_all();
    }

    /// Run `f` with the terminal locked.
    pub fn with_terminal<R>(&self, f: impl FnOnce(&mut Terminal) -> R) -> R {
        f(&mut self.terminal.lock().unwrap())
    }

    // --- Input -----------------------------------------------------------

    /// Route a semantic input event to the child. Returns whether the event
    /// was consumed.
    pub fn event(&self, event: &Event) -> bool {
        match event {
            Event::Key(key_event) => self.key_event(key_event),
            Event::Mouse(mouse_event) => self.mouse_event(mouse_event),
            Event::Focus(focus_event) => self.focus_event(focus_event),
            Event::Paste(paste_event) => self.paste_event(paste_event),
        }
    }

    fn key_event(&self, event: &KeyEvent) -> bool {
        // Key presses that send text dismiss the selection.
        if !event.text().is_empty() {
            self.clear_selection();
        }

        let (application_cursor_keys_mode, key_reporting_flags) = {
            let terminal = self.terminal.lock().unwrap();
            (
                terminal.application_cursor_keys_mode(),
                terminal.key_reporting_flags(),
            )
        };

        if let Some(bytes) =
            serialize_key_event(event, application_cursor_keys_mode, key_reporting_flags)
        {
            self.write(&bytes);
            return true;
        }
        false
    }

    fn mouse_event(&self, event: &MouseEvent) -> bool {
        let (alternate_scroll, mouse_protocol, mouse_encoding, window_size) = {
            let terminal = self.terminal.lock().unwrap();
            (
                AlternateScroll {
                    alternate_scroll_mode: terminal.alternate_scroll_mode(),
                    application_cursor_keys_mode: terminal.application_cursor_keys_mode(),
                    in_alternate_screen_buffer: terminal.in_alternate_screen_buffer(),
                },
                terminal.mouse_protocol(),
                terminal.mouse_encoding(),
                terminal.size(),
            )
        };

        let serialized = {
            let last_position = self.last_mouse_position.lock().unwrap();
            serialize_mouse_event(
                event,
                mouse_protocol,
                mouse_encoding,
                &last_position,
                alternate_scroll,
                window_size,
            )
        };
        *self.last_mouse_position.lock().unwrap() = Some(event.position());

        if let Some(bytes) = serialized {
            self.write(&bytes);
            return true;
        }

        // Wheel scrolling pans the viewport through the scrollback.
        if event.button() == MouseButton::ScrollUp && event.event_type() == MouseEventType::Press {
            self.terminal.lock().unwrap().scroll_up();
            return true;
        }
        if event.button() == MouseButton::ScrollDown && event.event_type() == MouseEventType::Press
        {
            self.terminal.lock().unwrap().scroll_down();
            return true;
        }

        // Selection.
        if event.button() == MouseButton::Left && event.event_type() == MouseEventType::Press {
            let cells = event.position().in_cells();
            *self.selection.lock().unwrap() = Some((cells, cells));
            return true;
        }

        if event.button() == MouseButton::Left && event.event_type() == MouseEventType::Move {
            let mut selection = self.selection.lock().unwrap();
            if let Some((_, end)) = selection.as_mut() {
                *end = event.position().in_cells();
                return true;
            }
        }

        if event.button() == MouseButton::Left && event.event_type() == MouseEventType::Release {
            if self.selection.lock().unwrap().is_some() {
                let text = self.selection_text();
                if !text.is_empty() {
                    if let Some(did_selection) = &self.did_selection {
                        did_selection(text.as_bytes());
                    }
                }
                self.clear_selection();
                return true;
            }
        }

        self.clear_selection();
        false
    }

    fn focus_event(&self, event: &FocusEvent) -> bool {
        let focus_event_mode = self.terminal.lock().unwrap().focus_event_mode();
        if let Some(bytes) = serialize_focus_event(event, focus_event_mode) {
            self.write(&bytes);
            return true;
        }
        false
    }

    fn paste_event(&self, event: &PasteEvent) -> bool {
        self.clear_selection();
        let bracketed_paste_mode = self.terminal.lock().unwrap().bracketed_paste_mode();
        self.write(&serialize_paste_event(event, bracketed_paste_mode));
        true
    }

    fn write(&self, bytes: &[u8]) {
        if let Some(pty) = &self.pty {
            if let Err(error) = pty.write_all(bytes) {
                tracing::error!(pane = self.id, %error, "pty write failed");
            }
        }
    }

    // --- Selection -------------------------------------------------------

    pub fn clear_selection(&self) {
        *self.selection.lock().unwrap() = None;
    }

    fn selection_bounds(&self) -> Option<(MouseCoordinate, MouseCoordinate)> {
        let selection = self.selection.lock().unwrap();
        let (a, b) = (*selection)?;
        if a == b {
            return None;
        }
        Some((a.min(b), a.max(b)))
    }

    /// Whether a cell lies inside the selection. The interval is
    /// lexicographically half-open: the end column is excluded.
    #[allow(dead_code)]
    pub fn in_selection(&self, coordinate: MouseCoordinate) -> bool {
        let Some((start, end)) = self.selection_bounds() else {
            return false;
        };
        Self::coordinate_in_selection(coordinate, start, end)
    }

    fn coordinate_in_selection(
        coordinate: MouseCoordinate,
        start: MouseCoordinate,
        end: MouseCoordinate,
    ) -> bool {
        let (row, col) = (coordinate.y(), coordinate.x());
        if row > start.y() && row < end.y() {
            return true;
        }
        if row == start.y() {
            return col >= start.x() && (row != end.y() || col < end.x());
        }
        row == end.y() && col < end.x()
    }

    /// The selected text, with trailing spaces trimmed per line and a
    /// newline wherever a selected line runs to the right edge.
    pub fn selection_text(&self) -> String {
        let Some((start, end)) = self.selection_bounds() else {
            return String::new();
        };

        self.with_terminal(|terminal| {
            let col_count = u32::from(terminal.col_count());
            let mut text = String::new();
            for row in start.y()..=end.y() {
                if row >= u32::from(terminal.row_count()) {
                    break;
                }
                let start_col = if row == start.y() { start.x() } else { 0 };
                let end_col = if row == end.y() { end.x() } else { col_count };

                let offset = terminal.scroll_relative_offset(row as u16);
                let cells = terminal.row_at_scroll_relative_offset(offset);

                let mut line = String::new();
                for col in start_col..end_col.min(cells.len() as u32) {
                    line.push_str(&cells[col as usize].text);
                }
                while line.ends_with(' ') {
                    line.pop();
                }

                text.push_str(&line);
                if end_col == col_count {
                    text.push('\n');
                }
            }
            text
        })
    }

    // --- Drawing ---------------------------------------------------------

    /// Paint dirty cells into the renderer and report where the cursor is.
    pub fn draw(&self, renderer: &mut Renderer) -> RenderedCursor {
        let selection = self.selection_bounds();
        let mut terminal = self.terminal.lock().unwrap();

        if terminal.allowed_to_draw() {
            for (r, row) in terminal.rows_mut().iter_mut().enumerate() {
                for (c, cell) in row.iter_mut().enumerate() {
                    let selected = selection.is_some_and(|(start, end)| {
                        Self::coordinate_in_selection(
                            MouseCoordinate::new(c as u32, r as u32),
                            start,
                            end,
                        )
                    });
                    if cell.dirty || selected {
                        // Selected cells stay dirty so deselection repaints.
                        cell.dirty = selected;

                        let mut sgr = cell.rendition;
                        if selected {
                            sgr.inverted = !sgr.inverted;
                        }
                        renderer.put_text(&cell.text, r as u16, c as u16, sgr);
                    }
                }
            }
        }

        RenderedCursor {
            cursor_row: terminal.cursor_row(),
            cursor_col: terminal.cursor_col(),
            style: terminal.cursor_style(),
            hidden: terminal.cursor_hidden() || !terminal.allowed_to_draw(),
        }
    }

    /// Join the reader and waiter threads. Callers make sure the child is
    /// exiting first, otherwise this blocks until it does.
    pub fn join_threads(&self) {
        if let Some(handle) = self.reader_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.waiter_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Pane {
    fn drop(&mut self) {
        self.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: u32, y: u32) -> MouseCoordinate {
        MouseCoordinate::new(x, y)
    }

    fn select(pane: &Pane, start: MouseCoordinate, end: MouseCoordinate) {
        *pane.selection.lock().unwrap() = Some((start, end));
    }

    #[test]
    fn test_in_selection_half_open() {
        let pane = Pane::create_mock();
        select(&pane, cell(2, 1), cell(4, 1));

        assert!(!pane.in_selection(cell(1, 1)));
        assert!(pane.in_selection(cell(2, 1)));
        assert!(pane.in_selection(cell(3, 1)));
        // The end column is exclusive.
        assert!(!pane.in_selection(cell(4, 1)));
        assert!(!pane.in_selection(cell(3, 0)));
    }

    #[test]
    fn test_in_selection_multi_row_and_reversed() {
        let pane = Pane::create_mock();
        // Reversed endpoints normalize.
        select(&pane, cell(1, 3), cell(4, 1));

        assert!(pane.in_selection(cell(4, 1)));
        assert!(pane.in_selection(cell(0, 2)));
        assert!(pane.in_selection(cell(79, 2)));
        assert!(pane.in_selection(cell(0, 3)));
        assert!(!pane.in_selection(cell(1, 3)));
        assert!(!pane.in_selection(cell(3, 1)));
    }

    #[test]
    fn test_empty_selection_contains_nothing() {
        let pane = Pane::create_mock();
        assert!(!pane.in_selection(cell(0, 0)));
        select(&pane, cell(2, 2), cell(2, 2));
        assert!(!pane.in_selection(cell(2, 2)));
    }

    #[test]
    fn test_selection_text_trims_and_joins() {
        let pane = Pane::create_mock();
        pane.with_terminal(|terminal| {
            let mut parser = EscapeSequenceParser::new();
            let results =
                parser.parse_application_escape_sequences("first line\r\nsecond\r\nthird");
            terminal.on_parser_results(&results);
        });

        select(&pane, cell(0, 0), cell(80, 1));
        assert_eq!(pane.selection_text(), "first line\nsecond\n");

        select(&pane, cell(6, 1), cell(3, 2));
        assert_eq!(pane.selection_text(), "\nthi");
    }
}
