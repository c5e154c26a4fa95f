//! Compositing renderer for the host terminal.
//!
//! Keeps the last painted frame and emits a minimal byte sequence for each
//! new frame: cursor moves, rendition changes, and text for changed cells,
//! coalescing runs within a row. Panes paint through a clip bound so a
//! misbehaving terminal cannot write outside its rectangle.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::core::term::{CursorStyle, GraphicsRendition, WindowSize};

/// Where the hardware cursor ends up after a frame.
#[derive(Clone, Copy, Debug)]
pub struct RenderedCursor {
    pub cursor_row: u16,
    pub cursor_col: u16,
    pub style: CursorStyle,
    pub hidden: bool,
}

impl Default for RenderedCursor {
    fn default() -> Self {
        Self {
            cursor_row: 0,
            cursor_col: 0,
            style: CursorStyle::default(),
            hidden: true,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
struct RenderCell {
    text: String,
    sgr: GraphicsRendition,
}

impl Default for RenderCell {
    fn default() -> Self {
        Self {
            text: " ".into(),
            sgr: GraphicsRendition::default(),
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Bound {
    row: u16,
    col: u16,
    rows: u16,
    cols: u16,
}

/// The frame compositor.
pub struct Renderer {
    size: WindowSize,
    /// The frame being assembled.
    current: Vec<Vec<RenderCell>>,
    /// The frame on the host terminal.
    previous: Vec<Vec<RenderCell>>,
    bound: Bound,
    force_clear: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            size: WindowSize::default(),
            current: Vec::new(),
            previous: Vec::new(),
            bound: Bound::default(),
            force_clear: false,
        }
    }

    /// Begin a frame. A size change resets both buffers and forces a full
    /// clear on the next finish.
    pub fn start(&mut self, size: WindowSize) {
        if size != self.size {
            self.size = size;
            let blank =
                vec![vec![RenderCell::default(); size.cols as usize]; size.rows as usize];
            self.previous = blank.clone();
            self.current = blank;
            self.force_clear = true;
        } else {
            self.current = self.previous.clone();
        }
        self.bound = Bound {
            row: 0,
            col: 0,
            rows: size.rows,
            cols: size.cols,
        };
    }

    /// Clip subsequent `put_text` calls to a rectangle. Coordinates passed
    /// to `put_text` are relative to the bound's origin.
    pub fn set_bound(&mut self, row: u16, col: u16, cols: u16, rows: u16) {
        self.bound = Bound { row, col, rows, cols };
    }

    /// Write one cell's text into the pending frame; calls outside the
    /// current bound are dropped.
    pub fn put_text(&mut self, text: &str, row: u16, col: u16, sgr: GraphicsRendition) {
        if row >= self.bound.rows || col >= self.bound.cols {
            return;
        }
        let row = self.bound.row + row;
        let col = self.bound.col + col;
        if row >= self.size.rows || col >= self.size.cols {
            return;
        }
        let cell = &mut self.current[row as usize][col as usize];
        cell.text.clear();
        cell.text.push_str(if text.is_empty() { " " } else { text });
        cell.sgr = sgr;
    }

    /// Diff the pending frame against the painted one and emit the update,
    /// then place the hardware cursor.
    pub fn finish(&mut self, out: &mut impl Write, cursor: RenderedCursor) -> io::Result<()> {
        let mut output = String::new();
        // Synchronized update, and no visible cursor while painting.
        output.push_str("\x1b[?2026h\x1b[?25l");

        if self.force_clear {
            self.force_clear = false;
            output.push_str("\x1b[H\x1b[2J");
            for row in &mut self.previous {
                for cell in row {
                    *cell = RenderCell::default();
                }
            }
        }

        let mut last_sgr = None::<GraphicsRendition>;
        let mut pen: Option<(u16, u16)> = None;
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                let cell = &self.current[row as usize][col as usize];
                if *cell == self.previous[row as usize][col as usize] {
                    continue;
                }

                if pen != Some((row, col)) {
                    let _ = write!(output, "\x1b[{};{}H", row + 1, col + 1);
                }
                if last_sgr != Some(cell.sgr) {
                    let _ = write!(output, "\x1b[{}m", cell.sgr.as_csi_params());
                    last_sgr = Some(cell.sgr);
                }
                output.push_str(&cell.text);
                pen = Some((row, col + 1));
            }
        }

        // Leave the host terminal in a known rendition.
        if last_sgr.is_some_and(|sgr| sgr != GraphicsRendition::default()) {
            output.push_str("\x1b[0m");
        }

        if !cursor.hidden {
            let _ = write!(
                output,
                "\x1b[{};{}H\x1b[{} q\x1b[?25h",
                cursor.cursor_row + 1,
                cursor.cursor_col + 1,
                cursor.style.to_decscusr()
            );
        }
        output.push_str("\x1b[?2026l");

        out.write_all(output.as_bytes())?;
        out.flush()?;

        std::mem::swap(&mut self.previous, &mut self.current);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::rendition::Color;

    fn start(size_rows: u16, size_cols: u16) -> Renderer {
        let mut renderer = Renderer::new();
        renderer.start(WindowSize::new(size_rows, size_cols));
        renderer
    }

    fn finish(renderer: &mut Renderer, cursor: RenderedCursor) -> String {
        let mut out = Vec::new();
        renderer.finish(&mut out, cursor).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_first_frame_clears_and_paints() {
        let mut renderer = start(2, 4);
        renderer.put_text("h", 0, 0, GraphicsRendition::default());
        renderer.put_text("i", 0, 1, GraphicsRendition::default());
        let output = finish(&mut renderer, RenderedCursor::default());

        assert!(output.contains("\x1b[2J"));
        assert!(output.contains("\x1b[1;1H"));
        assert!(output.contains("hi"));
        // Hidden cursor: never shown.
        assert!(!output.contains("\x1b[?25h"));
    }

    #[test]
    fn test_unchanged_frame_emits_no_cells() {
        let mut renderer = start(2, 4);
        renderer.put_text("x", 0, 0, GraphicsRendition::default());
        finish(&mut renderer, RenderedCursor::default());

        renderer.start(WindowSize::new(2, 4));
        renderer.put_text("x", 0, 0, GraphicsRendition::default());
        let output = finish(&mut renderer, RenderedCursor::default());
        // Only the frame bracketing remains.
        assert_eq!(output, "\x1b[?2026h\x1b[?25l\x1b[?2026l");
    }

    #[test]
    fn test_runs_coalesce_without_cursor_moves() {
        let mut renderer = start(1, 8);
        finish(&mut renderer, RenderedCursor::default());

        renderer.start(WindowSize::new(1, 8));
        for (i, ch) in ["a", "b", "c"].iter().enumerate() {
            renderer.put_text(ch, 0, i as u16, GraphicsRendition::default());
        }
        let output = finish(&mut renderer, RenderedCursor::default());
        // One move, one run.
        assert_eq!(output.matches("\x1b[1;1H").count(), 1);
        assert!(output.contains("abc"));
        assert_eq!(output.matches('H').count(), 1);
    }

    #[test]
    fn test_bound_clips_writes() {
        let mut renderer = start(4, 8);
        finish(&mut renderer, RenderedCursor::default());

        renderer.start(WindowSize::new(4, 8));
        renderer.set_bound(1, 2, 3, 2);
        renderer.put_text("x", 0, 0, GraphicsRendition::default());
        // Outside the 2x3 bound: dropped.
        renderer.put_text("y", 0, 3, GraphicsRendition::default());
        renderer.put_text("z", 2, 0, GraphicsRendition::default());
        let output = finish(&mut renderer, RenderedCursor::default());

        assert!(output.contains("\x1b[2;3H"));
        assert!(output.contains('x'));
        assert!(!output.contains('y'));
        assert!(!output.contains('z'));
    }

    #[test]
    fn test_sgr_changes_emitted_once_per_run() {
        let red = GraphicsRendition {
            fg: Color::Indexed(1),
            ..Default::default()
        };
        let mut renderer = start(1, 4);
        finish(&mut renderer, RenderedCursor::default());

        renderer.start(WindowSize::new(1, 4));
        renderer.put_text("a", 0, 0, red);
        renderer.put_text("b", 0, 1, red);
        let output = finish(&mut renderer, RenderedCursor::default());
        assert_eq!(output.matches("\x1b[0;31m").count(), 1);
        // Reset appended since the run left a non-default rendition.
        assert!(output.ends_with("\x1b[0m\x1b[?2026l"));
    }

    #[test]
    fn test_cursor_placement() {
        let mut renderer = start(4, 4);
        let cursor = RenderedCursor {
            cursor_row: 2,
            cursor_col: 3,
            style: CursorStyle::SteadyBar,
            hidden: false,
        };
        let output = finish(&mut renderer, cursor);
        assert!(output.contains("\x1b[3;4H\x1b[6 q\x1b[?25h"));
    }
}
