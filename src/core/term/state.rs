//! Terminal state management.
//!
//! The virtual terminal driven by parsed escape-sequence events: an
//! addressable cell grid with scrollback above and below the viewport,
//! scroll margins, the DEC private modes, and the ability to serialize its
//! own observable state back into a byte stream of escape sequences.

use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use super::params::Params;
use super::parser::{
    ControlCharacter, Csi, Dcs, Escape, Osc, ParserResult, PrintableCharacter,
};
use super::rendition::GraphicsRendition;

/// A terminal size in cells and pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowSize {
    pub rows: u16,
    pub cols: u16,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl WindowSize {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }
    }

    pub fn with_pixels(rows: u16, cols: u16, pixel_width: u32, pixel_height: u32) -> Self {
        Self {
            rows,
            cols,
            pixel_width,
            pixel_height,
        }
    }
}

/// A single grid position.
///
/// `text` is normally one code point; zero-width combining marks are
/// appended to the cell they modify.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub rendition: GraphicsRendition,
    pub dirty: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            text: " ".into(),
            rendition: GraphicsRendition::default(),
            dirty: true,
        }
    }
}

/// One screen row.
pub type Row = Vec<Cell>;

/// Cursor style selected by DECSCUSR.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorStyle {
    #[default]
    BlinkingBlock = 1,
    SteadyBlock = 2,
    BlinkingUnderline = 3,
    SteadyUnderline = 4,
    BlinkingBar = 5,
    SteadyBar = 6,
}

impl CursorStyle {
    /// Create from a DECSCUSR parameter; 0 folds to 1.
    pub fn from_decscusr(param: u32) -> Option<Self> {
        match param {
            0 | 1 => Some(CursorStyle::BlinkingBlock),
            2 => Some(CursorStyle::SteadyBlock),
            3 => Some(CursorStyle::BlinkingUnderline),
            4 => Some(CursorStyle::SteadyUnderline),
            5 => Some(CursorStyle::BlinkingBar),
            6 => Some(CursorStyle::SteadyBar),
            _ => None,
        }
    }

    pub fn to_decscusr(self) -> u32 {
        self as u32
    }
}

/// Which mouse events the child has asked to receive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseProtocol {
    #[default]
    None,
    X10,
    Vt200,
    BtnEvent,
    AnyEvent,
}

/// How mouse reports are encoded on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseEncoding {
    #[default]
    X10,
    Utf8,
    Sgr,
    Urxvt,
    SgrPixels,
}

bitflags! {
    /// Kitty keyboard-protocol progressive enhancement flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct KeyReportingFlags: u32 {
        const DISAMBIGUATE = 1;
        const REPORT_EVENT_TYPES = 2;
        const REPORT_ALTERNATE_KEYS = 4;
        const REPORT_ALL_KEYS_AS_ESCAPE_CODES = 8;
        const REPORT_ASSOCIATED_TEXT = 16;
    }
}

/// Events produced by the terminal for its owner to act on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalEvent {
    /// OSC 52: the child set the clipboard to these bytes.
    SetClipboard(Vec<u8>),
}

/// The terminal emulator.
#[derive(Clone)]
pub struct Terminal {
    row_count: u16,
    col_count: u16,
    xpixels: u32,
    ypixels: u32,
    /// The size offered by the layout; differs from the active size while a
    /// column mode or forced size is in effect.
    available: WindowSize,

    rows: Vec<Row>,
    rows_above: Vec<Row>,
    rows_below: Vec<Row>,

    cursor_row: u16,
    cursor_col: u16,
    saved_cursor_row: u16,
    saved_cursor_col: u16,
    x_overflow: bool,
    cursor_hidden: bool,
    cursor_style: CursorStyle,

    scroll_start: u16,
    scroll_end: u16,
    tab_stops: Vec<u16>,

    current_rendition: GraphicsRendition,

    origin_mode: bool,
    autowrap_mode: bool,
    application_cursor_keys_mode: bool,
    alternate_scroll_mode: bool,
    focus_event_mode: bool,
    bracketed_paste_mode: bool,
    mouse_protocol: MouseProtocol,
    mouse_encoding: MouseEncoding,
    key_reporting_flags: KeyReportingFlags,
    key_reporting_flags_stack: Vec<KeyReportingFlags>,

    allow_80_132_col_mode: bool,
    col_mode_80: bool,
    col_mode_132: bool,
    allow_force_terminal_size: bool,
    force_terminal_size: bool,
    disable_drawing: bool,

    save_state: Option<Box<Terminal>>,

    outgoing_events: Vec<TerminalEvent>,
    replies: Vec<u8>,
}

impl Terminal {
    pub fn new(size: WindowSize) -> Self {
        let rows = size.rows.max(1);
        let cols = size.cols.max(1);
        Self {
            row_count: rows,
            col_count: cols,
            xpixels: size.pixel_width,
            ypixels: size.pixel_height,
            available: size,
            rows: (0..rows).map(|_| blank_row(cols)).collect(),
            rows_above: Vec::new(),
            rows_below: Vec::new(),
            cursor_row: 0,
            cursor_col: 0,
            saved_cursor_row: 0,
            saved_cursor_col: 0,
            x_overflow: false,
            cursor_hidden: false,
            cursor_style: CursorStyle::default(),
            scroll_start: 0,
            scroll_end: rows - 1,
            tab_stops: default_tab_stops(cols),
            current_rendition: GraphicsRendition::default(),
            origin_mode: false,
            autowrap_mode: true,
            application_cursor_keys_mode: false,
            alternate_scroll_mode: false,
            focus_event_mode: false,
            bracketed_paste_mode: false,
            mouse_protocol: MouseProtocol::None,
            mouse_encoding: MouseEncoding::X10,
            key_reporting_flags: KeyReportingFlags::empty(),
            key_reporting_flags_stack: Vec::new(),
            allow_80_132_col_mode: false,
            col_mode_80: false,
            col_mode_132: false,
            allow_force_terminal_size: false,
            force_terminal_size: false,
            disable_drawing: false,
            save_state: None,
            outgoing_events: Vec::new(),
            replies: Vec::new(),
        }
    }

    // --- Accessors -------------------------------------------------------

    pub fn size(&self) -> WindowSize {
        WindowSize {
            rows: self.row_count,
            cols: self.col_count,
            pixel_width: self.xpixels,
            pixel_height: self.ypixels,
        }
    }

    #[allow(dead_code)]
    pub fn visible_size(&self) -> WindowSize {
        self.available
    }

    pub fn row_count(&self) -> u16 {
        self.row_count
    }

    pub fn col_count(&self) -> u16 {
        self.col_count
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn cursor_row(&self) -> u16 {
        self.cursor_row
    }

    pub fn cursor_col(&self) -> u16 {
        self.cursor_col
    }

    pub fn cursor_style(&self) -> CursorStyle {
        self.cursor_style
    }

    pub fn cursor_hidden(&self) -> bool {
        self.cursor_hidden
    }

    pub fn allowed_to_draw(&self) -> bool {
        !self.disable_drawing
    }

    pub fn in_alternate_screen_buffer(&self) -> bool {
        self.save_state.is_some()
    }

    pub fn application_cursor_keys_mode(&self) -> bool {
        self.application_cursor_keys_mode
    }

    pub fn alternate_scroll_mode(&self) -> bool {
        self.alternate_scroll_mode
    }

    pub fn focus_event_mode(&self) -> bool {
        self.focus_event_mode
    }

    pub fn bracketed_paste_mode(&self) -> bool {
        self.bracketed_paste_mode
    }

    pub fn mouse_protocol(&self) -> MouseProtocol {
        self.mouse_protocol
    }

    pub fn mouse_encoding(&self) -> MouseEncoding {
        self.mouse_encoding
    }

    pub fn key_reporting_flags(&self) -> KeyReportingFlags {
        self.key_reporting_flags
    }

    pub fn set_allow_force_terminal_size(&mut self, allow: bool) {
        self.allow_force_terminal_size = allow;
    }

    /// Drain queued outgoing events (clipboard sets).
    pub fn take_outgoing_events(&mut self) -> Vec<TerminalEvent> {
        std::mem::take(&mut self.outgoing_events)
    }

    /// Drain bytes the terminal wants written back to the child.
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }

    // --- Event dispatch --------------------------------------------------

    pub fn on_parser_results(&mut self, results: &[ParserResult]) {
        for result in results {
            self.on_parser_result(result);
        }
    }

    pub fn on_parser_result(&mut self, result: &ParserResult) {
        match result {
            ParserResult::Printable(printable) => self.on_printable(printable),
            ParserResult::Control(control) => self.on_control(control),
            ParserResult::Csi(csi) => self.on_csi(csi),
            ParserResult::Escape(escape) => self.on_escape(escape),
            ParserResult::Dcs(dcs) => self.on_dcs(dcs),
            ParserResult::Osc(osc) => self.on_osc(osc),
            ParserResult::Apc(_) => {}
        }
    }

    fn on_printable(&mut self, printable: &PrintableCharacter) {
        let code = printable.code_point as u32;
        if code < 0x7F || code > 0x9F {
            self.put_char(printable.code_point);
        }
    }

    fn on_control(&mut self, control: &ControlCharacter) {
        match control.code_point {
            '\x08' => self.c0_bs(),
            '\x07' => {}
            '\t' => self.c0_ht(),
            '\n' | '\x0b' | '\x0c' => self.c0_lf(),
            '\r' => self.c0_cr(),
            _ => {}
        }
    }

    fn on_csi(&mut self, csi: &Csi) {
        match (csi.intermediate.as_str(), csi.terminator) {
            ("?$", 'p') => self.csi_decrqm(&csi.params),
            ("=", 'c') => self.csi_da3(&csi.params),
            ("=", 'u') => self.csi_set_key_reporting_flags(&csi.params),
            (">", 'c') => self.csi_da2(&csi.params),
            (">", 'u') => self.csi_push_key_reporting_flags(&csi.params),
            ("<", 'u') => self.csi_pop_key_reporting_flags(&csi.params),
            ("?", 'h') => self.csi_decset(&csi.params),
            ("?", 'l') => self.csi_decrst(&csi.params),
            ("?", 'u') => self.csi_get_key_reporting_flags(&csi.params),
            (" ", 'q') => self.csi_decscusr(&csi.params),
            ("", '@') => self.csi_ich(&csi.params),
            ("", 'A') => self.csi_cuu(&csi.params),
            ("", 'B') => self.csi_cud(&csi.params),
            ("", 'C') => self.csi_cuf(&csi.params),
            ("", 'D') => self.csi_cub(&csi.params),
            ("", 'G') => self.csi_cha(&csi.params),
            ("", 'H') => self.csi_cup(&csi.params),
            ("", 'J') => self.csi_ed(&csi.params),
            ("", 'K') => self.csi_el(&csi.params),
            ("", 'L') => self.csi_il(&csi.params),
            ("", 'M') => self.csi_dl(&csi.params),
            ("", 'P') => self.csi_dch(&csi.params),
            ("", 'S') => self.csi_su(&csi.params),
            ("", 'T') => self.csi_sd(&csi.params),
            ("", 'X') => self.csi_ech(&csi.params),
            ("", 'b') => self.csi_rep(&csi.params),
            ("", 'c') => self.csi_da1(&csi.params),
            ("", 'd') => self.csi_vpa(&csi.params),
            ("", 'f') => self.csi_cup(&csi.params),
            ("", 'g') => self.csi_tbc(&csi.params),
            ("", 'm') => self.csi_sgr(&csi.params),
            ("", 'n') => self.csi_dsr(&csi.params),
            ("", 'r') => self.csi_decstbm(&csi.params),
            ("", 's') => self.save_pos(),
            ("", 't') => self.csi_xtwinops(&csi.params),
            ("", 'u') => self.restore_pos(),
            _ => {
                tracing::debug!(
                    intermediate = %csi.intermediate,
                    terminator = %csi.terminator,
                    "unhandled CSI"
                );
            }
        }
    }

    fn on_escape(&mut self, escape: &Escape) {
        if escape.intermediate == "#" {
            if escape.terminator == '8' {
                self.esc_decaln();
            }
            return;
        }
        if !escape.intermediate.is_empty() {
            return;
        }
        match escape.terminator {
            '7' => self.save_pos(),
            '8' => self.restore_pos(),
            'c' => self.esc_ris(),
            // 8-bit control characters spelled as ESC sequences.
            'D' => self.c1_ind(),
            'E' => self.c1_nel(),
            'H' => self.c1_hts(),
            'M' => self.c1_ri(),
            _ => {}
        }
    }

    fn on_dcs(&mut self, dcs: &Dcs) {
        if dcs.intermediate == "$" && dcs.terminator == 'q' {
            self.dcs_decrqss(&dcs.params, &dcs.data);
        }
    }

    fn on_osc(&mut self, osc: &Osc) {
        let Some(ps_end) = osc.data.find(';') else {
            return;
        };
        let (ps, rest) = osc.data.split_at(ps_end);
        if ps == "52" {
            self.osc_52(&rest[1..]);
        }
    }

    // --- C0 / C1 ---------------------------------------------------------

    fn c0_bs(&mut self) {
        if self.cursor_col > 0 {
            self.cursor_col -= 1;
        }
        self.x_overflow = false;
    }

    fn c0_ht(&mut self) {
        for &stop in &self.tab_stops {
            if stop > self.cursor_col {
                self.set_cursor(self.cursor_row, stop);
                return;
            }
        }
        self.set_cursor(self.cursor_row, self.col_count - 1);
    }

    fn c0_lf(&mut self) {
        self.x_overflow = false;
        if self.cursor_row == self.scroll_end {
            self.scroll_down_if_needed();
        } else if self.cursor_row + 1 < self.row_count {
            self.cursor_row += 1;
        }
    }

    fn c0_cr(&mut self) {
        self.cursor_col = 0;
        self.x_overflow = false;
    }

    fn c1_ind(&mut self) {
        self.c0_lf();
    }

    fn c1_nel(&mut self) {
        self.c0_cr();
        self.c0_lf();
    }

    fn c1_hts(&mut self) {
        if self.tab_stops.contains(&self.cursor_col) {
            return;
        }
        let index = self
            .tab_stops
            .iter()
            .position(|&stop| self.cursor_col < stop)
            .unwrap_or(self.tab_stops.len());
        self.tab_stops.insert(index, self.cursor_col);
    }

    fn c1_ri(&mut self) {
        self.x_overflow = false;
        if self.cursor_row == self.scroll_start {
            self.scroll_up_if_needed();
        } else if self.cursor_row > 0 {
            self.cursor_row -= 1;
        }
    }

    // --- ESC sequences ---------------------------------------------------

    fn esc_decaln(&mut self) {
        self.clear_with('E');
        self.set_cursor(0, 0);
    }

    fn esc_ris(&mut self) {
        let mut fresh = Terminal::new(self.size());
        fresh.available = self.available;
        fresh.allow_force_terminal_size = self.allow_force_terminal_size;
        fresh.outgoing_events = std::mem::take(&mut self.outgoing_events);
        fresh.replies = std::mem::take(&mut self.replies);
        *self = fresh;
    }

    fn save_pos(&mut self) {
        self.saved_cursor_row = self.cursor_row;
        self.saved_cursor_col = self.cursor_col;
    }

    fn restore_pos(&mut self) {
        self.set_cursor(self.saved_cursor_row, self.saved_cursor_col);
    }

    // --- CSI handlers ----------------------------------------------------

    fn csi_ich(&mut self, params: &Params) {
        self.x_overflow = false;
        let cols = self.col_count as usize;
        let col = self.cursor_col as usize;
        let n = (params.get_or(0, 1).max(1) as usize).min(cols - col);
        let row = &mut self.rows[self.cursor_row as usize];
        row[col..].rotate_right(n);
        for cell in &mut row[col..col + n] {
            *cell = Cell::default();
        }
        for cell in &mut row[col..] {
            cell.dirty = true;
        }
    }

    fn csi_dch(&mut self, params: &Params) {
        self.x_overflow = false;
        let cols = self.col_count as usize;
        let col = self.cursor_col as usize;
        let n = (params.get_or(0, 1).max(1) as usize).min(cols - col);
        let row = &mut self.rows[self.cursor_row as usize];
        row[col..].rotate_left(n);
        for cell in &mut row[cols - n..] {
            *cell = Cell::default();
        }
        for cell in &mut row[col..] {
            cell.dirty = true;
        }
    }

    fn csi_ech(&mut self, params: &Params) {
        let n = params.get_or(0, 1).max(1);
        let row = self.cursor_row;
        for i in 0..n {
            let col = self.cursor_col as u32 + i;
            if col >= u32::from(self.col_count) {
                break;
            }
            self.put_cell(row, col as u16, ' ');
        }
    }

    fn csi_rep(&mut self, params: &Params) {
        let preceding = if self.cursor_col == 0 {
            if self.cursor_row != 0 {
                self.rows[self.cursor_row as usize - 1][self.col_count as usize - 1]
                    .text
                    .chars()
                    .next()
                    .unwrap_or(' ')
            } else {
                ' '
            }
        } else {
            self.rows[self.cursor_row as usize][self.cursor_col as usize - 1]
                .text
                .chars()
                .next()
                .unwrap_or(' ')
        };
        for _ in 0..params.get(0) {
            self.put_char(preceding);
        }
    }

    fn csi_cuu(&mut self, params: &Params) {
        let delta = params.get_or(0, 1).max(1).min(u32::from(u16::MAX)) as u16;
        self.set_cursor(self.cursor_row.saturating_sub(delta), self.cursor_col);
    }

    fn csi_cud(&mut self, params: &Params) {
        let delta = params.get_or(0, 1).max(1).min(u32::from(u16::MAX)) as u16;
        self.set_cursor(self.cursor_row.saturating_add(delta), self.cursor_col);
    }

    fn csi_cuf(&mut self, params: &Params) {
        let delta = params.get_or(0, 1).max(1).min(u32::from(u16::MAX)) as u16;
        self.set_cursor(self.cursor_row, self.cursor_col.saturating_add(delta));
    }

    fn csi_cub(&mut self, params: &Params) {
        let delta = params.get_or(0, 1).max(1).min(u32::from(u16::MAX)) as u16;
        self.set_cursor(self.cursor_row, self.cursor_col.saturating_sub(delta));
    }

    fn csi_cup(&mut self, params: &Params) {
        let row = self.translate_row(params.get_or(0, 1));
        let col = self.translate_col(params.get_or(1, 1));
        self.set_cursor(row, col);
    }

    fn csi_cha(&mut self, params: &Params) {
        let col = self.translate_col(params.get_or(0, 1));
        self.set_cursor(self.cursor_row, col);
    }

    fn csi_vpa(&mut self, params: &Params) {
        let row = self.translate_row(params.get_or(0, 1));
        self.set_cursor(row, self.cursor_col);
    }

    fn csi_ed(&mut self, params: &Params) {
        match params.get(0) {
            0 => self.clear_below_cursor(' '),
            1 => self.clear_above_cursor(' '),
            2 => self.clear_with(' '),
            3 => {
                // XTerm extension: also drop the scrollback.
                self.rows_above.clear();
                self.rows_below.clear();
                self.clear_with(' ');
            }
            _ => {}
        }
    }

    fn csi_el(&mut self, params: &Params) {
        match params.get(0) {
            0 => self.clear_row_to_end(self.cursor_row, self.cursor_col, ' '),
            1 => self.clear_row_until(self.cursor_row, self.cursor_col, ' '),
            2 => self.clear_row(self.cursor_row, ' '),
            _ => {}
        }
    }

    fn csi_il(&mut self, params: &Params) {
        if self.cursor_row < self.scroll_start || self.cursor_row > self.scroll_end {
            return;
        }
        let n = params.get_or(0, 1).max(1);
        let start = self.cursor_row as usize;
        let end = self.scroll_end as usize;
        let cols = self.col_count;
        for _ in 0..n {
            self.rows[start..=end].rotate_right(1);
            self.rows[start] = blank_row(cols);
        }
        self.invalidate_all();
    }

    fn csi_dl(&mut self, params: &Params) {
        if self.cursor_row < self.scroll_start || self.cursor_row > self.scroll_end {
            return;
        }
        let max = u32::from(self.scroll_end - self.cursor_row).max(1);
        let n = params.get_or(0, 1).clamp(1, max);
        let start = self.cursor_row as usize;
        let end = self.scroll_end as usize;
        let cols = self.col_count;
        for _ in 0..n {
            self.rows[start..=end].rotate_left(1);
            self.rows[end] = blank_row(cols);
        }
        self.invalidate_all();
    }

    fn csi_su(&mut self, params: &Params) {
        for _ in 0..params.get_or(0, 1).max(1) {
            self.scroll_content_up();
        }
    }

    fn csi_sd(&mut self, params: &Params) {
        for _ in 0..params.get_or(0, 1).max(1) {
            self.scroll_content_down();
        }
    }

    fn csi_sgr(&mut self, params: &Params) {
        self.current_rendition.update_with_csi_params(params);
    }

    fn csi_dsr(&mut self, params: &Params) {
        match params.get(0) {
            5 => self.reply(b"\x1b[0n".to_vec()),
            6 => {
                let reply = format!("\x1b[{};{}R", self.cursor_row + 1, self.cursor_col + 1);
                self.reply(reply.into_bytes());
            }
            _ => {}
        }
    }

    fn csi_da1(&mut self, params: &Params) {
        if params.get(0) != 0 {
            return;
        }
        self.reply(b"\x1b[?1;0c".to_vec());
    }

    fn csi_da2(&mut self, params: &Params) {
        if params.get(0) != 0 {
            return;
        }
        self.reply(b"\x1b[>010;0c".to_vec());
    }

    fn csi_da3(&mut self, params: &Params) {
        if params.get(0) != 0 {
            return;
        }
        self.reply(b"\x1bP!|00000000\x1b\\".to_vec());
    }

    fn csi_tbc(&mut self, params: &Params) {
        match params.get(0) {
            0 => {
                let col = self.cursor_col;
                self.tab_stops.retain(|&stop| stop != col);
            }
            3 => self.tab_stops.clear(),
            _ => {}
        }
    }

    fn csi_decstbm(&mut self, params: &Params) {
        let new_start = (params.get_or(0, 1).saturating_sub(1)).min(u32::from(self.row_count - 1));
        let new_end = (params
            .get_or(1, u32::from(self.row_count))
            .saturating_sub(1))
        .min(u32::from(self.row_count - 1));
        if new_end <= new_start {
            return;
        }
        self.scroll_start = new_start as u16;
        self.scroll_end = new_end as u16;
        self.set_cursor(0, 0);
    }

    fn csi_decscusr(&mut self, params: &Params) {
        if let Some(style) = CursorStyle::from_decscusr(params.get(0)) {
            self.cursor_style = style;
        }
    }

    fn csi_decset(&mut self, params: &Params) {
        match params.get(0) {
            1 => self.application_cursor_keys_mode = true,
            3 => {
                if self.allow_80_132_col_mode {
                    self.col_mode_80 = false;
                    self.col_mode_132 = true;
                    let pixel_width =
                        self.available.pixel_width * 132 / u32::from(self.available.cols.max(1));
                    self.resize(WindowSize {
                        rows: self.row_count,
                        cols: 132,
                        pixel_width,
                        pixel_height: self.ypixels,
                    });
                    self.clear_with(' ');
                    self.csi_decstbm(&Params::new());
                }
            }
            6 => {
                self.origin_mode = true;
                self.set_cursor(self.cursor_row, self.cursor_col);
            }
            7 => self.autowrap_mode = true,
            9 => self.mouse_protocol = MouseProtocol::X10,
            25 => self.cursor_hidden = false,
            40 => self.allow_80_132_col_mode = true,
            1000 => self.mouse_protocol = MouseProtocol::Vt200,
            1002 => self.mouse_protocol = MouseProtocol::BtnEvent,
            1003 => self.mouse_protocol = MouseProtocol::AnyEvent,
            1004 => self.focus_event_mode = true,
            1005 => self.mouse_encoding = MouseEncoding::Utf8,
            1006 => self.mouse_encoding = MouseEncoding::Sgr,
            1007 => self.alternate_scroll_mode = true,
            1015 => self.mouse_encoding = MouseEncoding::Urxvt,
            1016 => self.mouse_encoding = MouseEncoding::SgrPixels,
            1049 => self.set_use_alternate_screen_buffer(true),
            2004 => self.bracketed_paste_mode = true,
            2026 => self.disable_drawing = true,
            mode => tracing::debug!(mode, "unhandled DECSET"),
        }
    }

    fn csi_decrst(&mut self, params: &Params) {
        match params.get(0) {
            1 => self.application_cursor_keys_mode = false,
            3 => {
                if self.allow_80_132_col_mode {
                    self.col_mode_80 = true;
                    self.col_mode_132 = false;
                    let pixel_width =
                        self.available.pixel_width * 80 / u32::from(self.available.cols.max(1));
                    self.resize(WindowSize {
                        rows: self.row_count,
                        cols: 80,
                        pixel_width,
                        pixel_height: self.ypixels,
                    });
                    self.clear_with(' ');
                    self.csi_decstbm(&Params::new());
                }
            }
            6 => self.origin_mode = false,
            7 => self.autowrap_mode = false,
            9 => self.mouse_protocol = MouseProtocol::None,
            25 => self.cursor_hidden = true,
            40 => {
                self.allow_80_132_col_mode = false;
                if self.col_mode_80 || self.col_mode_132 {
                    self.col_mode_80 = false;
                    self.col_mode_132 = false;
                    self.resize(self.available);
                }
            }
            1000 | 1002 | 1003 => self.mouse_protocol = MouseProtocol::None,
            1004 => self.focus_event_mode = false,
            1005 | 1006 | 1015 | 1016 => self.mouse_encoding = MouseEncoding::X10,
            1007 => self.alternate_scroll_mode = false,
            1049 => self.set_use_alternate_screen_buffer(false),
            2004 => self.bracketed_paste_mode = false,
            2026 => self.disable_drawing = false,
            mode => tracing::debug!(mode, "unhandled DECRST"),
        }
    }

    fn csi_decrqm(&mut self, params: &Params) {
        let mode = params.get(0);
        let reply = match mode {
            2026 => format!(
                "\x1b[?{};{}$y",
                mode,
                if self.disable_drawing { 1 } else { 2 }
            ),
            _ => format!("\x1b[?{};0$y", mode),
        };
        self.reply(reply.into_bytes());
    }

    fn csi_xtwinops(&mut self, params: &Params) {
        match params.get(0) {
            4 => {
                if !self.allow_force_terminal_size {
                    return;
                }
                let mut height = params.get_or(1, self.ypixels).min(100_000);
                let mut width = params.get_or(2, self.xpixels).min(100_000);
                if height == 0 {
                    height = self.available.pixel_height;
                }
                if width == 0 {
                    width = self.available.pixel_width;
                }
                self.ypixels = height;
                self.xpixels = width;
            }
            8 => {
                if !self.allow_force_terminal_size {
                    return;
                }
                // Resizes the internal grid only; the visible area stays
                // whatever the layout granted us.
                let mut rows = params.get_or(1, u32::from(self.row_count)).min(1000);
                let mut cols = params.get_or(2, u32::from(self.col_count)).min(1000);
                self.force_terminal_size = rows != 0 || cols != 0;
                if rows == 0 {
                    rows = u32::from(self.available.rows);
                }
                if cols == 0 {
                    cols = u32::from(self.available.cols);
                }
                self.resize(WindowSize {
                    rows: rows as u16,
                    cols: cols as u16,
                    pixel_width: self.xpixels,
                    pixel_height: self.ypixels,
                });
                self.clear_with(' ');
                self.csi_decstbm(&Params::new());
            }
            _ => {}
        }
    }

    fn csi_set_key_reporting_flags(&mut self, params: &Params) {
        let flags = KeyReportingFlags::from_bits_truncate(params.get(0));
        match params.get_or(1, 1) {
            1 => self.key_reporting_flags = flags,
            2 => self.key_reporting_flags |= flags,
            3 => self.key_reporting_flags &= !flags,
            _ => {}
        }
    }

    fn csi_get_key_reporting_flags(&mut self, _params: &Params) {
        let reply = format!("\x1b[?{}u", self.key_reporting_flags.bits());
        self.reply(reply.into_bytes());
    }

    fn csi_push_key_reporting_flags(&mut self, params: &Params) {
        let flags = KeyReportingFlags::from_bits_truncate(params.get(0));
        if self.key_reporting_flags_stack.len() >= 100 {
            self.key_reporting_flags_stack.remove(0);
        }
        self.key_reporting_flags_stack.push(self.key_reporting_flags);
        self.key_reporting_flags = flags;
    }

    fn csi_pop_key_reporting_flags(&mut self, params: &Params) {
        let n = params.get_or(0, 1) as usize;
        if n >= self.key_reporting_flags_stack.len() {
            self.key_reporting_flags_stack.clear();
            self.key_reporting_flags = KeyReportingFlags::empty();
            return;
        }
        let new_len = self.key_reporting_flags_stack.len() - n;
        self.key_reporting_flags = self.key_reporting_flags_stack[new_len];
        self.key_reporting_flags_stack.truncate(new_len);
    }

    // --- DCS / OSC -------------------------------------------------------

    fn dcs_decrqss(&mut self, _params: &Params, data: &str) {
        if data == "m" {
            let reply = format!("\x1bP1$r{}m\x1b\\", self.current_rendition.as_csi_params());
            self.reply(reply.into_bytes());
        } else {
            self.reply(b"\x1bP0$r\x1b\\".to_vec());
        }
    }

    fn osc_52(&mut self, data: &str) {
        // Data is of the form: Pc ; Pd
        let Some(pc_end) = data.find(';') else {
            return;
        };
        let pd = &data[pc_end + 1..];
        if pd == "?" {
            // TODO: respond with the actual clipboard contents.
            return;
        }
        if let Ok(bytes) = BASE64.decode(pd) {
            self.outgoing_events.push(TerminalEvent::SetClipboard(bytes));
        }
    }

    // --- Cursor and sizing -----------------------------------------------

    fn set_cursor(&mut self, row: u16, col: u16) {
        self.cursor_row = row.clamp(self.min_row(), self.max_row());
        self.cursor_col = col.min(self.col_count - 1);
        self.x_overflow = false;
    }

    fn min_row(&self) -> u16 {
        if self.origin_mode {
            self.scroll_start
        } else {
            0
        }
    }

    fn max_row(&self) -> u16 {
        if self.origin_mode {
            self.scroll_end
        } else {
            self.row_count - 1
        }
    }

    fn translate_row(&self, wire_row: u32) -> u16 {
        let row = wire_row.saturating_sub(1).min(u32::from(u16::MAX)) as u16;
        if self.origin_mode {
            row.saturating_add(self.scroll_start)
        } else {
            row
        }
    }

    fn translate_col(&self, wire_col: u32) -> u16 {
        wire_col.saturating_sub(1).min(u32::from(u16::MAX)) as u16
    }

    /// Adopt a new size from the layout. Has no effect on the grid while a
    /// column mode or forced size is active.
    pub fn set_visible_size(&mut self, size: WindowSize) {
        if self.available == size {
            return;
        }
        self.available = size;
        if !self.col_mode_80 && !self.col_mode_132 && !self.force_terminal_size {
            self.resize(size);
        }
    }

    pub fn resize(&mut self, size: WindowSize) {
        let rows = size.rows.max(1);
        let cols = size.cols.max(1);
        self.row_count = rows;
        self.col_count = cols;
        self.xpixels = size.pixel_width;
        self.ypixels = size.pixel_height;

        self.rows.resize_with(rows as usize, || blank_row(cols));
        for row in &mut self.rows {
            row.resize_with(cols as usize, Cell::default);
        }
        for row in &mut self.rows_above {
            row.resize_with(cols as usize, Cell::default);
        }
        for row in &mut self.rows_below {
            row.resize_with(cols as usize, Cell::default);
        }

        self.tab_stops = default_tab_stops(cols);

        // Invalid margins make the scroll rotations panic on overflow.
        self.scroll_start = 0;
        self.scroll_end = rows - 1;
        self.csi_decstbm(&Params::new());

        self.set_cursor(self.cursor_row.min(rows - 1), self.cursor_col.min(cols - 1));
        self.invalidate_all();
    }

    pub fn invalidate_all(&mut self) {
        for row in &mut self.rows {
            for cell in row {
                cell.dirty = true;
            }
        }
    }

    // --- Cell writes -----------------------------------------------------

    fn put_cell(&mut self, row: u16, col: u16, c: char) {
        let cell = &mut self.rows[row as usize][col as usize];
        cell.text.clear();
        cell.text.push(c);
        cell.rendition = self.current_rendition;
        cell.dirty = true;
    }

    fn put_char(&mut self, c: char) {
        let code = c as u32;
        if code <= 31 || code == 127 {
            // Render stray controls in caret notation.
            self.put_char('^');
            let caret = if code == 127 {
                '?'
            } else {
                char::from_u32(code | 0x40).unwrap_or('?')
            };
            self.put_char(caret);
            return;
        }

        if UnicodeWidthChar::width(c) == Some(0) {
            self.append_zero_width(c);
            return;
        }

        // Writing output snaps the view back to the live screen.
        if !self.rows_below.is_empty() {
            self.scroll_to_bottom();
        }

        if self.x_overflow {
            self.x_overflow = false;
            self.cursor_col = 0;
            if self.cursor_row == self.scroll_end {
                self.scroll_down_if_needed();
            } else if self.cursor_row + 1 < self.row_count {
                self.cursor_row += 1;
            }
        }

        self.put_cell(self.cursor_row, self.cursor_col, c);

        self.cursor_col += 1;
        if self.cursor_col >= self.col_count {
            self.x_overflow = self.autowrap_mode;
            self.cursor_col -= 1;
        }
    }

    fn append_zero_width(&mut self, c: char) {
        let col = if self.x_overflow {
            self.cursor_col
        } else if self.cursor_col > 0 {
            self.cursor_col - 1
        } else {
            return;
        };
        let cell = &mut self.rows[self.cursor_row as usize][col as usize];
        cell.text.push(c);
        cell.dirty = true;
    }

    fn clear_below_cursor(&mut self, ch: char) {
        self.clear_row_to_end(self.cursor_row, self.cursor_col, ch);
        for row in self.cursor_row + 1..self.row_count {
            self.clear_row(row, ch);
        }
    }

    fn clear_above_cursor(&mut self, ch: char) {
        for row in 0..self.cursor_row {
            self.clear_row(row, ch);
        }
        self.clear_row_until(self.cursor_row, self.cursor_col, ch);
    }

    fn clear_with(&mut self, ch: char) {
        for row in 0..self.row_count {
            self.clear_row(row, ch);
        }
    }

    fn clear_row(&mut self, row: u16, ch: char) {
        self.clear_row_to_end(row, 0, ch);
    }

    fn clear_row_until(&mut self, row: u16, end_col: u16, ch: char) {
        for col in 0..=end_col.min(self.col_count - 1) {
            self.put_cell(row, col, ch);
        }
    }

    fn clear_row_to_end(&mut self, row: u16, start_col: u16, ch: char) {
        for col in start_col..self.col_count {
            self.put_cell(row, col, ch);
        }
    }

    // --- Scrolling and scrollback ----------------------------------------

    /// Scroll the view one line toward the history (wheel up).
    pub fn scroll_up(&mut self) {
        if self.rows_above.is_empty() {
            return;
        }
        let start = self.scroll_start as usize;
        let end = self.scroll_end as usize;
        self.rows[start..=end].rotate_right(1);
        let evicted = std::mem::replace(&mut self.rows[start], self.rows_above.pop().unwrap());
        self.rows_below.push(evicted);
        self.invalidate_all();
    }

    /// Scroll the view one line toward the live screen (wheel down).
    pub fn scroll_down(&mut self) {
        if self.rows_below.is_empty() {
            return;
        }
        let start = self.scroll_start as usize;
        let end = self.scroll_end as usize;
        self.rows[start..=end].rotate_left(1);
        let evicted = std::mem::replace(&mut self.rows[end], self.rows_below.pop().unwrap());
        self.rows_above.push(evicted);
        self.invalidate_all();
    }

    pub fn scroll_to_bottom(&mut self) {
        while !self.rows_below.is_empty() {
            self.scroll_down();
        }
    }

    /// The cursor needs a fresh line below the scroll region.
    fn scroll_down_if_needed(&mut self) {
        self.cursor_row = self.cursor_row.clamp(self.scroll_start, self.scroll_end);
        self.scroll_content_up();
    }

    /// The cursor needs a fresh line above the scroll region.
    fn scroll_up_if_needed(&mut self) {
        self.cursor_row = self.cursor_row.clamp(self.scroll_start, self.scroll_end);
        self.scroll_content_down();
    }

    /// Rotate the scroll region up one line, feeding the evicted top row to
    /// the scrollback (or recycling a row the user scrolled past).
    fn scroll_content_up(&mut self) {
        if !self.rows_below.is_empty() {
            self.scroll_down();
            return;
        }
        let start = self.scroll_start as usize;
        let end = self.scroll_end as usize;
        let cols = self.col_count;
        self.rows[start..=end].rotate_left(1);
        let evicted = std::mem::replace(&mut self.rows[end], blank_row(cols));
        self.rows_above.push(evicted);
        self.invalidate_all();
        if self.scrollback_len() > self.row_count as usize + 1000 {
            self.rows_above.remove(0);
        }
    }

    /// Rotate the scroll region down one line (reverse index at the top).
    fn scroll_content_down(&mut self) {
        if !self.rows_above.is_empty() {
            self.scroll_up();
            return;
        }
        let start = self.scroll_start as usize;
        let end = self.scroll_end as usize;
        let cols = self.col_count;
        self.rows[start..=end].rotate_right(1);
        let evicted = std::mem::replace(&mut self.rows[start], blank_row(cols));
        self.rows_below.push(evicted);
        self.invalidate_all();
        if self.scrollback_len() > self.row_count as usize + 1000 {
            self.rows_below.remove(0);
        }
    }

    fn scrollback_len(&self) -> usize {
        self.rows_above.len() + self.rows_below.len()
    }

    fn total_rows(&self) -> usize {
        self.rows.len() + self.scrollback_len()
    }

    /// Map a display row into the scroll-relative row space that includes
    /// the scrollback on either side of the region.
    pub fn scroll_relative_offset(&self, display_row: u16) -> usize {
        let row = display_row as usize;
        if display_row < self.scroll_start {
            row
        } else if display_row > self.scroll_end {
            row + self.total_rows() - self.rows.len()
        } else {
            row + self.rows_above.len()
        }
    }

    pub fn row_at_scroll_relative_offset(&self, offset: usize) -> &Row {
        let start = self.scroll_start as usize;
        let above = self.rows_above.len();
        let region = (self.scroll_end - self.scroll_start) as usize;
        if offset < start {
            return &self.rows[offset];
        }
        if offset < start + above {
            return &self.rows_above[offset - start];
        }
        if offset < start + above + region {
            return &self.rows[offset - above];
        }
        if offset < start + above + region + self.rows_below.len() {
            return &self.rows_below[offset - start - above - region];
        }
        let index = (offset - self.rows_above.len() - self.rows_below.len())
            .min(self.rows.len() - 1);
        &self.rows[index]
    }

    // --- Alternate screen buffer -----------------------------------------

    fn set_use_alternate_screen_buffer(&mut self, enable: bool) {
        if enable == self.save_state.is_some() {
            return;
        }

        if enable {
            self.save_state = Some(Box::new(self.clone()));
            self.current_rendition = GraphicsRendition::default();
            self.x_overflow = false;
            self.cursor_hidden = false;
            self.cursor_row = 0;
            self.cursor_col = 0;
            self.saved_cursor_row = 0;
            self.saved_cursor_col = 0;
            self.rows_above.clear();
            self.rows_below.clear();
            self.clear_with(' ');
        } else if let Some(save) = self.save_state.take() {
            self.cursor_row = save.cursor_row;
            self.cursor_col = save.cursor_col;
            self.saved_cursor_row = save.saved_cursor_row;
            self.saved_cursor_col = save.saved_cursor_col;
            self.current_rendition = save.current_rendition;
            self.x_overflow = save.x_overflow;
            self.cursor_hidden = save.cursor_hidden;
            self.rows = save.rows;
            self.rows_above = save.rows_above;
            self.rows_below = save.rows_below;

            if self.row_count != save.row_count
                || self.col_count != save.col_count
                || self.xpixels != save.xpixels
                || self.ypixels != save.ypixels
            {
                self.resize(self.size());
            } else {
                self.invalidate_all();
            }
        }
    }

    // --- Replies ---------------------------------------------------------

    fn reply(&mut self, bytes: Vec<u8>) {
        self.replies.extend_from_slice(&bytes);
    }

    // --- State serialization ---------------------------------------------

    /// Serialize the observable state as a byte stream of escape sequences.
    /// Feeding the result to a fresh terminal of the same size (with forced
    /// sizing allowed) reconstructs the grid, cursor, and modes.
    pub fn state_as_escape_sequences(&self) -> String {
        let mut out = String::new();
        out.push_str("\x1bc");
        if let Some(save) = &self.save_state {
            // Main buffer first, then switch into the alternate buffer.
            save.state_as_escape_sequences_internal(&mut out);
            out.push_str("\x1b[?1049h");
        }
        self.state_as_escape_sequences_internal(&mut out);
        out
    }

    fn state_as_escape_sequences_internal(&self, out: &mut String) {
        // 1. Terminal size (the visible size is not reported in any way).
        let _ = write!(out, "\x1b[4;{};{}t", self.ypixels, self.xpixels);
        let _ = write!(out, "\x1b[8;{};{}t", self.row_count, self.col_count);
        if self.col_mode_80 || self.col_mode_132 {
            out.push_str("\x1b[?40h");
            out.push_str(if self.col_mode_80 {
                "\x1b[?3l"
            } else {
                "\x1b[?3h"
            });
            out.push_str("\x1b[?40l");
        }

        // 2. Cell contents, with autowrap suppressed so the last column
        // cannot scroll the screen.
        out.push_str("\x1b[?7l");
        {
            let mut last_sgr = GraphicsRendition::default();
            let mut first = true;
            let mut output_row = |row: &Row, out: &mut String| {
                if !first {
                    out.push_str("\r\n");
                }
                first = false;
                for cell in row {
                    if cell.rendition != last_sgr {
                        let _ = write!(out, "\x1b[{}m", cell.rendition.as_csi_params());
                        last_sgr = cell.rendition;
                    }
                    out.push_str(&cell.text);
                }
            };

            for row in &self.rows_above {
                output_row(row, out);
            }
            for row in &self.rows {
                output_row(row, out);
            }
            for row in self.rows_below.iter().rev() {
                output_row(row, out);
            }
        }

        // Pan back up so the active region is correct.
        if !self.rows_below.is_empty() {
            let _ = write!(out, "\x1b[H\x1b[{}T", self.rows_below.len());
        }

        // 3. Tab stops (before the final cursor position, since setting them
        // moves the cursor).
        out.push_str("\x1b[3g");
        for &col in &self.tab_stops {
            let _ = write!(out, "\x1b[1;{}H\x1bH", col + 1);
        }

        // 4. Internal state. (DECSET 2026 is not worth saving.)
        let _ = write!(out, "\x1b[{};{}r", self.scroll_start + 1, self.scroll_end + 1);
        out.push_str(if self.autowrap_mode {
            "\x1b[?7h"
        } else {
            "\x1b[?7l"
        });
        if self.origin_mode {
            out.push_str("\x1b[?6h");
        }

        // 5. Application state.
        if self.application_cursor_keys_mode {
            out.push_str("\x1b[?1h");
        }
        let mut first = true;
        let mut push_flags = |flags: KeyReportingFlags, out: &mut String| {
            if first {
                let _ = write!(out, "\x1b[={};1u", flags.bits());
                first = false;
            } else {
                let _ = write!(out, "\x1b[>{}u", flags.bits());
            }
        };
        for &flags in &self.key_reporting_flags_stack {
            push_flags(flags, out);
        }
        push_flags(self.key_reporting_flags, out);

        if self.alternate_scroll_mode {
            out.push_str("\x1b[?1007h");
        }
        match self.mouse_protocol {
            MouseProtocol::None => {}
            MouseProtocol::X10 => out.push_str("\x1b[?9h"),
            MouseProtocol::Vt200 => out.push_str("\x1b[?1000h"),
            MouseProtocol::BtnEvent => out.push_str("\x1b[?1002h"),
            MouseProtocol::AnyEvent => out.push_str("\x1b[?1003h"),
        }
        match self.mouse_encoding {
            MouseEncoding::X10 => {}
            MouseEncoding::Utf8 => out.push_str("\x1b[?1005h"),
            MouseEncoding::Sgr => out.push_str("\x1b[?1006h"),
            MouseEncoding::Urxvt => out.push_str("\x1b[?1015h"),
            MouseEncoding::SgrPixels => out.push_str("\x1b[?1016h"),
        }
        if self.focus_event_mode {
            out.push_str("\x1b[?1004h");
        }
        if self.bracketed_paste_mode {
            out.push_str("\x1b[?2004h");
        }

        // 6. Cursor.
        let _ = write!(out, "\x1b[{} q", self.cursor_style.to_decscusr());
        if self.origin_mode {
            let _ = write!(
                out,
                "\x1b[{};{}H",
                self.cursor_row - self.scroll_start + 1,
                self.cursor_col + 1
            );
        } else {
            let _ = write!(out, "\x1b[{};{}H", self.cursor_row + 1, self.cursor_col + 1);
        }
        if self.cursor_hidden {
            out.push_str("\x1b[?25l");
        }

        // 7. Pending overflow: re-emit the last visible cell.
        if self.x_overflow {
            let cell = &self.rows[self.cursor_row as usize][self.col_count as usize - 1];
            let _ = write!(out, "\x1b[{}m", cell.rendition.as_csi_params());
            out.push_str(&cell.text);
        }

        // 8. Current graphics rendition.
        let _ = write!(out, "\x1b[{}m", self.current_rendition.as_csi_params());
    }
}

fn blank_row(cols: u16) -> Row {
    vec![Cell::default(); cols as usize]
}

fn default_tab_stops(cols: u16) -> Vec<u16> {
    (8..cols).step_by(8).collect()
}

#[cfg(test)]
mod tests {
    use super::super::parser::EscapeSequenceParser;
    use super::*;
    use crate::core::term::rendition::Color;

    fn feed(terminal: &mut Terminal, input: &str) {
        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_application_escape_sequences(input);
        terminal.on_parser_results(&results);
    }

    fn row_text(terminal: &Terminal, row: usize) -> String {
        terminal.rows()[row].iter().map(|cell| cell.text.as_str()).collect()
    }

    fn grid(terminal: &Terminal) -> Vec<String> {
        (0..terminal.row_count() as usize)
            .map(|r| row_text(terminal, r))
            .collect()
    }

    #[test]
    fn test_basic_text_and_wrap() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "abcdefghijklmnopqrstuvwxy");

        assert_eq!(grid(&term), vec!["abcde", "fghij", "klmno", "pqrst", "uvwxy"]);
        assert_eq!((term.cursor_row(), term.cursor_col()), (4, 4));
        assert!(term.x_overflow);
    }

    #[test]
    fn test_utf8_and_zero_width_diacritic() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "$\u{a2}\u{20ac}\u{10348} a\u{305}");

        assert_eq!(row_text(&term, 0), "$\u{a2}\u{20ac}\u{10348} ");
        assert_eq!(term.rows()[1][0].text, "a\u{305}");
        assert_eq!((term.cursor_row(), term.cursor_col()), (1, 1));
    }

    #[test]
    fn test_insert_line_in_scroll_region() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "abcdefghijklmnopqrstuvwxy");
        feed(&mut term, "\x1b[2;4r\x1b[2;1H\x1b[L");

        assert_eq!(grid(&term), vec!["abcde", "     ", "fghij", "klmno", "uvwxy"]);
    }

    #[test]
    fn test_delete_line_clamps_to_region() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "abcdefghijklmnopqrstuvwxy");
        feed(&mut term, "\x1b[2;4r\x1b[2;1H\x1b[9M");

        assert_eq!(grid(&term), vec!["abcde", "klmno", "pqrst", "     ", "uvwxy"]);
    }

    #[test]
    fn test_alternate_screen_round_trip() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "abcdefghijklmnopqrstuvwx");
        let before = grid(&term);
        let cursor_before = (term.cursor_row(), term.cursor_col());

        feed(&mut term, "\x1b[?1049h");
        assert!(term.in_alternate_screen_buffer());
        assert_eq!((term.cursor_row(), term.cursor_col()), (0, 0));
        feed(&mut term, "X");
        assert_eq!(row_text(&term, 0), "X    ");

        feed(&mut term, "\x1b[?1049l");
        assert!(!term.in_alternate_screen_buffer());
        assert_eq!(grid(&term), before);
        assert_eq!((term.cursor_row(), term.cursor_col()), cursor_before);
    }

    #[test]
    fn test_erase_display_and_line() {
        let mut term = Terminal::new(WindowSize::new(3, 3));
        feed(&mut term, "abcdefghi");
        feed(&mut term, "\x1b[2;2H\x1b[0J");
        assert_eq!(grid(&term), vec!["abc", "d  ", "   "]);

        let mut term = Terminal::new(WindowSize::new(3, 3));
        feed(&mut term, "abcdefghi");
        feed(&mut term, "\x1b[2;2H\x1b[1K");
        assert_eq!(grid(&term), vec!["abc", "  f", "ghi"]);
    }

    #[test]
    fn test_ich_and_dch() {
        let mut term = Terminal::new(WindowSize::new(1, 5));
        feed(&mut term, "abcde\x1b[1;2H\x1b[2@");
        assert_eq!(row_text(&term, 0), "a  bc");

        feed(&mut term, "\x1b[1;2H\x1b[2P");
        assert_eq!(row_text(&term, 0), "abc  ");
    }

    #[test]
    fn test_ech_uses_current_rendition() {
        let mut term = Terminal::new(WindowSize::new(1, 5));
        feed(&mut term, "abcde\x1b[41m\x1b[1;2H\x1b[3X");
        assert_eq!(row_text(&term, 0), "a   e");
        assert_eq!(term.rows()[0][1].rendition.bg, Color::Indexed(1));
        // The cursor does not move.
        assert_eq!(term.cursor_col(), 1);
    }

    #[test]
    fn test_scrollback_accumulates_and_rewinds() {
        let mut term = Terminal::new(WindowSize::new(3, 3));
        feed(&mut term, "a\r\nb\r\nc\r\nd\r\ne");
        assert_eq!(grid(&term), vec!["c  ", "d  ", "e  "]);

        term.scroll_up();
        assert_eq!(grid(&term), vec!["b  ", "c  ", "d  "]);
        term.scroll_up();
        assert_eq!(grid(&term), vec!["a  ", "b  ", "c  "]);
        // No further history.
        term.scroll_up();
        assert_eq!(grid(&term), vec!["a  ", "b  ", "c  "]);

        // New output snaps back to the live screen.
        feed(&mut term, "!");
        assert_eq!(grid(&term), vec!["c  ", "d  ", "e! "]);
    }

    #[test]
    fn test_clear_scrollback() {
        let mut term = Terminal::new(WindowSize::new(2, 2));
        feed(&mut term, "a\r\nb\r\nc");
        feed(&mut term, "\x1b[3J");
        term.scroll_up();
        assert_eq!(grid(&term), vec!["  ", "  "]);
    }

    #[test]
    fn test_decstbm_validation() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b[3;3r");
        // A span under two rows is ignored.
        assert_eq!((term.scroll_start, term.scroll_end), (0, 4));

        feed(&mut term, "\x1b[2;9r");
        assert_eq!((term.scroll_start, term.scroll_end), (1, 4));
        assert_eq!((term.cursor_row(), term.cursor_col()), (0, 0));
    }

    #[test]
    fn test_origin_mode_addressing() {
        let mut term = Terminal::new(WindowSize::new(10, 10));
        feed(&mut term, "\x1b[3;6r\x1b[?6h");
        // Homed to the top of the region.
        assert_eq!(term.cursor_row(), 2);
        feed(&mut term, "\x1b[2;4H");
        assert_eq!((term.cursor_row(), term.cursor_col()), (3, 3));
        // Clamped inside the region.
        feed(&mut term, "\x1b[9;1H");
        assert_eq!(term.cursor_row(), 5);
    }

    #[test]
    fn test_tab_stops() {
        let mut term = Terminal::new(WindowSize::new(2, 20));
        feed(&mut term, "\t");
        assert_eq!(term.cursor_col(), 8);
        feed(&mut term, "\t");
        assert_eq!(term.cursor_col(), 16);
        feed(&mut term, "\t");
        assert_eq!(term.cursor_col(), 19);

        // HTS inserts a stop, TBC 3 clears them all.
        feed(&mut term, "\r\x1b[1;3H\x1bH\r\t");
        assert_eq!(term.cursor_col(), 2);
        feed(&mut term, "\x1b[3g\r\t");
        assert_eq!(term.cursor_col(), 19);
    }

    #[test]
    fn test_dsr_and_device_attributes() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b[2;3H\x1b[6n\x1b[5n\x1b[c");
        assert_eq!(term.take_replies(), b"\x1b[2;3R\x1b[0n\x1b[?1;0c".to_vec());
    }

    #[test]
    fn test_decrqss_reports_sgr() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b[1;31m\x1bP$qm\x1b\\");
        assert_eq!(term.take_replies(), b"\x1bP1$r0;1;31m\x1b\\".to_vec());

        feed(&mut term, "\x1bP$qr\x1b\\");
        assert_eq!(term.take_replies(), b"\x1bP0$r\x1b\\".to_vec());
    }

    #[test]
    fn test_osc_52_sets_clipboard() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b]52;c;aGVsbG8=\x07");
        assert_eq!(
            term.take_outgoing_events(),
            vec![TerminalEvent::SetClipboard(b"hello".to_vec())]
        );

        // A query is deliberately unanswered, and bad base64 is dropped.
        feed(&mut term, "\x1b]52;c;?\x07\x1b]52;c;!!!\x07");
        assert!(term.take_outgoing_events().is_empty());
        assert!(term.take_replies().is_empty());
    }

    #[test]
    fn test_kitty_key_reporting_stack() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b[=1;1u");
        assert_eq!(term.key_reporting_flags(), KeyReportingFlags::DISAMBIGUATE);
        feed(&mut term, "\x1b[>31u");
        assert_eq!(term.key_reporting_flags(), KeyReportingFlags::all());
        feed(&mut term, "\x1b[?u");
        assert_eq!(term.take_replies(), b"\x1b[?31u".to_vec());
        feed(&mut term, "\x1b[>2u");
        // Pop restores the flags saved by the matching push.
        feed(&mut term, "\x1b[<u");
        assert_eq!(term.key_reporting_flags(), KeyReportingFlags::all());
        // Popping past the bottom of the stack clears the flags.
        feed(&mut term, "\x1b[<9u");
        assert_eq!(term.key_reporting_flags(), KeyReportingFlags::empty());
    }

    #[test]
    fn test_xtwinops_forced_size() {
        let mut term = Terminal::new(WindowSize::new(5, 5));
        feed(&mut term, "\x1b[8;7;9t");
        // Ignored unless explicitly allowed.
        assert_eq!(term.size().rows, 5);

        term.set_allow_force_terminal_size(true);
        feed(&mut term, "\x1b[8;7;9t");
        assert_eq!((term.size().rows, term.size().cols), (7, 9));
        // The visible size still wins once the force is lifted.
        term.set_visible_size(WindowSize::new(5, 5));
        assert_eq!(term.size().rows, 7);
    }

    #[test]
    fn test_invariants_after_hostile_input(){
        let mut term = Terminal::new(WindowSize::new(4, 4));
        feed(
            &mut term,
            "\x1b[99;99H\x1b[999A\x1b[999B\x1b[999C\x1b[999D\x1b[99L\x1b[99M\x1b[99P\x1b[99@x\x1b[0;0r\x1b[99S\x1b[99T",
        );
        assert!(term.cursor_row() < term.row_count());
        assert!(term.cursor_col() < term.col_count());
        assert!(term.scroll_start <= term.scroll_end);
        for row in term.rows() {
            assert_eq!(row.len(), term.col_count() as usize);
        }
    }

    fn assert_observable_state_eq(a: &Terminal, b: &Terminal) {
        assert_eq!(grid(a), grid(b));
        for (row_a, row_b) in a.rows().iter().zip(b.rows()) {
            for (cell_a, cell_b) in row_a.iter().zip(row_b) {
                assert_eq!(cell_a.rendition, cell_b.rendition);
            }
        }
        assert_eq!(a.cursor_row(), b.cursor_row());
        assert_eq!(a.cursor_col(), b.cursor_col());
        assert_eq!(a.cursor_style(), b.cursor_style());
        assert_eq!(a.cursor_hidden(), b.cursor_hidden());
        assert_eq!(a.x_overflow, b.x_overflow);
        assert_eq!(a.current_rendition, b.current_rendition);
        assert_eq!(a.scroll_start, b.scroll_start);
        assert_eq!(a.scroll_end, b.scroll_end);
        assert_eq!(a.tab_stops, b.tab_stops);
        assert_eq!(a.origin_mode, b.origin_mode);
        assert_eq!(a.autowrap_mode, b.autowrap_mode);
        assert_eq!(a.application_cursor_keys_mode, b.application_cursor_keys_mode);
        assert_eq!(a.alternate_scroll_mode, b.alternate_scroll_mode);
        assert_eq!(a.focus_event_mode, b.focus_event_mode);
        assert_eq!(a.bracketed_paste_mode, b.bracketed_paste_mode);
        assert_eq!(a.mouse_protocol, b.mouse_protocol);
        assert_eq!(a.mouse_encoding, b.mouse_encoding);
        assert_eq!(a.key_reporting_flags, b.key_reporting_flags);
        assert_eq!(a.key_reporting_flags_stack, b.key_reporting_flags_stack);
        assert_eq!(a.in_alternate_screen_buffer(), b.in_alternate_screen_buffer());
    }

    fn round_trip(term: &Terminal) -> Terminal {
        let mut fresh = Terminal::new(term.size());
        fresh.set_allow_force_terminal_size(true);
        feed(&mut fresh, &term.state_as_escape_sequences());
        fresh
    }

    #[test]
    fn test_state_serialization_round_trip() {
        let mut term = Terminal::new(WindowSize::new(5, 8));
        feed(&mut term, "hello\r\n\x1b[1;31mworld\x1b[0m\r\nmore");
        feed(&mut term, "\x1b[2;4r\x1b[?1h\x1b[>11u\x1b[?1003h\x1b[?1006h");
        feed(&mut term, "\x1b[?2004h\x1b[3 q\x1b[2;3H");

        assert_observable_state_eq(&round_trip(&term), &term);
    }

    #[test]
    fn test_state_serialization_round_trip_overflow() {
        let mut term = Terminal::new(WindowSize::new(2, 4));
        feed(&mut term, "\x1b[44mabcd");
        assert!(term.x_overflow);
        assert_observable_state_eq(&round_trip(&term), &term);
    }

    #[test]
    fn test_state_serialization_round_trip_alt_screen() {
        let mut term = Terminal::new(WindowSize::new(3, 6));
        feed(&mut term, "main\x1b[?1049halt\x1b[?25l");
        let restored = round_trip(&term);
        assert_observable_state_eq(&restored, &term);

        // Leaving the alternate buffer recovers the main screen in both.
        let mut term = term;
        let mut restored = restored;
        feed(&mut term, "\x1b[?1049l");
        feed(&mut restored, "\x1b[?1049l");
        assert_observable_state_eq(&restored, &term);
    }

    #[test]
    fn test_state_serialization_round_trip_scrollback() {
        let mut term = Terminal::new(WindowSize::new(3, 3));
        feed(&mut term, "a\r\nb\r\nc\r\nd\r\ne");
        term.scroll_up();
        assert!(!term.rows_below.is_empty());
        let restored = round_trip(&term);
        assert_observable_state_eq(&restored, &term);

        // The rewound rows are also equivalent.
        let mut term = term;
        let mut restored = restored;
        term.scroll_to_bottom();
        restored.scroll_to_bottom();
        assert_observable_state_eq(&restored, &term);
    }
}
