//! Mouse events and their wire codecs.
//!
//! Events arrive from the host in SGR form (the compositor always puts the
//! host terminal in SGR any-event mode) and leave toward children in
//! whatever protocol and encoding each child negotiated.

use crate::core::term::{MouseEncoding, MouseProtocol, WindowSize};

use super::key::Modifiers;

/// A mouse button, or the wheel treated as buttons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseButton {
    #[default]
    None,
    Left,
    Middle,
    Right,
    ScrollUp,
    ScrollDown,
    Button8,
    Button9,
    Button10,
    Button11,
}

impl MouseButton {
    /// The button bits of the `Cb` report field, without modifiers.
    fn code(self) -> Option<u32> {
        Some(match self {
            MouseButton::Left => 0,
            MouseButton::Middle => 1,
            MouseButton::Right => 2,
            MouseButton::None => 3,
            MouseButton::ScrollUp => 64,
            MouseButton::ScrollDown => 65,
            MouseButton::Button8 => 128,
            MouseButton::Button9 => 129,
            MouseButton::Button10 => 130,
            MouseButton::Button11 => 131,
        })
    }

    fn from_code(code: u32) -> Self {
        match code {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            2 => MouseButton::Right,
            64 => MouseButton::ScrollUp,
            65 => MouseButton::ScrollDown,
            128 => MouseButton::Button8,
            129 => MouseButton::Button9,
            130 => MouseButton::Button10,
            131 => MouseButton::Button11,
            _ => MouseButton::None,
        }
    }

    pub fn is_scroll(self) -> bool {
        matches!(self, MouseButton::ScrollUp | MouseButton::ScrollDown)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MouseEventType {
    #[default]
    Press,
    Release,
    Move,
}

/// A cell- or pixel-space coordinate; `x` is the column, `y` the row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MouseCoordinate {
    y: u32,
    x: u32,
}

impl MouseCoordinate {
    pub fn new(x: u32, y: u32) -> Self {
        Self { y, x }
    }

    pub fn x(&self) -> u32 {
        self.x
    }

    pub fn y(&self) -> u32 {
        self.y
    }
}

/// A position carrying both cell and (optional) pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MousePosition {
    cells: MouseCoordinate,
    pixels: Option<MouseCoordinate>,
}

impl MousePosition {
    pub fn new(cells: MouseCoordinate, pixels: Option<MouseCoordinate>) -> Self {
        Self { cells, pixels }
    }

    pub fn in_cells(&self) -> MouseCoordinate {
        self.cells
    }

    pub fn in_pixels(&self) -> Option<MouseCoordinate> {
        self.pixels
    }

    /// Shift the position by a cell delta, scaling the pixel coordinates by
    /// the cell geometry of `size`.
    pub fn translate(&self, delta_x: i32, delta_y: i32, size: WindowSize) -> Self {
        let cells = MouseCoordinate::new(
            self.cells.x.saturating_add_signed(delta_x),
            self.cells.y.saturating_add_signed(delta_y),
        );
        let pixels = self.pixels.map(|pixels| {
            let cell_width = size.pixel_width / u32::from(size.cols.max(1));
            let cell_height = size.pixel_height / u32::from(size.rows.max(1));
            MouseCoordinate::new(
                pixels.x.saturating_add_signed(delta_x * cell_width as i32),
                pixels.y.saturating_add_signed(delta_y * cell_height as i32),
            )
        });
        Self { cells, pixels }
    }
}

/// A semantic mouse event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    event_type: MouseEventType,
    button: MouseButton,
    position: MousePosition,
    modifiers: Modifiers,
}

impl MouseEvent {
    pub fn new(
        event_type: MouseEventType,
        button: MouseButton,
        position: MousePosition,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            event_type,
            button,
            position,
            modifiers,
        }
    }

    #[allow(dead_code)]
    pub fn press(button: MouseButton, position: MousePosition) -> Self {
        Self::new(MouseEventType::Press, button, position, Modifiers::empty())
    }

    pub fn event_type(&self) -> MouseEventType {
        self.event_type
    }

    pub fn button(&self) -> MouseButton {
        self.button
    }

    pub fn position(&self) -> MousePosition {
        self.position
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The same event relative to a pane at the given offset.
    pub fn translate(&self, delta_x: i32, delta_y: i32, size: WindowSize) -> Self {
        Self {
            position: self.position.translate(delta_x, delta_y, size),
            ..*self
        }
    }
}

/// Decode an SGR mouse report (`CSI < Cb ; Cx ; Cy M/m`).
pub fn mouse_event_from_csi(csi: &crate::core::term::Csi) -> Option<MouseEvent> {
    if csi.intermediate != "<" || (csi.terminator != 'M' && csi.terminator != 'm') {
        return None;
    }

    let cb = csi.params.get(0);
    let x = csi.params.get_or(1, 1).saturating_sub(1);
    let y = csi.params.get_or(2, 1).saturating_sub(1);

    let mut modifiers = Modifiers::empty();
    if cb & 4 != 0 {
        modifiers |= Modifiers::SHIFT;
    }
    if cb & 8 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if cb & 16 != 0 {
        modifiers |= Modifiers::CONTROL;
    }

    let motion = cb & 32 != 0;
    let button = MouseButton::from_code(cb & !(4 | 8 | 16 | 32));
    let event_type = if motion {
        MouseEventType::Move
    } else if csi.terminator == 'm' {
        MouseEventType::Release
    } else {
        MouseEventType::Press
    };

    Some(MouseEvent::new(
        event_type,
        button,
        MousePosition::new(MouseCoordinate::new(x, y), None),
        modifiers,
    ))
}

/// Modes that decide whether a wheel press becomes an arrow key.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlternateScroll {
    pub alternate_scroll_mode: bool,
    pub application_cursor_keys_mode: bool,
    pub in_alternate_screen_buffer: bool,
}

/// Serialize a mouse event for the child.
///
/// Returns `None` when the child's protocol does not cover this event; the
/// caller then falls back to selection handling or viewport scrolling.
pub fn serialize_mouse_event(
    event: &MouseEvent,
    protocol: MouseProtocol,
    encoding: MouseEncoding,
    last_position: &Option<MousePosition>,
    alternate_scroll: AlternateScroll,
    _window_size: WindowSize,
) -> Option<Vec<u8>> {
    // With no mouse protocol active, a wheel press inside the alternate
    // screen buffer is translated to arrow key presses.
    if protocol == MouseProtocol::None {
        if alternate_scroll.in_alternate_screen_buffer
            && alternate_scroll.alternate_scroll_mode
            && event.event_type() == MouseEventType::Press
            && event.button().is_scroll()
        {
            let key = if event.button() == MouseButton::ScrollUp {
                b'A'
            } else {
                b'B'
            };
            return Some(if alternate_scroll.application_cursor_keys_mode {
                vec![0x1b, b'O', key]
            } else {
                vec![0x1b, b'[', key]
            });
        }
        return None;
    }

    match protocol {
        MouseProtocol::None => unreachable!(),
        MouseProtocol::X10 => {
            if event.event_type() != MouseEventType::Press
                || !matches!(
                    event.button(),
                    MouseButton::Left | MouseButton::Middle | MouseButton::Right
                )
            {
                return None;
            }
        }
        MouseProtocol::Vt200 => {
            if event.event_type() == MouseEventType::Move {
                return None;
            }
        }
        MouseProtocol::BtnEvent => {
            if event.event_type() == MouseEventType::Move && event.button() == MouseButton::None {
                return None;
            }
        }
        MouseProtocol::AnyEvent => {}
    }

    // Suppress repeated motion within the same cell.
    if event.event_type() == MouseEventType::Move {
        if let Some(last) = last_position {
            if last.in_cells() == event.position().in_cells() {
                return None;
            }
        }
    }

    let mut cb = event.button().code()?;
    if event.event_type() == MouseEventType::Move {
        cb += 32;
    }
    if event.modifiers().contains(Modifiers::SHIFT) {
        cb += 4;
    }
    if event.modifiers().contains(Modifiers::ALT) {
        cb += 8;
    }
    if event.modifiers().contains(Modifiers::CONTROL) {
        cb += 16;
    }

    let cells = event.position().in_cells();
    let (x, y) = (cells.x() + 1, cells.y() + 1);

    match encoding {
        MouseEncoding::Sgr => {
            let suffix = if event.event_type() == MouseEventType::Release {
                'm'
            } else {
                'M'
            };
            Some(format!("\x1b[<{};{};{}{}", cb, x, y, suffix).into_bytes())
        }
        MouseEncoding::SgrPixels => {
            let (px, py) = match event.position().in_pixels() {
                Some(pixels) => (pixels.x() + 1, pixels.y() + 1),
                None => (x, y),
            };
            let suffix = if event.event_type() == MouseEventType::Release {
                'm'
            } else {
                'M'
            };
            Some(format!("\x1b[<{};{};{}{}", cb, px, py, suffix).into_bytes())
        }
        MouseEncoding::Urxvt => {
            let cb = if event.event_type() == MouseEventType::Release {
                3 + (cb & !3)
            } else {
                cb
            };
            Some(format!("\x1b[{};{};{}M", cb + 32, x, y).into_bytes())
        }
        MouseEncoding::Utf8 => {
            let cb = if event.event_type() == MouseEventType::Release {
                3 + (cb & !3)
            } else {
                cb
            };
            let mut out = b"\x1b[M".to_vec();
            let mut push = |value: u32| {
                let encoded = char::from_u32(value + 32)?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(encoded.encode_utf8(&mut buf).as_bytes());
                Some(())
            };
            push(cb)?;
            push(x.min(2015))?;
            push(y.min(2015))?;
            Some(out)
        }
        MouseEncoding::X10 => {
            if x > 223 || y > 223 {
                return None;
            }
            let cb = if event.event_type() == MouseEventType::Release {
                3 + (cb & !3)
            } else {
                cb
            };
            Some(vec![
                0x1b,
                b'[',
                b'M',
                (cb + 32).min(255) as u8,
                (x + 32) as u8,
                (y + 32) as u8,
            ])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::{EscapeSequenceParser, ParserResult};

    fn at(x: u32, y: u32) -> MousePosition {
        MousePosition::new(MouseCoordinate::new(x, y), None)
    }

    fn serialize(
        event: &MouseEvent,
        protocol: MouseProtocol,
        encoding: MouseEncoding,
    ) -> Option<Vec<u8>> {
        serialize_mouse_event(
            event,
            protocol,
            encoding,
            &None,
            AlternateScroll::default(),
            WindowSize::new(24, 80),
        )
    }

    #[test]
    fn test_sgr_press_and_release() {
        let event = MouseEvent::press(MouseButton::Left, at(0, 0));
        assert_eq!(
            serialize(&event, MouseProtocol::Vt200, MouseEncoding::Sgr),
            Some(b"\x1b[<0;1;1M".to_vec())
        );

        let event = MouseEvent::new(
            MouseEventType::Release,
            MouseButton::Left,
            at(10, 20),
            Modifiers::empty(),
        );
        assert_eq!(
            serialize(&event, MouseProtocol::Vt200, MouseEncoding::Sgr),
            Some(b"\x1b[<0;11;21m".to_vec())
        );
    }

    #[test]
    fn test_scroll_buttons() {
        let event = MouseEvent::press(MouseButton::ScrollUp, at(5, 5));
        assert_eq!(
            serialize(&event, MouseProtocol::AnyEvent, MouseEncoding::Sgr),
            Some(b"\x1b[<64;6;6M".to_vec())
        );
        let event = MouseEvent::press(MouseButton::ScrollDown, at(5, 5));
        assert_eq!(
            serialize(&event, MouseProtocol::AnyEvent, MouseEncoding::Sgr),
            Some(b"\x1b[<65;6;6M".to_vec())
        );
    }

    #[test]
    fn test_x10_encoding() {
        let event = MouseEvent::press(MouseButton::Left, at(0, 0));
        assert_eq!(
            serialize(&event, MouseProtocol::X10, MouseEncoding::X10),
            Some(vec![0x1b, b'[', b'M', 32, 33, 33])
        );

        // Out of range for the 3-byte form.
        let event = MouseEvent::press(MouseButton::Left, at(300, 0));
        assert_eq!(serialize(&event, MouseProtocol::X10, MouseEncoding::X10), None);
    }

    #[test]
    fn test_x10_protocol_ignores_release_and_motion() {
        let event = MouseEvent::new(
            MouseEventType::Release,
            MouseButton::Left,
            at(0, 0),
            Modifiers::empty(),
        );
        assert_eq!(serialize(&event, MouseProtocol::X10, MouseEncoding::Sgr), None);

        let event = MouseEvent::new(
            MouseEventType::Move,
            MouseButton::None,
            at(0, 0),
            Modifiers::empty(),
        );
        assert_eq!(serialize(&event, MouseProtocol::Vt200, MouseEncoding::Sgr), None);
    }

    #[test]
    fn test_motion_suppressed_within_cell() {
        let event = MouseEvent::new(
            MouseEventType::Move,
            MouseButton::Left,
            at(3, 3),
            Modifiers::empty(),
        );
        let result = serialize_mouse_event(
            &event,
            MouseProtocol::AnyEvent,
            MouseEncoding::Sgr,
            &Some(at(3, 3)),
            AlternateScroll::default(),
            WindowSize::new(24, 80),
        );
        assert_eq!(result, None);

        let result = serialize_mouse_event(
            &event,
            MouseProtocol::AnyEvent,
            MouseEncoding::Sgr,
            &Some(at(2, 3)),
            AlternateScroll::default(),
            WindowSize::new(24, 80),
        );
        assert_eq!(result, Some(b"\x1b[<32;4;4M".to_vec()));
    }

    #[test]
    fn test_alternate_scroll_synthesizes_arrows() {
        let context = AlternateScroll {
            alternate_scroll_mode: true,
            application_cursor_keys_mode: false,
            in_alternate_screen_buffer: true,
        };
        let event = MouseEvent::press(MouseButton::ScrollUp, at(0, 0));
        let result = serialize_mouse_event(
            &event,
            MouseProtocol::None,
            MouseEncoding::X10,
            &None,
            context,
            WindowSize::new(24, 80),
        );
        assert_eq!(result, Some(b"\x1b[A".to_vec()));

        let context = AlternateScroll {
            application_cursor_keys_mode: true,
            ..context
        };
        let event = MouseEvent::press(MouseButton::ScrollDown, at(0, 0));
        let result = serialize_mouse_event(
            &event,
            MouseProtocol::None,
            MouseEncoding::X10,
            &None,
            context,
            WindowSize::new(24, 80),
        );
        assert_eq!(result, Some(b"\x1bOB".to_vec()));
    }

    #[test]
    fn test_decode_sgr_report() {
        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_input_escape_sequences("\x1b[<0;4;7M", true);
        let Some(ParserResult::Csi(csi)) = results.into_iter().next() else {
            panic!("expected CSI");
        };
        let event = mouse_event_from_csi(&csi).unwrap();
        assert_eq!(event.button(), MouseButton::Left);
        assert_eq!(event.event_type(), MouseEventType::Press);
        assert_eq!(event.position().in_cells(), MouseCoordinate::new(3, 6));

        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_input_escape_sequences("\x1b[<16;1;1m", true);
        let Some(ParserResult::Csi(csi)) = results.into_iter().next() else {
            panic!("expected CSI");
        };
        let event = mouse_event_from_csi(&csi).unwrap();
        assert_eq!(event.event_type(), MouseEventType::Release);
        assert_eq!(event.modifiers(), Modifiers::CONTROL);
    }
}
