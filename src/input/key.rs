//! Keyboard events and their wire codecs.
//!
//! Decoding turns host-side bytes (legacy sequences or kitty CSI u) into
//! [`KeyEvent`]s; encoding serializes events for a child using whatever
//! protocol that child has negotiated.

use bitflags::bitflags;

use crate::core::term::{Csi, KeyReportingFlags};

bitflags! {
    /// Key modifiers, in the kitty bit layout.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Modifiers: u32 {
        const SHIFT = 1;
        const ALT = 2;
        const CONTROL = 4;
        const SUPER = 8;
        const HYPER = 16;
        const META = 32;
        const CAPS_LOCK = 64;
        const NUM_LOCK = 128;
    }
}

/// A key, named where the wire protocols name it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    None,
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    F(u8),
    CapsLock,
    ScrollLock,
    NumLock,
    PrintScreen,
    Pause,
    Menu,
    LeftShift,
    LeftControl,
    LeftAlt,
    LeftSuper,
    RightShift,
    RightControl,
    RightAlt,
    RightSuper,
}

impl Key {
    /// Pure modifier keys; presses of these never trigger key bindings.
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::LeftShift
                | Key::LeftControl
                | Key::LeftAlt
                | Key::LeftSuper
                | Key::RightShift
                | Key::RightControl
                | Key::RightAlt
                | Key::RightSuper
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyEventType {
    #[default]
    Press,
    Repeat,
    Release,
}

/// A semantic keyboard event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    event_type: KeyEventType,
    key: Key,
    modifiers: Modifiers,
    text: String,
}

impl KeyEvent {
    pub fn new(event_type: KeyEventType, key: Key, modifiers: Modifiers, text: String) -> Self {
        Self {
            event_type,
            key,
            modifiers,
            text,
        }
    }

    #[allow(dead_code)]
    pub fn press(key: Key, modifiers: Modifiers) -> Self {
        let text = match key {
            Key::Char(c) if modifiers.intersection(!Modifiers::SHIFT).is_empty() => c.to_string(),
            _ => String::new(),
        };
        Self::new(KeyEventType::Press, key, modifiers, text)
    }

    pub fn event_type(&self) -> KeyEventType {
        self.event_type
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Build a key event from a bare code point (a printable character or a C0
/// control read outside any escape sequence).
pub fn key_event_from_legacy_code_point(code_point: char, extra: Modifiers) -> KeyEvent {
    let code = code_point as u32;
    let (key, mut modifiers, text) = match code {
        0x0d => (Key::Enter, Modifiers::empty(), String::new()),
        0x09 => (Key::Tab, Modifiers::empty(), String::new()),
        0x1b => (Key::Escape, Modifiers::empty(), String::new()),
        0x7f | 0x08 => (Key::Backspace, Modifiers::empty(), String::new()),
        0x00 => (Key::Char(' '), Modifiers::CONTROL, String::new()),
        0x01..=0x1a => {
            let ch = char::from_u32(code | 0x60).unwrap_or(' ');
            (Key::Char(ch), Modifiers::CONTROL, String::new())
        }
        0x1c..=0x1f => {
            let ch = char::from_u32(code | 0x40).unwrap_or(' ');
            (Key::Char(ch), Modifiers::CONTROL, String::new())
        }
        _ => {
            if code_point.is_uppercase() {
                let lower = code_point.to_lowercase().next().unwrap_or(code_point);
                (Key::Char(lower), Modifiers::SHIFT, code_point.to_string())
            } else {
                (Key::Char(code_point), Modifiers::empty(), code_point.to_string())
            }
        }
    };
    modifiers |= extra;
    KeyEvent::new(KeyEventType::Press, key, modifiers, text)
}

fn decode_modifiers(value: u32) -> Modifiers {
    Modifiers::from_bits_truncate(value.saturating_sub(1))
}

fn decode_event_type(value: u32) -> KeyEventType {
    match value {
        2 => KeyEventType::Repeat,
        3 => KeyEventType::Release,
        _ => KeyEventType::Press,
    }
}

fn key_from_kitty_code_point(code: u32) -> Option<Key> {
    Some(match code {
        13 => Key::Enter,
        9 => Key::Tab,
        27 => Key::Escape,
        127 => Key::Backspace,
        57348 => Key::Insert,
        57349 => Key::Delete,
        57358 => Key::CapsLock,
        57359 => Key::ScrollLock,
        57360 => Key::NumLock,
        57361 => Key::PrintScreen,
        57362 => Key::Pause,
        57363 => Key::Menu,
        57441 => Key::LeftShift,
        57442 => Key::LeftControl,
        57443 => Key::LeftAlt,
        57444 => Key::LeftSuper,
        57447 => Key::RightShift,
        57448 => Key::RightControl,
        57449 => Key::RightAlt,
        57450 => Key::RightSuper,
        _ => Key::Char(char::from_u32(code)?),
    })
}

fn kitty_code_point(key: Key) -> Option<u32> {
    Some(match key {
        Key::Char(c) => c as u32,
        Key::Enter => 13,
        Key::Tab => 9,
        Key::Escape => 27,
        Key::Backspace => 127,
        Key::Insert => 57348,
        Key::Delete => 57349,
        Key::CapsLock => 57358,
        Key::ScrollLock => 57359,
        Key::NumLock => 57360,
        Key::PrintScreen => 57361,
        Key::Pause => 57362,
        Key::Menu => 57363,
        Key::LeftShift => 57441,
        Key::LeftControl => 57442,
        Key::LeftAlt => 57443,
        Key::LeftSuper => 57444,
        Key::RightShift => 57447,
        Key::RightControl => 57448,
        Key::RightAlt => 57449,
        Key::RightSuper => 57450,
        _ => return None,
    })
}

/// Decode a CSI sequence into a key event, if it is one.
///
/// Understood forms: `CSI 1;mods A..H` (arrows, Home, End), `CSI code;mods ~`
/// (editing and function keys), and the kitty
/// `CSI cp[:shifted:base];mods[:event][;text] u` form.
pub fn key_event_from_csi(csi: &Csi) -> Option<KeyEvent> {
    if !csi.intermediate.is_empty() {
        return None;
    }

    let modifiers = decode_modifiers(csi.params.get_or(1, 1));
    let event_type = decode_event_type(
        csi.params
            .subparams(1)
            .get(1)
            .copied()
            .unwrap_or(1),
    );

    let key = match csi.terminator {
        'A' => Key::Up,
        'B' => Key::Down,
        'C' => Key::Right,
        'D' => Key::Left,
        'H' => Key::Home,
        'F' => Key::End,
        'Z' => {
            return Some(KeyEvent::new(
                event_type,
                Key::Tab,
                modifiers | Modifiers::SHIFT,
                String::new(),
            ));
        }
        '~' => match csi.params.get_or(0, 1) {
            2 => Key::Insert,
            3 => Key::Delete,
            5 => Key::PageUp,
            6 => Key::PageDown,
            7 => Key::Home,
            8 => Key::End,
            11..=15 => Key::F((csi.params.get(0) - 10) as u8),
            17..=21 => Key::F((csi.params.get(0) - 11) as u8),
            23 => Key::F(11),
            24 => Key::F(12),
            _ => return None,
        },
        'u' => {
            let code = csi.params.get(0);
            let key = key_from_kitty_code_point(code)?;
            let shifted = csi
                .params
                .subparams(0)
                .get(1)
                .copied()
                .and_then(char::from_u32);
            let text: String = csi
                .params
                .subparams(2)
                .iter()
                .filter_map(|&cp| char::from_u32(cp))
                .collect();
            let text = if text.is_empty() && event_type != KeyEventType::Release {
                match key {
                    Key::Char(c) if modifiers.intersection(!Modifiers::SHIFT).is_empty() => {
                        if !modifiers.contains(Modifiers::SHIFT) {
                            c.to_string()
                        } else if let Some(shifted) = shifted {
                            shifted.to_string()
                        } else {
                            c.to_uppercase().collect()
                        }
                    }
                    _ => text,
                }
            } else {
                text
            };
            return Some(KeyEvent::new(event_type, key, modifiers, text));
        }
        _ => return None,
    };

    Some(KeyEvent::new(event_type, key, modifiers, String::new()))
}

/// xterm-style modifier parameter: 1 plus the modifier bits.
fn modifier_code(modifiers: Modifiers) -> u32 {
    1 + (modifiers & (Modifiers::SHIFT | Modifiers::ALT | Modifiers::CONTROL | Modifiers::SUPER))
        .bits()
}

/// Serialize a key event for the child, honoring its cursor-key mode and
/// kitty progressive-enhancement flags. Returns `None` when the event has no
/// encoding under the current modes (for example a key release without
/// event-type reporting).
pub fn serialize_key_event(
    event: &KeyEvent,
    application_cursor_keys_mode: bool,
    flags: KeyReportingFlags,
) -> Option<Vec<u8>> {
    let kitty_all = flags.contains(KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES);
    let kitty_path =
        kitty_all || (flags.contains(KeyReportingFlags::DISAMBIGUATE) && is_ambiguous(event));

    if event.key() == Key::None {
        return None;
    }
    if event.key().is_modifier() && !kitty_all {
        return None;
    }
    // Releases exist only in the CSI u form, and only when the child asked
    // for event types.
    if event.event_type() == KeyEventType::Release
        && !(kitty_path && flags.contains(KeyReportingFlags::REPORT_EVENT_TYPES))
    {
        return None;
    }

    if kitty_path {
        if let Some(bytes) = serialize_kitty_key_event(event, flags) {
            return Some(bytes);
        }
    }
    if event.event_type() == KeyEventType::Release {
        return None;
    }

    serialize_legacy_key_event(event, application_cursor_keys_mode)
}

/// Keys whose legacy encoding collides with escape sequences or controls.
fn is_ambiguous(event: &KeyEvent) -> bool {
    if event.key() == Key::Escape {
        return true;
    }
    event
        .modifiers()
        .intersects(Modifiers::CONTROL | Modifiers::ALT | Modifiers::SUPER)
}

fn serialize_kitty_key_event(event: &KeyEvent, flags: KeyReportingFlags) -> Option<Vec<u8>> {
    // Arrow and editing keys keep their legacy forms with an explicit
    // modifier field under the kitty protocol.
    let legacy = match event.key() {
        Key::Up => Some(('A', None)),
        Key::Down => Some(('B', None)),
        Key::Right => Some(('C', None)),
        Key::Left => Some(('D', None)),
        Key::Home => Some(('H', None)),
        Key::End => Some(('F', None)),
        Key::PageUp => Some(('~', Some(5))),
        Key::PageDown => Some(('~', Some(6))),
        Key::F(n) => Some(('~', Some(function_key_code(n)?))),
        _ => None,
    };

    let mods_field = {
        let mut field = format!("{}", 1 + event.modifiers().bits());
        if flags.contains(KeyReportingFlags::REPORT_EVENT_TYPES) {
            match event.event_type() {
                KeyEventType::Press => {}
                KeyEventType::Repeat => field.push_str(":2"),
                KeyEventType::Release => field.push_str(":3"),
            }
        }
        field
    };

    if let Some((terminator, code)) = legacy {
        let out = match (code, mods_field.as_str()) {
            (Some(code), "1") => format!("\x1b[{}~", code),
            (Some(code), _) => format!("\x1b[{};{}~", code, mods_field),
            (None, "1") => format!("\x1b[{}", terminator),
            (None, _) => format!("\x1b[1;{}{}", mods_field, terminator),
        };
        return Some(out.into_bytes());
    }

    let code_point = kitty_code_point(event.key())?;
    let mut out = format!("\x1b[{}", code_point);

    let text_field = if flags.contains(KeyReportingFlags::REPORT_ASSOCIATED_TEXT)
        && event.event_type() != KeyEventType::Release
        && !event.text().is_empty()
    {
        let codes: Vec<String> = event.text().chars().map(|c| (c as u32).to_string()).collect();
        Some(codes.join(":"))
    } else {
        None
    };

    if let Some(text) = text_field {
        out.push_str(&format!(";{};{}", mods_field, text));
    } else if mods_field != "1" {
        out.push_str(&format!(";{}", mods_field));
    }
    out.push('u');
    Some(out.into_bytes())
}

fn function_key_code(n: u8) -> Option<u32> {
    Some(match n {
        1..=5 => 10 + u32::from(n),
        6..=10 => 11 + u32::from(n),
        11 => 23,
        12 => 24,
        _ => return None,
    })
}

fn serialize_legacy_key_event(
    event: &KeyEvent,
    application_cursor_keys_mode: bool,
) -> Option<Vec<u8>> {
    let mods = event.modifiers();

    match event.key() {
        Key::Char(ch) => Some(legacy_char(ch, event.text(), mods)),
        Key::Enter => {
            if mods.contains(Modifiers::ALT) {
                Some(vec![0x1b, 0x0d])
            } else {
                Some(vec![0x0d])
            }
        }
        Key::Tab => {
            if mods.contains(Modifiers::SHIFT) {
                Some(b"\x1b[Z".to_vec())
            } else {
                Some(vec![0x09])
            }
        }
        Key::Backspace => {
            if mods.contains(Modifiers::ALT) {
                Some(vec![0x1b, 0x7f])
            } else {
                Some(vec![0x7f])
            }
        }
        Key::Escape => Some(vec![0x1b]),
        Key::Up => Some(arrow_key(b'A', mods, application_cursor_keys_mode)),
        Key::Down => Some(arrow_key(b'B', mods, application_cursor_keys_mode)),
        Key::Right => Some(arrow_key(b'C', mods, application_cursor_keys_mode)),
        Key::Left => Some(arrow_key(b'D', mods, application_cursor_keys_mode)),
        Key::Home => Some(arrow_key(b'H', mods, application_cursor_keys_mode)),
        Key::End => Some(arrow_key(b'F', mods, application_cursor_keys_mode)),
        Key::Insert => Some(tilde_key(2, mods)),
        Key::Delete => Some(tilde_key(3, mods)),
        Key::PageUp => Some(tilde_key(5, mods)),
        Key::PageDown => Some(tilde_key(6, mods)),
        Key::F(n) => function_key(n, mods),
        _ => None,
    }
}

fn legacy_char(ch: char, text: &str, mods: Modifiers) -> Vec<u8> {
    // Ctrl maps letters into the C0 range.
    if mods.contains(Modifiers::CONTROL) {
        let control = match ch {
            'a'..='z' => Some((ch as u8) - b'a' + 1),
            '@' | '`' | ' ' => Some(0x00),
            '[' => Some(0x1b),
            '\\' => Some(0x1c),
            ']' => Some(0x1d),
            '^' | '~' => Some(0x1e),
            '_' | '?' => Some(0x1f),
            _ => None,
        };
        if let Some(byte) = control {
            return if mods.contains(Modifiers::ALT) {
                vec![0x1b, byte]
            } else {
                vec![byte]
            };
        }
    }

    let mut bytes = Vec::new();
    if mods.contains(Modifiers::ALT) {
        bytes.push(0x1b);
    }
    if !text.is_empty() {
        bytes.extend_from_slice(text.as_bytes());
    } else {
        let mut buf = [0u8; 4];
        bytes.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    bytes
}

fn arrow_key(key: u8, mods: Modifiers, application_cursor_keys_mode: bool) -> Vec<u8> {
    let code = modifier_code(mods);
    if code != 1 {
        format!("\x1b[1;{}{}", code, key as char).into_bytes()
    } else if application_cursor_keys_mode {
        vec![0x1b, b'O', key]
    } else {
        vec![0x1b, b'[', key]
    }
}

fn tilde_key(code: u32, mods: Modifiers) -> Vec<u8> {
    let modifier = modifier_code(mods);
    if modifier == 1 {
        format!("\x1b[{}~", code).into_bytes()
    } else {
        format!("\x1b[{};{}~", code, modifier).into_bytes()
    }
}

fn function_key(n: u8, mods: Modifiers) -> Option<Vec<u8>> {
    let modifier = modifier_code(mods);
    if (1..=4).contains(&n) {
        let key = [b'P', b'Q', b'R', b'S'][usize::from(n) - 1];
        if modifier == 1 {
            return Some(vec![0x1b, b'O', key]);
        }
        return Some(format!("\x1b[1;{}{}", modifier, key as char).into_bytes());
    }
    let code = function_key_code(n)?;
    Some(tilde_key(code, mods))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::term::{EscapeSequenceParser, ParserResult};

    fn csi_from(input: &str) -> Csi {
        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_input_escape_sequences(input, true);
        match results.into_iter().next() {
            Some(ParserResult::Csi(csi)) => csi,
            other => panic!("expected CSI, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_char_encoding() {
        let flags = KeyReportingFlags::empty();

        let event = KeyEvent::press(Key::Char('a'), Modifiers::empty());
        assert_eq!(serialize_key_event(&event, false, flags), Some(b"a".to_vec()));

        let event = KeyEvent::press(Key::Char('c'), Modifiers::CONTROL);
        assert_eq!(serialize_key_event(&event, false, flags), Some(vec![0x03]));

        let event = KeyEvent::press(Key::Char('x'), Modifiers::ALT);
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(vec![0x1b, b'x'])
        );
    }

    #[test]
    fn test_arrow_key_modes() {
        let flags = KeyReportingFlags::empty();

        let event = KeyEvent::press(Key::Up, Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(
            serialize_key_event(&event, true, flags),
            Some(b"\x1bOA".to_vec())
        );

        let event = KeyEvent::press(Key::Up, Modifiers::CONTROL);
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[1;5A".to_vec())
        );
        // Modified arrows never use the SS3 form.
        assert_eq!(
            serialize_key_event(&event, true, flags),
            Some(b"\x1b[1;5A".to_vec())
        );
    }

    #[test]
    fn test_function_keys() {
        let flags = KeyReportingFlags::empty();
        let event = KeyEvent::press(Key::F(1), Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1bOP".to_vec())
        );
        let event = KeyEvent::press(Key::F(5), Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[15~".to_vec())
        );
        let event = KeyEvent::press(Key::F(5), Modifiers::SHIFT);
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[15;2~".to_vec())
        );
    }

    #[test]
    fn test_release_dropped_without_event_reporting() {
        let event = KeyEvent::new(
            KeyEventType::Release,
            Key::Char('a'),
            Modifiers::empty(),
            String::new(),
        );
        assert_eq!(
            serialize_key_event(&event, false, KeyReportingFlags::empty()),
            None
        );
        // Even full kitty encoding cannot express a release without
        // event-type reporting.
        assert_eq!(
            serialize_key_event(
                &event,
                false,
                KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            ),
            None
        );
    }

    #[test]
    fn test_release_of_disambiguated_key() {
        let flags = KeyReportingFlags::DISAMBIGUATE | KeyReportingFlags::REPORT_EVENT_TYPES;
        let event = KeyEvent::new(
            KeyEventType::Release,
            Key::Char('c'),
            Modifiers::CONTROL,
            String::new(),
        );
        // An ambiguous key goes out in CSI u form, release included.
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[99;5:3u".to_vec())
        );

        // A plain key is not escape-coded under disambiguation alone, so
        // its release has no encoding.
        let event = KeyEvent::new(
            KeyEventType::Release,
            Key::Char('c'),
            Modifiers::empty(),
            String::new(),
        );
        assert_eq!(serialize_key_event(&event, false, flags), None);
    }

    #[test]
    fn test_kitty_all_keys_as_escape_codes() {
        let flags = KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES;

        let event = KeyEvent::press(Key::Char('a'), Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[97u".to_vec())
        );

        let event = KeyEvent::press(Key::Char('a'), Modifiers::CONTROL);
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[97;5u".to_vec())
        );

        let event = KeyEvent::press(Key::Escape, Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[27u".to_vec())
        );
    }

    #[test]
    fn test_kitty_event_types_and_text() {
        let flags = KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            | KeyReportingFlags::REPORT_EVENT_TYPES;
        let event = KeyEvent::new(
            KeyEventType::Release,
            Key::Char('a'),
            Modifiers::empty(),
            String::new(),
        );
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[97;1:3u".to_vec())
        );

        let flags = KeyReportingFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
            | KeyReportingFlags::REPORT_ASSOCIATED_TEXT;
        let event = KeyEvent::press(Key::Char('a'), Modifiers::empty());
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[97;1;97u".to_vec())
        );
    }

    #[test]
    fn test_disambiguate_escapes_ctrl_keys() {
        let flags = KeyReportingFlags::DISAMBIGUATE;
        let event = KeyEvent::press(Key::Char('c'), Modifiers::CONTROL);
        assert_eq!(
            serialize_key_event(&event, false, flags),
            Some(b"\x1b[99;5u".to_vec())
        );
        // Unmodified text keys keep their plain encoding.
        let event = KeyEvent::press(Key::Char('c'), Modifiers::empty());
        assert_eq!(serialize_key_event(&event, false, flags), Some(b"c".to_vec()));
    }

    #[test]
    fn test_decode_legacy_csi() {
        let event = key_event_from_csi(&csi_from("\x1b[A")).unwrap();
        assert_eq!(event.key(), Key::Up);
        assert_eq!(event.modifiers(), Modifiers::empty());

        let event = key_event_from_csi(&csi_from("\x1b[1;5D")).unwrap();
        assert_eq!(event.key(), Key::Left);
        assert_eq!(event.modifiers(), Modifiers::CONTROL);

        let event = key_event_from_csi(&csi_from("\x1b[3~")).unwrap();
        assert_eq!(event.key(), Key::Delete);

        let event = key_event_from_csi(&csi_from("\x1b[15;2~")).unwrap();
        assert_eq!(event.key(), Key::F(5));
        assert_eq!(event.modifiers(), Modifiers::SHIFT);
    }

    #[test]
    fn test_decode_kitty_csi_u() {
        let event = key_event_from_csi(&csi_from("\x1b[97u")).unwrap();
        assert_eq!(event.key(), Key::Char('a'));
        assert_eq!(event.text(), "a");

        let event = key_event_from_csi(&csi_from("\x1b[98;5u")).unwrap();
        assert_eq!(event.key(), Key::Char('b'));
        assert_eq!(event.modifiers(), Modifiers::CONTROL);
        assert_eq!(event.text(), "");

        let event = key_event_from_csi(&csi_from("\x1b[97;1:3u")).unwrap();
        assert_eq!(event.event_type(), KeyEventType::Release);

        let event = key_event_from_csi(&csi_from("\x1b[57441u")).unwrap();
        assert!(event.key().is_modifier());
    }

    #[test]
    fn test_decode_legacy_code_points() {
        let event = key_event_from_legacy_code_point('\x03', Modifiers::empty());
        assert_eq!(event.key(), Key::Char('c'));
        assert_eq!(event.modifiers(), Modifiers::CONTROL);

        let event = key_event_from_legacy_code_point('A', Modifiers::empty());
        assert_eq!(event.key(), Key::Char('a'));
        assert_eq!(event.modifiers(), Modifiers::SHIFT);
        assert_eq!(event.text(), "A");

        let event = key_event_from_legacy_code_point('\x1b', Modifiers::empty());
        assert_eq!(event.key(), Key::Escape);

        let event = key_event_from_legacy_code_point('q', Modifiers::ALT);
        assert_eq!(event.key(), Key::Char('q'));
        assert_eq!(event.modifiers(), Modifiers::ALT);
    }
}
