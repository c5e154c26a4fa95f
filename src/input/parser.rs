//! Host-input pipeline.
//!
//! Turns decoded stdin text into semantic events: the escape parser runs in
//! input mode (so a lone ESC key press is reported), and bracketed pastes
//! are spliced out of the stream and delivered as single events.

use crate::core::term::{
    ControlCharacter, Csi, EscapeSequenceParser, ParserResult, PrintableCharacter,
};

use super::focus::{focus_event_from_csi, FocusEvent};
use super::key::{key_event_from_csi, key_event_from_legacy_code_point, KeyEvent, Modifiers};
use super::mouse::{mouse_event_from_csi, MouseEvent};
use super::paste::{is_bracketed_paste_begin, PasteEvent, BRACKETED_PASTE_END};

/// A semantic input event.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Focus(FocusEvent),
    Paste(PasteEvent),
}

/// Parses host input into a sequence of [`Event`]s.
#[derive(Default)]
pub struct TerminalInputParser {
    parser: EscapeSequenceParser,
    in_bracketed_paste: bool,
    paste_buffer: String,
    events: Vec<Event>,
}

impl TerminalInputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a chunk of decoded input. The chunk boundary is meaningful: a
    /// trailing bare ESC is flushed as an Escape key press.
    pub fn parse(&mut self, input: &str) -> Vec<Event> {
        // One character at a time so the paste terminator is seen as soon as
        // it completes.
        let mut iter = input.chars().peekable();
        while let Some(ch) = iter.next() {
            if self.in_bracketed_paste {
                self.paste_buffer.push(ch);
                if self.paste_buffer.ends_with(BRACKETED_PASTE_END) {
                    let mut text = std::mem::take(&mut self.paste_buffer);
                    text.truncate(text.len() - BRACKETED_PASTE_END.len());
                    self.events.push(Event::Paste(PasteEvent::new(text)));
                    self.in_bracketed_paste = false;
                }
                continue;
            }

            let flush = iter.peek().is_none();
            let mut buf = [0u8; 4];
            let results = self
                .parser
                .parse_input_escape_sequences(ch.encode_utf8(&mut buf), flush);
            for result in results {
                self.handle(&result);
            }
        }
        std::mem::take(&mut self.events)
    }

    fn handle(&mut self, result: &ParserResult) {
        match result {
            ParserResult::Printable(printable) => self.handle_printable(printable),
            ParserResult::Control(control) => self.handle_control(control),
            ParserResult::Csi(csi) => self.handle_csi(csi),
            ParserResult::Escape(_) | ParserResult::Dcs(_) | ParserResult::Osc(_)
            | ParserResult::Apc(_) => {}
        }
    }

    fn handle_printable(&mut self, printable: &PrintableCharacter) {
        self.events.push(Event::Key(key_event_from_legacy_code_point(
            printable.code_point,
            Modifiers::empty(),
        )));
    }

    fn handle_control(&mut self, control: &ControlCharacter) {
        let modifiers = if control.was_in_escape {
            Modifiers::ALT
        } else {
            Modifiers::empty()
        };
        self.events.push(Event::Key(key_event_from_legacy_code_point(
            control.code_point,
            modifiers,
        )));
    }

    fn handle_csi(&mut self, csi: &Csi) {
        if let Some(key_event) = key_event_from_csi(csi) {
            self.events.push(Event::Key(key_event));
        }
        if let Some(mouse_event) = mouse_event_from_csi(csi) {
            self.events.push(Event::Mouse(mouse_event));
        }
        if let Some(focus_event) = focus_event_from_csi(csi) {
            self.events.push(Event::Focus(focus_event));
        }
        if is_bracketed_paste_begin(csi) {
            self.in_bracketed_paste = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::key::{Key, KeyEventType};
    use crate::input::mouse::{MouseButton, MouseEventType};

    #[test]
    fn test_plain_text_becomes_key_events() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("hi");
        assert_eq!(events.len(), 2);
        let Event::Key(event) = &events[0] else {
            panic!("expected key event");
        };
        assert_eq!(event.key(), Key::Char('h'));
        assert_eq!(event.text(), "h");
    }

    #[test]
    fn test_lone_escape_is_a_key_press() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("\x1b");
        assert_eq!(events.len(), 1);
        let Event::Key(event) = &events[0] else {
            panic!("expected key event");
        };
        assert_eq!(event.key(), Key::Escape);
        assert_eq!(event.event_type(), KeyEventType::Press);
    }

    #[test]
    fn test_alt_modified_control() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("\x1b\x0d");
        assert_eq!(events.len(), 1);
        let Event::Key(event) = &events[0] else {
            panic!("expected key event");
        };
        assert_eq!(event.key(), Key::Enter);
        assert!(event.modifiers().contains(Modifiers::ALT));
    }

    #[test]
    fn test_bracketed_paste_splicing() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("a\x1b[200~pasted\ntext\x1b[201~b");
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], Event::Key(k) if k.text() == "a"));
        let Event::Paste(paste) = &events[1] else {
            panic!("expected paste event");
        };
        assert_eq!(paste.text(), "pasted\ntext");
        assert!(matches!(&events[2], Event::Key(k) if k.text() == "b"));
    }

    #[test]
    fn test_paste_split_across_reads() {
        let mut parser = TerminalInputParser::new();
        assert!(parser.parse("\x1b[200~hel").is_empty());
        let events = parser.parse("lo\x1b[201~");
        assert_eq!(events.len(), 1);
        let Event::Paste(paste) = &events[0] else {
            panic!("expected paste event");
        };
        assert_eq!(paste.text(), "hello");
    }

    #[test]
    fn test_mouse_and_focus_events() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("\x1b[<0;2;3M\x1b[I\x1b[O");
        assert_eq!(events.len(), 3);
        let Event::Mouse(mouse) = &events[0] else {
            panic!("expected mouse event");
        };
        assert_eq!(mouse.button(), MouseButton::Left);
        assert_eq!(mouse.event_type(), MouseEventType::Press);
        assert!(matches!(&events[1], Event::Focus(f) if f.is_focus_in()));
        assert!(matches!(&events[2], Event::Focus(f) if !f.is_focus_in()));
    }

    #[test]
    fn test_arrow_key_sequence() {
        let mut parser = TerminalInputParser::new();
        let events = parser.parse("\x1b[A");
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Event::Key(k) if k.key() == Key::Up));
    }
}
