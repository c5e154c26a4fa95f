//! VT escape-sequence parser.
//!
//! A state machine in the classic Paul Williams layout, fed with decoded
//! code points. It produces a stream of parsed events and never emits an
//! incomplete sequence. The same machine parses both directions:
//! application output (child -> compositor) and host input
//! (user's terminal -> compositor); the only difference is that the input
//! side can be flushed so a bare ESC key press is reported immediately.

use super::params::Params;

/// A graphic code point to be drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrintableCharacter {
    pub code_point: char,
}

/// A C0 control. `was_in_escape` is set when the control arrived while the
/// parser had consumed an ESC (the Meta/Alt convention on the input side).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlCharacter {
    pub code_point: char,
    pub was_in_escape: bool,
}

/// A complete CSI sequence. `intermediate` holds the private markers and
/// intermediate bytes in order of appearance (`"?"`, `" "`, `"?$"`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Csi {
    pub intermediate: String,
    pub params: Params,
    pub terminator: char,
}

/// A complete ESC sequence that is not a control-string introducer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Escape {
    pub intermediate: String,
    pub terminator: char,
}

/// A complete DCS sequence with its passthrough data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dcs {
    pub intermediate: String,
    pub params: Params,
    pub terminator: char,
    pub data: String,
}

/// A complete OSC string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Osc {
    pub data: String,
}

/// A complete APC string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Apc {
    pub data: String,
}

/// One parsed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParserResult {
    Printable(PrintableCharacter),
    Control(ControlCharacter),
    Csi(Csi),
    Escape(Escape),
    Dcs(Dcs),
    Osc(Osc),
    Apc(Apc),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum State {
    #[default]
    Ground,
    Escape,
    EscapeIntermediate,
    CsiEntry,
    CsiParam,
    CsiIntermediate,
    CsiIgnore,
    DcsEntry,
    DcsParam,
    DcsIntermediate,
    DcsPassthrough,
    DcsIgnore,
    OscString,
    SosPmApcString,
    /// ESC seen inside a control string; deciding between ST and abort.
    StringEscape,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum StringKind {
    #[default]
    Osc,
    Apc,
    /// SOS and PM strings are consumed but produce no event.
    Ignored,
    Dcs,
}

/// The escape-sequence state machine.
#[derive(Default)]
pub struct EscapeSequenceParser {
    state: State,
    intermediate: String,
    param_groups: Vec<Vec<u32>>,
    current_subparams: Vec<u32>,
    current_param: Option<u32>,
    string_kind: StringKind,
    string_data: String,
    dcs_intermediate: String,
    dcs_params: Params,
    dcs_terminator: char,
    results: Vec<ParserResult>,
}

impl EscapeSequenceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse child output. Partial sequences are retained across calls.
    pub fn parse_application_escape_sequences(&mut self, input: &str) -> Vec<ParserResult> {
        for ch in input.chars() {
            self.feed(ch);
        }
        std::mem::take(&mut self.results)
    }

    /// Parse host input. With `flush` set, a trailing bare ESC is reported
    /// as a control character instead of being held for a continuation.
    pub fn parse_input_escape_sequences(&mut self, input: &str, flush: bool) -> Vec<ParserResult> {
        for ch in input.chars() {
            self.feed(ch);
        }
        if flush && self.state == State::Escape {
            self.results.push(ParserResult::Control(ControlCharacter {
                code_point: '\x1b',
                was_in_escape: false,
            }));
            self.state = State::Ground;
        }
        std::mem::take(&mut self.results)
    }

    fn feed(&mut self, ch: char) {
        // C0 controls are handled up front; which ones abort, execute, or
        // terminate depends on where we are.
        if (ch as u32) < 0x20 {
            match self.state {
                State::OscString | State::SosPmApcString | State::DcsPassthrough => {
                    if ch == '\x07' && self.state == State::OscString {
                        self.finish_string();
                        return;
                    }
                    if ch == '\x1b' {
                        self.state = State::StringEscape;
                        return;
                    }
                    // Any other C0 ends the string, then executes.
                    self.finish_string();
                    self.emit_control(ch, false);
                }
                State::StringEscape => {
                    self.finish_string();
                    if ch == '\x1b' {
                        self.enter_escape();
                    } else {
                        self.emit_control(ch, false);
                        self.state = State::Ground;
                    }
                }
                State::Escape => {
                    if ch == '\x1b' {
                        self.enter_escape();
                    } else if ch == '\x18' || ch == '\x1a' {
                        self.state = State::Ground;
                    } else {
                        // Meta convention: the pending ESC modifies this
                        // control and is consumed with it.
                        self.emit_control(ch, true);
                        self.state = State::Ground;
                    }
                }
                _ => {
                    if ch == '\x1b' {
                        self.enter_escape();
                    } else if ch == '\x18' || ch == '\x1a' {
                        self.state = State::Ground;
                    } else {
                        self.emit_control(ch, false);
                    }
                }
            }
            return;
        }

        match self.state {
            State::Ground => {
                self.results
                    .push(ParserResult::Printable(PrintableCharacter { code_point: ch }));
            }
            State::Escape => match ch {
                '[' => {
                    self.state = State::CsiEntry;
                }
                ']' => {
                    self.string_kind = StringKind::Osc;
                    self.string_data.clear();
                    self.state = State::OscString;
                }
                'P' => {
                    self.state = State::DcsEntry;
                }
                '_' => {
                    self.string_kind = StringKind::Apc;
                    self.string_data.clear();
                    self.state = State::SosPmApcString;
                }
                'X' | '^' => {
                    self.string_kind = StringKind::Ignored;
                    self.string_data.clear();
                    self.state = State::SosPmApcString;
                }
                '\u{20}'..='\u{2f}' => {
                    self.intermediate.push(ch);
                    self.state = State::EscapeIntermediate;
                }
                '\u{30}'..='\u{7e}' => {
                    let intermediate = std::mem::take(&mut self.intermediate);
                    self.results.push(ParserResult::Escape(Escape {
                        intermediate,
                        terminator: ch,
                    }));
                    self.state = State::Ground;
                }
                _ => {
                    self.state = State::Ground;
                }
            },
            State::EscapeIntermediate => match ch {
                '\u{20}'..='\u{2f}' => {
                    self.intermediate.push(ch);
                }
                '\u{30}'..='\u{7e}' => {
                    let intermediate = std::mem::take(&mut self.intermediate);
                    self.results.push(ParserResult::Escape(Escape {
                        intermediate,
                        terminator: ch,
                    }));
                    self.state = State::Ground;
                }
                _ => {
                    self.state = State::Ground;
                }
            },
            State::CsiEntry | State::DcsEntry => {
                let in_dcs = self.state == State::DcsEntry;
                match ch {
                    '0'..='9' => {
                        self.push_digit(ch);
                        self.state = if in_dcs { State::DcsParam } else { State::CsiParam };
                    }
                    ';' => {
                        self.end_group();
                        self.state = if in_dcs { State::DcsParam } else { State::CsiParam };
                    }
                    ':' => {
                        self.end_subparam();
                        self.state = if in_dcs { State::DcsParam } else { State::CsiParam };
                    }
                    '<' | '=' | '>' | '?' => {
                        self.intermediate.push(ch);
                    }
                    '\u{20}'..='\u{2f}' => {
                        self.intermediate.push(ch);
                        self.state = if in_dcs {
                            State::DcsIntermediate
                        } else {
                            State::CsiIntermediate
                        };
                    }
                    '\u{40}'..='\u{7e}' => {
                        self.dispatch(ch, in_dcs);
                    }
                    _ => {
                        self.state = if in_dcs { State::DcsIgnore } else { State::CsiIgnore };
                    }
                }
            }
            State::CsiParam | State::DcsParam => {
                let in_dcs = self.state == State::DcsParam;
                match ch {
                    '0'..='9' => self.push_digit(ch),
                    ';' => self.end_group(),
                    ':' => self.end_subparam(),
                    '\u{20}'..='\u{2f}' => {
                        self.flush_group();
                        self.intermediate.push(ch);
                        self.state = if in_dcs {
                            State::DcsIntermediate
                        } else {
                            State::CsiIntermediate
                        };
                    }
                    '\u{40}'..='\u{7e}' => {
                        self.dispatch(ch, in_dcs);
                    }
                    _ => {
                        self.state = if in_dcs { State::DcsIgnore } else { State::CsiIgnore };
                    }
                }
            }
            State::CsiIntermediate | State::DcsIntermediate => {
                let in_dcs = self.state == State::DcsIntermediate;
                match ch {
                    '\u{20}'..='\u{2f}' => self.intermediate.push(ch),
                    '\u{40}'..='\u{7e}' => {
                        self.dispatch(ch, in_dcs);
                    }
                    _ => {
                        self.state = if in_dcs { State::DcsIgnore } else { State::CsiIgnore };
                    }
                }
            }
            State::CsiIgnore => {
                if ('\u{40}'..='\u{7e}').contains(&ch) {
                    self.reset_sequence();
                    self.state = State::Ground;
                }
            }
            State::DcsIgnore => {
                if ch == '\u{9c}' {
                    self.reset_sequence();
                    self.state = State::Ground;
                }
            }
            State::OscString | State::SosPmApcString | State::DcsPassthrough => {
                if ch == '\u{9c}' {
                    self.finish_string();
                } else {
                    self.string_data.push(ch);
                }
            }
            State::StringEscape => {
                if ch == '\\' {
                    self.finish_string();
                } else {
                    // Not a string terminator: close out the string and
                    // reprocess this byte as a fresh escape sequence.
                    self.finish_string();
                    self.enter_escape();
                    self.feed(ch);
                }
            }
        }
    }

    fn enter_escape(&mut self) {
        self.reset_sequence();
        self.state = State::Escape;
    }

    fn reset_sequence(&mut self) {
        self.intermediate.clear();
        self.param_groups.clear();
        self.current_subparams.clear();
        self.current_param = None;
    }

    fn push_digit(&mut self, ch: char) {
        let digit = ch as u32 - '0' as u32;
        self.current_param = Some(
            self.current_param
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit),
        );
    }

    fn end_subparam(&mut self) {
        self.current_subparams.push(self.current_param.take().unwrap_or(0));
    }

    fn end_group(&mut self) {
        let mut group = std::mem::take(&mut self.current_subparams);
        group.push(self.current_param.take().unwrap_or(0));
        self.param_groups.push(group);
    }

    /// Finalize a trailing group only if one is pending.
    fn flush_group(&mut self) {
        if self.current_param.is_some() || !self.current_subparams.is_empty() {
            self.end_group();
        }
    }

    fn dispatch(&mut self, terminator: char, in_dcs: bool) {
        self.flush_group();
        let intermediate = std::mem::take(&mut self.intermediate);
        let params = Params::from(std::mem::take(&mut self.param_groups));
        if in_dcs {
            self.dcs_intermediate = intermediate;
            self.dcs_params = params;
            self.dcs_terminator = terminator;
            self.string_kind = StringKind::Dcs;
            self.string_data.clear();
            self.state = State::DcsPassthrough;
        } else {
            self.results.push(ParserResult::Csi(Csi {
                intermediate,
                params,
                terminator,
            }));
            self.state = State::Ground;
        }
    }

    fn finish_string(&mut self) {
        let data = std::mem::take(&mut self.string_data);
        match self.string_kind {
            StringKind::Osc => self.results.push(ParserResult::Osc(Osc { data })),
            StringKind::Apc => self.results.push(ParserResult::Apc(Apc { data })),
            StringKind::Ignored => {}
            StringKind::Dcs => {
                self.results.push(ParserResult::Dcs(Dcs {
                    intermediate: std::mem::take(&mut self.dcs_intermediate),
                    params: std::mem::take(&mut self.dcs_params),
                    terminator: self.dcs_terminator,
                    data,
                }));
            }
        }
        self.state = State::Ground;
    }

    fn emit_control(&mut self, ch: char, was_in_escape: bool) {
        self.results.push(ParserResult::Control(ControlCharacter {
            code_point: ch,
            was_in_escape,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<ParserResult> {
        EscapeSequenceParser::new().parse_application_escape_sequences(input)
    }

    fn csi(intermediate: &str, params: &[u32], terminator: char) -> ParserResult {
        ParserResult::Csi(Csi {
            intermediate: intermediate.into(),
            params: Params::from_slice(params),
            terminator,
        })
    }

    #[test]
    fn test_printable_and_controls() {
        let results = parse("a\nb");
        assert_eq!(
            results,
            vec![
                ParserResult::Printable(PrintableCharacter { code_point: 'a' }),
                ParserResult::Control(ControlCharacter {
                    code_point: '\n',
                    was_in_escape: false
                }),
                ParserResult::Printable(PrintableCharacter { code_point: 'b' }),
            ]
        );
    }

    #[test]
    fn test_csi_with_params() {
        assert_eq!(parse("\x1b[5;10H"), vec![csi("", &[5, 10], 'H')]);
        assert_eq!(parse("\x1b[H"), vec![csi("", &[], 'H')]);
        assert_eq!(parse("\x1b[?1049h"), vec![csi("?", &[1049], 'h')]);
        assert_eq!(parse("\x1b[>31u"), vec![csi(">", &[31], 'u')]);
    }

    #[test]
    fn test_csi_with_space_intermediate() {
        assert_eq!(parse("\x1b[4 q"), vec![csi(" ", &[4], 'q')]);
    }

    #[test]
    fn test_csi_subparams() {
        let mut params = Params::new();
        params.add_subparams(vec![4, 3]);
        assert_eq!(
            parse("\x1b[4:3m"),
            vec![ParserResult::Csi(Csi {
                intermediate: String::new(),
                params,
                terminator: 'm',
            })]
        );
    }

    #[test]
    fn test_csi_private_and_intermediate() {
        assert_eq!(parse("\x1b[?2026$p"), vec![csi("?$", &[2026], 'p')]);
    }

    #[test]
    fn test_osc_bel_and_st() {
        assert_eq!(
            parse("\x1b]52;c;aGk=\x07"),
            vec![ParserResult::Osc(Osc {
                data: "52;c;aGk=".into()
            })]
        );
        assert_eq!(
            parse("\x1b]52;c;aGk=\x1b\\"),
            vec![ParserResult::Osc(Osc {
                data: "52;c;aGk=".into()
            })]
        );
    }

    #[test]
    fn test_dcs_decrqss() {
        assert_eq!(
            parse("\x1bP$qm\x1b\\"),
            vec![ParserResult::Dcs(Dcs {
                intermediate: "$".into(),
                params: Params::new(),
                terminator: 'q',
                data: "m".into(),
            })]
        );
    }

    #[test]
    fn test_escape_dispatch() {
        assert_eq!(
            parse("\x1bM"),
            vec![ParserResult::Escape(Escape {
                intermediate: String::new(),
                terminator: 'M'
            })]
        );
        assert_eq!(
            parse("\x1b#8"),
            vec![ParserResult::Escape(Escape {
                intermediate: "#".into(),
                terminator: '8'
            })]
        );
    }

    #[test]
    fn test_sequence_split_across_feeds() {
        let mut parser = EscapeSequenceParser::new();
        assert!(parser.parse_application_escape_sequences("\x1b[1;").is_empty());
        assert_eq!(
            parser.parse_application_escape_sequences("2H"),
            vec![csi("", &[1, 2], 'H')]
        );
    }

    #[test]
    fn test_input_flush_reports_bare_escape() {
        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_input_escape_sequences("\x1b", true);
        assert_eq!(
            results,
            vec![ParserResult::Control(ControlCharacter {
                code_point: '\x1b',
                was_in_escape: false
            })]
        );

        // Without the flush the ESC is held for a continuation.
        let mut parser = EscapeSequenceParser::new();
        assert!(parser.parse_input_escape_sequences("\x1b", false).is_empty());
        assert_eq!(
            parser.parse_input_escape_sequences("[A", false),
            vec![csi("", &[], 'A')]
        );
    }

    #[test]
    fn test_control_in_escape_reports_meta() {
        let mut parser = EscapeSequenceParser::new();
        let results = parser.parse_input_escape_sequences("\x1b\x08", true);
        assert_eq!(
            results,
            vec![ParserResult::Control(ControlCharacter {
                code_point: '\x08',
                was_in_escape: true
            })]
        );
    }

    #[test]
    fn test_apc_string() {
        assert_eq!(
            parse("\x1b_Gdata\x1b\\"),
            vec![ParserResult::Apc(Apc {
                data: "Gdata".into()
            })]
        );
    }

    #[test]
    fn test_control_inside_csi_executes() {
        let results = parse("\x1b[1\n;2H");
        assert_eq!(
            results,
            vec![
                ParserResult::Control(ControlCharacter {
                    code_point: '\n',
                    was_in_escape: false
                }),
                csi("", &[1, 2], 'H'),
            ]
        );
    }

    #[test]
    fn test_can_aborts_sequence() {
        let results = parse("\x1b[12\x18x");
        assert_eq!(
            results,
            vec![ParserResult::Printable(PrintableCharacter { code_point: 'x' })]
        );
    }
}
