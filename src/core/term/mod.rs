//! Terminal emulation: parameter lists, graphics renditions, the escape
//! sequence parser, and the terminal state machine itself.

pub mod params;
pub mod parser;
pub mod rendition;
pub mod state;

pub use params::Params;
pub use parser::{
    Apc, ControlCharacter, Csi, Dcs, Escape, EscapeSequenceParser, Osc, ParserResult,
    PrintableCharacter,
};
pub use rendition::{BlinkMode, Color, FontWeight, GraphicsRendition, UnderlineMode};
pub use state::{
    Cell, CursorStyle, KeyReportingFlags, MouseEncoding, MouseProtocol, Row, Terminal,
    TerminalEvent, WindowSize,
};
