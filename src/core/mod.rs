//! Core terminal emulation components.
//!
//! This module contains the low-level machinery shared by every pane:
//!
//! - **pty**: Unix pseudo-terminal open/spawn/resize
//! - **term**: VT100/VT510/xterm terminal state and escape sequence parser
//! - **utf8**: streaming UTF-8 decoding for PTY and stdin reads

pub mod pty;
pub mod term;
pub mod utf8;
