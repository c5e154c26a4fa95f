//! ttx - a tiling terminal multiplexer.
//!
//! Hosts multiple child processes, each on its own PTY with a full virtual
//! terminal, composes their screens into a tiled layout on the host
//! terminal, and routes input to the focused pane.
//!
//! # Quick start
//!
//! ```text
//! ttx bash           # run bash in the first pane
//! ```
//!
//! # Keybindings (Ctrl+B prefix)
//!
//! | Key | Action |
//! |-----|--------|
//! | c | New tab |
//! | 1-9 | Switch tab |
//! | \| | Split horizontal |
//! | - | Split vertical |
//! | Ctrl+H/J/K/L | Navigate panes |
//! | h/j/k/l | Resize pane (shift reverses) |
//! | x | Close pane |
//! | d | Detach (quit) |
//!
//! Three threads cooperate around one shared layout state: the input thread
//! parses host stdin and dispatches key binds, the render thread ticks at
//! 40 Hz emitting frame diffs, and the main thread waits for SIGWINCH.

mod core;
mod input;
mod ui;
mod wm;

use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crossterm::terminal;
use signal_hook::consts::SIGWINCH;
use signal_hook::iterator::Signals;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::core::term::{GraphicsRendition, WindowSize};
use crate::core::utf8::Utf8StreamDecoder;
use crate::input::{Event, Key, KeyEvent, KeyEventType, TerminalInputParser};
use crate::ui::{find_bind, make_key_binds, Action, InputMode, RenderedCursor, Renderer};
use crate::wm::{Direction, LayoutNode, LayoutPart, LayoutState, PaneId, RenderEvent};

const FRAME_INTERVAL: Duration = Duration::from_millis(25);

fn print_usage() {
    eprintln!("usage: ttx COMMAND...");
    eprintln!();
    eprintln!("Runs COMMAND in the first pane of a tiled terminal multiplexer.");
    eprintln!("The prefix key is Ctrl+B; new panes run COMMAND as well.");
}

fn init_logging() {
    // Stdout belongs to the compositor, so logs go to a file.
    if let Ok(file) = std::fs::File::create("/tmp/ttx.log") {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn host_window_size() -> io::Result<WindowSize> {
    use std::os::fd::AsFd;
    if let Ok(ws) = rustix_openpty::rustix::termios::tcgetwinsize(io::stdout().as_fd()) {
        if ws.ws_row > 0 && ws.ws_col > 0 {
            return Ok(WindowSize::with_pixels(
                ws.ws_row,
                ws.ws_col,
                u32::from(ws.ws_xpixel),
                u32::from(ws.ws_ypixel),
            ));
        }
    }
    let (cols, rows) = terminal::size()?;
    Ok(WindowSize::new(rows, cols))
}

/// Raw-mode scope: restores cooked mode on every exit path.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Host terminal setup scope; torn down in reverse order on drop.
struct TerminalSetupGuard;

impl TerminalSetupGuard {
    fn enter() -> io::Result<Self> {
        let mut out = io::stdout();
        // Alternate screen, home, clear.
        out.write_all(b"\x1b[?1049h\x1b[H\x1b[2J")?;
        // The compositor does its own wrapping.
        out.write_all(b"\x1b[?7l")?;
        // Kitty keyboard: disambiguate + events + alternates + all-as-escape
        // + associated text.
        out.write_all(b"\x1b[>31u")?;
        // Any-event mouse tracking with SGR encoding.
        out.write_all(b"\x1b[?1003h\x1b[?1006h")?;
        // Focus reporting.
        out.write_all(b"\x1b[?1004h")?;
        // Bracketed paste.
        out.write_all(b"\x1b[?2004h")?;
        out.flush()?;
        Ok(Self)
    }
}

impl Drop for TerminalSetupGuard {
    fn drop(&mut self) {
        let mut out = io::stdout();
        let _ = out.write_all(b"\x1b[?2004l");
        let _ = out.write_all(b"\x1b[?1004l");
        let _ = out.write_all(b"\x1b[?1006l\x1b[?1003l");
        let _ = out.write_all(b"\x1b[<u");
        let _ = out.write_all(b"\x1b[?7h");
        let _ = out.write_all(b"\x1b[?1049l\x1b[?25h");
        let _ = out.flush();
    }
}

/// Flip the shutdown flag and wake every blocked thread: SIGWINCH for the
/// signal loop, and a device-attributes request whose reply unblocks the
/// stdin read.
fn request_shutdown(done: &AtomicBool) {
    if !done.swap(true, Ordering::Release) {
        unsafe {
            libc::raise(libc::SIGWINCH);
        }
        let mut out = io::stdout();
        let _ = out.write_all(b"\x1b[c");
        let _ = out.flush();
    }
}

fn main() -> ExitCode {
    let command: Vec<String> = std::env::args().skip(1).collect();
    if command.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_usage();
        return ExitCode::SUCCESS;
    }
    if command.is_empty() {
        print_usage();
        return ExitCode::from(2);
    }

    init_logging();
    info!(command = %command.join(" "), "ttx starting");

    let size = match host_window_size() {
        Ok(size) => size,
        Err(error) => {
            eprintln!("ttx: cannot query terminal size: {error}");
            return ExitCode::FAILURE;
        }
    };

    let (events_tx, events_rx) = mpsc::channel();
    let layout_state = Arc::new(Mutex::new(LayoutState::new(size)));

    // The first pane; a spawn failure aborts before touching the terminal.
    if let Err(error) = layout_state.lock().unwrap().add_tab(&command, &events_tx) {
        eprintln!("ttx: failed to spawn '{}': {error}", command[0]);
        return ExitCode::FAILURE;
    }

    let mut signals = match Signals::new([SIGWINCH]) {
        Ok(signals) => signals,
        Err(error) => {
            eprintln!("ttx: cannot install signal handler: {error}");
            return ExitCode::FAILURE;
        }
    };

    let _raw_mode = match RawModeGuard::enter() {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("ttx: cannot enter raw mode: {error}");
            return ExitCode::FAILURE;
        }
    };
    let _setup = match TerminalSetupGuard::enter() {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("ttx: cannot initialize terminal: {error}");
            return ExitCode::FAILURE;
        }
    };

    let done = Arc::new(AtomicBool::new(false));

    let input_handle = {
        let command = command.clone();
        let layout_state = Arc::clone(&layout_state);
        let events_tx = events_tx.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || input_thread(&command, &layout_state, &events_tx, &done))
    };

    let render_handle = {
        let layout_state = Arc::clone(&layout_state);
        let done = Arc::clone(&done);
        std::thread::spawn(move || render_thread(&layout_state, events_rx, &done))
    };

    // The signal loop lives on the main thread.
    for _ in signals.forever() {
        if done.load(Ordering::Acquire) {
            break;
        }
        if let Ok(new_size) = host_window_size() {
            let _ = events_tx.send(RenderEvent::WindowSize(new_size));
        }
    }

    let _ = render_handle.join();
    let _ = input_handle.join();

    // Hang up whatever children remain, then reap their threads.
    // TODO: skip waiting for children that ignore SIGHUP.
    let panes = layout_state.lock().unwrap().all_panes();
    for pane in &panes {
        pane.exit();
    }
    for pane in &panes {
        pane.join_threads();
    }

    info!("ttx exiting");
    ExitCode::SUCCESS
}

fn input_thread(
    command: &[String],
    layout_state: &Mutex<LayoutState>,
    events: &Sender<RenderEvent>,
    done: &AtomicBool,
) {
    let binds = make_key_binds(Key::Char('b'));
    let mut mode = InputMode::Insert;
    let mut parser = TerminalInputParser::new();
    let mut decoder = Utf8StreamDecoder::new();
    let mut buffer = [0u8; 4096];
    let mut stdin = io::stdin();

    'read: while !done.load(Ordering::Acquire) {
        let nread = match stdin.read(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        if done.load(Ordering::Acquire) {
            break;
        }

        let text = decoder.decode(&buffer[..nread]);
        for event in parser.parse(&text) {
            if done.load(Ordering::Acquire) {
                break 'read;
            }

            match event {
                Event::Key(key_event) => {
                    if key_event.event_type() == KeyEventType::Press
                        && !key_event.key().is_modifier()
                    {
                        if let Some(bind) = find_bind(&binds, mode, &key_event) {
                            let next_mode = bind.next_mode.unwrap_or(InputMode::Insert);
                            apply_action(
                                bind.action,
                                &key_event,
                                command,
                                layout_state,
                                events,
                                done,
                            );
                            mode = next_mode;
                            continue;
                        }
                    }
                    // Keep the lock while the pane handles the event so the
                    // pane cannot be destroyed underneath us.
                    let state = layout_state.lock().unwrap();
                    if let Some(pane) = state.active_pane() {
                        pane.event(&Event::Key(key_event));
                    }
                }
                Event::Mouse(mouse_event) => {
                    layout_state.lock().unwrap().mouse_event(&mouse_event);
                }
                other => {
                    let state = layout_state.lock().unwrap();
                    if let Some(pane) = state.active_pane() {
                        pane.event(&other);
                    }
                }
            }
        }
    }

    request_shutdown(done);
}

fn apply_action(
    action: Action,
    key_event: &KeyEvent,
    command: &[String],
    layout_state: &Mutex<LayoutState>,
    events: &Sender<RenderEvent>,
    done: &AtomicBool,
) {
    match action {
        Action::EnterNormalMode | Action::ResetMode => {}
        Action::SendToPane => {
            let state = layout_state.lock().unwrap();
            if let Some(pane) = state.active_pane() {
                pane.event(&Event::Key(key_event.clone()));
            }
        }
        Action::CreateTab => {
            if let Err(error) = layout_state.lock().unwrap().add_tab(command, events) {
                error!(%error, "create tab failed");
            }
        }
        Action::SwitchTab(number) => {
            layout_state.lock().unwrap().set_active_tab(number);
        }
        Action::Navigate(direction) => {
            layout_state.lock().unwrap().navigate(direction);
        }
        Action::Resize(direction, delta) => {
            layout_state.lock().unwrap().resize_active(direction, delta);
        }
        Action::AddPane(direction) => {
            if let Err(error) = layout_state
                .lock()
                .unwrap()
                .add_pane(command, direction, events)
            {
                error!(%error, "split failed");
            }
        }
        Action::ExitPane => {
            let state = layout_state.lock().unwrap();
            if let Some(pane) = state.active_pane() {
                pane.exit();
            }
        }
        Action::Quit => request_shutdown(done),
    }
}

fn render_thread(
    layout_state: &Mutex<LayoutState>,
    events_rx: Receiver<RenderEvent>,
    done: &AtomicBool,
) {
    let mut renderer = Renderer::new();
    let mut stdout = io::stdout();
    let mut deadline = Instant::now();

    while !done.load(Ordering::Acquire) {
        let mut clipboard = Vec::new();
        let cursor = {
            let mut state = layout_state.lock().unwrap();

            for event in events_rx.try_iter() {
                match event {
                    RenderEvent::WindowSize(size) => state.relayout(size),
                    RenderEvent::PaneExited(id) => {
                        if state.remove_pane(id) {
                            // The last pane is gone.
                            request_shutdown(done);
                        }
                    }
                    RenderEvent::CopyToClipboard(bytes) => clipboard.push(bytes),
                }
            }

            let active: Option<PaneId> = state.active_pane().map(|pane| pane.id());
            state.active_tab().and_then(|tab| tab.layout_tree()).map(|tree| {
                renderer.start(state.size());
                let mut cursor = None;
                draw_node(&mut renderer, tree, active, state.size(), &mut cursor);
                cursor.unwrap_or_default()
            })
        };

        if let Some(cursor) = cursor {
            if let Err(error) = renderer.finish(&mut stdout, cursor) {
                // Losing the host terminal is fatal.
                error!(%error, "host terminal write failed");
                request_shutdown(done);
                break;
            }
        }

        for bytes in clipboard {
            let _ = write!(stdout, "\x1b]52;c;{}\x07", BASE64.encode(&bytes));
            let _ = stdout.flush();
        }

        while deadline < Instant::now() {
            deadline += FRAME_INTERVAL;
        }
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
}

/// Walk the layout tree: separators between siblings, then each pane
/// clipped to its rectangle. The active pane decides the hardware cursor.
fn draw_node(
    renderer: &mut Renderer,
    node: &LayoutNode,
    active: Option<PaneId>,
    screen: WindowSize,
    cursor: &mut Option<RenderedCursor>,
) {
    let mut first = true;
    for child in &node.children {
        if !first {
            let (row, col, size) = child.rect();
            renderer.set_bound(0, 0, screen.cols, screen.rows);
            match node.direction {
                Direction::Horizontal => {
                    for r in row..row + size.rows {
                        renderer.put_text(
                            "\u{2502}",
                            r,
                            col.saturating_sub(1),
                            GraphicsRendition::default(),
                        );
                    }
                }
                Direction::Vertical => {
                    for c in col..col + size.cols {
                        renderer.put_text(
                            "\u{2500}",
                            row.saturating_sub(1),
                            c,
                            GraphicsRendition::default(),
                        );
                    }
                }
                Direction::None => {}
            }
        }
        first = false;

        match child {
            LayoutPart::Node(inner) => draw_node(renderer, inner, active, screen, cursor),
            LayoutPart::Entry(entry) => {
                renderer.set_bound(entry.row, entry.col, entry.size.cols, entry.size.rows);
                let mut pane_cursor = entry.pane.draw(renderer);
                if active == Some(entry.pane.id()) {
                    pane_cursor.cursor_row += entry.row;
                    pane_cursor.cursor_col += entry.col;
                    *cursor = Some(pane_cursor);
                }
            }
            LayoutPart::EmptySlot { .. } => {}
        }
    }
}
