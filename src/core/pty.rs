//! Unix pseudo-terminal handling.
//!
//! Opens a PTY pair, spawns the child attached to the slave side as its
//! controlling terminal, and exposes the master for I/O, resizing, and
//! signalling.

use std::io::{self, Read, Write};
use std::os::fd::AsFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;

use rustix_openpty::openpty;
use rustix_openpty::rustix::termios::{tcsetwinsize, Winsize};
use thiserror::Error;

use super::term::WindowSize;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("failed to open pty pair: {0}")]
    Open(#[source] io::Error),

    #[error("failed to spawn child process: {0}")]
    Spawn(#[source] io::Error),

    #[error("failed to resize pty: {0}")]
    Resize(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

fn to_winsize(size: WindowSize) -> Winsize {
    Winsize {
        ws_row: size.rows,
        ws_col: size.cols,
        ws_xpixel: size.pixel_width.min(u32::from(u16::MAX)) as u16,
        ws_ypixel: size.pixel_height.min(u32::from(u16::MAX)) as u16,
    }
}

/// The master side of a PTY pair plus the child attached to the slave.
pub struct Pty {
    master: std::fs::File,
    child: Mutex<Child>,
    child_pid: libc::pid_t,
}

impl Pty {
    /// Open a PTY of the given size and spawn `command` on its slave side.
    ///
    /// The child runs in a new session with the slave as its controlling
    /// terminal and as stdin/stdout/stderr, and sees `TERM=xterm-256color`
    /// and `COLORTERM=truecolor`.
    pub fn spawn(command: &[String], size: WindowSize) -> Result<Self> {
        let pair = openpty(None, Some(&to_winsize(size))).map_err(|e| PtyError::Open(e.into()))?;
        let (master, slave) = (pair.controller, pair.user);

        let mut builder = Command::new(&command[0]);
        builder.args(&command[1..]);
        builder.env("TERM", "xterm-256color");
        builder.env("COLORTERM", "truecolor");
        builder.stdin(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
        builder.stderr(Stdio::from(slave.try_clone().map_err(PtyError::Spawn)?));
        builder.stdout(Stdio::from(slave));

        let master_fd = {
            use std::os::fd::AsRawFd;
            master.as_raw_fd()
        };
        unsafe {
            builder.pre_exec(move || {
                // New session, with the slave (now fd 0) as the controlling
                // terminal.
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                    return Err(io::Error::last_os_error());
                }

                // The child must not hold the master open.
                libc::close(master_fd);

                // Restore default signal dispositions.
                libc::signal(libc::SIGCHLD, libc::SIG_DFL);
                libc::signal(libc::SIGHUP, libc::SIG_DFL);
                libc::signal(libc::SIGINT, libc::SIG_DFL);
                libc::signal(libc::SIGQUIT, libc::SIG_DFL);
                libc::signal(libc::SIGTERM, libc::SIG_DFL);
                libc::signal(libc::SIGWINCH, libc::SIG_DFL);

                Ok(())
            });
        }

        let child = builder.spawn().map_err(PtyError::Spawn)?;
        let child_pid = child.id() as libc::pid_t;

        Ok(Self {
            master: std::fs::File::from(master),
            child: Mutex::new(child),
            child_pid,
        })
    }

    /// Blocking read of child output from the master side.
    pub fn read(&self, buffer: &mut [u8]) -> io::Result<usize> {
        (&self.master).read(buffer)
    }

    /// Write input bytes to the child.
    pub fn write_all(&self, bytes: &[u8]) -> io::Result<()> {
        (&self.master).write_all(bytes)
    }

    /// Propagate a size change to the kernel (and thus to the child via
    /// SIGWINCH).
    pub fn resize(&self, size: WindowSize) -> Result<()> {
        tcsetwinsize(self.master.as_fd(), to_winsize(size))
            .map_err(|e| PtyError::Resize(e.into()))
    }

    /// Block until the child exits and reap it.
    pub fn wait(&self) -> io::Result<ExitStatus> {
        self.child
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .wait()
    }

    /// Ask the child to hang up, as if its terminal went away.
    pub fn signal_hangup(&self) {
        unsafe {
            libc::kill(self.child_pid, libc::SIGHUP);
        }
    }
}
