//! Pane: one child process, its PTY, and its terminal emulation state.
//!
//! The server reads PTY output in bounded chunks per tick, feeds it
//! through the VT parser into the pane's `Screen`, and drains the
//! resulting events (bell, title, responses to write back). Input bytes
//! queue in `write_queue` until the PTY is writable; past the high-water
//! mark, reads from the PTY pause until the queue drains.

use std::collections::VecDeque;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, RawFd};
use std::time::Instant;

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use rmux_core::event::{EventQueue, ScreenEvent};
use rmux_core::Screen;
use thiserror::Error;
use vte::ansi::Processor;

use crate::options::Options;
use crate::registry::PaneId;

/// Bytes drained from one PTY per event-loop tick (fairness bound).
pub const READ_BUDGET: usize = 65536;

/// Pending input beyond this pauses reads from the pane (backpressure).
pub const WRITE_HIGH_WATER: usize = 131_072;

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to open pty: {0}")]
    OpenPty(String),
    #[error("failed to spawn {argv0}: {err}")]
    Spawn { argv0: String, err: String },
}

/// What a pane is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaneMode {
    /// Live child output.
    #[default]
    Default,
    /// Frozen viewport scrolled back into history.
    ViewHistory,
}

pub struct SpawnConfig {
    pub argv: Vec<String>,
    pub cwd: Option<String>,
    pub env: Vec<(String, String)>,
    pub cols: u16,
    pub rows: u16,
    pub history_limit: usize,
}

/// Everything the parser surfaced during one `feed`.
#[derive(Debug, Default)]
pub struct PaneOutput {
    pub bell: bool,
    pub activity: bool,
    pub title_changed: bool,
    /// OSC 52 stores: (selector, text).
    pub clipboard: Vec<(u8, String)>,
}

pub struct Pane {
    pub id: PaneId,
    screen: Screen<EventQueue>,
    processor: Processor,
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    master_fd: RawFd,
    write_queue: VecDeque<u8>,
    /// Reads paused while the write queue is over the high-water mark.
    reads_paused: bool,
    pub mode: PaneMode,
    pub dead: bool,
    pub exit_status: Option<u32>,
    pub last_activity: Instant,
    pub title: String,
    pub options: Options,
}

// The master fd stays owned by `master` for the pane's whole life; this
// borrow is only used for poll registration and non-blocking I/O.
fn borrow_fd(fd: RawFd) -> BorrowedFd<'static> {
    #[allow(unsafe_code)]
    unsafe {
        BorrowedFd::borrow_raw(fd)
    }
}

impl Pane {
    /// Open a PTY pair, spawn the child on the slave side, and wrap the
    /// master for the event loop. The master is switched to non-blocking
    /// before first use.
    pub fn spawn(id: PaneId, cfg: &SpawnConfig) -> Result<Self, SpawnError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: cfg.rows,
                cols: cfg.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::OpenPty(e.to_string()))?;

        let argv0 = cfg.argv.first().cloned().unwrap_or_else(|| "sh".to_string());
        let mut cmd = CommandBuilder::new(&argv0);
        for arg in cfg.argv.iter().skip(1) {
            cmd.arg(arg);
        }
        if let Some(ref dir) = cfg.cwd {
            cmd.cwd(dir);
        }
        for (key, value) in &cfg.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::Spawn { argv0: argv0.clone(), err: e.to_string() })?;
        drop(pair.slave);

        let master_fd = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| SpawnError::OpenPty("master has no fd".to_string()))?;
        if let Err(e) = fcntl(master_fd, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)) {
            log::warn!("pane {id}: O_NONBLOCK failed: {e}");
        }

        log::debug!("pane {id}: spawned {argv0}");

        Ok(Self {
            id,
            screen: Screen::new(cfg.cols as usize, cfg.rows as usize, cfg.history_limit, EventQueue::new()),
            processor: Processor::new(),
            master: pair.master,
            child,
            master_fd,
            write_queue: VecDeque::new(),
            reads_paused: false,
            mode: PaneMode::default(),
            dead: false,
            exit_status: None,
            last_activity: Instant::now(),
            title: String::new(),
            options: Options::new(),
        })
    }

    pub fn fd(&self) -> RawFd {
        self.master_fd
    }

    pub fn screen(&self) -> &Screen<EventQueue> {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen<EventQueue> {
        &mut self.screen
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Whether the event loop should poll this pane's fd for reads.
    pub fn wants_read(&self) -> bool {
        !self.dead && !self.reads_paused
    }

    /// Whether the event loop should poll this pane's fd for writes.
    pub fn wants_write(&self) -> bool {
        !self.dead && !self.write_queue.is_empty()
    }

    /// Drain up to the read budget from the PTY and run it through the
    /// parser. Returns what the bytes produced, or `None` at EOF.
    pub fn read_ready(&mut self) -> io::Result<Option<PaneOutput>> {
        let mut buf = [0u8; 4096];
        let mut total = 0;
        let mut out = PaneOutput::default();

        while total < READ_BUDGET {
            match nix::unistd::read(self.master_fd, &mut buf) {
                Ok(0) => {
                    if total == 0 {
                        return Ok(None);
                    }
                    break;
                }
                Ok(n) => {
                    total += n;
                    self.feed(&buf[..n], &mut out);
                }
                Err(nix::errno::Errno::EAGAIN) => break,
                Err(nix::errno::Errno::EIO) => {
                    // Slave side fully closed.
                    if total == 0 {
                        return Ok(None);
                    }
                    break;
                }
                Err(e) => return Err(io::Error::from(e)),
            }
        }

        if total > 0 {
            out.activity = true;
            self.last_activity = Instant::now();
        }
        Ok(Some(out))
    }

    /// Feed bytes through the parser and fold screen events into `out`.
    pub fn feed(&mut self, bytes: &[u8], out: &mut PaneOutput) {
        self.processor.advance(&mut self.screen, bytes);
        for event in self.screen.listener().drain() {
            match event {
                ScreenEvent::Bell => out.bell = true,
                ScreenEvent::Title(title) => {
                    self.title = title;
                    out.title_changed = true;
                }
                ScreenEvent::PtyWrite(bytes) => self.send(&bytes),
                ScreenEvent::ClipboardStore(selector, text) => {
                    out.clipboard.push((selector, text));
                }
                ScreenEvent::ModesChanged => {}
            }
        }
    }

    /// Queue input bytes for the child. Past the high-water mark, pane
    /// reads pause until the queue drains below it again.
    pub fn send(&mut self, bytes: &[u8]) {
        if self.dead {
            return;
        }
        self.write_queue.extend(bytes);
        if self.write_queue.len() > WRITE_HIGH_WATER {
            self.reads_paused = true;
        }
    }

    /// Write queued input to the PTY until it would block.
    pub fn flush_writes(&mut self) -> io::Result<()> {
        while !self.write_queue.is_empty() {
            let (head, _) = self.write_queue.as_slices();
            match nix::unistd::write(borrow_fd(self.master_fd), head) {
                Ok(0) => break,
                Ok(n) => {
                    self.write_queue.drain(..n);
                }
                Err(nix::errno::Errno::EAGAIN) => break,
                Err(e) => return Err(io::Error::from(e)),
            }
        }
        if self.write_queue.len() <= WRITE_HIGH_WATER / 2 {
            self.reads_paused = false;
        }
        Ok(())
    }

    /// Resize the PTY and the emulation state.
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        if let Err(e) = self.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        }) {
            log::warn!("pane {}: pty resize failed: {e}", self.id);
        }
        self.screen.resize(cols as usize, rows as usize);
    }

    /// Reap the child if it has exited. Returns true when the pane just
    /// died.
    pub fn check_child(&mut self) -> bool {
        if self.dead {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_status = Some(status.exit_code());
                self.dead = true;
                log::debug!("pane {}: child exited with {}", self.id, status.exit_code());
                true
            }
            Ok(None) => false,
            Err(e) => {
                log::warn!("pane {}: try_wait failed: {e}", self.id);
                false
            }
        }
    }

    /// Hang up the child and stop all I/O. Idempotent.
    pub fn close(&mut self) {
        if let Some(pid) = self.child.process_id() {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGHUP,
            );
        }
        self.dead = true;
        self.write_queue.clear();
    }

    /// Scroll the viewport into history (enters view mode) or back.
    pub fn scroll_history(&mut self, delta: isize) {
        self.screen.grid_mut().scroll_display(delta);
        self.mode = if self.screen.grid().display_offset == 0 {
            PaneMode::Default
        } else {
            PaneMode::ViewHistory
        };
    }
}

impl AsFd for Pane {
    fn as_fd(&self) -> BorrowedFd<'_> {
        borrow_fd(self.master_fd)
    }
}
