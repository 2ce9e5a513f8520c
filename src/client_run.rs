//! The client program: connect to the server, identify, issue a
//! command, and (when attaching) pump bytes between the local tty and
//! the socket until the server says goodbye.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use nix::sys::termios::{self, LocalFlags, SetArg, Termios};
use signal_hook::consts::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook_mio::v1_0::Signals;

use crate::protocol::{
    encode_strings, send_with_fd, ClientCaps, Frame, FrameCodec, Identify, MsgType, ResizeBody,
};
use crate::socket;
use crate::PROTOCOL_VERSION;

const TOKEN_SOCKET: Token = Token(0);
const TOKEN_STDIN: Token = Token(1);
const TOKEN_SIGNALS: Token = Token(2);

/// How long to wait for a freshly spawned server to bind its socket.
const START_TIMEOUT: Duration = Duration::from_secs(3);

/// Connect, or spawn the server and connect.
fn connect(path: &Path, may_start: bool) -> io::Result<UnixStream> {
    match UnixStream::connect(path) {
        Ok(stream) => return Ok(stream),
        Err(e) if !may_start => return Err(e),
        Err(_) => {}
    }

    // No server: fork one, detached, and wait for the socket.
    let exe = std::env::current_exe()?;
    Command::new(exe)
        .arg("server")
        .arg("--socket-path")
        .arg(path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    let deadline = Instant::now() + START_TIMEOUT;
    loop {
        match UnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                if Instant::now() >= deadline {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionRefused,
                        format!("server failed to start: {e}"),
                    ));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
}

/// Capabilities advertised from the local environment.
fn local_caps() -> ClientCaps {
    let mut caps = ClientCaps::DEFAULT_COLORS | ClientCaps::CLIPBOARD;
    let term = std::env::var("TERM").unwrap_or_default();
    if term.contains("256color") {
        caps |= ClientCaps::COLORS_256;
    }
    if term.contains("88color") {
        caps |= ClientCaps::COLORS_88;
    }
    let lang = std::env::var("LANG").unwrap_or_default();
    if lang.to_uppercase().contains("UTF-8") || lang.to_uppercase().contains("UTF8") {
        caps |= ClientCaps::UTF8;
    }
    if std::env::var("COLORTERM").is_ok_and(|v| v == "truecolor" || v == "24bit") {
        caps |= ClientCaps::TRUE_COLOR;
    }
    caps
}

fn tty_size() -> (u16, u16) {
    let mut ws = libc::winsize {
        ws_row: 0,
        ws_col: 0,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    // SAFETY: TIOCGWINSZ reads into a properly sized winsize struct.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::ioctl(libc::STDIN_FILENO, libc::TIOCGWINSZ, &mut ws) };
    if rc == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        (ws.ws_col, ws.ws_row)
    } else {
        (80, 24)
    }
}

/// Put the controlling tty in raw mode, returning the saved state.
fn enter_raw_mode() -> Option<Termios> {
    let stdin = io::stdin();
    let saved = termios::tcgetattr(&stdin).ok()?;
    let mut raw = saved.clone();
    termios::cfmakeraw(&mut raw);
    // Keep signal generation off; the server sees every byte.
    raw.local_flags.remove(LocalFlags::ISIG);
    termios::tcsetattr(&stdin, SetArg::TCSANOW, &raw).ok()?;
    Some(saved)
}

fn restore_mode(saved: &Termios) {
    let _ = termios::tcsetattr(&io::stdin(), SetArg::TCSANOW, saved);
}

/// Run one client invocation. Returns the process exit code.
pub fn run(label: &str, socket_override: Option<&Path>, argv: Vec<String>) -> i32 {
    let default_path = socket::socket_path(label);
    let path = socket_override.unwrap_or(&default_path);

    // Refuse to nest inside a pane of ourselves.
    if std::env::var("RMUX").is_ok() && argv.first().is_some_and(|c| c == "new-session") {
        eprintln!("sessions should be nested with care; unset RMUX to force");
        return 1;
    }

    let may_start = matches!(
        argv.first().map(String::as_str),
        Some("new-session") | Some("start-server") | None
    );
    if let Err(e) = socket::prepare_dir(&socket::socket_dir()) {
        eprintln!("{e}");
        return 2;
    }
    let stream = match connect(path, may_start) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to connect to server: {e}");
            return if may_start { 2 } else { 1 };
        }
    };

    let argv = if argv.is_empty() {
        vec!["attach-session".to_string()]
    } else {
        argv
    };
    let attaching = matches!(
        argv.first().map(String::as_str),
        Some("attach-session") | Some("new-session")
    ) && !argv.iter().any(|a| a == "-d");

    match pump(stream, &argv, attaching) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("client error: {e}");
            1
        }
    }
}

fn pump(mut stream: UnixStream, argv: &[String], attaching: bool) -> io::Result<i32> {
    let (cols, rows) = tty_size();
    let identify = Identify {
        version: PROTOCOL_VERSION,
        caps: local_caps(),
        cols,
        rows,
        term: std::env::var("TERM").unwrap_or_default(),
        cwd: std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        tty_name: String::new(),
    };

    // IDENTIFY carries the tty fd as ancillary data.
    let identify_frame = Frame::new(MsgType::Identify, identify.encode());
    send_with_fd(
        stream.as_raw_fd(),
        &identify_frame.encode(),
        Some(io::stdin().as_raw_fd()),
    )
    .map_err(io::Error::from)?;

    // Interesting environment for panes spawned by this command.
    let mut environ = Vec::new();
    for key in ["TERM", "SHELL", "HOME", "EDITOR", "VISUAL", "LANG"] {
        if let Ok(value) = std::env::var(key) {
            environ.push(format!("{key}={value}"));
        }
    }
    stream.write_all(&Frame::new(MsgType::Environ, encode_strings(&environ)).encode())?;
    stream.write_all(&Frame::new(MsgType::Command, encode_strings(argv)).encode())?;

    let saved_termios = if attaching { enter_raw_mode() } else { None };
    let result = pump_loop(&mut stream, attaching);
    if let Some(saved) = saved_termios {
        restore_mode(&saved);
        // Leave the screen clean after an attached session.
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x1b[?25h\x1b[0m\r\n");
        let _ = stdout.flush();
    }
    result
}

/// Write a whole frame on the (non-blocking) socket, waiting out short
/// stalls; client frames are small and the server drains quickly.
fn send_frame(stream: &mut UnixStream, frame: &Frame) -> io::Result<()> {
    let bytes = frame.encode();
    let mut off = 0;
    while off < bytes.len() {
        match stream.write(&bytes[off..]) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => off += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn pump_loop(stream: &mut UnixStream, attaching: bool) -> io::Result<i32> {
    stream.set_nonblocking(true)?;

    let mut poll = Poll::new()?;
    let socket_fd = stream.as_raw_fd();
    let stdin_fd = io::stdin().as_raw_fd();
    poll.registry()
        .register(&mut SourceFd(&socket_fd), TOKEN_SOCKET, Interest::READABLE)?;
    if attaching {
        poll.registry()
            .register(&mut SourceFd(&stdin_fd), TOKEN_STDIN, Interest::READABLE)?;
    }
    let mut signals = Signals::new([SIGWINCH, SIGTERM, SIGINT])?;
    poll.registry()
        .register(&mut signals, TOKEN_SIGNALS, Interest::READABLE)?;

    let mut events = Events::with_capacity(64);
    let mut codec = FrameCodec::new();
    let mut stdout = io::stdout();

    loop {
        poll.poll(&mut events, None)?;
        for event in events.iter() {
            match event.token() {
                TOKEN_SOCKET => loop {
                    let mut buf = [0u8; 65536];
                    match stream.read(&mut buf) {
                        Ok(0) => return Ok(0),
                        Ok(n) => codec.push(&buf[..n]),
                        Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                        Err(e) => return Err(e),
                    }
                },
                TOKEN_STDIN => loop {
                    let mut buf = [0u8; 4096];
                    match nix::unistd::read(stdin_fd, &mut buf) {
                        Ok(0) => {
                            send_frame(stream, &Frame::new(MsgType::Detach, Vec::new()))?;
                            break;
                        }
                        Ok(n) => {
                            send_frame(stream, &Frame::new(MsgType::Stdin, buf[..n].to_vec()))?;
                        }
                        Err(nix::errno::Errno::EAGAIN) => break,
                        Err(e) => return Err(io::Error::from(e)),
                    }
                },
                TOKEN_SIGNALS => {
                    let pending: Vec<i32> = signals.pending().collect();
                    for signal in pending {
                        match signal {
                            SIGWINCH => {
                                let (cols, rows) = tty_size();
                                let body = ResizeBody { cols, rows }.encode();
                                send_frame(stream, &Frame::new(MsgType::Resize, body))?;
                            }
                            SIGTERM | SIGINT => {
                                send_frame(stream, &Frame::new(MsgType::Detach, Vec::new()))?;
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        while let Some(frame) = codec
            .next_frame()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
        {
            match frame.ty {
                MsgType::Output => {
                    stdout.write_all(&frame.payload)?;
                    stdout.flush()?;
                }
                MsgType::Exit => {
                    if !frame.payload.is_empty() {
                        let mut stderr = io::stderr();
                        let _ = stderr.write_all(b"\r\n");
                        let _ = stderr.write_all(&frame.payload);
                        let _ = stderr.write_all(b"\r\n");
                    }
                    return Ok(i32::from(frame.flags));
                }
                MsgType::Detach => {
                    return Ok(0);
                }
                MsgType::Ready => {}
                other => {
                    // Unknown directions are fatal on both sides.
                    log::debug!("unexpected frame from server: {other:?}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_compose() {
        let caps = ClientCaps::UTF8 | ClientCaps::COLORS_256 | ClientCaps::TRUE_COLOR;
        assert!(caps.contains(ClientCaps::UTF8));
        assert!(!caps.contains(ClientCaps::CONTROL_MODE));
    }
}
