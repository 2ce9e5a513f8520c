//! The single-threaded readiness loop driving PTYs, client sockets,
//! timers, and signals.
//!
//! Tick order: readable PTYs drain first (bounded per pane), then client
//! frames, then timers and alert coalescing, then rendering, then write
//! flushing, then the sweep of dead entities. No component blocks inside
//! a tick; everything is non-blocking with re-armed interest.

use std::collections::HashMap;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use mio::net::{UnixListener, UnixStream};
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use signal_hook::consts::{SIGCHLD, SIGTERM};
use signal_hook_mio::v1_0::Signals;

use crate::client::ClientState;
use crate::command;
use crate::protocol::{
    decode_strings, Frame, Identify, MsgType, ProtocolError, ResizeBody,
};
use crate::registry::{ClientId, PaneId};
use crate::server::Server;
use crate::socket;
use crate::PROTOCOL_VERSION;

const TOKEN_LISTENER: Token = Token(0);
const TOKEN_SIGNALS: Token = Token(1);
const TOKEN_BASE: usize = 2;

/// How long the listener stays parked after EMFILE/ENFILE.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Client(ClientId),
    Pane(PaneId),
}

/// Interest bits currently registered for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Registered {
    read: bool,
    write: bool,
}

impl Registered {
    fn interest(self) -> Option<Interest> {
        match (self.read, self.write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

pub struct EventLoop {
    poll: Poll,
    server: Server,
    listener: UnixListener,
    listener_parked_until: Option<Instant>,
    signals: Signals,
    socket_path: PathBuf,
    sources: HashMap<Token, Source>,
    client_tokens: HashMap<ClientId, Token>,
    pane_tokens: HashMap<PaneId, Token>,
    client_streams: HashMap<ClientId, UnixStream>,
    client_regs: HashMap<ClientId, Registered>,
    pane_regs: HashMap<PaneId, Registered>,
    next_token: usize,
}

impl EventLoop {
    pub fn new(socket_path: &Path) -> io::Result<Self> {
        socket::prepare_bind(socket_path)?;
        let mut listener = UnixListener::bind(socket_path)?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, TOKEN_LISTENER, Interest::READABLE)?;

        let mut signals = Signals::new([SIGCHLD, SIGTERM])?;
        poll.registry()
            .register(&mut signals, TOKEN_SIGNALS, Interest::READABLE)?;

        log::info!("server listening on {}", socket_path.display());

        let mut server = Server::new();
        server.socket_path = socket_path.to_path_buf();

        Ok(Self {
            poll,
            server,
            listener,
            listener_parked_until: None,
            signals,
            socket_path: socket_path.to_path_buf(),
            sources: HashMap::new(),
            client_tokens: HashMap::new(),
            pane_tokens: HashMap::new(),
            client_streams: HashMap::new(),
            client_regs: HashMap::new(),
            pane_regs: HashMap::new(),
            next_token: TOKEN_BASE,
        })
    }

    /// In-process access for integration tests.
    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Run until the server shuts down.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(256);

        loop {
            self.reconcile_interest()?;
            let timeout = self.next_timeout();
            self.poll.poll(&mut events, timeout)?;

            let now = Instant::now();
            self.maybe_unpark_listener(now)?;

            // I/O phase, PTYs before clients within each poll batch.
            let mut client_work = Vec::new();
            for event in events.iter() {
                match event.token() {
                    TOKEN_LISTENER => self.accept_ready()?,
                    TOKEN_SIGNALS => self.signals_ready(),
                    token => match self.sources.get(&token).copied() {
                        Some(Source::Pane(pane)) => {
                            if event.is_readable() {
                                self.pane_readable(pane);
                            }
                            if event.is_writable() {
                                self.pane_writable(pane);
                            }
                        }
                        Some(Source::Client(client)) => {
                            client_work.push((client, event.is_readable(), event.is_writable()));
                        }
                        None => {}
                    },
                }
            }
            for (client, readable, writable) in client_work {
                if readable {
                    self.client_readable(client);
                }
                if writable {
                    self.flush_client(client);
                }
            }

            // Timers, alerts, rendering, sweep.
            self.server.check_silence(Instant::now());
            self.server.alerts_tick();
            self.server.clear_visited_flags();
            self.server.render_clients();
            self.server.consume_all_damage();

            let ids = self.server.clients.ids();
            for client in ids {
                self.flush_client(client);
            }
            self.server.sweep();
            self.reap_closed_clients()?;
            self.reap_dead_panes()?;

            if self.server.shutting_down && self.server.clients.is_empty() {
                break;
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        log::info!("server exiting");
        Ok(())
    }

    // --- timers ---

    fn next_timeout(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut deadline: Option<Instant> = None;
        let mut consider = |d: Option<Instant>| {
            if let Some(d) = d {
                deadline = Some(deadline.map_or(d, |cur: Instant| cur.min(d)));
            }
        };

        consider(self.server.next_silence_deadline(now));
        consider(self.listener_parked_until);
        for (_, client) in self.server.clients.iter() {
            consider(client.message.as_ref().map(|&(_, expiry)| expiry));
        }

        deadline.map(|d| d.saturating_duration_since(now))
    }

    // --- listener ---

    fn accept_ready(&mut self) -> io::Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, _)) => self.register_client(stream)?,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if is_fd_exhaustion(&e) => {
                    log::warn!("accept: {e}; pausing listener");
                    self.poll.registry().deregister(&mut self.listener)?;
                    self.listener_parked_until = Some(Instant::now() + ACCEPT_BACKOFF);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn maybe_unpark_listener(&mut self, now: Instant) -> io::Result<()> {
        if let Some(until) = self.listener_parked_until {
            if now >= until {
                self.listener_parked_until = None;
                self.poll
                    .registry()
                    .register(&mut self.listener, TOKEN_LISTENER, Interest::READABLE)?;
            }
        }
        Ok(())
    }

    fn register_client(&mut self, stream: UnixStream) -> io::Result<()> {
        let id = self.server.clients.add(crate::client::Client::new);
        let token = Token(self.next_token);
        self.next_token += 1;

        self.sources.insert(token, Source::Client(id));
        self.client_tokens.insert(id, token);
        self.client_streams.insert(id, stream);
        self.client_regs.insert(id, Registered::default());
        log::debug!("client {id} connected");
        Ok(())
    }

    // --- signals ---

    fn signals_ready(&mut self) {
        let pending: Vec<i32> = self.signals.pending().collect();
        for signal in pending {
            match signal {
                SIGCHLD => {
                    let ids = self.server.panes.ids();
                    for pane in ids {
                        let died = self
                            .server
                            .panes
                            .get_mut(pane)
                            .is_some_and(|p| p.check_child());
                        if died {
                            // Output written just before exit is still in
                            // the pty buffer; drain it before reaping.
                            loop {
                                match self.server.panes.get_mut(pane).map(|p| p.read_ready()) {
                                    Some(Ok(Some(out))) if out.activity => {
                                        self.server.note_pane_output(pane, &out);
                                    }
                                    _ => break,
                                }
                            }
                            self.server.handle_pane_exit(pane);
                        }
                    }
                }
                SIGTERM => {
                    log::info!("SIGTERM: shutting down");
                    self.server.begin_shutdown();
                }
                _ => {}
            }
        }
    }

    // --- pane I/O ---

    fn pane_readable(&mut self, pane: PaneId) {
        let result = match self.server.panes.get_mut(pane) {
            Some(p) => p.read_ready(),
            None => return,
        };
        match result {
            Ok(Some(out)) => self.server.note_pane_output(pane, &out),
            Ok(None) => {
                // EOF: the child is gone or going.
                let died = self
                    .server
                    .panes
                    .get_mut(pane)
                    .is_some_and(|p| p.check_child());
                if died || self.server.panes.get(pane).is_some_and(|p| p.dead) {
                    self.server.handle_pane_exit(pane);
                }
            }
            Err(e) => {
                log::warn!("pane {pane}: read error: {e}");
                self.server.kill_pane(pane);
            }
        }
    }

    fn pane_writable(&mut self, pane: PaneId) {
        if let Some(p) = self.server.panes.get_mut(pane) {
            if let Err(e) = p.flush_writes() {
                log::warn!("pane {pane}: write error: {e}");
                self.server.kill_pane(pane);
            }
        }
    }

    // --- client I/O ---

    fn client_readable(&mut self, client: ClientId) {
        let Some(stream) = self.client_streams.get_mut(&client) else {
            return;
        };
        let fd = stream.as_raw_fd();

        let mut buf = [0u8; 65536];
        let mut received_fds: Vec<RawFd> = Vec::new();
        let mut closed = false;
        loop {
            match crate::protocol::recv_with_fds(fd, &mut buf, &mut received_fds) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    if let Some(c) = self.server.clients.get_mut(client) {
                        c.codec.push(&buf[..n]);
                    }
                }
                Err(nix::errno::Errno::EAGAIN) => break,
                Err(e) => {
                    log::debug!("client {client}: read error: {e}");
                    closed = true;
                    break;
                }
            }
        }

        // The only fd a client passes is its tty at IDENTIFY; the server
        // renders over the socket, so ownership ends here.
        for fd in received_fds {
            let _ = nix::unistd::close(fd);
        }

        loop {
            let frame = match self.server.clients.get_mut(client) {
                Some(c) => c.codec.next_frame(),
                None => break,
            };
            match frame {
                Ok(Some(frame)) => self.dispatch_frame(client, frame),
                Ok(None) => break,
                Err(e) => {
                    // Unknown types and oversize frames are fatal.
                    log::warn!("client {client}: protocol error: {e}");
                    self.fatal_client_error(client, &e);
                    break;
                }
            }
        }

        if closed {
            self.drop_client(client);
        }
    }

    fn fatal_client_error(&mut self, client: ClientId, err: &ProtocolError) {
        if let Some(c) = self.server.clients.get_mut(client) {
            let mut frame = Frame::new(MsgType::Exit, format!("{err}").into_bytes());
            frame.flags = 1;
            c.outbuf.extend_from_slice(&frame.encode());
            c.state = ClientState::Detaching;
        }
    }

    fn dispatch_frame(&mut self, client: ClientId, frame: Frame) {
        match frame.ty {
            MsgType::Identify => self.handle_identify(client, &frame),
            MsgType::Environ => {
                if let Some(c) = self.server.clients.get_mut(client) {
                    for entry in decode_strings(&frame.payload) {
                        if let Some((k, v)) = entry.split_once('=') {
                            c.environ.push((k.to_string(), v.to_string()));
                        }
                    }
                }
            }
            MsgType::Command => self.handle_command(client, &frame),
            MsgType::Stdin | MsgType::Keys => self.handle_stdin(client, &frame),
            MsgType::Resize => {
                if let Ok(body) = ResizeBody::decode(&frame.payload) {
                    self.server.client_resized(client, body.cols, body.rows);
                }
            }
            MsgType::Detach => {
                self.server.detach(client, MsgType::Detach, "");
            }
            MsgType::Suspend => {
                if let Some(c) = self.server.clients.get_mut(client) {
                    if c.state == ClientState::Attached {
                        c.state = ClientState::Suspended;
                    }
                }
            }
            MsgType::Wakeup => {
                if let Some(c) = self.server.clients.get_mut(client) {
                    if c.state == ClientState::Suspended {
                        c.state = ClientState::Attached;
                        c.renderer.invalidate();
                        c.needs_redraw = true;
                    }
                }
            }
            MsgType::Shutdown => self.server.begin_shutdown(),
            MsgType::Lock | MsgType::Unlock => {
                // Accepted; locking UI is outside the core.
            }
            MsgType::Exit => {
                self.server.detach(client, MsgType::Exit, "");
            }
            MsgType::Ready | MsgType::Output => {
                // Server-to-client only; a client sending these is
                // confused but harmless.
                log::debug!("client {client}: unexpected {:?}", frame.ty);
            }
        }
    }

    fn handle_identify(&mut self, client: ClientId, frame: &Frame) {
        let identify = match Identify::decode(&frame.payload) {
            Ok(i) => i,
            Err(e) => {
                self.fatal_client_error(client, &e);
                return;
            }
        };

        if identify.version != PROTOCOL_VERSION {
            log::warn!(
                "client {client}: protocol version {} != {}",
                identify.version,
                PROTOCOL_VERSION
            );
            if let Some(c) = self.server.clients.get_mut(client) {
                let mut frame = Frame::new(MsgType::Exit, b"protocol version mismatch".to_vec());
                frame.flags = 1;
                c.outbuf.extend_from_slice(&frame.encode());
                c.state = ClientState::Detaching;
            }
            return;
        }

        if let Some(c) = self.server.clients.get_mut(client) {
            c.caps = identify.caps;
            c.cols = identify.cols;
            c.rows = identify.rows;
            c.term = identify.term;
            c.cwd = identify.cwd;
            c.tty_name = identify.tty_name;
            c.state = ClientState::Identified;
        }
    }

    fn handle_command(&mut self, client: ClientId, frame: &Frame) {
        let argv = decode_strings(&frame.payload);
        log::debug!("client {client}: command {argv:?}");

        match command::execute_list(&mut self.server, client, &argv) {
            Ok(reply) => {
                let attach = reply.attach;
                if let Some(c) = self.server.clients.get_mut(client) {
                    if !reply.output.is_empty() {
                        let mut text = reply.output.into_bytes();
                        text.push(b'\n');
                        c.queue(MsgType::Output, text);
                    }
                }
                if let Some(session) = attach {
                    self.server.attach(client, session);
                } else if reply.detach_self {
                    self.server.detach(client, MsgType::Detach, "");
                } else if self
                    .server
                    .clients
                    .get(client)
                    .is_some_and(|c| !c.is_attached())
                {
                    // One-shot command invocation: done.
                    if let Some(c) = self.server.clients.get_mut(client) {
                        c.start_detach(MsgType::Exit, Vec::new());
                    }
                }
            }
            Err(err) => {
                let message = err.to_string();
                let attached = self
                    .server
                    .clients
                    .get(client)
                    .is_some_and(|c| c.is_attached());
                if let Some(c) = self.server.clients.get_mut(client) {
                    if attached {
                        c.set_message(message, crate::server::MESSAGE_TTL);
                    } else {
                        let mut text = message.into_bytes();
                        text.push(b'\n');
                        c.queue(MsgType::Output, text);
                        let mut frame = Frame::new(MsgType::Exit, Vec::new());
                        frame.flags = 1;
                        c.outbuf.extend_from_slice(&frame.encode());
                        c.state = ClientState::Detaching;
                    }
                }
            }
        }
    }

    fn handle_stdin(&mut self, client: ClientId, frame: &Frame) {
        let read_only = self
            .server
            .clients
            .get(client)
            .is_some_and(|c| c.caps.contains(crate::protocol::ClientCaps::READ_ONLY));
        if read_only {
            return;
        }

        let Some(pane_id) = self.server.active_pane_for_client(client) else {
            return;
        };
        let mode = self
            .server
            .panes
            .get(pane_id)
            .map(|p| p.screen().mode())
            .unwrap_or_default();
        let pane_rect = self
            .server
            .window_of_pane(pane_id)
            .and_then(|w| self.server.windows.get(w))
            .and_then(|w| w.layout.rect_of(pane_id));

        let items = match self.server.clients.get_mut(client) {
            Some(c) => c.key_decoder.decode_frame(&frame.payload),
            None => return,
        };

        // No binding table is loaded (bindings are an external
        // collaborator): every key goes to the pane. Mouse reports are
        // rebased into the pane's rectangle; events the pane did not ask
        // for are dropped at this edge.
        let mut bytes = Vec::new();
        for item in items {
            match item {
                crate::input::InputItem::Key(key) => {
                    bytes.extend_from_slice(&crate::input::encode_key(key, mode));
                }
                crate::input::InputItem::Raw(raw) => {
                    if raw.starts_with(b"\x1b[<") {
                        if mode.intersects(rmux_core::TermMode::ANY_MOUSE) {
                            if let Some(rect) = pane_rect {
                                if let Some(rebased) = crate::input::translate_mouse(&raw, rect) {
                                    bytes.extend_from_slice(&rebased);
                                }
                            }
                        }
                    } else if mode.contains(rmux_core::TermMode::FOCUS_IN_OUT) {
                        bytes.extend_from_slice(&raw);
                    }
                }
            }
        }
        if let Some(pane) = self.server.panes.get_mut(pane_id) {
            pane.send(&bytes);
            let _ = pane.flush_writes();
        }
    }

    fn flush_client(&mut self, client: ClientId) {
        let Some(stream) = self.client_streams.get_mut(&client) else {
            return;
        };
        let Some(c) = self.server.clients.get_mut(client) else {
            return;
        };

        while !c.outbuf.is_empty() {
            match stream.write(&c.outbuf) {
                Ok(0) => break,
                Ok(n) => {
                    c.outbuf.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    log::debug!("client {client}: write error: {e}");
                    c.outbuf.clear();
                    c.state = ClientState::Detaching;
                    break;
                }
            }
        }

        if c.state == ClientState::Detaching && c.outbuf.is_empty() {
            self.drop_client(client);
        }
    }

    fn drop_client(&mut self, client: ClientId) {
        let session = self.server.clients.get(client).and_then(|c| c.session);
        if let Some(token) = self.client_tokens.remove(&client) {
            self.sources.remove(&token);
        }
        if let Some(mut stream) = self.client_streams.remove(&client) {
            let _ = self.poll.registry().deregister(&mut stream);
        }
        self.client_regs.remove(&client);
        self.server.clients.remove(client);
        if let Some(session) = session {
            if self.server.sessions.contains(session) {
                let unattached = self.server.clients_of_session(session).is_empty();
                let destroy = unattached
                    && self
                        .server
                        .options_for_session(Some(session))
                        .flag("destroy-unattached");
                if destroy {
                    self.server.destroy_session(session);
                }
            }
        }
        self.server.apply_window_sizes();
        log::debug!("client {client} closed");
    }

    fn reap_closed_clients(&mut self) -> io::Result<()> {
        for client in std::mem::take(&mut self.server.closed_clients) {
            self.drop_client(client);
        }
        Ok(())
    }

    /// Deregister fds of panes removed by the sweep.
    fn reap_dead_panes(&mut self) -> io::Result<()> {
        let stale: Vec<PaneId> = self
            .pane_tokens
            .keys()
            .filter(|&&pane| !self.server.panes.contains(pane))
            .copied()
            .collect();
        for pane in stale {
            if let Some(token) = self.pane_tokens.remove(&pane) {
                self.sources.remove(&token);
            }
            self.pane_regs.remove(&pane);
            // The fd is closed by the pane's master drop; mio drops the
            // registration with it.
        }
        Ok(())
    }

    // --- interest reconciliation ---

    /// Bring poll registrations in line with what each source wants.
    fn reconcile_interest(&mut self) -> io::Result<()> {
        // Panes.
        let pane_ids = self.server.panes.ids();
        for pane in pane_ids {
            let (fd, want) = match self.server.panes.get(pane) {
                Some(p) => (
                    p.fd(),
                    Registered { read: p.wants_read(), write: p.wants_write() },
                ),
                None => continue,
            };
            let token = match self.pane_tokens.get(&pane) {
                Some(&t) => t,
                None => {
                    let t = Token(self.next_token);
                    self.next_token += 1;
                    self.pane_tokens.insert(pane, t);
                    self.sources.insert(t, Source::Pane(pane));
                    self.pane_regs.insert(pane, Registered::default());
                    t
                }
            };
            let current = self.pane_regs.get(&pane).copied().unwrap_or_default();
            if current == want {
                continue;
            }
            let mut source = SourceFd(&fd);
            match (current.interest(), want.interest()) {
                (None, Some(interest)) => {
                    self.poll.registry().register(&mut source, token, interest)?;
                }
                (Some(_), Some(interest)) => {
                    self.poll.registry().reregister(&mut source, token, interest)?;
                }
                (Some(_), None) => {
                    self.poll.registry().deregister(&mut source)?;
                }
                (None, None) => {}
            }
            self.pane_regs.insert(pane, want);
        }

        // Clients: always readable, writable while output is pending.
        let client_ids = self.server.clients.ids();
        for client in client_ids {
            let want = match self.server.clients.get(client) {
                Some(c) => Registered { read: true, write: !c.outbuf.is_empty() },
                None => continue,
            };
            let Some(&token) = self.client_tokens.get(&client) else {
                continue;
            };
            let current = self.client_regs.get(&client).copied().unwrap_or_default();
            if current == want {
                continue;
            }
            let Some(stream) = self.client_streams.get_mut(&client) else {
                continue;
            };
            match (current.interest(), want.interest()) {
                (None, Some(interest)) => {
                    self.poll.registry().register(stream, token, interest)?;
                }
                (Some(_), Some(interest)) => {
                    self.poll.registry().reregister(stream, token, interest)?;
                }
                (Some(_), None) => {
                    self.poll.registry().deregister(stream)?;
                }
                (None, None) => {}
            }
            self.client_regs.insert(client, want);
        }

        Ok(())
    }
}

fn is_fd_exhaustion(e: &io::Error) -> bool {
    matches!(e.raw_os_error(), Some(code) if code == libc::EMFILE || code == libc::ENFILE)
}

/// Bind the socket and run the server until shutdown.
pub fn run(socket_path: &Path) -> io::Result<()> {
    let mut event_loop = EventLoop::new(socket_path)?;
    event_loop.run()
}
