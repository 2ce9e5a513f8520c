//! The server: one value owning every session, window, pane, and client.
//!
//! All state lives here and is only touched from the event loop thread.
//! Entities cross-reference each other by id; destruction marks entities
//! dead and `sweep` reclaims them at end of tick so callbacks running
//! earlier in the same tick never observe freed state.

pub mod event_loop;

use std::path::PathBuf;
use std::time::Duration;

use crate::client::{Client, ClientState};
use crate::options::{OptionChain, Options};
use crate::pane::{Pane, PaneOutput, SpawnConfig, SpawnError};
use crate::paste::PasteBuffers;
use crate::protocol::{ClientCaps, MsgType};
use crate::registry::{ClientId, PaneId, Registry, SessionId, WindowId};
use crate::render;
use crate::session::Session;
use crate::window::{Window, WindowFlags};

/// How long transient status-line messages stay visible.
pub const MESSAGE_TTL: Duration = Duration::from_millis(3000);

pub struct Server {
    pub panes: Registry<PaneId, Pane>,
    pub windows: Registry<WindowId, Window>,
    pub sessions: Registry<SessionId, Session>,
    pub clients: Registry<ClientId, Client>,
    /// Global option layers, one per scope.
    pub server_options: Options,
    pub session_options: Options,
    pub window_options: Options,
    pub paste: PasteBuffers,
    /// Entities marked dead this tick, reclaimed by `sweep`.
    dead_panes: Vec<PaneId>,
    dead_windows: Vec<WindowId>,
    /// Clients whose sockets the event loop must close.
    pub closed_clients: Vec<ClientId>,
    /// Window flags raised this tick, for the alert coalescer.
    pub pending_alerts: Vec<(WindowId, WindowFlags)>,
    /// Where this server's control socket lives (for `$RMUX`).
    pub socket_path: PathBuf,
    pub shutting_down: bool,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self {
            panes: Registry::new(),
            windows: Registry::new(),
            sessions: Registry::new(),
            clients: Registry::new(),
            server_options: Options::new(),
            session_options: Options::new(),
            window_options: Options::new(),
            paste: PasteBuffers::new(),
            dead_panes: Vec::new(),
            dead_windows: Vec::new(),
            closed_clients: Vec::new(),
            pending_alerts: Vec::new(),
            socket_path: PathBuf::new(),
            shutting_down: false,
        }
    }

    // --- option chains ---

    pub fn options_for_session(&self, session: Option<SessionId>) -> OptionChain<'_> {
        let mut layers = Vec::new();
        if let Some(s) = session.and_then(|id| self.sessions.get(id)) {
            layers.push(&s.options);
        }
        layers.push(&self.session_options);
        layers.push(&self.server_options);
        OptionChain::new(layers)
    }

    pub fn options_for_window(&self, window: WindowId) -> OptionChain<'_> {
        let mut layers = Vec::new();
        if let Some(w) = self.windows.get(window) {
            layers.push(&w.options);
        }
        layers.push(&self.window_options);
        layers.push(&self.server_options);
        OptionChain::new(layers)
    }

    pub fn options_for_pane(&self, pane: PaneId) -> OptionChain<'_> {
        let mut layers = Vec::new();
        if let Some(p) = self.panes.get(pane) {
            layers.push(&p.options);
        }
        if let Some(w) = self.window_of_pane(pane).and_then(|id| self.windows.get(id)) {
            layers.push(&w.options);
        }
        layers.push(&self.window_options);
        layers.push(&self.server_options);
        OptionChain::new(layers)
    }

    // --- lookups ---

    pub fn window_of_pane(&self, pane: PaneId) -> Option<WindowId> {
        self.windows
            .iter()
            .find(|(_, w)| w.contains(pane))
            .map(|(id, _)| id)
    }

    /// Sessions linking a window, in id order.
    pub fn sessions_of_window(&self, window: WindowId) -> Vec<SessionId> {
        self.sessions
            .iter()
            .filter(|(_, s)| s.index_of(window).is_some())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn find_session_by_name(&self, name: &str) -> Option<SessionId> {
        self.sessions
            .iter()
            .find(|(_, s)| s.name == name)
            .map(|(id, _)| id)
    }

    pub fn clients_of_session(&self, session: SessionId) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|(_, c)| c.session == Some(session) && c.is_attached())
            .map(|(id, _)| id)
            .collect()
    }

    /// The pane commands target: the active pane of the current window
    /// of the client's session.
    pub fn active_pane_for_client(&self, client: ClientId) -> Option<PaneId> {
        let session = self.clients.get(client)?.session?;
        let window = self.sessions.get(session)?.current_window()?;
        self.windows.get(window)?.active_pane()
    }

    // --- entity creation ---

    /// Spawn a pane running `argv` (or the default shell when empty).
    pub fn spawn_pane(
        &mut self,
        argv: Vec<String>,
        cwd: Option<String>,
        mut env: Vec<(String, String)>,
        cols: u16,
        rows: u16,
        session: Option<SessionId>,
    ) -> Result<PaneId, SpawnError> {
        // Panes always see a screen-like TERM and the nesting guard.
        env.retain(|(k, _)| k != "TERM" && k != "RMUX");
        env.push(("TERM".to_string(), "screen-256color".to_string()));
        env.push((
            "RMUX".to_string(),
            format!(
                "{},{},{}",
                self.socket_path.display(),
                std::process::id(),
                session.map_or(0, |s| s.0)
            ),
        ));

        let chain = self.options_for_session(session);
        let history_limit = chain.number("history-limit").max(0) as usize;
        let argv = if argv.is_empty() {
            let shell = chain.string("default-shell");
            let shell = if shell.is_empty() {
                std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
            } else {
                shell
            };
            vec![shell]
        } else {
            argv
        };

        let cfg = SpawnConfig { argv, cwd, env, cols, rows, history_limit };
        self.panes.try_add(|id| Pane::spawn(id, &cfg))
    }

    /// Create a window containing one fresh pane, linked into `session`.
    pub fn new_window(
        &mut self,
        session: SessionId,
        name: Option<String>,
        argv: Vec<String>,
        cwd: Option<String>,
        env: Vec<(String, String)>,
        index: Option<u16>,
    ) -> Result<WindowId, SpawnError> {
        let (cols, rows) = self.session_window_size(session);
        let pane = self.spawn_pane(argv, cwd, env, cols, rows, Some(session))?;

        let name = name.unwrap_or_else(|| {
            self.panes
                .get(pane)
                .map(|p| p.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "shell".to_string())
        });
        let window = self.windows.add(|id| Window::new(id, name, pane, cols, rows));

        let base = self.options_for_session(Some(session)).number("base-index") as u16;
        if let Some(s) = self.sessions.get_mut(session) {
            s.link_window(window, index, base);
        }
        Ok(window)
    }

    /// Create a session with one window. `size` is the creating client's
    /// terminal size, or a default for detached creation.
    pub fn new_session(
        &mut self,
        name: Option<String>,
        argv: Vec<String>,
        cwd: Option<String>,
        env: Vec<(String, String)>,
        size: (u16, u16),
    ) -> Result<SessionId, SpawnError> {
        let name = name.unwrap_or_else(|| {
            let mut n = self.sessions.len() as u32;
            while self.find_session_by_name(&n.to_string()).is_some() {
                n += 1;
            }
            n.to_string()
        });
        let session = self.sessions.add(|id| Session::new(id, name));

        match self.new_window(session, None, argv, cwd, env, None) {
            Ok(window) => {
                // No client is attached yet: the requested size applies
                // until the first attach recomputes it.
                let target = (size.0, size.1.saturating_sub(1));
                if let Some(w) = self.windows.get_mut(window) {
                    w.apply_size(target.0, target.1);
                }
                self.resize_window_panes(window);
                Ok(session)
            }
            Err(e) => {
                self.sessions.remove(session);
                Err(e)
            }
        }
    }

    // --- sizing ---

    /// The window area a session's windows get: smallest attached client
    /// minus the status line, or 80×24 unattached.
    fn session_window_size(&self, session: SessionId) -> (u16, u16) {
        let mut size = None;
        for (_, c) in self.clients.iter() {
            if c.session == Some(session) && c.is_attached() {
                let cand = (c.cols, c.rows.saturating_sub(1));
                size = Some(match size {
                    None => cand,
                    Some((w, h)) => (cand.0.min(w), cand.1.min(h)),
                });
            }
        }
        size.unwrap_or((80, 23))
    }

    /// Recompute every window's target size and retile those that
    /// changed, resizing their panes' PTYs.
    pub fn apply_window_sizes(&mut self) {
        let window_ids = self.windows.ids();
        for window_id in window_ids {
            let Some(target) = self.window_target_size(window_id) else {
                continue;
            };
            let changed = match self.windows.get_mut(window_id) {
                Some(w) => w.apply_size(target.0, target.1),
                None => false,
            };
            if changed {
                self.resize_window_panes(window_id);
                for (_, client) in self.clients.iter_mut() {
                    client.needs_redraw = true;
                }
            }
        }
    }

    /// Minimum size over interested clients. With `aggressive-resize`
    /// only clients currently showing the window count; otherwise every
    /// client attached to a linking session does.
    pub fn window_target_size(&self, window: WindowId) -> Option<(u16, u16)> {
        let aggressive = self.options_for_window(window).flag("aggressive-resize");
        let mut size: Option<(u16, u16)> = None;

        for session_id in self.sessions_of_window(window) {
            let session = self.sessions.get(session_id)?;
            let showing = session.current_window() == Some(window);
            if aggressive && !showing {
                continue;
            }
            for client_id in self.clients_of_session(session_id) {
                if let Some(c) = self.clients.get(client_id) {
                    let cand = (c.cols, c.rows.saturating_sub(1));
                    size = Some(match size {
                        None => cand,
                        Some((w, h)) => (cand.0.min(w), cand.1.min(h)),
                    });
                }
            }
        }
        size
    }

    /// Push the layout's pane rectangles down to the PTYs.
    pub fn resize_window_panes(&mut self, window: WindowId) {
        let leaves = match self.windows.get(window) {
            Some(w) => w.layout.leaves(),
            None => return,
        };
        for (pane_id, rect) in leaves {
            if let Some(pane) = self.panes.get_mut(pane_id) {
                pane.resize(rect.w, rect.h);
            }
        }
    }

    // --- attach / detach ---

    /// Attach an identified client to a session.
    pub fn attach(&mut self, client: ClientId, session: SessionId) {
        if let Some(c) = self.clients.get_mut(client) {
            c.session = Some(session);
            c.state = ClientState::Attached;
            c.needs_redraw = true;
            c.renderer.invalidate();
            c.queue(MsgType::Ready, Vec::new());
        }
        self.apply_window_sizes();
    }

    /// Detach a client with the given frame (DETACH or EXIT).
    pub fn detach(&mut self, client: ClientId, ty: MsgType, reason: &str) {
        let session = self.clients.get(client).and_then(|c| c.session);
        if let Some(c) = self.clients.get_mut(client) {
            c.start_detach(ty, reason.as_bytes().to_vec());
        }
        if let Some(session) = session {
            self.session_client_gone(session);
        }
        self.apply_window_sizes();
    }

    /// Called when a session loses a client: destroy-unattached handling.
    fn session_client_gone(&mut self, session: SessionId) {
        let unattached = self.clients_of_session(session).is_empty();
        if unattached && self.options_for_session(Some(session)).flag("destroy-unattached") {
            self.destroy_session(session);
        }
    }

    // --- destruction ---

    /// Kill a pane: hang up its child and schedule removal.
    pub fn kill_pane(&mut self, pane: PaneId) {
        if let Some(p) = self.panes.get_mut(pane) {
            p.close();
        }
        if !self.dead_panes.contains(&pane) {
            self.dead_panes.push(pane);
        }
    }

    pub fn kill_window(&mut self, window: WindowId) {
        let panes: Vec<PaneId> = self
            .windows
            .get(window)
            .map(|w| w.panes().to_vec())
            .unwrap_or_default();
        for pane in panes {
            self.kill_pane(pane);
        }
    }

    pub fn destroy_session(&mut self, session: SessionId) {
        let Some(s) = self.sessions.remove(session) else {
            return;
        };
        let windows: Vec<WindowId> = s.winlinks().map(|(_, w)| w).collect();
        for window in windows {
            if self.sessions_of_window(window).is_empty() {
                self.kill_window(window);
            }
        }
        // Clients viewing the session are sent away.
        let viewers: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, c)| c.session == Some(session))
            .map(|(id, _)| id)
            .collect();
        for client in viewers {
            if let Some(c) = self.clients.get_mut(client) {
                c.start_detach(MsgType::Exit, b"session destroyed".to_vec());
            }
        }
        log::info!("session {session} destroyed");
    }

    /// Take a live pane out of its window without killing it (the first
    /// half of moving a pane between windows). The emptied window is
    /// scheduled for destruction like any other.
    pub fn remove_pane_from_window(&mut self, window: WindowId, pane: PaneId) {
        let emptied = match self.windows.get_mut(window) {
            Some(w) => w.remove_pane(pane),
            None => return,
        };
        if emptied {
            if let Some(w) = self.windows.get_mut(window) {
                w.dead = true;
            }
            if !self.dead_windows.contains(&window) {
                self.dead_windows.push(window);
            }
        } else {
            self.resize_window_panes(window);
        }
        for (_, client) in self.clients.iter_mut() {
            client.needs_redraw = true;
        }
    }

    /// A pane's child exited. The pane lingers under `remain-on-exit`.
    pub fn handle_pane_exit(&mut self, pane: PaneId) {
        if self.options_for_pane(pane).flag("remain-on-exit") {
            for (_, client) in self.clients.iter_mut() {
                client.needs_redraw = true;
            }
            return;
        }
        if !self.dead_panes.contains(&pane) {
            self.dead_panes.push(pane);
        }
    }

    /// End-of-tick reclamation: dead panes leave their windows, empty
    /// windows unlink everywhere, empty sessions die. Windows are freed
    /// one tick after their last pane (they sit in `dead_windows` for
    /// the next sweep, so callbacks pending this tick still resolve).
    pub fn sweep(&mut self) {
        // Windows emptied during the previous tick go first.
        for window_id in std::mem::take(&mut self.dead_windows) {
            self.destroy_window(window_id);
        }

        for pane_id in std::mem::take(&mut self.dead_panes) {
            let Some(window_id) = self.window_of_pane(pane_id) else {
                self.panes.remove(pane_id);
                continue;
            };
            let emptied = match self.windows.get_mut(window_id) {
                Some(w) => w.remove_pane(pane_id),
                None => false,
            };
            self.panes.remove(pane_id);
            if emptied {
                if let Some(w) = self.windows.get_mut(window_id) {
                    w.dead = true;
                }
                self.dead_windows.push(window_id);
            } else {
                self.resize_window_panes(window_id);
                for (_, client) in self.clients.iter_mut() {
                    client.needs_redraw = true;
                }
            }
        }

        // Sessions with no winlinks and no clients go away.
        let empty_sessions: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(id, s)| s.is_empty() && self.clients_of_session(*id).is_empty())
            .map(|(id, _)| id)
            .collect();
        for session in empty_sessions {
            self.destroy_session(session);
        }
    }

    fn destroy_window(&mut self, window: WindowId) {
        let session_ids = self.sessions_of_window(window);
        for session_id in session_ids {
            let renumber = self
                .options_for_session(Some(session_id))
                .flag("renumber-windows");
            let base = self.options_for_session(Some(session_id)).number("base-index") as u16;
            if let Some(session) = self.sessions.get_mut(session_id) {
                while let Some(index) = session.index_of(window) {
                    session.unlink_index(index);
                }
                if renumber {
                    session.renumber(base);
                }
            }
            // Empty sessions are reclaimed by the caller's sweep pass.
        }
        self.windows.remove(window);
        for (_, client) in self.clients.iter_mut() {
            client.needs_redraw = true;
        }
        log::debug!("window {window} destroyed");
    }

    // --- per-tick rendering ---

    /// The status line text for one client.
    pub fn status_line(&mut self, client_id: ClientId) -> String {
        let session_id = match self.clients.get(client_id).and_then(|c| c.session) {
            Some(s) => s,
            None => return String::new(),
        };

        if let Some(c) = self.clients.get_mut(client_id) {
            if let Some(message) = c.message() {
                return message.to_string();
            }
        }

        let Some(session) = self.sessions.get(session_id) else {
            return String::new();
        };
        let mut line = format!("[{}]", session.name);
        for (index, window_id) in session.winlinks() {
            let Some(window) = self.windows.get(window_id) else {
                continue;
            };
            let marker = if session.current_index() == Some(index) {
                "*"
            } else if window.flags.contains(WindowFlags::BELL) {
                "!"
            } else if window.flags.intersects(WindowFlags::ACTIVITY | WindowFlags::SILENCE) {
                "#"
            } else {
                ""
            };
            line.push_str(&format!(" {}:{}{}", index, window.name, marker));
        }
        line
    }

    /// Render every dirty attached client, queueing OUTPUT frames.
    pub fn render_clients(&mut self) {
        let client_ids = self.clients.ids();
        for client_id in client_ids {
            let wants = self
                .clients
                .get(client_id)
                .is_some_and(|c| c.wants_output() && c.needs_redraw);
            let window_dirty = self.client_window_dirty(client_id);
            if !wants && !window_dirty {
                continue;
            }
            self.render_client(client_id);
        }
    }

    fn client_window_dirty(&self, client_id: ClientId) -> bool {
        let Some(client) = self.clients.get(client_id) else {
            return false;
        };
        if !client.wants_output() {
            return false;
        }
        let Some(window_id) = client
            .session
            .and_then(|s| self.sessions.get(s))
            .and_then(|s| s.current_window())
        else {
            return false;
        };
        let Some(window) = self.windows.get(window_id) else {
            return false;
        };
        window
            .panes()
            .iter()
            .any(|&p| self.panes.get(p).is_some_and(|p| p.screen().any_damage()))
    }

    /// Compose and diff one client's view.
    pub fn render_client(&mut self, client_id: ClientId) {
        let status = self.status_line(client_id);

        let Some(client) = self.clients.get(client_id) else {
            return;
        };
        let (cols, rows, caps) = (client.cols, client.rows, client.caps);
        let Some(window_id) = client
            .session
            .and_then(|s| self.sessions.get(s))
            .and_then(|s| s.current_window())
        else {
            return;
        };
        let Some(window) = self.windows.get(window_id) else {
            return;
        };

        let mut pane_grids = Vec::new();
        for (pane_id, rect) in window.layout.leaves() {
            if let Some(pane) = self.panes.get(pane_id) {
                pane_grids.push((rect, pane.screen().grid()));
            }
        }
        let ascii_only = !caps.contains(ClientCaps::UTF8);
        let image = render::compose(cols, rows, &pane_grids, &status, ascii_only);

        // Cursor: the active pane's, offset by its rectangle.
        let cursor = window.active_pane().and_then(|pane_id| {
            let pane = self.panes.get(pane_id)?;
            let rect = window.layout.rect_of(pane_id)?;
            let grid = pane.screen().grid();
            if !pane.screen().mode().contains(rmux_core::TermMode::SHOW_CURSOR) {
                return None;
            }
            let (cx, cy) = (grid.cursor.col as u16, grid.cursor.row as u16);
            if cx < rect.w && cy < rect.h {
                Some((rect.x + cx, rect.y + cy))
            } else {
                None
            }
        });

        let mut bytes = Vec::new();
        if let Some(client) = self.clients.get_mut(client_id) {
            client.renderer.render(&image, caps, cursor, &mut bytes);
            client.queue_output(bytes);
            client.needs_redraw = false;
        }
    }

    /// Clear damage on every pane after all clients rendered.
    pub fn consume_all_damage(&mut self) {
        for (_, pane) in self.panes.iter_mut() {
            pane.screen_mut().consume_damage();
        }
    }

    /// Visiting a window clears its alert flags.
    pub fn clear_visited_flags(&mut self) {
        let mut visited = Vec::new();
        for (_, client) in self.clients.iter() {
            if let Some(window) = client
                .session
                .and_then(|s| self.sessions.get(s))
                .and_then(|s| s.current_window())
            {
                if client.is_attached() {
                    visited.push(window);
                }
            }
        }
        for window_id in visited {
            if let Some(w) = self.windows.get_mut(window_id) {
                if !w.flags.is_empty() {
                    w.flags = WindowFlags::empty();
                    for (_, client) in self.clients.iter_mut() {
                        client.needs_redraw = true;
                    }
                }
            }
        }
    }

    /// Fold one pane's parser output into window flags and alert queue.
    pub fn note_pane_output(&mut self, pane: PaneId, out: &PaneOutput) {
        let Some(window_id) = self.window_of_pane(pane) else {
            return;
        };

        for &(selector, ref text) in &out.clipboard {
            self.paste.push_automatic(text.clone().into_bytes());
            self.forward_clipboard(window_id, selector, text);
        }

        let mut raised = WindowFlags::empty();
        if out.bell {
            raised |= WindowFlags::BELL;
        }
        if out.activity {
            raised |= WindowFlags::ACTIVITY;
        }
        if out.title_changed {
            let follow = self.options_for_window(window_id).flag("set-titles");
            if follow {
                if let Some(title) = self.panes.get(pane).map(|p| p.title.clone()) {
                    if let Some(w) = self.windows.get_mut(window_id) {
                        w.name = title;
                    }
                }
            }
        }

        if !raised.is_empty() {
            if let Some(w) = self.windows.get_mut(window_id) {
                w.flags |= raised;
            }
            self.pending_alerts.push((window_id, raised));
        }
    }

    /// OSC 52 from a pane: re-encode and pass on to clients that
    /// advertise clipboard support; everyone else only gets the paste
    /// buffer.
    fn forward_clipboard(&mut self, window: WindowId, selector: u8, text: &str) {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;

        let encoded = BASE64.encode(text.as_bytes());
        let seq = format!("\x1b]52;{};{encoded}\x07", selector as char).into_bytes();

        for session_id in self.sessions_of_window(window) {
            for client_id in self.clients_of_session(session_id) {
                if let Some(client) = self.clients.get_mut(client_id) {
                    if client.caps.contains(ClientCaps::CLIPBOARD) {
                        client.queue_output(seq.clone());
                    }
                }
            }
        }
    }

    /// When the smallest attached client for a session changes size.
    pub fn client_resized(&mut self, client: ClientId, cols: u16, rows: u16) {
        if let Some(c) = self.clients.get_mut(client) {
            c.cols = cols;
            c.rows = rows;
            c.renderer.invalidate();
            c.needs_redraw = true;
        }
        self.apply_window_sizes();
    }

    /// Graceful shutdown: every client gets an EXIT frame.
    pub fn begin_shutdown(&mut self) {
        self.shutting_down = true;
        let ids = self.clients.ids();
        for client in ids {
            if let Some(c) = self.clients.get_mut(client) {
                c.start_detach(MsgType::Exit, b"server exiting".to_vec());
            }
        }
        for (_, pane) in self.panes.iter_mut() {
            pane.close();
        }
    }
}
