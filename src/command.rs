//! Structured command dispatch.
//!
//! The interactive command language (prefix keys, the config-file
//! parser) is an external collaborator; this module is the interface it
//! sits on: an argv in, one reply or one error out. A command list
//! aborts at the first error, and every error is a single line routed to
//! the invoking client.

use thiserror::Error;

use crate::input::{encode_key, Key, KeyPress};
use crate::layout::{Direction, LayoutError, LayoutPreset, Orientation, SplitSize};
use crate::options::{OptionError, OptionScope};
use crate::pane::SpawnError;
use crate::protocol::MsgType;
use crate::registry::{ClientId, PaneId, SessionId, WindowId};
use crate::server::{Server, MESSAGE_TTL};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("no such session: {0}")]
    NoSuchSession(String),
    #[error("no such window: {0}")]
    NoSuchWindow(String),
    #[error("no such pane: {0}")]
    NoSuchPane(String),
    #[error("no current session")]
    NoCurrentSession,
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error("{0}")]
    Other(String),
}

/// What a successful command hands back to the dispatcher.
#[derive(Debug, Default)]
pub struct CommandReply {
    /// Text for the client (list output, confirmation, or empty).
    pub output: String,
    /// The client should attach to this session.
    pub attach: Option<SessionId>,
    /// The client should be detached after the reply.
    pub detach_self: bool,
}

impl CommandReply {
    fn text(output: String) -> Self {
        Self { output, ..Self::default() }
    }

    fn empty() -> Self {
        Self::default()
    }
}

/// Execute one command for `client`. `argv[0]` names the command.
pub fn execute(
    server: &mut Server,
    client: ClientId,
    argv: &[String],
) -> Result<CommandReply, CommandError> {
    let Some(name) = argv.first() else {
        return Err(CommandError::Usage("<command> [args]"));
    };
    let args = &argv[1..];

    match name.as_str() {
        "new-session" => new_session(server, client, args),
        "attach-session" => attach_session(server, client, args),
        "detach-client" => detach_client(server, client, args),
        "kill-server" => {
            server.begin_shutdown();
            Ok(CommandReply::empty())
        }
        "kill-pane" => kill_pane(server, client, args),
        "kill-window" => kill_window(server, client, args),
        "list-sessions" => list_sessions(server),
        "list-windows" => list_windows(server, client, args),
        "list-panes" => list_panes(server, client, args),
        "new-window" => new_window(server, client, args),
        "next-window" => cycle_window(server, client, Cycle::Next),
        "previous-window" => cycle_window(server, client, Cycle::Previous),
        "last-window" => cycle_window(server, client, Cycle::Last),
        "select-window" => select_window(server, client, args),
        "select-pane" => select_pane(server, client, args),
        "split-window" => split_window(server, client, args),
        "swap-pane" => swap_pane(server, client, args),
        "break-pane" => break_pane(server, client, args),
        "join-pane" => join_pane(server, client, args),
        "select-layout" => select_layout(server, client, args),
        "rename-session" => rename_session(server, client, args),
        "rename-window" => rename_window(server, client, args),
        "send-keys" => send_keys(server, client, args),
        "set-option" => set_option(server, client, args),
        "show-options" => show_options(server, client, args),
        "set-buffer" => set_buffer(server, args),
        "show-buffer" => show_buffer(server, args),
        "paste-buffer" => paste_buffer(server, client, args),
        "display-message" => display_message(server, client, args),
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Run a `;`-separated command list, aborting at the first error.
pub fn execute_list(
    server: &mut Server,
    client: ClientId,
    argv: &[String],
) -> Result<CommandReply, CommandError> {
    let mut reply = CommandReply::empty();
    for chunk in argv.split(|a| a == ";") {
        if chunk.is_empty() {
            continue;
        }
        let r = execute(server, client, chunk)?;
        if !r.output.is_empty() {
            if !reply.output.is_empty() {
                reply.output.push('\n');
            }
            reply.output.push_str(&r.output);
        }
        reply.attach = reply.attach.or(r.attach);
        reply.detach_self |= r.detach_self;
    }
    Ok(reply)
}

// --- target resolution ---

fn current_session(server: &Server, client: ClientId) -> Result<SessionId, CommandError> {
    if let Some(s) = server.clients.get(client).and_then(|c| c.session) {
        return Ok(s);
    }
    server
        .sessions
        .iter()
        .next()
        .map(|(id, _)| id)
        .ok_or(CommandError::NoCurrentSession)
}

fn resolve_session(
    server: &Server,
    client: ClientId,
    target: Option<&str>,
) -> Result<SessionId, CommandError> {
    match target {
        None => current_session(server, client),
        Some(t) => {
            if let Some(raw) = t.strip_prefix('$') {
                if let Ok(n) = raw.parse::<u32>() {
                    let id = SessionId(n);
                    if server.sessions.contains(id) {
                        return Ok(id);
                    }
                }
                return Err(CommandError::NoSuchSession(t.to_string()));
            }
            server
                .find_session_by_name(t)
                .ok_or_else(|| CommandError::NoSuchSession(t.to_string()))
        }
    }
}

/// `:index`, `@id`, or a window name within the target session.
fn resolve_window(
    server: &Server,
    client: ClientId,
    target: Option<&str>,
) -> Result<(SessionId, u16, WindowId), CommandError> {
    let (session_part, window_part) = match target {
        Some(t) if t.contains(':') => {
            let (s, w) = t.split_once(':').expect("checked");
            (if s.is_empty() { None } else { Some(s) }, Some(w))
        }
        Some(t) if t.starts_with('@') => (None, Some(t)),
        Some(t) => (Some(t), None),
        None => (None, None),
    };

    let session_id = resolve_session(server, client, session_part)?;
    let session = server
        .sessions
        .get(session_id)
        .ok_or(CommandError::NoCurrentSession)?;

    let missing = || CommandError::NoSuchWindow(target.unwrap_or("(current)").to_string());
    match window_part {
        None | Some("") => {
            let index = session.current_index().ok_or_else(missing)?;
            let window = session.window_at(index).ok_or_else(missing)?;
            Ok((session_id, index, window))
        }
        Some(w) => {
            if let Some(raw) = w.strip_prefix('@') {
                let id = raw
                    .parse::<u32>()
                    .map(WindowId)
                    .map_err(|_| missing())?;
                let index = session.index_of(id).ok_or_else(missing)?;
                return Ok((session_id, index, id));
            }
            if let Ok(index) = w.parse::<u16>() {
                let window = session.window_at(index).ok_or_else(missing)?;
                return Ok((session_id, index, window));
            }
            // By name.
            for (index, window_id) in session.winlinks() {
                if server.windows.get(window_id).is_some_and(|w2| w2.name == w) {
                    return Ok((session_id, index, window_id));
                }
            }
            Err(missing())
        }
    }
}

/// `%id` or the active pane of the target window.
fn resolve_pane(
    server: &Server,
    client: ClientId,
    target: Option<&str>,
) -> Result<(WindowId, PaneId), CommandError> {
    match target {
        Some(t) if t.starts_with('%') => {
            let id = t[1..]
                .parse::<u32>()
                .map(PaneId)
                .map_err(|_| CommandError::NoSuchPane(t.to_string()))?;
            if !server.panes.contains(id) {
                return Err(CommandError::NoSuchPane(t.to_string()));
            }
            let window = server
                .window_of_pane(id)
                .ok_or_else(|| CommandError::NoSuchPane(t.to_string()))?;
            Ok((window, id))
        }
        other => {
            let (_, _, window) = resolve_window(server, client, other)?;
            let pane = server
                .windows
                .get(window)
                .and_then(|w| w.active_pane())
                .ok_or_else(|| CommandError::NoSuchPane("(active)".to_string()))?;
            Ok((window, pane))
        }
    }
}

// --- commands ---

fn new_session(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let detached = args.flag("-d");
    let name = args.value("-s");
    let cwd = args.value("-c");
    let cols = args.value("-x").and_then(|v| v.parse().ok());
    let rows = args.value("-y").and_then(|v| v.parse().ok());
    let argv = args.rest();

    if let Some(ref n) = name {
        if server.find_session_by_name(n).is_some() {
            return Err(CommandError::Other(format!("duplicate session: {n}")));
        }
    }

    let size = if detached {
        (cols.unwrap_or(80), rows.unwrap_or(24))
    } else {
        server
            .clients
            .get(client)
            .map(|c| (c.cols, c.rows))
            .unwrap_or((80, 24))
    };

    let env = server
        .clients
        .get(client)
        .map(|c| c.environ.clone())
        .unwrap_or_default();
    let session = server.new_session(name, argv, cwd, env, size)?;

    let mut reply = CommandReply::empty();
    if detached {
        let name = &server.sessions.get(session).expect("created").name;
        reply.output = format!("session {name} created");
    } else {
        reply.attach = Some(session);
    }
    Ok(reply)
}

fn attach_session(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let session = resolve_session(server, client, target.as_deref())?;
    Ok(CommandReply { attach: Some(session), ..CommandReply::default() })
}

fn detach_client(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let all_others = args.flag("-a");

    if all_others {
        let session = server.clients.get(client).and_then(|c| c.session);
        let targets: Vec<ClientId> = server
            .clients
            .iter()
            .filter(|(id, c)| *id != client && c.is_attached() && c.session == session)
            .map(|(id, _)| id)
            .collect();
        for target in targets {
            server.detach(target, MsgType::Detach, "");
        }
        Ok(CommandReply::empty())
    } else {
        Ok(CommandReply { detach_self: true, ..CommandReply::default() })
    }
}

fn kill_pane(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let (_, pane) = resolve_pane(server, client, target.as_deref())?;
    server.kill_pane(pane);
    Ok(CommandReply::empty())
}

fn kill_window(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let (_, _, window) = resolve_window(server, client, target.as_deref())?;
    server.kill_window(window);
    Ok(CommandReply::empty())
}

fn list_sessions(server: &Server) -> Result<CommandReply, CommandError> {
    let mut lines = Vec::new();
    for (id, session) in server.sessions.iter() {
        let windows = session.winlinks().count();
        let clients = server.clients_of_session(id).len();
        let attached = if clients > 0 { " (attached)" } else { "" };
        lines.push(format!(
            "{}: {} windows{attached}",
            session.name, windows
        ));
    }
    Ok(CommandReply::text(lines.join("\n")))
}

fn list_windows(
    server: &Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let target = arg_set.value("-t");
    let session_id = resolve_session(server, client, target.as_deref())?;
    let session = server
        .sessions
        .get(session_id)
        .ok_or(CommandError::NoCurrentSession)?;

    let mut lines = Vec::new();
    for (index, window_id) in session.winlinks() {
        let Some(window) = server.windows.get(window_id) else {
            continue;
        };
        let current = if session.current_index() == Some(index) { "*" } else { "" };
        let (w, h) = window.size();
        lines.push(format!(
            "{index}: {}{current} [{w}x{h}] ({} panes)",
            window.name,
            window.panes().len()
        ));
    }
    Ok(CommandReply::text(lines.join("\n")))
}

fn list_panes(
    server: &Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let target = arg_set.value("-t");
    let (_, _, window_id) = resolve_window(server, client, target.as_deref())?;
    let window = server
        .windows
        .get(window_id)
        .ok_or_else(|| CommandError::NoSuchWindow(format!("{window_id}")))?;

    let mut lines = Vec::new();
    for (i, &pane_id) in window.panes().iter().enumerate() {
        let Some(rect) = window.layout.rect_of(pane_id) else {
            continue;
        };
        let active = if window.active_pane() == Some(pane_id) { " (active)" } else { "" };
        let dead = server
            .panes
            .get(pane_id)
            .is_some_and(|p| p.dead)
            .then_some(" (dead)")
            .unwrap_or("");
        lines.push(format!(
            "{i}: {pane_id} [{}x{}]{active}{dead}",
            rect.w, rect.h
        ));
    }
    Ok(CommandReply::text(lines.join("\n")))
}

fn new_window(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let name = args.value("-n");
    let index = args.value("-t").and_then(|v| v.trim_start_matches(':').parse().ok());
    let cwd = args.value("-c");
    let argv = args.rest();

    let session = current_session(server, client)?;
    let env = server
        .clients
        .get(client)
        .map(|c| c.environ.clone())
        .unwrap_or_default();
    let window = server.new_window(session, name, argv, cwd, env, index)?;

    // Creating a window switches to it.
    if let Some(s) = server.sessions.get_mut(session) {
        if let Some(idx) = s.index_of(window) {
            s.select_index(idx);
        }
    }
    mark_session_redraw(server, session);
    Ok(CommandReply::empty())
}

enum Cycle {
    Next,
    Previous,
    Last,
}

fn cycle_window(
    server: &mut Server,
    client: ClientId,
    how: Cycle,
) -> Result<CommandReply, CommandError> {
    let session = current_session(server, client)?;
    let moved = server.sessions.get_mut(session).and_then(|s| match how {
        Cycle::Next => s.next_window(),
        Cycle::Previous => s.previous_window(),
        Cycle::Last => s.last_window(),
    });
    if moved.is_none() {
        return Err(CommandError::Other("no other window".to_string()));
    }
    server.apply_window_sizes();
    mark_session_redraw(server, session);
    Ok(CommandReply::empty())
}

fn select_window(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t").ok_or(CommandError::Usage("select-window -t target"))?;
    let (session_id, index, _) = resolve_window(server, client, Some(&target))?;
    if let Some(s) = server.sessions.get_mut(session_id) {
        s.select_index(index);
    }
    server.apply_window_sizes();
    mark_session_redraw(server, session_id);
    Ok(CommandReply::empty())
}

fn select_pane(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let direction = if args.flag("-U") {
        Some(Direction::Up)
    } else if args.flag("-D") {
        Some(Direction::Down)
    } else if args.flag("-L") {
        Some(Direction::Left)
    } else if args.flag("-R") {
        Some(Direction::Right)
    } else {
        None
    };
    let target = args.value("-t");

    let (window_id, pane) = resolve_pane(server, client, target.as_deref())?;
    let Some(window) = server.windows.get_mut(window_id) else {
        return Err(CommandError::NoSuchWindow(format!("{window_id}")));
    };

    match direction {
        Some(dir) => {
            window.set_active(pane);
            if window.select_direction(dir).is_none() {
                return Err(CommandError::Other("pane not found in direction".to_string()));
            }
        }
        None => {
            if !window.set_active(pane) {
                return Err(CommandError::NoSuchPane(format!("{pane}")));
            }
        }
    }
    for (_, c) in server.clients.iter_mut() {
        c.needs_redraw = true;
    }
    Ok(CommandReply::empty())
}

fn split_window(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    // -h: side by side; -v (default): stacked.
    let orient = if args.flag("-h") {
        Orientation::Horizontal
    } else {
        args.flag("-v");
        Orientation::Vertical
    };
    let before = args.flag("-b");
    let percent = args.value("-p").and_then(|v| v.parse::<u8>().ok());
    let cells = args.value("-l").and_then(|v| v.parse::<u16>().ok());
    let target = args.value("-t");
    let cwd = args.value("-c");
    let argv = args.rest();

    let size = match (cells, percent) {
        (Some(n), _) => SplitSize::Cells(n),
        (None, Some(p)) => SplitSize::Percent(p),
        (None, None) => SplitSize::Percent(50),
    };

    let (window_id, target_pane) = resolve_pane(server, client, target.as_deref())?;
    let session = server.sessions_of_window(window_id).first().copied();

    // Probe the split before spawning so a too-small layout never costs
    // a fork.
    {
        let window = server
            .windows
            .get(window_id)
            .ok_or_else(|| CommandError::NoSuchWindow(format!("{window_id}")))?;
        let mut probe = window.layout.clone();
        probe.split(target_pane, orient, size, !before, PaneId(u32::MAX))?;
    }

    let env = server
        .clients
        .get(client)
        .map(|c| c.environ.clone())
        .unwrap_or_default();
    let new_pane = server.spawn_pane(argv, cwd, env, 10, 5, session)?;

    let rect = {
        let window = server
            .windows
            .get_mut(window_id)
            .ok_or_else(|| CommandError::NoSuchWindow(format!("{window_id}")))?;
        let rect = window
            .layout
            .split(target_pane, orient, size, !before, new_pane)?;
        window.add_pane(new_pane, Some(target_pane));
        window.set_active(new_pane);
        rect
    };
    if let Some(pane) = server.panes.get_mut(new_pane) {
        pane.resize(rect.w, rect.h);
    }
    server.resize_window_panes(window_id);
    for (_, c) in server.clients.iter_mut() {
        c.needs_redraw = true;
    }
    Ok(CommandReply::empty())
}

fn swap_pane(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let src = args.value("-s").ok_or(CommandError::Usage("swap-pane -s %src -t %dst"))?;
    let dst = args.value("-t").ok_or(CommandError::Usage("swap-pane -s %src -t %dst"))?;
    let (src_window, src_pane) = resolve_pane(server, client, Some(&src))?;
    let (dst_window, dst_pane) = resolve_pane(server, client, Some(&dst))?;

    if src_window != dst_window {
        return Err(CommandError::Other("panes are in different windows".to_string()));
    }
    if let Some(window) = server.windows.get_mut(src_window) {
        window.layout.swap(src_pane, dst_pane);
    }
    server.resize_window_panes(src_window);
    for (_, c) in server.clients.iter_mut() {
        c.needs_redraw = true;
    }
    Ok(CommandReply::empty())
}

/// Move a pane out into its own window.
fn break_pane(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let name = args.value("-n");
    let target = args.value("-t");

    let (window_id, pane) = resolve_pane(server, client, target.as_deref())?;
    let session = server
        .sessions_of_window(window_id)
        .first()
        .copied()
        .ok_or(CommandError::NoCurrentSession)?;
    let (cols, rows) = server
        .windows
        .get(window_id)
        .map(|w| w.size())
        .unwrap_or((80, 23));

    server.remove_pane_from_window(window_id, pane);

    let name = name
        .or_else(|| server.panes.get(pane).map(|p| p.title.clone()).filter(|t| !t.is_empty()))
        .unwrap_or_else(|| "shell".to_string());
    let new_window = server
        .windows
        .add(|id| crate::window::Window::new(id, name, pane, cols, rows));
    if let Some(p) = server.panes.get_mut(pane) {
        p.resize(cols, rows);
    }

    let base = server.options_for_session(Some(session)).number("base-index") as u16;
    if let Some(s) = server.sessions.get_mut(session) {
        let index = s.link_window(new_window, None, base);
        if let Some(index) = index {
            s.select_index(index);
        }
    }
    server.apply_window_sizes();
    mark_session_redraw(server, session);
    Ok(CommandReply::empty())
}

/// Move a pane into another window by splitting at the target pane.
fn join_pane(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let orient = if args.flag("-h") {
        Orientation::Horizontal
    } else {
        args.flag("-v");
        Orientation::Vertical
    };
    let src = args.value("-s").ok_or(CommandError::Usage("join-pane -s %src [-t dst]"))?;
    let dst = args.value("-t");

    let (src_window, src_pane) = resolve_pane(server, client, Some(&src))?;
    let (dst_window, dst_pane) = resolve_pane(server, client, dst.as_deref())?;
    if src_window == dst_window {
        return Err(CommandError::Other("pane is already in that window".to_string()));
    }

    // Probe the destination split first so failure leaves the source
    // window untouched.
    {
        let window = server
            .windows
            .get(dst_window)
            .ok_or_else(|| CommandError::NoSuchWindow(format!("{dst_window}")))?;
        let mut probe = window.layout.clone();
        probe.split(dst_pane, orient, SplitSize::Percent(50), true, PaneId(u32::MAX))?;
    }

    server.remove_pane_from_window(src_window, src_pane);
    let rect = {
        let window = server
            .windows
            .get_mut(dst_window)
            .ok_or_else(|| CommandError::NoSuchWindow(format!("{dst_window}")))?;
        let rect = window
            .layout
            .split(dst_pane, orient, SplitSize::Percent(50), true, src_pane)?;
        window.add_pane(src_pane, Some(dst_pane));
        window.set_active(src_pane);
        rect
    };
    if let Some(p) = server.panes.get_mut(src_pane) {
        p.resize(rect.w, rect.h);
    }
    server.resize_window_panes(dst_window);
    for (_, c) in server.clients.iter_mut() {
        c.needs_redraw = true;
    }
    Ok(CommandReply::empty())
}

fn select_layout(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let rest = args.rest();
    let name = rest
        .first()
        .ok_or(CommandError::Usage("select-layout <layout-name>"))?;
    let preset =
        LayoutPreset::parse(name).ok_or_else(|| CommandError::Other(format!("unknown layout: {name}")))?;

    let (_, _, window_id) = resolve_window(server, client, target.as_deref())?;
    if let Some(window) = server.windows.get_mut(window_id) {
        let (cols, rows) = window.size();
        let panes = window.panes().to_vec();
        window.layout = preset.apply(&panes, cols, rows);
    }
    server.resize_window_panes(window_id);
    for (_, c) in server.clients.iter_mut() {
        c.needs_redraw = true;
    }
    Ok(CommandReply::empty())
}

fn rename_session(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let rest = args.rest();
    let name = rest.first().ok_or(CommandError::Usage("rename-session <name>"))?;
    if server.find_session_by_name(name).is_some() {
        return Err(CommandError::Other(format!("duplicate session: {name}")));
    }
    let session = resolve_session(server, client, target.as_deref())?;
    if let Some(s) = server.sessions.get_mut(session) {
        s.name = name.clone();
    }
    mark_session_redraw(server, session);
    Ok(CommandReply::empty())
}

fn rename_window(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let target = args.value("-t");
    let rest = args.rest();
    let name = rest.first().ok_or(CommandError::Usage("rename-window <name>"))?;
    let (session_id, _, window_id) = resolve_window(server, client, target.as_deref())?;
    if let Some(w) = server.windows.get_mut(window_id) {
        w.name = name.clone();
    }
    mark_session_redraw(server, session_id);
    Ok(CommandReply::empty())
}

fn send_keys(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let literal = args.flag("-l");
    let target = args.value("-t");
    let keys = args.rest();

    let (_, pane_id) = resolve_pane(server, client, target.as_deref())?;
    let mode = server
        .panes
        .get(pane_id)
        .map(|p| p.screen().mode())
        .unwrap_or_default();

    let mut bytes = Vec::new();
    for key in &keys {
        if literal {
            bytes.extend_from_slice(key.as_bytes());
            continue;
        }
        match parse_key_name(key) {
            Some(press) => bytes.extend_from_slice(&encode_key(press, mode)),
            None => bytes.extend_from_slice(key.as_bytes()),
        }
    }
    if let Some(pane) = server.panes.get_mut(pane_id) {
        pane.send(&bytes);
    }
    Ok(CommandReply::empty())
}

/// Key names accepted by send-keys: `Enter`, `Space`, `Tab`, `Escape`,
/// `Up`, `C-x`, `M-x`, `F1`..`F12`, `PageUp`, …
fn parse_key_name(name: &str) -> Option<KeyPress> {
    let key = match name {
        "Enter" => Key::Enter,
        "Tab" => Key::Tab,
        "BTab" => Key::BackTab,
        "Space" => Key::Char(' '),
        "Escape" => Key::Escape,
        "BSpace" => Key::Backspace,
        "Up" => Key::Up,
        "Down" => Key::Down,
        "Left" => Key::Left,
        "Right" => Key::Right,
        "Home" => Key::Home,
        "End" => Key::End,
        "PageUp" | "PgUp" => Key::PageUp,
        "PageDown" | "PgDn" => Key::PageDown,
        "IC" | "Insert" => Key::Insert,
        "DC" | "Delete" => Key::Delete,
        _ => {
            if let Some(rest) = name.strip_prefix("C-") {
                let c = single_char(rest)?;
                return Some(KeyPress::plain(Key::Ctrl(c)));
            }
            if let Some(rest) = name.strip_prefix("M-") {
                let c = single_char(rest)?;
                return Some(KeyPress::plain(Key::Alt(c)));
            }
            if let Some(rest) = name.strip_prefix('F') {
                if let Ok(n) = rest.parse::<u8>() {
                    if (1..=12).contains(&n) {
                        return Some(KeyPress::plain(Key::F(n)));
                    }
                }
            }
            return None;
        }
    };
    Some(KeyPress::plain(key))
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn set_option(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut args = ArgSet::new(args);
    let global = args.flag("-g");
    let window_scope = args.flag("-w");
    let pane_scope = args.flag("-p");
    let target = args.value("-t");
    let rest = args.rest();
    let (name, value) = match rest.as_slice() {
        [n, v] => (n.clone(), v.clone()),
        _ => return Err(CommandError::Usage("set-option [-g|-w|-p] <name> <value>")),
    };

    let def = crate::options::lookup_def(&name)
        .ok_or_else(|| OptionError::Unknown(name.clone()))?;

    if global || def.scope == OptionScope::Server {
        match def.scope {
            OptionScope::Window | OptionScope::Pane => server.window_options.set(&name, &value)?,
            OptionScope::Server => server.server_options.set(&name, &value)?,
            OptionScope::Session => server.session_options.set(&name, &value)?,
        }
    } else if pane_scope || def.scope == OptionScope::Pane {
        let (_, pane) = resolve_pane(server, client, target.as_deref())?;
        if let Some(p) = server.panes.get_mut(pane) {
            p.options.set(&name, &value)?;
        }
    } else if window_scope || def.scope == OptionScope::Window {
        let (_, _, window) = resolve_window(server, client, target.as_deref())?;
        if let Some(w) = server.windows.get_mut(window) {
            w.options.set(&name, &value)?;
        }
    } else {
        let session = resolve_session(server, client, target.as_deref())?;
        if let Some(s) = server.sessions.get_mut(session) {
            s.options.set(&name, &value)?;
        }
    }

    // Some options act immediately.
    if name == "history-limit" {
        let limit = server
            .options_for_session(None)
            .number("history-limit")
            .max(0) as usize;
        for (_, pane) in server.panes.iter_mut() {
            pane.screen_mut().set_history_limit(limit);
        }
    }
    if name == "aggressive-resize" {
        server.apply_window_sizes();
    }
    Ok(CommandReply::empty())
}

fn show_options(
    server: &Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let global = arg_set.flag("-g");
    let mut lines = Vec::new();

    let render = |lines: &mut Vec<String>, name: &str, value: &crate::options::OptionValue| {
        use crate::options::OptionValue;
        let shown = match value {
            OptionValue::String(s) => s.clone(),
            OptionValue::Number(n) => n.to_string(),
            OptionValue::Flag(b) => if *b { "on" } else { "off" }.to_string(),
            OptionValue::Choice(i) => crate::options::lookup_def(name)
                .and_then(|d| match d.kind {
                    crate::options::OptionKind::Choice(c) => c.get(*i).copied(),
                    _ => None,
                })
                .unwrap_or("?")
                .to_string(),
            OptionValue::List(items) => items.join(","),
        };
        lines.push(format!("{name} {shown}"));
    };

    if global {
        for (name, value) in server.session_options.iter() {
            render(&mut lines, name, value);
        }
        for (name, value) in server.window_options.iter() {
            render(&mut lines, name, value);
        }
        for (name, value) in server.server_options.iter() {
            render(&mut lines, name, value);
        }
    } else {
        let session = current_session(server, client)?;
        if let Some(s) = server.sessions.get(session) {
            for (name, value) in s.options.iter() {
                render(&mut lines, name, value);
            }
        }
    }
    lines.sort();
    Ok(CommandReply::text(lines.join("\n")))
}

fn set_buffer(server: &mut Server, args: &[String]) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let name = arg_set.value("-b");
    let rest = arg_set.rest();
    let data = rest
        .first()
        .ok_or(CommandError::Usage("set-buffer [-b name] <data>"))?;

    match name {
        Some(n) => server.paste.set_named(&n, data.clone().into_bytes()),
        None => {
            server.paste.push_automatic(data.clone().into_bytes());
        }
    }
    Ok(CommandReply::empty())
}

fn show_buffer(server: &Server, args: &[String]) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let name = arg_set.value("-b");
    let buffer = match name {
        Some(ref n) => server.paste.get(n),
        None => server.paste.top(),
    }
    .ok_or_else(|| CommandError::Other("no buffer".to_string()))?;
    Ok(CommandReply::text(String::from_utf8_lossy(&buffer.data).into_owned()))
}

fn paste_buffer(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let mut arg_set = ArgSet::new(args);
    let name = arg_set.value("-b");
    let target = arg_set.value("-t");

    let data = match name {
        Some(ref n) => server.paste.get(n),
        None => server.paste.top(),
    }
    .ok_or_else(|| CommandError::Other("no buffer".to_string()))?
    .data
    .clone();

    let (_, pane_id) = resolve_pane(server, client, target.as_deref())?;
    let bracketed = server
        .panes
        .get(pane_id)
        .is_some_and(|p| p.screen().mode().contains(rmux_core::TermMode::BRACKETED_PASTE));

    if let Some(pane) = server.panes.get_mut(pane_id) {
        if bracketed {
            pane.send(b"\x1b[200~");
            pane.send(&data);
            pane.send(b"\x1b[201~");
        } else {
            pane.send(&data);
        }
    }
    Ok(CommandReply::empty())
}

fn display_message(
    server: &mut Server,
    client: ClientId,
    args: &[String],
) -> Result<CommandReply, CommandError> {
    let text = args.join(" ");
    if let Some(c) = server.clients.get_mut(client) {
        c.set_message(text, MESSAGE_TTL);
    }
    Ok(CommandReply::empty())
}

fn mark_session_redraw(server: &mut Server, session: SessionId) {
    for client in server.clients_of_session(session) {
        if let Some(c) = server.clients.get_mut(client) {
            c.needs_redraw = true;
        }
    }
    server.clear_visited_flags();
}

/// Owned argv with consumed-entry tracking.
struct ArgSet {
    items: Vec<String>,
}

impl ArgSet {
    fn new(args: &[String]) -> Self {
        Self { items: args.to_vec() }
    }

    fn flag(&mut self, name: &str) -> bool {
        match self.items.iter().position(|a| a == name) {
            Some(i) => {
                self.items.remove(i);
                true
            }
            None => false,
        }
    }

    fn value(&mut self, name: &str) -> Option<String> {
        let i = self.items.iter().position(|a| a == name)?;
        if i + 1 >= self.items.len() {
            return None;
        }
        let v = self.items.remove(i + 1);
        self.items.remove(i);
        Some(v)
    }

    fn rest(self) -> Vec<String> {
        self.items
    }
}
