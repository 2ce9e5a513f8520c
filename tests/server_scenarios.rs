//! Server-level scenarios driven in-process: a `Server` value, scripted
//! clients, and real PTY-backed panes.

use rmux::client::{Client, ClientState};
use rmux::command;
use rmux::pane::PaneOutput;
use rmux::protocol::{ClientCaps, FrameCodec, MsgType};
use rmux::registry::{ClientId, SessionId};
use rmux::server::Server;
use rmux::window::WindowFlags;

fn add_client(server: &mut Server, cols: u16, rows: u16) -> ClientId {
    let id = server.clients.add(Client::new);
    let client = server.clients.get_mut(id).unwrap();
    client.cols = cols;
    client.rows = rows;
    client.caps = ClientCaps::UTF8 | ClientCaps::COLORS_256;
    client.state = ClientState::Identified;
    id
}

fn new_session(server: &mut Server, name: &str) -> SessionId {
    server
        .new_session(
            Some(name.to_string()),
            vec!["/bin/sh".to_string()],
            None,
            Vec::new(),
            (80, 24),
        )
        .expect("spawn session")
}

fn frames_of(client: &rmux::client::Client) -> Vec<rmux::protocol::Frame> {
    let mut codec = FrameCodec::new();
    codec.push(&client.outbuf);
    let mut frames = Vec::new();
    while let Some(frame) = codec.next_frame().unwrap() {
        frames.push(frame);
    }
    frames
}

// Scenario: split a single 80x24 window, then grow it.

#[test]
fn split_and_resize_window() {
    let mut server = Server::new();
    let client = add_client(&mut server, 80, 25);
    let session = new_session(&mut server, "main");
    server.attach(client, session);

    let window_id = server.sessions.get(session).unwrap().current_window().unwrap();
    assert_eq!(server.windows.get(window_id).unwrap().size(), (80, 24));

    command::execute(&mut server, client, &["split-window".to_string(), "-h".to_string()])
        .expect("split");

    let window = server.windows.get(window_id).unwrap();
    let leaves = window.layout.leaves();
    assert_eq!(leaves.len(), 2);
    let widths: Vec<u16> = leaves.iter().map(|(_, r)| r.w).collect();
    assert_eq!(widths, vec![40, 39]);
    assert!(leaves.iter().all(|(_, r)| r.h == 24));

    // Grow the client: the window follows, proportionally.
    server.client_resized(client, 100, 25);
    let window = server.windows.get(window_id).unwrap();
    let widths: Vec<u16> = window.layout.leaves().iter().map(|(_, r)| r.w).collect();
    assert_eq!(widths, vec![50, 49]);
}

// Scenario: bell routing with bell-action=any, visual-bell=off. Client 1
// is looking at the bell window; client 2 views the same window group
// from another session showing a different window.

#[test]
fn bell_routing_audible_and_status() {
    let mut server = Server::new();

    let session1 = new_session(&mut server, "one");
    let bell_window = server.sessions.get(session1).unwrap().current_window().unwrap();

    let session2 = new_session(&mut server, "two");
    // Link the bell window into session 2 at index 2; session 2 stays on
    // its own window.
    server
        .sessions
        .get_mut(session2)
        .unwrap()
        .link_window(bell_window, Some(2), 0);

    let client1 = add_client(&mut server, 80, 25);
    server.attach(client1, session1);
    let client2 = add_client(&mut server, 80, 25);
    server.attach(client2, session2);

    // Drop the attach-time traffic so only the bell shows up.
    server.clients.get_mut(client1).unwrap().outbuf.clear();
    server.clients.get_mut(client2).unwrap().outbuf.clear();

    // A pane in the bell window rings.
    let pane = server.windows.get(bell_window).unwrap().active_pane().unwrap();
    let mut out = PaneOutput::default();
    server.panes.get_mut(pane).unwrap().feed(b"\x07", &mut out);
    assert!(out.bell);
    server.note_pane_output(pane, &out);
    server.alerts_tick();

    // Client 1 (viewing the window): audible BEL, no message.
    let frames = frames_of(server.clients.get(client1).unwrap());
    assert!(frames
        .iter()
        .any(|f| f.ty == MsgType::Output && f.payload.contains(&0x07)));
    assert!(server.clients.get_mut(client1).unwrap().message().is_none());

    // Client 2 (same window linked elsewhere): audible BEL and a
    // status-line message naming the winlink.
    let frames = frames_of(server.clients.get(client2).unwrap());
    assert!(frames
        .iter()
        .any(|f| f.ty == MsgType::Output && f.payload.contains(&0x07)));
    assert_eq!(
        server.clients.get_mut(client2).unwrap().message(),
        Some("Bell in window 2")
    );
}

// Alert coalescing: many bells, one notification per visit.

#[test]
fn bell_notifications_coalesce_until_visit() {
    let mut server = Server::new();
    let session1 = new_session(&mut server, "one");
    let bell_window = server.sessions.get(session1).unwrap().current_window().unwrap();

    let session2 = new_session(&mut server, "two");
    server
        .sessions
        .get_mut(session2)
        .unwrap()
        .link_window(bell_window, Some(7), 0);
    let client = add_client(&mut server, 80, 25);
    server.attach(client, session2);
    server.clients.get_mut(client).unwrap().outbuf.clear();

    let pane = server.windows.get(bell_window).unwrap().active_pane().unwrap();

    // Two bells in one tick: one delivery.
    let mut out = PaneOutput::default();
    server.panes.get_mut(pane).unwrap().feed(b"\x07\x07", &mut out);
    server.note_pane_output(pane, &out);
    server.alerts_tick();
    let bels = count_bels(&frames_of(server.clients.get(client).unwrap()));
    assert_eq!(bels, 1);

    // Another bell in a later tick, still unvisited: no new delivery.
    let mut out = PaneOutput::default();
    server.panes.get_mut(pane).unwrap().feed(b"\x07", &mut out);
    server.note_pane_output(pane, &out);
    server.alerts_tick();
    let bels = count_bels(&frames_of(server.clients.get(client).unwrap()));
    assert_eq!(bels, 1);

    // Visit the winlink, ring again: delivered again.
    server.sessions.get_mut(session2).unwrap().select_index(7);
    server.sessions.get_mut(session2).unwrap().select_index(0);
    server.clients.get_mut(client).unwrap().outbuf.clear();

    let mut out = PaneOutput::default();
    server.panes.get_mut(pane).unwrap().feed(b"\x07", &mut out);
    server.note_pane_output(pane, &out);
    server.alerts_tick();
    let bels = count_bels(&frames_of(server.clients.get(client).unwrap()));
    assert_eq!(bels, 1);
}

fn count_bels(frames: &[rmux::protocol::Frame]) -> usize {
    frames
        .iter()
        .filter(|f| f.ty == MsgType::Output)
        .flat_map(|f| f.payload.iter())
        .filter(|&&b| b == 0x07)
        .count()
}

// Scenario: detach-client -a detaches everyone else; the session stays.

#[test]
fn detach_all_others_keeps_session() {
    let mut server = Server::new();
    let session = new_session(&mut server, "main");

    let c1 = add_client(&mut server, 80, 25);
    let c2 = add_client(&mut server, 80, 25);
    let c3 = add_client(&mut server, 80, 25);
    for &c in &[c1, c2, c3] {
        server.attach(c, session);
    }

    let reply = command::execute(
        &mut server,
        c1,
        &["detach-client".to_string(), "-a".to_string()],
    )
    .expect("detach -a");
    assert!(!reply.detach_self);

    for &c in &[c2, c3] {
        let client = server.clients.get(c).unwrap();
        assert_eq!(client.state, ClientState::Detaching);
        assert!(frames_of(client).iter().any(|f| f.ty == MsgType::Detach));
    }
    // The invoker stays attached; the session survives unattached or not.
    assert_eq!(server.clients.get(c1).unwrap().state, ClientState::Attached);
    assert!(server.sessions.contains(session));

    server.sweep();
    assert!(server.sessions.contains(session));
}

// Window lifecycle: killing the only pane kills the window and then the
// unattached session.

#[test]
fn kill_pane_cascades_to_window_and_session() {
    let mut server = Server::new();
    let session = new_session(&mut server, "doomed");
    let window = server.sessions.get(session).unwrap().current_window().unwrap();
    let pane = server.windows.get(window).unwrap().active_pane().unwrap();

    server.kill_pane(pane);
    // First sweep removes the pane and marks the window; the window is
    // reclaimed one sweep later.
    server.sweep();
    assert!(!server.panes.contains(pane));
    server.sweep();
    assert!(!server.windows.contains(window));
    assert!(!server.sessions.contains(session));
}

#[test]
fn remain_on_exit_keeps_dead_pane() {
    let mut server = Server::new();
    server.window_options.set("remain-on-exit", "on").unwrap();

    let session = new_session(&mut server, "sticky");
    let window = server.sessions.get(session).unwrap().current_window().unwrap();
    let pane = server.windows.get(window).unwrap().active_pane().unwrap();

    server.panes.get_mut(pane).unwrap().dead = true;
    server.handle_pane_exit(pane);
    server.sweep();

    assert!(server.panes.contains(pane));
    assert!(server.windows.contains(window));
}

// Sessions with several windows: selection and renumbering.

#[test]
fn window_selection_and_renumber() {
    let mut server = Server::new();
    let session = new_session(&mut server, "multi");
    server
        .new_window(session, Some("two".into()), vec!["/bin/sh".into()], None, Vec::new(), None)
        .unwrap();
    server
        .new_window(session, Some("three".into()), vec!["/bin/sh".into()], None, Vec::new(), None)
        .unwrap();

    server.sessions.get_mut(session).unwrap().select_index(2);
    let second = server.sessions.get(session).unwrap().window_at(1).unwrap();
    server.kill_window(second);
    server.sessions.get_mut(session).unwrap().options.set("renumber-windows", "on").unwrap();
    server.sweep();
    server.sweep();

    let indices: Vec<u16> = server
        .sessions
        .get(session)
        .unwrap()
        .winlinks()
        .map(|(i, _)| i)
        .collect();
    assert_eq!(indices, vec![0, 1]);
    // The selected window followed its compacted index.
    let current = server.sessions.get(session).unwrap().current_window().unwrap();
    assert_eq!(server.sessions.get(session).unwrap().index_of(current), Some(1));
}

#[test]
fn destroy_unattached_session_on_detach() {
    let mut server = Server::new();
    let session = new_session(&mut server, "temp");
    server
        .sessions
        .get_mut(session)
        .unwrap()
        .options
        .set("destroy-unattached", "on")
        .unwrap();

    let client = add_client(&mut server, 80, 25);
    server.attach(client, session);
    assert!(server.sessions.contains(session));

    server.detach(client, MsgType::Detach, "");
    assert!(!server.sessions.contains(session));
}

#[test]
fn status_line_lists_windows_and_marks_current() {
    let mut server = Server::new();
    let client = add_client(&mut server, 80, 25);
    let session = new_session(&mut server, "work");
    server.attach(client, session);
    server
        .new_window(session, Some("logs".into()), vec!["/bin/sh".into()], None, Vec::new(), None)
        .unwrap();
    server.sessions.get_mut(session).unwrap().select_index(0);

    let status = server.status_line(client);
    assert!(status.starts_with("[work]"));
    assert!(status.contains("0:"));
    assert!(status.contains('*'));
    assert!(status.contains("1:logs"));
}

#[test]
fn send_keys_reaches_pane_queue() {
    let mut server = Server::new();
    let client = add_client(&mut server, 80, 25);
    let session = new_session(&mut server, "keys");
    server.attach(client, session);

    command::execute(
        &mut server,
        client,
        &["send-keys".to_string(), "echo hello".to_string(), "Enter".to_string()],
    )
    .expect("send-keys");

    let pane = server.active_pane_for_client(client).unwrap();
    assert!(server.panes.get(pane).unwrap().wants_write());
}

#[test]
fn break_and_join_move_panes_between_windows() {
    let mut server = Server::new();
    let client = add_client(&mut server, 80, 25);
    let session = new_session(&mut server, "move");
    server.attach(client, session);

    command::execute(&mut server, client, &["split-window".to_string(), "-h".to_string()])
        .expect("split");
    let window1 = server.sessions.get(session).unwrap().window_at(0).unwrap();
    let moved = server.windows.get(window1).unwrap().active_pane().unwrap();

    // Break the active pane out into its own window.
    command::execute(&mut server, client, &["break-pane".to_string()]).expect("break");
    let window2 = server.sessions.get(session).unwrap().current_window().unwrap();
    assert_ne!(window1, window2);

    // The pane lives in exactly one window.
    let holders: Vec<_> = server
        .windows
        .iter()
        .filter(|(_, w)| w.contains(moved))
        .map(|(id, _)| id)
        .collect();
    assert_eq!(holders, vec![window2]);
    assert_eq!(server.windows.get(window1).unwrap().panes().len(), 1);

    // Join it back: again exactly one holder.
    let anchor = server.windows.get(window1).unwrap().active_pane().unwrap();
    command::execute(
        &mut server,
        client,
        &[
            "join-pane".to_string(),
            "-s".to_string(),
            format!("{moved}"),
            "-t".to_string(),
            format!("{anchor}"),
        ],
    )
    .expect("join");
    let holders: Vec<_> = server
        .windows
        .iter()
        .filter(|(_, w)| w.contains(moved))
        .map(|(id, _)| id)
        .collect();
    assert_eq!(holders, vec![window1]);
    assert_eq!(server.windows.get(window1).unwrap().panes().len(), 2);
}

#[test]
fn silence_alert_fires_after_interval() {
    use std::time::{Duration, Instant};

    let mut server = Server::new();
    let session1 = new_session(&mut server, "quiet");
    let quiet_window = server.sessions.get(session1).unwrap().current_window().unwrap();
    server
        .windows
        .get_mut(quiet_window)
        .unwrap()
        .options
        .set("monitor-silence", "1")
        .unwrap();

    let session2 = new_session(&mut server, "watcher");
    server
        .sessions
        .get_mut(session2)
        .unwrap()
        .link_window(quiet_window, Some(3), 0);
    let client = add_client(&mut server, 80, 25);
    server.attach(client, session2);
    server.clients.get_mut(client).unwrap().outbuf.clear();

    // Backdate the pane's last activity beyond the interval.
    let pane = server.windows.get(quiet_window).unwrap().active_pane().unwrap();
    server.panes.get_mut(pane).unwrap().last_activity = Instant::now() - Duration::from_secs(5);

    server.check_silence(Instant::now());
    server.alerts_tick();

    assert!(server
        .windows
        .get(quiet_window)
        .unwrap()
        .flags
        .contains(WindowFlags::SILENCE));
    assert_eq!(
        server.clients.get_mut(client).unwrap().message(),
        Some("Silence in window 3")
    );
}

#[test]
fn command_errors_are_single_messages() {
    let mut server = Server::new();
    let client = add_client(&mut server, 80, 25);
    let err = command::execute(
        &mut server,
        client,
        &["select-window".to_string(), "-t".to_string(), "99".to_string()],
    )
    .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("no such") || text.contains("no current"), "{text}");
}
