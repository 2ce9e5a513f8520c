//! An attached viewer: socket, capabilities, viewed session, buffers.

use std::time::Instant;

use crate::input::KeyDecoder;
use crate::protocol::{ClientCaps, Frame, FrameCodec, MsgType};
use crate::registry::{ClientId, SessionId};
use crate::render::Renderer;

/// Lifecycle of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    /// Socket accepted, IDENTIFY not yet seen.
    #[default]
    Unattached,
    /// Identified; no session selected yet.
    Identified,
    /// Viewing a session.
    Attached,
    /// Suspended (^Z at the client); no output sent.
    Suspended,
    /// EXIT/DETACH sent, waiting for the socket to drain and close.
    Detaching,
}

pub struct Client {
    pub id: ClientId,
    pub state: ClientState,
    pub caps: ClientCaps,
    pub term: String,
    pub tty_name: String,
    pub cwd: String,
    pub cols: u16,
    pub rows: u16,
    /// The session this client views.
    pub session: Option<SessionId>,
    /// Reassembles incoming frames.
    pub codec: FrameCodec,
    /// Encoded frames waiting for socket writability.
    pub outbuf: Vec<u8>,
    pub key_decoder: KeyDecoder,
    pub renderer: Renderer,
    /// Environment staged by ENVIRON frames for the next COMMAND.
    pub environ: Vec<(String, String)>,
    /// Transient status-line message and its expiry.
    pub message: Option<(String, Instant)>,
    /// Needs a render pass this tick.
    pub needs_redraw: bool,
    pub last_activity: Instant,
}

impl Client {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            state: ClientState::default(),
            caps: ClientCaps::empty(),
            term: String::new(),
            tty_name: String::new(),
            cwd: String::new(),
            cols: 80,
            rows: 24,
            session: None,
            codec: FrameCodec::new(),
            outbuf: Vec::new(),
            key_decoder: KeyDecoder::new(),
            renderer: Renderer::new(),
            environ: Vec::new(),
            message: None,
            needs_redraw: true,
            last_activity: Instant::now(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state == ClientState::Attached
    }

    /// Whether render output should flow to this client.
    pub fn wants_output(&self) -> bool {
        self.state == ClientState::Attached && !self.caps.contains(ClientCaps::CONTROL_MODE)
    }

    /// Queue a frame on the socket.
    pub fn queue(&mut self, ty: MsgType, payload: Vec<u8>) {
        self.outbuf.extend_from_slice(&Frame::new(ty, payload).encode());
    }

    /// Queue raw terminal bytes as an OUTPUT frame.
    pub fn queue_output(&mut self, bytes: Vec<u8>) {
        if !bytes.is_empty() {
            self.queue(MsgType::Output, bytes);
        }
    }

    /// Show a transient status-line message.
    pub fn set_message(&mut self, text: String, ttl: std::time::Duration) {
        self.message = Some((text, Instant::now() + ttl));
        self.needs_redraw = true;
    }

    /// Current message, dropping it once expired.
    pub fn message(&mut self) -> Option<&str> {
        if let Some((_, expiry)) = self.message {
            if Instant::now() >= expiry {
                self.message = None;
                self.needs_redraw = true;
            }
        }
        self.message.as_ref().map(|(text, _)| text.as_str())
    }

    /// Begin detaching: after this only the out-buffer drains.
    pub fn start_detach(&mut self, ty: MsgType, payload: Vec<u8>) {
        self.queue(ty, payload);
        self.state = ClientState::Detaching;
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn new_client_is_unattached() {
        let c = Client::new(ClientId(0));
        assert_eq!(c.state, ClientState::Unattached);
        assert!(!c.is_attached());
        assert!(c.session.is_none());
    }

    #[test]
    fn queue_encodes_frames() {
        let mut c = Client::new(ClientId(0));
        c.queue(MsgType::Ready, vec![]);
        let mut codec = FrameCodec::new();
        codec.push(&c.outbuf);
        assert_eq!(codec.next_frame().unwrap().unwrap().ty, MsgType::Ready);
    }

    #[test]
    fn control_mode_suppresses_output() {
        let mut c = Client::new(ClientId(0));
        c.state = ClientState::Attached;
        assert!(c.wants_output());
        c.caps |= ClientCaps::CONTROL_MODE;
        assert!(!c.wants_output());
    }

    #[test]
    fn message_expires() {
        let mut c = Client::new(ClientId(0));
        c.set_message("Bell in window 2".into(), Duration::from_secs(1));
        assert_eq!(c.message(), Some("Bell in window 2"));
        c.message = Some(("old".into(), Instant::now() - Duration::from_secs(1)));
        assert_eq!(c.message(), None);
    }

    #[test]
    fn detach_clears_session() {
        let mut c = Client::new(ClientId(0));
        c.state = ClientState::Attached;
        c.session = Some(crate::registry::SessionId(1));
        c.start_detach(MsgType::Detach, vec![]);
        assert_eq!(c.state, ClientState::Detaching);
        assert!(c.session.is_none());
        assert!(!c.outbuf.is_empty());
    }
}
