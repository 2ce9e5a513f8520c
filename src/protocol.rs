//! Control-socket protocol: length-prefixed, type-tagged frames.
//!
//! Wire format, little-endian: `u32 payload_len | u16 type | u16 flags |
//! payload`. Unknown types are fatal to the connection on both ends.
//! File descriptors ride as `SCM_RIGHTS` ancillary data on the send that
//! carries their frame (only IDENTIFY uses this, for the client tty).

use std::io;
use std::os::fd::RawFd;

use bitflags::bitflags;
use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};
use std::io::{IoSlice, IoSliceMut};
use thiserror::Error;

/// Frame header bytes on the wire.
pub const HEADER_LEN: usize = 8;

/// Upper bound on a single payload; anything larger is a protocol error.
pub const MAX_PAYLOAD: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message type {0}")]
    UnknownType(u16),
    #[error("oversized frame: {0} bytes")]
    Oversize(u32),
    #[error("truncated payload")]
    Truncated,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Message types on the control socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum MsgType {
    Identify = 1,
    Environ = 2,
    Command = 3,
    Stdin = 4,
    Resize = 5,
    Exit = 6,
    Suspend = 7,
    Wakeup = 8,
    Shutdown = 9,
    Ready = 10,
    Keys = 11,
    Output = 12,
    Lock = 13,
    Unlock = 14,
    Detach = 15,
}

impl MsgType {
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::Identify),
            2 => Some(Self::Environ),
            3 => Some(Self::Command),
            4 => Some(Self::Stdin),
            5 => Some(Self::Resize),
            6 => Some(Self::Exit),
            7 => Some(Self::Suspend),
            8 => Some(Self::Wakeup),
            9 => Some(Self::Shutdown),
            10 => Some(Self::Ready),
            11 => Some(Self::Keys),
            12 => Some(Self::Output),
            13 => Some(Self::Lock),
            14 => Some(Self::Unlock),
            15 => Some(Self::Detach),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub ty: MsgType,
    pub flags: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(ty: MsgType, payload: Vec<u8>) -> Self {
        Self { ty, flags: 0, payload }
    }

    /// Serialize header + payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.ty as u16).to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Incremental frame reassembly over a byte stream.
#[derive(Debug, Default)]
pub struct FrameCodec {
    buf: Vec<u8>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes read from the socket.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if any.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let len = u32::from_le_bytes(self.buf[0..4].try_into().expect("sliced"));
        if len as usize > MAX_PAYLOAD {
            return Err(ProtocolError::Oversize(len));
        }
        let total = HEADER_LEN + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let raw_ty = u16::from_le_bytes(self.buf[4..6].try_into().expect("sliced"));
        let flags = u16::from_le_bytes(self.buf[6..8].try_into().expect("sliced"));
        let ty = MsgType::from_u16(raw_ty).ok_or(ProtocolError::UnknownType(raw_ty))?;
        let payload = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);

        Ok(Some(Frame { ty, flags, payload }))
    }
}

bitflags! {
    /// Capabilities a client reports at IDENTIFY time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClientCaps: u32 {
        const UTF8           = 1 << 0;
        const COLORS_256     = 1 << 1;
        const COLORS_88      = 1 << 2;
        const DEFAULT_COLORS = 1 << 3;
        const CONTROL_MODE   = 1 << 4;
        const CLIPBOARD      = 1 << 5;
        const TRUE_COLOR     = 1 << 6;
        const READ_ONLY      = 1 << 7;
    }
}

/// IDENTIFY payload: version, capabilities, terminal geometry, names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identify {
    pub version: u32,
    pub caps: ClientCaps,
    pub cols: u16,
    pub rows: u16,
    pub term: String,
    pub cwd: String,
    pub tty_name: String,
}

impl Identify {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.caps.bits().to_le_bytes());
        out.extend_from_slice(&self.cols.to_le_bytes());
        out.extend_from_slice(&self.rows.to_le_bytes());
        put_str(&mut out, &self.term);
        put_str(&mut out, &self.cwd);
        put_str(&mut out, &self.tty_name);
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cur = Cursor::new(payload);
        let version = cur.u32()?;
        let caps = ClientCaps::from_bits_truncate(cur.u32()?);
        let cols = cur.u16()?;
        let rows = cur.u16()?;
        let term = cur.str_()?;
        let cwd = cur.str_()?;
        let tty_name = cur.str_()?;
        Ok(Self { version, caps, cols, rows, term, cwd, tty_name })
    }
}

/// RESIZE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBody {
    pub cols: u16,
    pub rows: u16,
}

impl ResizeBody {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4);
        out.extend_from_slice(&self.cols.to_le_bytes());
        out.extend_from_slice(&self.rows.to_le_bytes());
        out
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cur = Cursor::new(payload);
        Ok(Self { cols: cur.u16()?, rows: cur.u16()? })
    }
}

/// COMMAND / ENVIRON payloads are NUL-delimited string lists.
pub fn encode_strings(items: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for item in items {
        put_str(&mut out, item);
    }
    out
}

pub fn decode_strings(payload: &[u8]) -> Vec<String> {
    payload
        .split(|&b| b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect()
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

struct Cursor<'a> {
    rest: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(rest: &'a [u8]) -> Self {
        Self { rest }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.rest.len() < n {
            return Err(ProtocolError::Truncated);
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().expect("sized")))
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().expect("sized")))
    }

    fn str_(&mut self) -> Result<String, ProtocolError> {
        let nul = self
            .rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::Truncated)?;
        let s = String::from_utf8_lossy(&self.rest[..nul]).into_owned();
        self.rest = &self.rest[nul + 1..];
        Ok(s)
    }
}

/// Send bytes on a socket, attaching `fd` as `SCM_RIGHTS` when given.
/// Returns the number of payload bytes written.
pub fn send_with_fd(sock: RawFd, bytes: &[u8], fd: Option<RawFd>) -> nix::Result<usize> {
    let iov = [IoSlice::new(bytes)];
    let fds;
    let cmsgs: &[ControlMessage<'_>] = match fd {
        Some(fd) => {
            fds = [fd];
            &[ControlMessage::ScmRights(&fds)]
        }
        None => &[],
    };
    sendmsg::<()>(sock, &iov, cmsgs, MsgFlags::empty(), None)
}

/// Receive bytes and any passed file descriptors.
pub fn recv_with_fds(sock: RawFd, buf: &mut [u8], fds: &mut Vec<RawFd>) -> nix::Result<usize> {
    let mut iov = [IoSliceMut::new(buf)];
    let mut cmsg_buf = nix::cmsg_space!([RawFd; 4]);
    let msg = recvmsg::<()>(sock, &mut iov, Some(&mut cmsg_buf), MsgFlags::empty())?;
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::ScmRights(received) = cmsg {
            fds.extend(received);
        }
    }
    Ok(msg.bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_round_trip() {
        let frame = Frame::new(MsgType::Command, b"new-session\0-d\0".to_vec());
        let wire = frame.encode();

        let mut codec = FrameCodec::new();
        codec.push(&wire);
        let decoded = codec.next_frame().unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(codec.next_frame().unwrap().is_none());
    }

    #[test]
    fn split_reads_reassemble() {
        let frame = Frame::new(MsgType::Output, vec![7; 100]);
        let wire = frame.encode();

        let mut codec = FrameCodec::new();
        for chunk in wire.chunks(9) {
            codec.push(chunk);
        }
        assert_eq!(codec.next_frame().unwrap().unwrap(), frame);
    }

    #[test]
    fn two_frames_in_one_read() {
        let a = Frame::new(MsgType::Stdin, b"ls\r".to_vec());
        let b = Frame::new(MsgType::Resize, ResizeBody { cols: 80, rows: 24 }.encode());
        let mut wire = a.encode();
        wire.extend(b.encode());

        let mut codec = FrameCodec::new();
        codec.push(&wire);
        assert_eq!(codec.next_frame().unwrap().unwrap(), a);
        assert_eq!(codec.next_frame().unwrap().unwrap(), b);
        assert!(codec.next_frame().unwrap().is_none());
    }

    #[test]
    fn unknown_type_is_fatal() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&0u32.to_le_bytes());
        wire.extend_from_slice(&999u16.to_le_bytes());
        wire.extend_from_slice(&0u16.to_le_bytes());

        let mut codec = FrameCodec::new();
        codec.push(&wire);
        assert!(matches!(codec.next_frame(), Err(ProtocolError::UnknownType(999))));
    }

    #[test]
    fn oversize_frame_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&(MAX_PAYLOAD as u32 + 1).to_le_bytes());
        wire.extend_from_slice(&1u16.to_le_bytes());
        wire.extend_from_slice(&0u16.to_le_bytes());

        let mut codec = FrameCodec::new();
        codec.push(&wire);
        assert!(matches!(codec.next_frame(), Err(ProtocolError::Oversize(_))));
    }

    #[test]
    fn identify_round_trip() {
        let id = Identify {
            version: 1,
            caps: ClientCaps::UTF8 | ClientCaps::COLORS_256,
            cols: 120,
            rows: 40,
            term: "xterm-256color".into(),
            cwd: "/home/user".into(),
            tty_name: "/dev/pts/3".into(),
        };
        assert_eq!(Identify::decode(&id.encode()).unwrap(), id);
    }

    #[test]
    fn identify_truncated_fails() {
        let id = Identify {
            version: 1,
            caps: ClientCaps::empty(),
            cols: 80,
            rows: 24,
            term: "vt100".into(),
            cwd: String::new(),
            tty_name: String::new(),
        };
        let mut wire = id.encode();
        wire.truncate(6);
        assert!(matches!(Identify::decode(&wire), Err(ProtocolError::Truncated)));
    }

    #[test]
    fn string_list_round_trip() {
        let argv = vec!["split-window".to_string(), "-h".to_string(), "-p".to_string(), "30".to_string()];
        assert_eq!(decode_strings(&encode_strings(&argv)), argv);
        assert!(decode_strings(&[]).is_empty());
    }
}
