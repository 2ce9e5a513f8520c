//! Client-edge key handling.
//!
//! Bytes from a client's terminal are decoded into key presses; keys not
//! claimed by a binding table (an external collaborator) are re-encoded
//! for the active pane, honoring that pane's cursor-key and keypad
//! modes. Decode and encode share one table so the round trip is exact
//! for everything a terminal can name.

use rmux_core::TermMode;

/// A decoded key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    /// Ctrl plus a letter/symbol, stored uppercase-insensitively.
    Ctrl(char),
    /// Alt (ESC prefix) plus a character.
    Alt(char),
    Enter,
    Tab,
    BackTab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    Insert,
    Delete,
    PageUp,
    PageDown,
    F(u8),
}

/// A key with its xterm modifier parameter (0 = unmodified, else 1+mask).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub mods: u8,
}

impl KeyPress {
    pub fn plain(key: Key) -> Self {
        Self { key, mods: 0 }
    }
}

/// Letter-terminated keys (SS3 when unmodified and application cursor
/// keys are on, CSI otherwise).
const LETTER_KEYS: &[(u8, Key)] = &[
    (b'A', Key::Up),
    (b'B', Key::Down),
    (b'C', Key::Right),
    (b'D', Key::Left),
    (b'H', Key::Home),
    (b'F', Key::End),
    (b'P', Key::F(1)),
    (b'Q', Key::F(2)),
    (b'R', Key::F(3)),
    (b'S', Key::F(4)),
];

/// Tilde-terminated keys (`CSI num ~`).
const TILDE_KEYS: &[(u8, Key)] = &[
    (2, Key::Insert),
    (3, Key::Delete),
    (5, Key::PageUp),
    (6, Key::PageDown),
    (15, Key::F(5)),
    (17, Key::F(6)),
    (18, Key::F(7)),
    (19, Key::F(8)),
    (20, Key::F(9)),
    (21, Key::F(10)),
    (23, Key::F(11)),
    (24, Key::F(12)),
];

fn letter_key(term: u8) -> Option<Key> {
    LETTER_KEYS.iter().find(|&&(t, _)| t == term).map(|&(_, k)| k)
}

fn letter_term(key: Key) -> Option<u8> {
    LETTER_KEYS.iter().find(|&&(_, k)| k == key).map(|&(t, _)| t)
}

fn tilde_key(num: u8) -> Option<Key> {
    TILDE_KEYS.iter().find(|&&(n, _)| n == num).map(|&(_, k)| k)
}

fn tilde_num(key: Key) -> Option<u8> {
    TILDE_KEYS.iter().find(|&&(_, k)| k == key).map(|&(n, _)| n)
}

/// One unit of decoded client input: a nameable key, or a sequence the
/// binding layer has no name for (mouse reports, focus events) that must
/// reach the pane verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputItem {
    Key(KeyPress),
    Raw(Vec<u8>),
}

/// Incremental decoder for one client's input stream.
#[derive(Debug, Default)]
pub struct KeyDecoder {
    buf: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one STDIN frame. Escape sequences split across frames are
    /// rare enough that a trailing partial sequence is flushed as
    /// literal keys — a frame is the client's atom of input.
    pub fn decode_frame(&mut self, bytes: &[u8]) -> Vec<InputItem> {
        self.buf.extend_from_slice(bytes);
        let mut items = Vec::new();

        loop {
            match self.try_decode_one() {
                Decoded::Key(key) => items.push(InputItem::Key(key)),
                Decoded::Raw(bytes) => items.push(InputItem::Raw(bytes)),
                Decoded::NeedMore => {
                    // End of frame: a bare ESC is a real Escape press,
                    // and an unfinished sequence degrades to its bytes.
                    // Partial UTF-8 stays buffered — multi-byte chars
                    // straddle frame boundaries routinely.
                    if self.buf.first() == Some(&0x1b) {
                        items.push(InputItem::Key(KeyPress::plain(Key::Escape)));
                        let rest: Vec<u8> = self.buf.drain(1..).collect();
                        self.buf.clear();
                        for &b in &rest {
                            if let Decoded::Key(k) = decode_single_byte(b) {
                                items.push(InputItem::Key(k));
                            }
                        }
                    }
                    break;
                }
                Decoded::Empty => break,
            }
        }
        items
    }

    fn try_decode_one(&mut self) -> Decoded {
        if self.buf.is_empty() {
            return Decoded::Empty;
        }

        let b0 = self.buf[0];
        if b0 != 0x1b {
            // UTF-8 or control byte.
            let len = utf8_len(b0);
            if len > 1 {
                if self.buf.len() < len {
                    return Decoded::NeedMore;
                }
                let taken: Vec<u8> = self.buf.drain(..len).collect();
                return match std::str::from_utf8(&taken) {
                    Ok(s) => {
                        let c = s.chars().next().expect("nonempty utf8");
                        Decoded::Key(KeyPress::plain(Key::Char(c)))
                    }
                    // Invalid continuation: drop the lead byte, keep going.
                    Err(_) => Decoded::Key(KeyPress::plain(Key::Char('\u{FFFD}'))),
                };
            }
            self.buf.remove(0);
            return decode_single_byte(b0);
        }

        // ESC-prefixed.
        if self.buf.len() < 2 {
            return Decoded::NeedMore;
        }
        match self.buf[1] {
            b'[' => self.decode_csi(),
            b'O' => {
                if self.buf.len() < 3 {
                    return Decoded::NeedMore;
                }
                let term = self.buf[2];
                self.buf.drain(..3);
                match letter_key(term) {
                    Some(key) => Decoded::Key(KeyPress::plain(key)),
                    None => Decoded::Key(KeyPress::plain(Key::Escape)),
                }
            }
            // Alt + printable.
            c if c >= 0x20 && c < 0x7f => {
                self.buf.drain(..2);
                Decoded::Key(KeyPress::plain(Key::Alt(c as char)))
            }
            _ => {
                self.buf.remove(0);
                Decoded::Key(KeyPress::plain(Key::Escape))
            }
        }
    }

    /// `ESC [ params terminator`.
    fn decode_csi(&mut self) -> Decoded {
        let Some(end) = self.buf[2..]
            .iter()
            .position(|&b| (0x40..=0x7e).contains(&b))
            .map(|p| p + 2)
        else {
            return Decoded::NeedMore;
        };

        let params: Vec<u8> = self.buf[2..end].to_vec();
        let term = self.buf[end];
        let raw: Vec<u8> = self.buf[..=end].to_vec();
        self.buf.drain(..=end);

        // SGR mouse reports and focus events have no key name; they pass
        // through to the pane untouched.
        if matches!(term, b'M' | b'm') && params.first() == Some(&b'<') {
            return Decoded::Raw(raw);
        }
        if matches!(term, b'I' | b'O') && params.is_empty() {
            return Decoded::Raw(raw);
        }

        let mut numbers = params
            .split(|&b| b == b';')
            .map(|part| std::str::from_utf8(part).ok().and_then(|s| s.parse::<u8>().ok()));
        let first = numbers.next().flatten();
        let second = numbers.next().flatten();

        let press = match term {
            b'~' => match first.and_then(tilde_key) {
                Some(key) => KeyPress { key, mods: second.unwrap_or(0) },
                None => return Decoded::Key(KeyPress::plain(Key::Escape)),
            },
            b'Z' => KeyPress::plain(Key::BackTab),
            t => match letter_key(t) {
                Some(key) => KeyPress { key, mods: second.unwrap_or(0) },
                None => return Decoded::Key(KeyPress::plain(Key::Escape)),
            },
        };
        Decoded::Key(press)
    }
}

enum Decoded {
    Key(KeyPress),
    Raw(Vec<u8>),
    NeedMore,
    Empty,
}

fn decode_single_byte(b: u8) -> Decoded {
    let press = match b {
        b'\r' | b'\n' => KeyPress::plain(Key::Enter),
        b'\t' => KeyPress::plain(Key::Tab),
        0x7f => KeyPress::plain(Key::Backspace),
        0x00 => KeyPress::plain(Key::Ctrl(' ')),
        0x01..=0x1a => KeyPress::plain(Key::Ctrl((b - 1 + b'a') as char)),
        0x1c..=0x1f => KeyPress::plain(Key::Ctrl((b - 0x1c + b'\\') as char)),
        _ => KeyPress::plain(Key::Char(b as char)),
    };
    Decoded::Key(press)
}

fn utf8_len(b: u8) -> usize {
    match b {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

/// Map a Ctrl+key combination to its C0 control byte.
fn ctrl_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        ' ' | '`' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' => Some(0x1f),
        '8' => Some(0x7f),
        _ => None,
    }
}

/// Rebase an SGR mouse report from client coordinates into a pane's
/// rectangle. Returns `None` when the event lands outside the pane.
///
/// Format: `ESC [ < b ; x ; y (M|m)` with 1-based coordinates.
pub fn translate_mouse(seq: &[u8], rect: crate::layout::Rect) -> Option<Vec<u8>> {
    let body = seq.strip_prefix(b"\x1b[<")?;
    let (body, terminator) = body.split_at(body.len().checked_sub(1)?);
    let terminator = *terminator.first()?;
    if terminator != b'M' && terminator != b'm' {
        return None;
    }

    let text = std::str::from_utf8(body).ok()?;
    let mut parts = text.split(';');
    let button: u32 = parts.next()?.parse().ok()?;
    let x: u16 = parts.next()?.parse().ok()?;
    let y: u16 = parts.next()?.parse().ok()?;

    // 1-based client cell → 0-based, then into the pane.
    let (cx, cy) = (x.checked_sub(1)?, y.checked_sub(1)?);
    if cx < rect.x || cx >= rect.x + rect.w || cy < rect.y || cy >= rect.y + rect.h {
        return None;
    }
    let px = cx - rect.x + 1;
    let py = cy - rect.y + 1;
    Some(format!("\x1b[<{button};{px};{py}{}", terminator as char).into_bytes())
}

/// Encode a key press for a pane, honoring its terminal modes.
pub fn encode_key(press: KeyPress, mode: TermMode) -> Vec<u8> {
    let app_cursor = mode.contains(TermMode::APP_CURSOR);
    let key = press.key;
    let mods = press.mods;

    if let Some(term) = letter_term(key) {
        return if mods > 0 {
            format!("\x1b[1;{}{}", mods, term as char).into_bytes()
        } else if app_cursor {
            vec![0x1b, b'O', term]
        } else {
            vec![0x1b, b'[', term]
        };
    }

    if let Some(num) = tilde_num(key) {
        return if mods > 0 {
            format!("\x1b[{num};{mods}~").into_bytes()
        } else {
            format!("\x1b[{num}~").into_bytes()
        };
    }

    match key {
        Key::Enter => vec![b'\r'],
        Key::Tab => vec![b'\t'],
        Key::BackTab => b"\x1b[Z".to_vec(),
        Key::Backspace => vec![0x7f],
        Key::Escape => vec![0x1b],
        Key::Ctrl(c) => ctrl_byte(c).map_or_else(Vec::new, |b| vec![b]),
        Key::Alt(c) => {
            let mut out = vec![0x1b];
            let mut tmp = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
            out
        }
        Key::Char(c) => {
            let mut tmp = [0u8; 4];
            c.encode_utf8(&mut tmp).as_bytes().to_vec()
        }
        // Letter/tilde keys were handled above.
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<KeyPress> {
        KeyDecoder::new()
            .decode_frame(bytes)
            .into_iter()
            .map(|item| match item {
                InputItem::Key(k) => k,
                InputItem::Raw(raw) => panic!("unexpected raw item {raw:?}"),
            })
            .collect()
    }

    #[test]
    fn plain_ascii() {
        let keys = decode(b"ls");
        assert_eq!(
            keys,
            vec![KeyPress::plain(Key::Char('l')), KeyPress::plain(Key::Char('s'))]
        );
    }

    #[test]
    fn control_bytes() {
        assert_eq!(decode(b"\x03"), vec![KeyPress::plain(Key::Ctrl('c'))]);
        assert_eq!(decode(b"\x01"), vec![KeyPress::plain(Key::Ctrl('a'))]);
        assert_eq!(decode(b"\r"), vec![KeyPress::plain(Key::Enter)]);
        assert_eq!(decode(b"\t"), vec![KeyPress::plain(Key::Tab)]);
        assert_eq!(decode(b"\x7f"), vec![KeyPress::plain(Key::Backspace)]);
    }

    #[test]
    fn csi_arrows() {
        assert_eq!(decode(b"\x1b[A"), vec![KeyPress::plain(Key::Up)]);
        assert_eq!(decode(b"\x1b[D"), vec![KeyPress::plain(Key::Left)]);
    }

    #[test]
    fn ss3_arrows() {
        assert_eq!(decode(b"\x1bOB"), vec![KeyPress::plain(Key::Down)]);
    }

    #[test]
    fn modified_arrow_keeps_modifier() {
        let keys = decode(b"\x1b[1;5C");
        assert_eq!(keys, vec![KeyPress { key: Key::Right, mods: 5 }]);
    }

    #[test]
    fn tilde_keys_decode() {
        assert_eq!(decode(b"\x1b[5~"), vec![KeyPress::plain(Key::PageUp)]);
        assert_eq!(decode(b"\x1b[24~"), vec![KeyPress::plain(Key::F(12))]);
        assert_eq!(decode(b"\x1b[3;2~"), vec![KeyPress { key: Key::Delete, mods: 2 }]);
    }

    #[test]
    fn back_tab() {
        assert_eq!(decode(b"\x1b[Z"), vec![KeyPress::plain(Key::BackTab)]);
    }

    #[test]
    fn alt_char() {
        assert_eq!(decode(b"\x1bx"), vec![KeyPress::plain(Key::Alt('x'))]);
    }

    #[test]
    fn lone_escape_is_escape() {
        assert_eq!(decode(b"\x1b"), vec![KeyPress::plain(Key::Escape)]);
    }

    #[test]
    fn utf8_char() {
        assert_eq!(decode("é".as_bytes()), vec![KeyPress::plain(Key::Char('é'))]);
        assert_eq!(decode("好".as_bytes()), vec![KeyPress::plain(Key::Char('好'))]);
    }

    #[test]
    fn utf8_split_across_frames() {
        let mut decoder = KeyDecoder::new();
        let bytes = "好".as_bytes();
        assert!(decoder.decode_frame(&bytes[..1]).is_empty());
        assert_eq!(
            decoder.decode_frame(&bytes[1..]),
            vec![InputItem::Key(KeyPress::plain(Key::Char('好')))]
        );
    }

    #[test]
    fn sgr_mouse_passes_through_raw() {
        let items = KeyDecoder::new().decode_frame(b"\x1b[<0;10;5M");
        assert_eq!(items, vec![InputItem::Raw(b"\x1b[<0;10;5M".to_vec())]);
    }

    #[test]
    fn focus_events_pass_through_raw() {
        let items = KeyDecoder::new().decode_frame(b"\x1b[I");
        assert_eq!(items, vec![InputItem::Raw(b"\x1b[I".to_vec())]);
    }

    #[test]
    fn mouse_translation_rebases_into_pane() {
        use crate::layout::Rect;
        // Pane at (41, 0), 39x24. Client cell (43, 3) 0-based = (44, 4)
        // in the 1-based report.
        let rect = Rect::new(41, 0, 39, 24);
        let out = translate_mouse(b"\x1b[<0;45;4M", rect).unwrap();
        assert_eq!(out, b"\x1b[<0;4;4M".to_vec());
    }

    #[test]
    fn mouse_outside_pane_is_dropped() {
        use crate::layout::Rect;
        let rect = Rect::new(41, 0, 39, 24);
        assert!(translate_mouse(b"\x1b[<0;10;5M", rect).is_none());
    }

    #[test]
    fn mouse_release_keeps_lowercase_terminator() {
        use crate::layout::Rect;
        let rect = Rect::new(0, 0, 80, 24);
        let out = translate_mouse(b"\x1b[<0;8;2m", rect).unwrap();
        assert!(out.ends_with(b"m"));
    }

    #[test]
    fn encode_arrows_respect_app_cursor() {
        let up = KeyPress::plain(Key::Up);
        assert_eq!(encode_key(up, TermMode::default()), b"\x1b[A");
        assert_eq!(
            encode_key(up, TermMode::default() | TermMode::APP_CURSOR),
            b"\x1bOA"
        );
    }

    #[test]
    fn encode_modified_arrow_uses_csi() {
        let press = KeyPress { key: Key::Right, mods: 5 };
        let mode = TermMode::default() | TermMode::APP_CURSOR;
        assert_eq!(encode_key(press, mode), b"\x1b[1;5C");
    }

    #[test]
    fn round_trip_unbound_keys() {
        let mode = TermMode::default();
        for bytes in [
            b"\x1b[A".to_vec(),
            b"\x1b[5~".to_vec(),
            b"\x1b[1;5C".to_vec(),
            b"\x1b[3~".to_vec(),
            b"\x1b[Z".to_vec(),
            b"\r".to_vec(),
            b"\x03".to_vec(),
        ] {
            let keys = decode(&bytes);
            assert_eq!(keys.len(), 1, "{bytes:?}");
            assert_eq!(encode_key(keys[0], mode), bytes, "{bytes:?}");
        }
    }

    #[test]
    fn encode_ctrl_and_alt() {
        assert_eq!(encode_key(KeyPress::plain(Key::Ctrl('c')), TermMode::default()), vec![3]);
        assert_eq!(
            encode_key(KeyPress::plain(Key::Alt('f')), TermMode::default()),
            vec![0x1b, b'f']
        );
    }
}
