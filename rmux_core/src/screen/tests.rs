use vte::ansi::Processor;

use crate::cell::CellFlags;
use crate::event::{EventQueue, ScreenEvent};
use crate::mode::TermMode;

use super::Screen;

fn screen(cols: usize, lines: usize) -> (Screen<EventQueue>, Processor) {
    (Screen::new(cols, lines, 100, EventQueue::new()), Processor::new())
}

fn feed(screen: &mut Screen<EventQueue>, processor: &mut Processor, bytes: &[u8]) {
    processor.advance(screen, bytes);
}

fn row_text(screen: &Screen<EventQueue>, line: usize) -> String {
    let mut s: String = screen.grid().row(line).iter().map(|c| c.c).collect();
    while s.ends_with(' ') {
        s.pop();
    }
    s
}

#[test]
fn plain_text_prints() {
    let (mut s, mut p) = screen(20, 4);
    feed(&mut s, &mut p, b"hello");
    assert_eq!(row_text(&s, 0), "hello");
    assert_eq!(s.grid().cursor.col, 5);
}

#[test]
fn crlf_moves_to_next_line() {
    let (mut s, mut p) = screen(20, 4);
    feed(&mut s, &mut p, b"one\r\ntwo");
    assert_eq!(row_text(&s, 0), "one");
    assert_eq!(row_text(&s, 1), "two");
}

#[test]
fn sgr_applies_to_printed_cells() {
    let (mut s, mut p) = screen(20, 4);
    feed(&mut s, &mut p, b"\x1b[1;31mx\x1b[0my");
    let bold = &s.grid().row(0)[0];
    assert!(bold.flags.contains(CellFlags::BOLD));
    assert_eq!(bold.fg, vte::ansi::Color::Named(vte::ansi::NamedColor::Red));
    let plain = &s.grid().row(0)[1];
    assert!(plain.flags.is_empty());
}

#[test]
fn cup_moves_cursor() {
    let (mut s, mut p) = screen(20, 10);
    feed(&mut s, &mut p, b"\x1b[5;8Hx");
    assert_eq!(s.grid().row(4)[7].c, 'x');
}

#[test]
fn ed_clears_below() {
    let (mut s, mut p) = screen(10, 3);
    feed(&mut s, &mut p, b"aaa\r\nbbb\r\nccc\x1b[2;1H\x1b[J");
    assert_eq!(row_text(&s, 0), "aaa");
    assert_eq!(row_text(&s, 1), "");
    assert_eq!(row_text(&s, 2), "");
}

#[test]
fn el_clears_to_right() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"abcdef\x1b[1;3H\x1b[K");
    assert_eq!(row_text(&s, 0), "ab");
}

#[test]
fn alt_screen_swap_and_restore() {
    let (mut s, mut p) = screen(20, 4);
    feed(&mut s, &mut p, b"primary");
    feed(&mut s, &mut p, b"\x1b[?1049h");
    assert!(s.is_alt_screen());
    assert!(s.mode().contains(TermMode::ALT_SCREEN));
    feed(&mut s, &mut p, b"alt");
    assert_eq!(row_text(&s, 0), "alt");

    feed(&mut s, &mut p, b"\x1b[?1049l");
    assert!(!s.is_alt_screen());
    assert_eq!(row_text(&s, 0), "primary");
    // Cursor restored to where the primary screen left it.
    assert_eq!(s.grid().cursor.col, 7);
}

#[test]
fn alt_screen_has_no_scrollback() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x1b[?1049h");
    for _ in 0..10 {
        feed(&mut s, &mut p, b"x\r\n");
    }
    assert!(s.grid().scrollback.is_empty());
}

#[test]
fn decstbm_scrolls_within_region() {
    let (mut s, mut p) = screen(10, 5);
    feed(&mut s, &mut p, b"A\r\nB\r\nC\r\nD\r\nE");
    // Region rows 2-4 (1-based), cursor to region bottom, then LF.
    feed(&mut s, &mut p, b"\x1b[2;4r\x1b[4;1H\n");
    assert_eq!(row_text(&s, 0), "A");
    assert_eq!(row_text(&s, 1), "C");
    assert_eq!(row_text(&s, 2), "D");
    assert_eq!(row_text(&s, 3), "");
    assert_eq!(row_text(&s, 4), "E");
}

#[test]
fn origin_mode_homes_to_region_top() {
    let (mut s, mut p) = screen(10, 6);
    feed(&mut s, &mut p, b"\x1b[3;5r\x1b[?6h\x1b[HX");
    assert_eq!(s.grid().row(2)[0].c, 'X');
}

#[test]
fn bell_emits_event() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x07");
    assert_eq!(s.listener().drain(), vec![ScreenEvent::Bell]);
}

#[test]
fn osc_title_emits_event_and_updates_state() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x1b]2;my title\x07");
    assert_eq!(s.title(), "my title");
    assert!(s.listener().drain().contains(&ScreenEvent::Title("my title".into())));
}

#[test]
fn osc52_store_decodes_base64() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x1b]52;c;aGVsbG8=\x07");
    let events = s.listener().drain();
    assert!(events.iter().any(|e| matches!(
        e,
        ScreenEvent::ClipboardStore(b'c', text) if text == "hello"
    )));
}

#[test]
fn dsr6_reports_cursor_position() {
    let (mut s, mut p) = screen(20, 5);
    feed(&mut s, &mut p, b"\x1b[3;4H\x1b[6n");
    let events = s.listener().drain();
    assert!(events.contains(&ScreenEvent::PtyWrite(b"\x1b[3;4R".to_vec())));
}

#[test]
fn bracketed_paste_toggle_notifies() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x1b[?2004h");
    assert!(s.mode().contains(TermMode::BRACKETED_PASTE));
    assert!(s.listener().drain().contains(&ScreenEvent::ModesChanged));

    feed(&mut s, &mut p, b"\x1b[?2004l");
    assert!(!s.mode().contains(TermMode::BRACKETED_PASTE));
}

#[test]
fn charset_line_drawing() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, b"\x1b(0qqq\x1b(Bq");
    assert_eq!(row_text(&s, 0), "───q");
}

#[test]
fn wide_char_wraps_whole_at_line_end() {
    let (mut s, mut p) = screen(80, 4);
    let mut bytes = vec![b'a'; 79];
    bytes.extend_from_slice("好".as_bytes());
    feed(&mut s, &mut p, &bytes);

    assert!(s.grid().row(0)[79].flags.contains(CellFlags::LEADING_WIDE_CHAR_SPACER));
    assert!(!s.grid().row(0)[79].flags.contains(CellFlags::WIDE_CHAR));
    assert_eq!(s.grid().row(1)[0].c, '好');
}

#[test]
fn combining_mark_attaches_to_base() {
    let (mut s, mut p) = screen(10, 2);
    feed(&mut s, &mut p, "e\u{0301}x".as_bytes());
    assert_eq!(s.grid().row(0)[0].c, 'e');
    assert_eq!(s.grid().row(0)[0].zerowidth(), &['\u{0301}']);
    assert_eq!(s.grid().row(0)[1].c, 'x');
}

#[test]
fn malformed_sequences_do_not_lose_output() {
    let (mut s, mut p) = screen(20, 2);
    // An unterminated CSI full of garbage, then normal text.
    feed(&mut s, &mut p, b"\x1b[999;999;999;zok");
    assert!(row_text(&s, 0).contains("ok"));
}

#[test]
fn ris_resets_everything() {
    let (mut s, mut p) = screen(10, 3);
    feed(&mut s, &mut p, b"\x1b[?2004hstuff\x1b]2;t\x07\x1bc");
    assert_eq!(row_text(&s, 0), "");
    assert_eq!(s.title(), "");
    assert!(!s.mode().contains(TermMode::BRACKETED_PASTE));
    assert_eq!(s.grid().cursor.row, 0);
}

#[test]
fn resize_reflows_primary_only() {
    let (mut s, mut p) = screen(10, 3);
    feed(&mut s, &mut p, b"abcdefgh");
    s.resize(5, 3);
    assert_eq!(row_text(&s, 0), "abcde");
    assert_eq!(row_text(&s, 1), "fgh");
    assert_eq!(s.cols(), 5);
}

#[test]
fn damage_consumed_after_print() {
    let (mut s, mut p) = screen(10, 3);
    s.consume_damage();
    feed(&mut s, &mut p, b"\x1b[2;1Hx");
    assert!(s.any_damage());
    assert_eq!(s.consume_damage(), vec![1]);
    assert!(!s.any_damage());
}
