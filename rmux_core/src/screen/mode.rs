//! Mode management, device queries, and terminal identification.

use vte::ansi::{Mode, NamedMode, NamedPrivateMode, PrivateMode};

use crate::event::{EventListener, ScreenEvent};
use crate::mode::TermMode;

use super::Screen;

/// Maps a `NamedPrivateMode` to its DEC parameter number and `TermMode`
/// flag. `None` for modes needing special handling (alt screen) or not
/// supported.
fn private_mode_flag(named: NamedPrivateMode) -> Option<(u32, TermMode)> {
    match named {
        NamedPrivateMode::CursorKeys => Some((1, TermMode::APP_CURSOR)),
        NamedPrivateMode::Origin => Some((6, TermMode::ORIGIN)),
        NamedPrivateMode::LineWrap => Some((7, TermMode::LINE_WRAP)),
        NamedPrivateMode::ShowCursor => Some((25, TermMode::SHOW_CURSOR)),
        NamedPrivateMode::ReportMouseClicks => Some((1000, TermMode::MOUSE_REPORT)),
        NamedPrivateMode::ReportCellMouseMotion => Some((1002, TermMode::MOUSE_MOTION)),
        NamedPrivateMode::ReportAllMouseMotion => Some((1003, TermMode::MOUSE_ALL)),
        NamedPrivateMode::ReportFocusInOut => Some((1004, TermMode::FOCUS_IN_OUT)),
        NamedPrivateMode::Utf8Mouse => Some((1005, TermMode::UTF8_MOUSE)),
        NamedPrivateMode::SgrMouse => Some((1006, TermMode::SGR_MOUSE)),
        NamedPrivateMode::AlternateScroll => Some((1007, TermMode::ALTERNATE_SCROLL)),
        NamedPrivateMode::BracketedPaste => Some((2004, TermMode::BRACKETED_PASTE)),
        _ => None,
    }
}

/// Maps a `NamedMode` to its ANSI parameter number and `TermMode` flag.
fn named_mode_flag(named: NamedMode) -> (u32, TermMode) {
    match named {
        NamedMode::Insert => (4, TermMode::INSERT),
        NamedMode::LineFeedNewLine => (20, TermMode::LINE_FEED_NEW_LINE),
    }
}

/// Flags whose toggling the outer layers must observe (input encoding and
/// mouse routing happen at the client edge).
const OBSERVED: TermMode = TermMode::ANY_MOUSE
    .union(TermMode::SGR_MOUSE)
    .union(TermMode::UTF8_MOUSE)
    .union(TermMode::FOCUS_IN_OUT)
    .union(TermMode::BRACKETED_PASTE)
    .union(TermMode::APP_CURSOR)
    .union(TermMode::APP_KEYPAD);

impl<T: EventListener> Screen<T> {
    fn set_flag(&mut self, flag: TermMode, on: bool) {
        let before = self.mode;
        self.mode.set(flag, on);
        if before != self.mode && flag.intersects(OBSERVED) {
            self.emit(ScreenEvent::ModesChanged);
        }
    }

    pub(super) fn handle_set_mode(&mut self, mode: Mode) {
        if let Mode::Named(named) = mode {
            let (_, flag) = named_mode_flag(named);
            self.set_flag(flag, true);
        }
    }

    pub(super) fn handle_unset_mode(&mut self, mode: Mode) {
        if let Mode::Named(named) = mode {
            let (_, flag) = named_mode_flag(named);
            self.set_flag(flag, false);
        }
    }

    pub(super) fn handle_set_private_mode(&mut self, mode: PrivateMode) {
        match mode {
            PrivateMode::Named(NamedPrivateMode::SwapScreenAndSetRestoreCursor) => {
                self.swap_alt_screen(true);
            }
            PrivateMode::Named(named) => {
                if let Some((_, flag)) = private_mode_flag(named) {
                    self.set_flag(flag, true);
                } else {
                    log::debug!("unhandled DECSET {named:?}");
                }
            }
            PrivateMode::Unknown(param) => {
                log::debug!("unknown DECSET {param}");
            }
        }
    }

    pub(super) fn handle_unset_private_mode(&mut self, mode: PrivateMode) {
        match mode {
            PrivateMode::Named(NamedPrivateMode::SwapScreenAndSetRestoreCursor) => {
                self.restore_primary_screen(true);
            }
            PrivateMode::Named(named) => {
                if let Some((_, flag)) = private_mode_flag(named) {
                    self.set_flag(flag, false);
                } else {
                    log::debug!("unhandled DECRST {named:?}");
                }
            }
            PrivateMode::Unknown(param) => {
                log::debug!("unknown DECRST {param}");
            }
        }
    }

    pub(super) fn handle_set_keypad_application_mode(&mut self) {
        self.set_flag(TermMode::APP_KEYPAD, true);
    }

    pub(super) fn handle_unset_keypad_application_mode(&mut self) {
        self.set_flag(TermMode::APP_KEYPAD, false);
    }

    /// DECRPM response: `CSI Ps; Pm $ y` (1 = set, 2 = reset, 0 = unknown).
    pub(super) fn handle_report_mode(&mut self, mode: Mode) {
        let (param, state) = match mode {
            Mode::Named(named) => {
                let (p, flag) = named_mode_flag(named);
                (p, if self.mode.contains(flag) { 1u8 } else { 2 })
            }
            Mode::Unknown(n) => (u32::from(n), 0u8),
        };
        self.emit(ScreenEvent::PtyWrite(format!("\x1b[{param};{state}$y").into_bytes()));
    }

    pub(super) fn handle_report_private_mode(&mut self, mode: PrivateMode) {
        let (param, state) = match mode {
            PrivateMode::Named(NamedPrivateMode::SwapScreenAndSetRestoreCursor) => {
                (1049u32, if self.mode.contains(TermMode::ALT_SCREEN) { 1u8 } else { 2 })
            }
            PrivateMode::Named(named) => match private_mode_flag(named) {
                Some((p, flag)) => (p, if self.mode.contains(flag) { 1u8 } else { 2 }),
                None => return,
            },
            PrivateMode::Unknown(n) => (u32::from(n), 0u8),
        };
        self.emit(ScreenEvent::PtyWrite(format!("\x1b[?{param};{state}$y").into_bytes()));
    }

    pub(super) fn handle_device_status(&mut self, status: usize) {
        match status {
            // DSR 5 — device status: report OK.
            5 => self.emit(ScreenEvent::PtyWrite(b"\x1b[0n".to_vec())),
            // DSR 6 — cursor position report (1-based).
            6 => {
                let grid = self.grid();
                let response = format!("\x1b[{};{}R", grid.cursor.row + 1, grid.cursor.col + 1);
                self.emit(ScreenEvent::PtyWrite(response.into_bytes()));
            }
            _ => log::debug!("unhandled DSR {status}"),
        }
    }

    pub(super) fn handle_identify_terminal(&mut self, intermediate: Option<char>) {
        match intermediate {
            // DA2 — secondary device attributes: VT220-compatible.
            Some('>') => self.emit(ScreenEvent::PtyWrite(b"\x1b[>1;10;0c".to_vec())),
            // DA — primary device attributes: VT220 with ANSI color.
            _ => self.emit(ScreenEvent::PtyWrite(b"\x1b[?62;22c".to_vec())),
        }
    }

    pub(super) fn handle_text_area_size_chars(&mut self) {
        let grid = self.grid();
        let response = format!("\x1b[8;{};{}t", grid.lines, grid.cols);
        self.emit(ScreenEvent::PtyWrite(response.into_bytes()));
    }

    pub(super) fn handle_bell(&mut self) {
        self.emit(ScreenEvent::Bell);
    }

    pub(super) fn handle_decaln(&mut self) {
        self.grid_mut().decaln();
    }

    /// RIS: back to power-on state.
    pub(super) fn handle_reset_state(&mut self) {
        self.grapheme.after_zwj = false;
        self.active_is_alt = false;
        self.mode = TermMode::default();
        self.charset = crate::charset::CharsetState::default();
        self.title.clear();
        self.title_stack.clear();
        let grid = self.grid_mut();
        grid.clear_all();
        grid.cursor.reset_attrs();
        grid.set_scroll_region(0, None);
    }
}
