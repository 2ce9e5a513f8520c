//! Terminal mode flags (DECSET/DECRST, SM/RM).
//!
//! Each flag corresponds to a mode toggled by DECSET (`CSI ? n h`), DECRST
//! (`CSI ? n l`), SM (`CSI n h`), or RM (`CSI n l`). The default mode has
//! `SHOW_CURSOR` and `LINE_WRAP` enabled.

use bitflags::bitflags;

bitflags! {
    /// Bitflags for terminal mode state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TermMode: u32 {
        /// DECTCEM — cursor visible.
        const SHOW_CURSOR        = 1 << 0;
        /// DECCKM — application cursor keys.
        const APP_CURSOR         = 1 << 1;
        /// DECKPAM/DECKPNM — application keypad mode.
        const APP_KEYPAD         = 1 << 2;
        /// DECAWM — auto-wrap at end of line.
        const LINE_WRAP          = 1 << 3;
        /// DECOM — origin mode (cursor relative to scroll region).
        const ORIGIN             = 1 << 4;
        /// IRM — insert mode.
        const INSERT             = 1 << 5;
        /// Mode 1049 — alternate screen buffer.
        const ALT_SCREEN         = 1 << 6;
        /// Mode 1000 — report mouse clicks.
        const MOUSE_REPORT       = 1 << 7;
        /// Mode 1002 — report mouse button + drag.
        const MOUSE_MOTION       = 1 << 8;
        /// Mode 1003 — report all mouse motion.
        const MOUSE_ALL          = 1 << 9;
        /// Mode 1006 — SGR mouse encoding.
        const SGR_MOUSE          = 1 << 10;
        /// Mode 1005 — UTF-8 mouse encoding.
        const UTF8_MOUSE         = 1 << 11;
        /// Mode 1004 — report focus in/out events.
        const FOCUS_IN_OUT       = 1 << 12;
        /// Mode 2004 — bracketed paste.
        const BRACKETED_PASTE    = 1 << 13;
        /// Mode 1007 — alternate scroll (wheel sends arrows on alt screen).
        const ALTERNATE_SCROLL   = 1 << 14;
        /// LNM — linefeed implies carriage return.
        const LINE_FEED_NEW_LINE = 1 << 15;

        /// Computed: any mouse reporting mode is active.
        const ANY_MOUSE = Self::MOUSE_REPORT.bits()
                        | Self::MOUSE_MOTION.bits()
                        | Self::MOUSE_ALL.bits();
    }
}

impl Default for TermMode {
    fn default() -> Self {
        Self::SHOW_CURSOR | Self::LINE_WRAP
    }
}

#[cfg(test)]
mod tests {
    use super::TermMode;

    #[test]
    fn default_mode() {
        let mode = TermMode::default();
        assert!(mode.contains(TermMode::SHOW_CURSOR));
        assert!(mode.contains(TermMode::LINE_WRAP));
        assert!(!mode.contains(TermMode::ALT_SCREEN));
    }

    #[test]
    fn any_mouse_covers_all_reporting_modes() {
        for flag in [TermMode::MOUSE_REPORT, TermMode::MOUSE_MOTION, TermMode::MOUSE_ALL] {
            assert!(flag.intersects(TermMode::ANY_MOUSE));
        }
        assert!(!TermMode::SGR_MOUSE.intersects(TermMode::ANY_MOUSE));
    }
}
