//! Character set translation state (G0–G3, single shifts).
//!
//! Wraps `vte::ansi::StandardCharset` with a state machine tracking the
//! active slot and SS2/SS3 single-shift state. DEC special graphics
//! mapping comes from `StandardCharset::map`.

pub use vte::ansi::{CharsetIndex, StandardCharset};

/// Character set translation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharsetState {
    /// G0–G3 charset slots (default: all ASCII).
    charsets: [StandardCharset; 4],
    /// Currently active charset slot (default: G0).
    active: CharsetIndex,
    /// SS2/SS3 single-shift override — used for one character, then cleared.
    single_shift: Option<CharsetIndex>,
}

impl Default for CharsetState {
    fn default() -> Self {
        Self {
            charsets: [StandardCharset::Ascii; 4],
            active: CharsetIndex::G0,
            single_shift: None,
        }
    }
}

impl CharsetState {
    /// Translate a character through the active charset.
    ///
    /// A pending single shift applies to this one character only.
    pub fn translate(&mut self, ch: char) -> char {
        let idx = self.single_shift.take().unwrap_or(self.active);
        self.charsets[idx as usize].map(ch)
    }

    /// Assign a charset to a slot (ESC (, ESC ), ESC *, ESC +).
    pub fn set_charset(&mut self, index: CharsetIndex, charset: StandardCharset) {
        self.charsets[index as usize] = charset;
    }

    /// Switch the active charset slot (SO/SI control codes).
    pub fn set_active(&mut self, index: CharsetIndex) {
        self.active = index;
    }

    /// Set a single-shift override (SS2/SS3).
    pub fn set_single_shift(&mut self, index: CharsetIndex) {
        self.single_shift = Some(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passthrough() {
        let mut state = CharsetState::default();
        assert_eq!(state.translate('q'), 'q');
    }

    #[test]
    fn special_graphics_maps_box_drawing() {
        let mut state = CharsetState::default();
        state.set_charset(CharsetIndex::G0, StandardCharset::SpecialCharacterAndLineDrawing);
        // 'q' maps to a horizontal line in DEC special graphics.
        assert_eq!(state.translate('q'), '─');
    }

    #[test]
    fn single_shift_applies_once() {
        let mut state = CharsetState::default();
        state.set_charset(CharsetIndex::G2, StandardCharset::SpecialCharacterAndLineDrawing);
        state.set_single_shift(CharsetIndex::G2);
        assert_eq!(state.translate('q'), '─');
        assert_eq!(state.translate('q'), 'q');
    }

    #[test]
    fn shift_out_and_in() {
        let mut state = CharsetState::default();
        state.set_charset(CharsetIndex::G1, StandardCharset::SpecialCharacterAndLineDrawing);
        state.set_active(CharsetIndex::G1);
        assert_eq!(state.translate('q'), '─');
        state.set_active(CharsetIndex::G0);
        assert_eq!(state.translate('q'), 'q');
    }
}
