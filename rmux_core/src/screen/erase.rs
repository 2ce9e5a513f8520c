//! Erase and editing operations.

use vte::ansi::{ClearMode, LineClearMode, TabulationClearMode};

use crate::event::EventListener;

use super::Screen;

impl<T: EventListener> Screen<T> {
    pub(super) fn handle_clear_screen(&mut self, mode: ClearMode) {
        self.grapheme.after_zwj = false;
        self.grid_mut().erase_display(mode);
    }

    pub(super) fn handle_clear_line(&mut self, mode: LineClearMode) {
        self.grapheme.after_zwj = false;
        self.grid_mut().erase_line(mode);
    }

    pub(super) fn handle_clear_tabs(&mut self, mode: TabulationClearMode) {
        self.grid_mut().clear_tab_stops(mode);
    }

    pub(super) fn handle_erase_chars(&mut self, count: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().erase_chars(count);
    }

    pub(super) fn handle_delete_chars(&mut self, count: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().delete_chars(count);
    }

    pub(super) fn handle_insert_blank(&mut self, count: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().insert_blank_chars(count);
    }

    pub(super) fn handle_insert_blank_lines(&mut self, count: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().insert_lines(count);
    }

    pub(super) fn handle_delete_lines(&mut self, count: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().delete_lines(count);
    }
}
