//! Scrolling, line feeds, and tab movement.

use crate::event::EventListener;
use crate::mode::TermMode;

use super::Screen;

impl<T: EventListener> Screen<T> {
    pub(super) fn handle_scroll_up(&mut self, count: usize) {
        self.grid_mut().scroll_up(count);
    }

    pub(super) fn handle_scroll_down(&mut self, count: usize) {
        self.grid_mut().scroll_down(count);
    }

    /// DECSTBM: parameters arrive 1-based; the cursor homes afterwards
    /// (honoring origin mode).
    pub(super) fn handle_set_scrolling_region(&mut self, top: usize, bottom: Option<usize>) {
        let grid = self.grid_mut();
        grid.set_scroll_region(top.max(1) - 1, bottom.map(|b| b.max(1) - 1));
        self.handle_goto(0, 0);
    }

    pub(super) fn handle_reverse_index(&mut self) {
        self.grid_mut().reverse_index();
    }

    pub(super) fn handle_linefeed(&mut self) {
        self.grapheme.after_zwj = false;
        let lf_newline = self.mode.contains(TermMode::LINE_FEED_NEW_LINE);
        let grid = self.grid_mut();
        grid.linefeed();
        if lf_newline {
            grid.carriage_return();
        }
    }

    pub(super) fn handle_carriage_return(&mut self) {
        self.grapheme.after_zwj = false;
        self.grid_mut().carriage_return();
    }

    pub(super) fn handle_backspace(&mut self) {
        self.grapheme.after_zwj = false;
        self.grid_mut().backspace();
    }

    pub(super) fn handle_newline(&mut self) {
        self.grapheme.after_zwj = false;
        let grid = self.grid_mut();
        grid.linefeed();
        grid.carriage_return();
    }

    pub(super) fn handle_put_tab(&mut self, count: u16) {
        self.grid_mut().advance_tab(count);
    }

    pub(super) fn handle_move_backward_tabs(&mut self, count: u16) {
        self.grid_mut().backward_tab(count);
    }

    pub(super) fn handle_set_horizontal_tabstop(&mut self) {
        self.grid_mut().set_tab_stop();
    }
}
