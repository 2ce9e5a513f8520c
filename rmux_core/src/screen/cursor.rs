//! Cursor movement and save/restore.

use crate::event::EventListener;
use crate::mode::TermMode;

use super::Screen;

impl<T: EventListener> Screen<T> {
    /// CUP/HVP. In origin mode the line is relative to the scroll region
    /// and clamped inside it.
    pub(super) fn handle_goto(&mut self, line: i32, col: usize) {
        self.grapheme.after_zwj = false;
        let origin = self.mode.contains(TermMode::ORIGIN);
        let grid = self.grid_mut();
        let row = if line < 0 { 0 } else { line as usize };
        let row = if origin {
            (grid.scroll_top() + row).min(grid.scroll_bottom())
        } else {
            row
        };
        grid.goto(row, col);
    }

    pub(super) fn handle_goto_line(&mut self, line: i32) {
        let col = self.grid().cursor.col;
        self.handle_goto(line, col);
    }

    pub(super) fn handle_goto_col(&mut self, col: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().goto_col(col);
    }

    pub(super) fn handle_move_up(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().move_up(n);
    }

    pub(super) fn handle_move_down(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().move_down(n);
    }

    pub(super) fn handle_move_forward(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().move_forward(n);
    }

    pub(super) fn handle_move_backward(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        self.grid_mut().move_backward(n);
    }

    pub(super) fn handle_move_down_and_cr(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        let grid = self.grid_mut();
        grid.move_down(n);
        grid.carriage_return();
    }

    pub(super) fn handle_move_up_and_cr(&mut self, n: usize) {
        self.grapheme.after_zwj = false;
        let grid = self.grid_mut();
        grid.move_up(n);
        grid.carriage_return();
    }

    pub(super) fn handle_save_cursor_position(&mut self) {
        self.grid_mut().save_cursor();
    }

    pub(super) fn handle_restore_cursor_position(&mut self) {
        self.grid_mut().restore_cursor();
    }
}
