//! Cursor movement, tab stops, save/restore cursor, and the scroll region.

use vte::ansi::TabulationClearMode;

use super::Grid;

impl Grid {
    pub fn goto(&mut self, row: usize, col: usize) {
        self.cursor.row = row.min(self.lines.saturating_sub(1));
        self.cursor.col = col.min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    pub fn goto_line(&mut self, row: usize) {
        self.cursor.row = row.min(self.lines.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    pub fn goto_col(&mut self, col: usize) {
        self.cursor.col = col.min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    pub fn move_up(&mut self, n: usize) {
        self.cursor.row = self.cursor.row.saturating_sub(n);
        self.cursor.pending_wrap = false;
    }

    pub fn move_down(&mut self, n: usize) {
        self.cursor.row = (self.cursor.row + n).min(self.lines.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    pub fn move_forward(&mut self, n: usize) {
        self.cursor.col = (self.cursor.col + n).min(self.cols.saturating_sub(1));
        self.cursor.pending_wrap = false;
    }

    pub fn move_backward(&mut self, n: usize) {
        self.cursor.col = self.cursor.col.saturating_sub(n);
        self.cursor.pending_wrap = false;
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(self.cursor.clone());
    }

    pub fn restore_cursor(&mut self) {
        if let Some(saved) = self.saved_cursor.clone() {
            self.cursor = saved;
            self.cursor.row = self.cursor.row.min(self.lines.saturating_sub(1));
            self.cursor.col = self.cursor.col.min(self.cols.saturating_sub(1));
        }
    }

    /// DECSTBM. `top`/`bottom` are 0-based and inclusive; invalid regions
    /// are ignored.
    pub fn set_scroll_region(&mut self, top: usize, bottom: Option<usize>) {
        let bottom = bottom.unwrap_or_else(|| self.lines.saturating_sub(1));
        if top < bottom && bottom < self.lines {
            self.scroll_top = top;
            self.scroll_bottom = bottom;
        }
    }

    pub fn scroll_top(&self) -> usize {
        self.scroll_top
    }

    pub fn scroll_bottom(&self) -> usize {
        self.scroll_bottom
    }

    pub(super) fn reset_scroll_region(&mut self) {
        self.scroll_top = 0;
        self.scroll_bottom = self.lines.saturating_sub(1);
    }

    pub fn set_tab_stop(&mut self) {
        if self.cursor.col < self.cols {
            self.tab_stops[self.cursor.col] = true;
        }
    }

    pub fn clear_tab_stops(&mut self, mode: TabulationClearMode) {
        match mode {
            TabulationClearMode::Current => {
                if self.cursor.col < self.cols {
                    self.tab_stops[self.cursor.col] = false;
                }
            }
            TabulationClearMode::All => {
                self.tab_stops.fill(false);
            }
        }
    }

    pub fn advance_tab(&mut self, count: u16) {
        for _ in 0..count {
            let mut col = self.cursor.col + 1;
            while col < self.cols && !self.tab_stops[col] {
                col += 1;
            }
            self.cursor.col = col.min(self.cols.saturating_sub(1));
        }
        self.cursor.pending_wrap = false;
    }

    pub fn backward_tab(&mut self, count: u16) {
        for _ in 0..count {
            if self.cursor.col == 0 {
                break;
            }
            let mut col = self.cursor.col - 1;
            while col > 0 && !self.tab_stops[col] {
                col -= 1;
            }
            self.cursor.col = col;
        }
        self.cursor.pending_wrap = false;
    }

    pub(super) fn rebuild_tab_stops(&mut self, cols: usize) {
        self.tab_stops = Self::build_tab_stops(cols);
    }
}
