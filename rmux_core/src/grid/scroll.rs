//! Scroll operations: region scrolls, newline, reverse index.

use crate::cell::Cell;

use super::row::Row;
use super::Grid;

impl Grid {
    /// Move the cursor down one line, scrolling at the region bottom.
    pub fn newline(&mut self) {
        self.cursor.pending_wrap = false;
        if self.cursor.row >= self.scroll_bottom {
            self.scroll_up(1);
        } else {
            self.cursor.row += 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
        self.cursor.pending_wrap = false;
    }

    pub fn backspace(&mut self) {
        if self.cursor.col > 0 {
            self.cursor.col -= 1;
        }
        self.cursor.pending_wrap = false;
    }

    /// RI: move up one line, scrolling down at the region top.
    pub fn reverse_index(&mut self) {
        if self.cursor.row == self.scroll_top {
            self.scroll_down(1);
        } else if self.cursor.row > 0 {
            self.cursor.row -= 1;
        }
    }

    pub fn linefeed(&mut self) {
        self.newline();
    }

    pub fn scroll_up(&mut self, count: usize) {
        self.scroll_up_in_region(self.scroll_top, self.scroll_bottom, count);
    }

    pub fn scroll_down(&mut self, count: usize) {
        self.scroll_down_in_region(self.scroll_top, self.scroll_bottom, count);
    }

    /// Scroll rows `[top, bottom]` up by `count`. Rows leaving a region
    /// whose top is the first line are appended to scrollback (bounded by
    /// the history limit); otherwise they are dropped. Revealed rows get
    /// the BCE background.
    pub(super) fn scroll_up_in_region(&mut self, top: usize, bottom: usize, count: usize) {
        if top > bottom || bottom >= self.lines {
            return;
        }
        let count = count.min(bottom - top + 1);
        let template = Cell::from(self.cursor.template.bg);

        for _ in 0..count {
            let scrolled_row = self.rows.remove(top);

            if top == 0 && self.history_limit() > 0 {
                if self.scrollback.len() >= self.history_limit() {
                    self.scrollback.pop_front();
                    // Eviction while scrolled back: shrink the offset so the
                    // viewport does not drift past the oldest row.
                    if self.display_offset > 0 {
                        self.display_offset -= 1;
                    }
                } else if self.display_offset > 0 {
                    // History grew under the viewport — keep it anchored.
                    self.display_offset += 1;
                }
                self.scrollback.push_back(scrolled_row);
            }

            let mut fresh = Row::new(self.cols);
            fresh.reset(&template);
            self.rows.insert(bottom, fresh);
        }

        self.dirty_mut().mark_range(top, bottom);
    }

    /// Scroll rows `[top, bottom]` down by `count`; bottom rows are lost,
    /// revealed rows get the BCE background.
    pub(super) fn scroll_down_in_region(&mut self, top: usize, bottom: usize, count: usize) {
        if top > bottom || bottom >= self.lines {
            return;
        }
        let count = count.min(bottom - top + 1);
        let template = Cell::from(self.cursor.template.bg);

        for _ in 0..count {
            self.rows.remove(bottom);
            let mut fresh = Row::new(self.cols);
            fresh.reset(&template);
            self.rows.insert(top, fresh);
        }

        self.dirty_mut().mark_range(top, bottom);
    }
}
