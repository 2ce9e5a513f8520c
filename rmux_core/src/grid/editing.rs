//! Character writing, erasing, and insertion/deletion operations.

use vte::ansi::{ClearMode, LineClearMode};

use crate::cell::CellFlags;

use super::Grid;

impl Grid {
    /// Write a single-width character at the cursor.
    ///
    /// A pending wrap from the previous print is resolved first: CR+LF
    /// (scrolling if needed) with the WRAPLINE marker left on the old row.
    pub fn put_char(&mut self, c: char) {
        if self.cursor.pending_wrap {
            self.wrap_cursor();
        }

        if self.cursor.col >= self.cols {
            self.cursor.col = self.cols.saturating_sub(1);
        }

        let col = self.cursor.col;
        let row = self.cursor.row;

        self.unsplit_wide_pair(row, col);

        let template = &self.cursor.template;
        let cell = &mut self.rows[row][col];
        cell.c = c;
        cell.fg = template.fg;
        cell.bg = template.bg;
        cell.flags = template.flags & !CellFlags::LAYOUT;
        cell.extra = template.extra.clone();

        if col >= self.rows[row].occ {
            self.rows[row].occ = col + 1;
        }
        self.dirty_mut().mark(row);

        self.cursor.col += 1;
        if self.cursor.col >= self.cols {
            self.cursor.pending_wrap = true;
            self.cursor.col = self.cols - 1;
        }
    }

    /// Write a double-width character (cell + spacer).
    ///
    /// At the last column the wide char cannot be split: the current cell
    /// becomes a leading spacer and the character wraps whole.
    pub fn put_wide_char(&mut self, c: char) {
        if self.cursor.pending_wrap {
            self.wrap_cursor();
        }

        if self.cols < 2 {
            // Degenerate grid: treat as narrow.
            return self.put_char(c);
        }

        if self.cursor.col + 1 >= self.cols {
            let col = self.cursor.col;
            let row = self.cursor.row;
            let cell = &mut self.rows[row][col];
            cell.c = ' ';
            cell.flags = CellFlags::LEADING_WIDE_CHAR_SPACER;
            cell.extra = None;
            self.rows[row].occ = self.rows[row].occ.max(col + 1);
            self.dirty_mut().mark(row);
            self.wrap_cursor();
        }

        let col = self.cursor.col;
        let row = self.cursor.row;

        self.unsplit_wide_pair(row, col);
        self.unsplit_wide_pair(row, col + 1);

        let template = self.cursor.template.clone();
        let cell = &mut self.rows[row][col];
        cell.c = c;
        cell.fg = template.fg;
        cell.bg = template.bg;
        cell.flags = (template.flags & !CellFlags::LAYOUT) | CellFlags::WIDE_CHAR;
        cell.extra = template.extra.clone();

        let spacer = &mut self.rows[row][col + 1];
        spacer.c = ' ';
        spacer.fg = template.fg;
        spacer.bg = template.bg;
        spacer.flags = CellFlags::WIDE_CHAR_SPACER;
        spacer.extra = None;

        self.rows[row].occ = self.rows[row].occ.max(col + 2);
        self.dirty_mut().mark(row);

        self.cursor.col += 2;
        if self.cursor.col >= self.cols {
            self.cursor.pending_wrap = true;
            self.cursor.col = self.cols - 1;
        }
    }

    /// Overwriting half of a wide pair must clear the other half, so no
    /// orphaned spacer or truncated wide char survives.
    fn unsplit_wide_pair(&mut self, row: usize, col: usize) {
        if col >= self.cols {
            return;
        }
        if self.rows[row][col].flags.contains(CellFlags::WIDE_CHAR_SPACER) && col > 0 {
            let prev = &mut self.rows[row][col - 1];
            prev.c = ' ';
            prev.flags.remove(CellFlags::WIDE_CHAR);
        }
        if self.rows[row][col].flags.contains(CellFlags::WIDE_CHAR) && col + 1 < self.cols {
            let next = &mut self.rows[row][col + 1];
            next.c = ' ';
            next.flags.remove(CellFlags::WIDE_CHAR_SPACER);
        }
    }

    /// Resolve a pending wrap: mark the row soft-wrapped and move on.
    pub(super) fn wrap_cursor(&mut self) {
        let row = self.cursor.row;
        if self.cols > 0 {
            self.rows[row][self.cols - 1].flags.insert(CellFlags::WRAPLINE);
        }

        self.cursor.col = 0;
        self.cursor.pending_wrap = false;

        if self.cursor.row >= self.scroll_bottom {
            self.scroll_up(1);
        } else {
            self.cursor.row += 1;
        }
    }

    pub fn erase_display(&mut self, mode: ClearMode) {
        let template = self.cursor.template.clone();
        let row = self.cursor.row;
        let col = self.cursor.col;
        match mode {
            ClearMode::Below => {
                for c in col..self.cols {
                    self.rows[row][c].reset(&template);
                }
                for r in (row + 1)..self.lines {
                    self.rows[r].reset(&template);
                }
                let last_line = self.lines.saturating_sub(1);
                self.dirty_mut().mark_range(row, last_line);
            }
            ClearMode::Above => {
                for r in 0..row {
                    self.rows[r].reset(&template);
                }
                for c in 0..=col.min(self.cols.saturating_sub(1)) {
                    self.rows[row][c].reset(&template);
                }
                self.dirty_mut().mark_range(0, row);
            }
            ClearMode::All => {
                for r in 0..self.lines {
                    self.rows[r].reset(&template);
                }
                self.dirty_mut().mark_all();
            }
            ClearMode::Saved => {
                self.scrollback.clear();
                self.display_offset = 0;
                self.dirty_mut().mark_all();
            }
        }
    }

    pub fn erase_line(&mut self, mode: LineClearMode) {
        let template = self.cursor.template.clone();
        let row = self.cursor.row;
        let col = self.cursor.col;
        match mode {
            LineClearMode::Right => {
                for c in col..self.cols {
                    self.rows[row][c].reset(&template);
                }
            }
            LineClearMode::Left => {
                for c in 0..=col.min(self.cols.saturating_sub(1)) {
                    self.rows[row][c].reset(&template);
                }
            }
            LineClearMode::All => {
                self.rows[row].reset(&template);
            }
        }
        self.dirty_mut().mark(row);
    }

    /// ECH: blank `count` cells at the cursor without shifting.
    pub fn erase_chars(&mut self, count: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let template = self.cursor.template.clone();
        let end = (col + count).min(self.cols);
        for c in col..end {
            self.rows[row][c].reset(&template);
        }
        self.dirty_mut().mark(row);
    }

    /// ICH: insert blanks at the cursor, shifting the tail right.
    pub fn insert_blank_chars(&mut self, count: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let count = count.min(self.cols.saturating_sub(col));
        if count == 0 {
            return;
        }

        for c in (col + count..self.cols).rev() {
            self.rows[row][c] = self.rows[row][c - count].clone();
        }
        let template = self.cursor.template.clone();
        for c in col..col + count {
            self.rows[row][c].reset(&template);
        }
        self.rows[row].occ = (self.rows[row].occ + count).min(self.cols);
        self.dirty_mut().mark(row);
    }

    /// DCH: delete cells at the cursor, shifting the tail left.
    pub fn delete_chars(&mut self, count: usize) {
        let row = self.cursor.row;
        let col = self.cursor.col;
        let count = count.min(self.cols.saturating_sub(col));
        if count == 0 {
            return;
        }

        for c in col..(self.cols - count) {
            self.rows[row][c] = self.rows[row][c + count].clone();
        }
        let template = self.cursor.template.clone();
        for c in (self.cols - count)..self.cols {
            self.rows[row][c].reset(&template);
        }
        self.dirty_mut().mark(row);
    }

    /// IL: insert blank lines at the cursor within the scroll region.
    pub fn insert_lines(&mut self, count: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top() || row > self.scroll_bottom() {
            return;
        }
        self.scroll_down_in_region(row, self.scroll_bottom(), count);
    }

    /// DL: delete lines at the cursor within the scroll region.
    pub fn delete_lines(&mut self, count: usize) {
        let row = self.cursor.row;
        if row < self.scroll_top() || row > self.scroll_bottom() {
            return;
        }
        self.scroll_up_in_region(row, self.scroll_bottom(), count);
    }
}
