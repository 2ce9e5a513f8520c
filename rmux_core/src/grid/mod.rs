//! Terminal grid: 2D cell storage with cursor, scrollback, damage
//! tracking, and reflow support.
//!
//! The grid is deliberately cursor-dumb about semantics: operations take
//! effect at the stored cursor position and explicit ranges, and the
//! `Screen` layer decides when to call them. Rows that scroll off the top
//! of a full-height region are appended to the scrollback deque, bounded
//! by the history limit.

pub mod cursor;
pub mod dirty;
mod editing;
mod navigation;
mod reflow;
pub mod row;
mod scroll;

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use crate::cell::{Cell, CellFlags};

pub use cursor::Cursor;
pub use dirty::DirtyTracker;
pub use row::Row;

const DEFAULT_TAB_INTERVAL: usize = 8;

#[derive(Debug, Clone)]
pub struct Grid {
    rows: Vec<Row>,
    pub cols: usize,
    pub lines: usize,
    pub cursor: Cursor,
    saved_cursor: Option<Cursor>,
    scroll_top: usize,
    scroll_bottom: usize,
    tab_stops: Vec<bool>,
    pub scrollback: VecDeque<Row>,
    history_limit: usize,
    /// How many lines the viewport is scrolled back into history (0 = live).
    pub display_offset: usize,
    dirty: DirtyTracker,
}

impl Grid {
    /// A grid with the default history limit.
    pub fn new(cols: usize, lines: usize) -> Self {
        Self::with_history(cols, lines, 2000)
    }

    /// A grid bounded to `history_limit` scrollback rows (0 = none, used
    /// by the alternate screen).
    pub fn with_history(cols: usize, lines: usize, history_limit: usize) -> Self {
        debug_assert!(cols >= 1 && lines >= 1, "grid dimensions must be >= 1 ({cols}x{lines})");
        let rows = (0..lines).map(|_| Row::new(cols)).collect();
        let tab_stops = Self::build_tab_stops(cols);

        Self {
            rows,
            cols,
            lines,
            cursor: Cursor::default(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: lines.saturating_sub(1),
            tab_stops,
            scrollback: VecDeque::new(),
            history_limit,
            display_offset: 0,
            dirty: DirtyTracker::new(lines),
        }
    }

    fn build_tab_stops(cols: usize) -> Vec<bool> {
        let mut stops = vec![false; cols];
        for i in (DEFAULT_TAB_INTERVAL..cols).step_by(DEFAULT_TAB_INTERVAL) {
            stops[i] = true;
        }
        stops
    }

    pub fn row(&self, line: usize) -> &Row {
        &self.rows[line]
    }

    pub fn row_mut(&mut self, line: usize) -> &mut Row {
        self.dirty.mark(line);
        &mut self.rows[line]
    }

    /// The row shown at viewport line `line`, honoring `display_offset`.
    pub fn visible_row(&self, line: usize) -> &Row {
        if self.display_offset == 0 {
            return &self.rows[line];
        }
        let offset_line = line as isize - self.display_offset as isize;
        if offset_line < 0 {
            let sb_idx = self.scrollback.len() as isize + offset_line;
            if sb_idx >= 0 {
                return &self.scrollback[sb_idx as usize];
            }
            return self.scrollback.front().unwrap_or(&self.rows[0]);
        }
        &self.rows[offset_line as usize]
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Change the history bound, evicting oldest rows when shrinking.
    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit;
        while self.scrollback.len() > limit {
            self.scrollback.pop_front();
        }
        self.display_offset = self.display_offset.min(self.scrollback.len());
    }

    /// Adjust display offset (positive = older content). Clamped to the
    /// available history.
    pub fn scroll_display(&mut self, delta: isize) {
        let target = (self.display_offset as isize + delta).clamp(0, self.scrollback.len() as isize);
        if target as usize != self.display_offset {
            self.display_offset = target as usize;
            self.dirty.mark_all();
        }
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }

    /// Reset every visible cell to the default and home the cursor.
    pub fn clear_all(&mut self) {
        let template = Cell::default();
        for r in 0..self.lines {
            self.rows[r].reset(&template);
        }
        self.cursor.col = 0;
        self.cursor.row = 0;
        self.cursor.pending_wrap = false;
        self.dirty.mark_all();
    }

    /// DECALN: fill the screen with 'E' using default attributes.
    pub fn decaln(&mut self) {
        for r in 0..self.lines {
            for c in 0..self.cols {
                let cell = &mut self.rows[r][c];
                cell.c = 'E';
                cell.fg = Cell::default().fg;
                cell.bg = Cell::default().bg;
                cell.flags = CellFlags::empty();
                cell.extra = None;
            }
            self.rows[r].occ = self.cols;
        }
        self.dirty.mark_all();
    }
}
