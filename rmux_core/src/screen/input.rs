//! Printable character input pipeline.

use unicode_width::UnicodeWidthChar;

use crate::cell::CellFlags;
use crate::event::EventListener;
use crate::grid::Grid;

use super::Screen;

/// Tracks grapheme cluster continuation for ZWJ emoji sequences.
///
/// When a Zero-Width Joiner (U+200D) is attached to a cell, the next
/// printable character joins the same base cell as a zero-width character
/// rather than starting a new cell.
#[derive(Debug, Default)]
pub struct GraphemeState {
    /// True when the last zero-width character was ZWJ (U+200D).
    pub(super) after_zwj: bool,
    /// Base cell of the cluster in progress.
    pub(super) base_row: usize,
    pub(super) base_col: usize,
}

/// Find the column of the previous base cell (skipping wide char spacers).
///
/// Accounts for a pending wrap: when set, `cursor.col` already points at
/// the last written cell rather than the cell after it.
fn prev_base_col(grid: &Grid) -> Option<usize> {
    let row = grid.cursor.row;
    let col = if grid.cursor.pending_wrap {
        grid.cursor.col
    } else if grid.cursor.col > 0 {
        grid.cursor.col - 1
    } else {
        return None;
    };

    if row >= grid.lines || col >= grid.cols {
        return None;
    }

    if grid.row(row)[col].flags.contains(CellFlags::WIDE_CHAR_SPACER) && col > 0 {
        Some(col - 1)
    } else {
        Some(col)
    }
}

impl<T: EventListener> Screen<T> {
    pub(super) fn handle_input(&mut self, c: char) {
        let c = self.charset.translate(c);
        let width = UnicodeWidthChar::width(c);

        // ZWJ continuation: the next printable joins the cluster.
        if self.grapheme.after_zwj {
            if let Some(w) = width {
                if w > 0 {
                    self.grapheme.after_zwj = false;
                    let row = self.grapheme.base_row;
                    let col = self.grapheme.base_col;
                    let grid = self.grid_mut();
                    if row < grid.lines && col < grid.cols {
                        grid.row_mut(row)[col].push_zerowidth(c);
                    }
                    return;
                }
            } else {
                self.grapheme.after_zwj = false;
            }
        }

        // Emoji skin tone modifiers attach to the previous wide cell.
        if matches!(c, '\u{1F3FB}'..='\u{1F3FF}') {
            let grid = self.grid_mut();
            if let Some(prev_col) = prev_base_col(grid) {
                let row = grid.cursor.row;
                if grid.row(row)[prev_col].flags.contains(CellFlags::WIDE_CHAR) {
                    grid.row_mut(row)[prev_col].push_zerowidth(c);
                    return;
                }
            }
        }

        match width {
            Some(2) => self.grid_mut().put_wide_char(c),
            Some(0) => {
                let grid = self.grid_mut();
                if let Some(col) = prev_base_col(grid) {
                    let row = grid.cursor.row;
                    grid.row_mut(row)[col].push_zerowidth(c);

                    if c == '\u{200D}' {
                        self.grapheme.after_zwj = true;
                        self.grapheme.base_row = row;
                        self.grapheme.base_col = col;
                    }
                }
            }
            _ => self.grid_mut().put_char(c),
        }
    }
}
