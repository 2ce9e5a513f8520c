use vte::ansi::{ClearMode, Color, LineClearMode};

use crate::cell::CellFlags;

use super::Grid;

fn write_str(grid: &mut Grid, s: &str) {
    for c in s.chars() {
        if unicode_width::UnicodeWidthChar::width(c) == Some(2) {
            grid.put_wide_char(c);
        } else {
            grid.put_char(c);
        }
    }
}

fn row_text(grid: &Grid, line: usize) -> String {
    let row = grid.row(line);
    let mut s: String = row.iter().map(|c| c.c).collect();
    while s.ends_with(' ') {
        s.pop();
    }
    s
}

fn visible_text(grid: &Grid) -> Vec<String> {
    (0..grid.lines).map(|l| row_text(grid, l)).collect()
}

// --- writing ---

#[test]
fn put_char_stores_cell_and_advances() {
    let mut grid = Grid::new(10, 3);
    grid.put_char('h');
    grid.put_char('i');
    assert_eq!(grid.row(0)[0].c, 'h');
    assert_eq!(grid.row(0)[1].c, 'i');
    assert_eq!(grid.cursor.col, 2);
}

#[test]
fn put_char_applies_template() {
    let mut grid = Grid::new(10, 3);
    grid.cursor.template.fg = Color::Indexed(1);
    grid.cursor.template.flags = CellFlags::BOLD;
    grid.put_char('x');
    assert_eq!(grid.row(0)[0].fg, Color::Indexed(1));
    assert!(grid.row(0)[0].flags.contains(CellFlags::BOLD));
}

#[test]
fn last_column_sets_pending_wrap() {
    let mut grid = Grid::new(5, 3);
    write_str(&mut grid, "abcde");
    // Cursor parked on the last column, not past it.
    assert_eq!(grid.cursor.col, 4);
    assert!(grid.cursor.pending_wrap);
    assert_eq!(grid.cursor.row, 0);
}

#[test]
fn pending_wrap_resolves_on_next_print() {
    let mut grid = Grid::new(5, 3);
    write_str(&mut grid, "abcdef");
    assert_eq!(grid.row(0)[4].c, 'e');
    assert!(grid.row(0)[4].flags.contains(CellFlags::WRAPLINE));
    assert_eq!(grid.row(1)[0].c, 'f');
    assert_eq!(grid.cursor.row, 1);
    assert_eq!(grid.cursor.col, 1);
}

#[test]
fn carriage_return_clears_pending_wrap() {
    let mut grid = Grid::new(5, 3);
    write_str(&mut grid, "abcde");
    grid.carriage_return();
    grid.put_char('X');
    // No wrap happened: X overwrote column 0 of the same row.
    assert_eq!(grid.row(0)[0].c, 'X');
    assert_eq!(grid.cursor.row, 0);
}

#[test]
fn wide_char_writes_cell_and_spacer() {
    let mut grid = Grid::new(10, 3);
    grid.put_wide_char('好');
    assert_eq!(grid.row(0)[0].c, '好');
    assert!(grid.row(0)[0].flags.contains(CellFlags::WIDE_CHAR));
    assert!(grid.row(0)[1].flags.contains(CellFlags::WIDE_CHAR_SPACER));
    assert_eq!(grid.cursor.col, 2);
}

#[test]
fn wide_char_at_last_column_wraps_whole() {
    let mut grid = Grid::new(80, 3);
    for _ in 0..79 {
        grid.put_char('a');
    }
    grid.put_wide_char('好');
    // Column 79 of row 0 is a blank leading spacer, not half a wide char.
    assert!(grid.row(0)[79].flags.contains(CellFlags::LEADING_WIDE_CHAR_SPACER));
    assert_eq!(grid.row(0)[79].c, ' ');
    assert!(!grid.row(0)[79].flags.contains(CellFlags::WIDE_CHAR));
    // The wide char landed whole at the start of row 1.
    assert_eq!(grid.row(1)[0].c, '好');
    assert!(grid.row(1)[0].flags.contains(CellFlags::WIDE_CHAR));
    assert!(grid.row(1)[1].flags.contains(CellFlags::WIDE_CHAR_SPACER));
}

#[test]
fn overwriting_wide_char_clears_spacer() {
    let mut grid = Grid::new(10, 3);
    grid.put_wide_char('好');
    grid.goto(0, 0);
    grid.put_char('x');
    assert_eq!(grid.row(0)[0].c, 'x');
    assert!(!grid.row(0)[1].flags.contains(CellFlags::WIDE_CHAR_SPACER));
}

#[test]
fn overwriting_spacer_clears_wide_char() {
    let mut grid = Grid::new(10, 3);
    grid.put_wide_char('好');
    grid.goto(0, 1);
    grid.put_char('x');
    assert_eq!(grid.row(0)[1].c, 'x');
    assert!(!grid.row(0)[0].flags.contains(CellFlags::WIDE_CHAR));
    assert_eq!(grid.row(0)[0].c, ' ');
}

// --- scrolling and history ---

#[test]
fn linefeed_at_bottom_scrolls_into_history() {
    let mut grid = Grid::with_history(10, 3, 100);
    write_str(&mut grid, "one");
    grid.newline();
    grid.carriage_return();
    write_str(&mut grid, "two");
    grid.newline();
    grid.carriage_return();
    write_str(&mut grid, "three");
    grid.newline();
    grid.carriage_return();
    write_str(&mut grid, "four");

    assert_eq!(grid.scrollback.len(), 1);
    let oldest: String = grid.scrollback[0].iter().map(|c| c.c).collect();
    assert!(oldest.starts_with("one"));
    assert_eq!(row_text(&grid, 2), "four");
}

#[test]
fn history_limit_evicts_oldest() {
    let mut grid = Grid::with_history(10, 4, 100);
    for i in 0..150 {
        write_str(&mut grid, &format!("l{i}"));
        grid.newline();
        grid.carriage_return();
    }
    assert_eq!(grid.scrollback.len(), 100);
    // Rows l0..=l146 scrolled off the top; the newest 100 are l47..=l146.
    let oldest: String = grid.scrollback[0].iter().map(|c| c.c).collect();
    assert!(oldest.starts_with("l47"), "oldest was {oldest:?}");
}

#[test]
fn alt_grid_has_no_history() {
    let mut grid = Grid::with_history(10, 2, 0);
    for _ in 0..5 {
        grid.newline();
    }
    assert!(grid.scrollback.is_empty());
}

#[test]
fn sub_region_scroll_preserves_outside_rows() {
    let mut grid = Grid::new(10, 5);
    for (i, s) in ["A", "B", "C", "D", "E"].iter().enumerate() {
        grid.goto(i, 0);
        write_str(&mut grid, s);
    }
    grid.set_scroll_region(1, Some(3));
    grid.goto(3, 0);
    grid.newline();

    assert_eq!(row_text(&grid, 0), "A");
    assert_eq!(row_text(&grid, 1), "C");
    assert_eq!(row_text(&grid, 2), "D");
    assert_eq!(row_text(&grid, 3), "");
    assert_eq!(row_text(&grid, 4), "E");
    // Sub-region scrolls never touch history.
    assert!(grid.scrollback.is_empty());
}

#[test]
fn reverse_index_at_region_top_scrolls_down() {
    let mut grid = Grid::new(10, 3);
    write_str(&mut grid, "top");
    grid.goto(0, 0);
    grid.reverse_index();
    assert_eq!(row_text(&grid, 0), "");
    assert_eq!(row_text(&grid, 1), "top");
}

#[test]
fn scroll_up_fills_with_bce_background() {
    let mut grid = Grid::new(10, 3);
    grid.cursor.template.bg = Color::Indexed(4);
    grid.goto(2, 0);
    grid.newline();
    assert_eq!(grid.row(2)[0].bg, Color::Indexed(4));
    assert_eq!(grid.row(2)[9].bg, Color::Indexed(4));
}

#[test]
fn display_offset_stays_anchored_while_history_grows() {
    let mut grid = Grid::with_history(10, 2, 100);
    for _ in 0..10 {
        grid.newline();
    }
    grid.scroll_display(5);
    assert_eq!(grid.display_offset, 5);
    grid.newline();
    assert_eq!(grid.display_offset, 6);
}

#[test]
fn display_offset_clamps_to_history() {
    let mut grid = Grid::with_history(10, 2, 100);
    for _ in 0..3 {
        grid.newline();
    }
    grid.scroll_display(1000);
    assert_eq!(grid.display_offset, 2);
    grid.scroll_display(-1000);
    assert_eq!(grid.display_offset, 0);
}

// --- insert/delete ---

#[test]
fn insert_lines_pushes_content_down() {
    let mut grid = Grid::new(10, 4);
    for (i, s) in ["A", "B", "C", "D"].iter().enumerate() {
        grid.goto(i, 0);
        write_str(&mut grid, s);
    }
    grid.goto(1, 0);
    grid.insert_lines(2);
    assert_eq!(visible_text(&grid), vec!["A", "", "", "B"]);
}

#[test]
fn delete_lines_pulls_content_up() {
    let mut grid = Grid::new(10, 4);
    for (i, s) in ["A", "B", "C", "D"].iter().enumerate() {
        grid.goto(i, 0);
        write_str(&mut grid, s);
    }
    grid.goto(1, 0);
    grid.delete_lines(1);
    assert_eq!(visible_text(&grid), vec!["A", "C", "D", ""]);
}

#[test]
fn insert_lines_outside_region_is_noop() {
    let mut grid = Grid::new(10, 4);
    write_str(&mut grid, "A");
    grid.set_scroll_region(1, Some(2));
    grid.goto(3, 0);
    grid.insert_lines(1);
    assert_eq!(row_text(&grid, 0), "A");
}

#[test]
fn insert_blank_chars_shifts_right() {
    let mut grid = Grid::new(10, 2);
    write_str(&mut grid, "abcdef");
    grid.goto(0, 2);
    grid.insert_blank_chars(2);
    assert_eq!(row_text(&grid, 0), "ab  cdef");
}

#[test]
fn delete_chars_shifts_left() {
    let mut grid = Grid::new(10, 2);
    write_str(&mut grid, "abcdef");
    grid.goto(0, 1);
    grid.delete_chars(2);
    assert_eq!(row_text(&grid, 0), "adef");
}

#[test]
fn erase_chars_blanks_without_shifting() {
    let mut grid = Grid::new(10, 2);
    write_str(&mut grid, "abcdef");
    grid.goto(0, 1);
    grid.erase_chars(2);
    assert_eq!(row_text(&grid, 0), "a  def");
}

// --- erase ---

#[test]
fn erase_display_below() {
    let mut grid = Grid::new(10, 3);
    for (i, s) in ["AA", "BB", "CC"].iter().enumerate() {
        grid.goto(i, 0);
        write_str(&mut grid, s);
    }
    grid.goto(1, 1);
    grid.erase_display(ClearMode::Below);
    assert_eq!(visible_text(&grid), vec!["AA", "B", ""]);
}

#[test]
fn erase_display_above() {
    let mut grid = Grid::new(10, 3);
    for (i, s) in ["AA", "BB", "CC"].iter().enumerate() {
        grid.goto(i, 0);
        write_str(&mut grid, s);
    }
    grid.goto(1, 0);
    grid.erase_display(ClearMode::Above);
    assert_eq!(visible_text(&grid), vec!["", "B", "CC"]);
}

#[test]
fn erase_saved_clears_history_only() {
    let mut grid = Grid::with_history(10, 2, 100);
    write_str(&mut grid, "keep");
    for _ in 0..4 {
        grid.newline();
    }
    assert!(!grid.scrollback.is_empty());
    grid.erase_display(ClearMode::Saved);
    assert!(grid.scrollback.is_empty());
    assert_eq!(grid.display_offset, 0);
}

#[test]
fn erase_line_variants() {
    let mut grid = Grid::new(6, 1);
    write_str(&mut grid, "abcdef");
    grid.goto(0, 2);
    grid.erase_line(LineClearMode::Right);
    assert_eq!(row_text(&grid, 0), "ab");

    write_str(&mut grid, "cdef");
    grid.goto(0, 2);
    grid.erase_line(LineClearMode::Left);
    assert_eq!(row_text(&grid, 0), "   def");
    assert_eq!(grid.row(0)[3].c, 'd');
}

// --- tabs ---

#[test]
fn tab_stops_every_eight_columns() {
    let mut grid = Grid::new(20, 1);
    grid.advance_tab(1);
    assert_eq!(grid.cursor.col, 8);
    grid.advance_tab(1);
    assert_eq!(grid.cursor.col, 16);
    grid.backward_tab(1);
    assert_eq!(grid.cursor.col, 8);
}

#[test]
fn custom_tab_stop() {
    let mut grid = Grid::new(20, 1);
    grid.goto(0, 3);
    grid.set_tab_stop();
    grid.goto(0, 0);
    grid.advance_tab(1);
    assert_eq!(grid.cursor.col, 3);
}

// --- resize and reflow ---

#[test]
fn resize_is_idempotent() {
    let mut grid = Grid::with_history(10, 4, 100);
    write_str(&mut grid, "hello world this wraps around");
    let mut a = grid.clone();
    a.resize(7, 3, true);
    let mut b = grid.clone();
    b.resize(7, 3, true);
    b.resize(7, 3, true);

    assert_eq!(visible_text(&a), visible_text(&b));
    assert_eq!(a.cursor.row, b.cursor.row);
    assert_eq!(a.cursor.col, b.cursor.col);
    assert_eq!(a.scrollback.len(), b.scrollback.len());
}

#[test]
fn reflow_round_trip_restores_visible_content() {
    let mut grid = Grid::with_history(8, 4, 100);
    write_str(&mut grid, "the quick brown fox");
    let before = visible_text(&grid);

    grid.resize(12, 4, true);
    grid.resize(8, 4, true);

    assert_eq!(visible_text(&grid), before);
}

#[test]
fn reflow_grow_unwraps_lines() {
    let mut grid = Grid::new(5, 4);
    write_str(&mut grid, "abcdefgh");
    assert_eq!(row_text(&grid, 0), "abcde");
    assert_eq!(row_text(&grid, 1), "fgh");

    grid.resize(10, 4, true);
    assert_eq!(row_text(&grid, 0), "abcdefgh");
    assert_eq!(row_text(&grid, 1), "");
}

#[test]
fn reflow_shrink_wraps_lines() {
    let mut grid = Grid::new(10, 4);
    write_str(&mut grid, "abcdefgh");
    grid.resize(5, 4, true);
    assert_eq!(row_text(&grid, 0), "abcde");
    assert!(grid.row(0)[4].flags.contains(CellFlags::WRAPLINE));
    assert_eq!(row_text(&grid, 1), "fgh");
}

#[test]
fn reflow_keeps_cursor_on_its_character() {
    let mut grid = Grid::new(10, 4);
    write_str(&mut grid, "abcdefgh");
    // Park the cursor on 'g'.
    grid.goto(0, 6);
    grid.resize(5, 4, true);
    assert_eq!((grid.cursor.row, grid.cursor.col), (1, 1));
}

#[test]
fn reflow_cursor_past_content_keeps_distance() {
    let mut grid = Grid::new(10, 4);
    write_str(&mut grid, "abcdefgh");
    // Cursor sits one past 'h' at (0, 8).
    grid.resize(5, 4, true);
    assert_eq!((grid.cursor.row, grid.cursor.col), (1, 3));
}

#[test]
fn reflow_wide_char_moves_whole() {
    let mut grid = Grid::new(6, 3);
    write_str(&mut grid, "abcd好");
    grid.resize(5, 3, true);
    // The wide char did not fit in the remaining column: leading spacer
    // then the pair at the next row start.
    assert!(grid.row(0)[4].flags.contains(CellFlags::LEADING_WIDE_CHAR_SPACER));
    assert_eq!(grid.row(1)[0].c, '好');
    assert!(grid.row(1)[1].flags.contains(CellFlags::WIDE_CHAR_SPACER));
}

#[test]
fn no_reflow_resize_truncates() {
    let mut grid = Grid::with_history(10, 3, 0);
    write_str(&mut grid, "abcdefghij");
    grid.resize(5, 3, false);
    assert_eq!(row_text(&grid, 0), "abcde");
    assert_eq!(grid.lines, 3);
    assert_eq!(grid.cols, 5);
}

#[test]
fn shrink_rows_prefers_trimming_blanks() {
    let mut grid = Grid::with_history(10, 4, 100);
    write_str(&mut grid, "top");
    grid.resize(10, 2, true);
    // The blank bottom rows went away, not the content.
    assert_eq!(row_text(&grid, 0), "top");
    assert!(grid.scrollback.is_empty());
}

#[test]
fn grow_rows_pulls_back_history_when_cursor_at_bottom() {
    let mut grid = Grid::with_history(10, 2, 100);
    write_str(&mut grid, "one");
    grid.newline();
    grid.carriage_return();
    write_str(&mut grid, "two");
    grid.newline();
    grid.carriage_return();
    write_str(&mut grid, "three");
    assert_eq!(grid.scrollback.len(), 1);

    grid.resize(10, 4, true);
    assert_eq!(grid.scrollback.len(), 0);
    assert_eq!(row_text(&grid, 0), "one");
    assert_eq!(row_text(&grid, 1), "two");
    assert_eq!(row_text(&grid, 2), "three");
}

#[test]
fn resize_resets_scroll_region() {
    let mut grid = Grid::new(10, 5);
    grid.set_scroll_region(1, Some(3));
    grid.resize(10, 8, true);
    assert_eq!(grid.scroll_top(), 0);
    assert_eq!(grid.scroll_bottom(), 7);
}

// --- damage ---

#[test]
fn writes_mark_rows_dirty() {
    let mut grid = Grid::new(10, 3);
    grid.dirty_mut().consume();
    grid.goto(1, 0);
    grid.put_char('x');
    assert_eq!(grid.dirty_mut().consume(), vec![1]);
}

#[test]
fn scroll_marks_region_dirty() {
    let mut grid = Grid::new(10, 4);
    grid.dirty_mut().consume();
    grid.goto(3, 0);
    grid.newline();
    assert_eq!(grid.dirty_mut().consume(), vec![0, 1, 2, 3]);
}

#[test]
fn set_history_limit_shrinks_scrollback() {
    let mut grid = Grid::with_history(10, 2, 100);
    for _ in 0..50 {
        grid.newline();
    }
    assert_eq!(grid.scrollback.len(), 49);
    grid.set_history_limit(10);
    assert_eq!(grid.scrollback.len(), 10);
}
