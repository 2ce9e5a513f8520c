//! Client rendering: compose a window into a cell image and diff it
//! against what the client last saw, emitting minimal escape sequences.
//!
//! Composition reads pane grids placed by the layout, draws separators
//! in the gaps, and adds a one-line status bar. The diff walks rows,
//! re-homing the cursor only when a run breaks and re-emitting SGR only
//! when the style changes between adjacent emitted cells.

use rmux_core::cell::{Cell, CellFlags};
use rmux_core::grid::Grid;
use unicode_width::UnicodeWidthChar;
use vte::ansi::{Color, NamedColor};

use crate::layout::Rect;
use crate::protocol::ClientCaps;

/// A fixed-size matrix of styled cells, the unit of client rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenImage {
    pub cols: u16,
    pub rows: u16,
    cells: Vec<Cell>,
}

impl ScreenImage {
    pub fn blank(cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols as usize * rows as usize],
        }
    }

    pub fn cell(&self, x: u16, y: u16) -> &Cell {
        &self.cells[y as usize * self.cols as usize + x as usize]
    }

    pub fn cell_mut(&mut self, x: u16, y: u16) -> &mut Cell {
        &mut self.cells[y as usize * self.cols as usize + x as usize]
    }

    /// Copy the visible region of a grid into the image at `rect`,
    /// clipping to both the rect and the image.
    pub fn blit_grid(&mut self, grid: &Grid, rect: Rect) {
        let rows = (rect.h as usize).min(grid.lines);
        let cols = (rect.w as usize).min(grid.cols);
        for row in 0..rows {
            let src = grid.visible_row(row);
            for col in 0..cols {
                let x = rect.x + col as u16;
                let y = rect.y + row as u16;
                if x < self.cols && y < self.rows {
                    *self.cell_mut(x, y) = src[col].clone();
                }
            }
        }
    }

    /// Write a text run with the given template style, truncating at the
    /// right edge. Wide characters occupy two columns.
    pub fn draw_text(&mut self, x: u16, y: u16, text: &str, template: &Cell) {
        if y >= self.rows {
            return;
        }
        let mut col = x;
        for ch in text.chars() {
            let width = UnicodeWidthChar::width(ch).unwrap_or(1) as u16;
            if col + width > self.cols {
                break;
            }
            let cell = self.cell_mut(col, y);
            cell.c = ch;
            cell.fg = template.fg;
            cell.bg = template.bg;
            cell.flags = template.flags;
            cell.extra = None;
            if width == 2 {
                let spacer = self.cell_mut(col + 1, y);
                spacer.c = ' ';
                spacer.fg = template.fg;
                spacer.bg = template.bg;
                spacer.flags = CellFlags::WIDE_CHAR_SPACER;
            }
            col += width;
        }
    }

    /// Fill a single cell with a separator glyph.
    pub fn draw_separator(&mut self, x: u16, y: u16, glyph: char) {
        if x < self.cols && y < self.rows {
            let cell = self.cell_mut(x, y);
            cell.c = glyph;
            cell.fg = Color::Named(NamedColor::Foreground);
            cell.bg = Color::Named(NamedColor::Background);
            cell.flags = CellFlags::empty();
            cell.extra = None;
        }
    }
}

/// Compose pane grids plus separators plus a status line into one image
/// of `cols`×`rows`. The window area is everything above the last row.
pub fn compose(
    cols: u16,
    rows: u16,
    panes: &[(Rect, &Grid)],
    status: &str,
    ascii_only: bool,
) -> ScreenImage {
    let mut image = ScreenImage::blank(cols, rows);
    let window_rows = rows.saturating_sub(1);

    let (vsep, hsep) = if ascii_only { ('|', '-') } else { ('│', '─') };

    // Separators first, panes on top: any cell a pane doesn't claim and
    // that borders one is a separator.
    for &(rect, _) in panes {
        if rect.right() < cols {
            for y in rect.y..rect.bottom().min(window_rows) {
                image.draw_separator(rect.right(), y, vsep);
            }
        }
        if rect.bottom() < window_rows {
            for x in rect.x..rect.right().min(cols) {
                image.draw_separator(x, rect.bottom(), hsep);
            }
        }
    }

    for &(rect, grid) in panes {
        let clipped = Rect::new(rect.x, rect.y, rect.w, rect.h.min(window_rows.saturating_sub(rect.y)));
        image.blit_grid(grid, clipped);
    }

    // Status line: inverse video across the full width.
    let mut template = Cell::default();
    template.flags = CellFlags::INVERSE;
    if window_rows < rows {
        for x in 0..cols {
            let cell = image.cell_mut(x, window_rows);
            cell.flags = CellFlags::INVERSE;
        }
        image.draw_text(0, window_rows, status, &template);
    }

    image
}

/// Per-client render state: the image last sent and the cursor position
/// the client's terminal is left at.
#[derive(Debug, Default)]
pub struct Renderer {
    last: Option<ScreenImage>,
    cursor: Option<(u16, u16)>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a full repaint on the next render.
    pub fn invalidate(&mut self) {
        self.last = None;
    }

    /// Emit the escape sequences that reconcile the client's terminal
    /// with `next`, then park the cursor at `cursor` (shown or hidden).
    pub fn render(
        &mut self,
        next: &ScreenImage,
        caps: ClientCaps,
        cursor: Option<(u16, u16)>,
        out: &mut Vec<u8>,
    ) {
        let full = match &self.last {
            Some(last) => last.cols != next.cols || last.rows != next.rows,
            None => true,
        };
        if full {
            out.extend_from_slice(b"\x1b[H\x1b[2J");
            self.cursor = Some((0, 0));
        }

        let mut style = StyleState::default();
        out.extend_from_slice(b"\x1b[0m\x1b[?25l");

        for y in 0..next.rows {
            let mut x = 0;
            while x < next.cols {
                let cell = next.cell(x, y);
                if cell.flags.contains(CellFlags::WIDE_CHAR_SPACER) {
                    x += 1;
                    continue;
                }
                let width = if cell.flags.contains(CellFlags::WIDE_CHAR) { 2 } else { 1 };

                // After a clear, blank cells are already correct.
                if full && cell.is_blank() {
                    x += width;
                    continue;
                }
                let unchanged = !full
                    && self
                        .last
                        .as_ref()
                        .is_some_and(|last| last.cell(x, y) == cell);
                if unchanged {
                    x += width;
                    continue;
                }

                self.move_to(x, y, out);
                style.apply(cell, caps, out);

                let mut tmp = [0u8; 4];
                let c = if cell.c == '\0' { ' ' } else { cell.c };
                out.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
                for &zw in cell.zerowidth() {
                    out.extend_from_slice(zw.encode_utf8(&mut tmp).as_bytes());
                }

                self.cursor = Some((x + width, y));
                x += width;
            }
        }

        if let Some((cx, cy)) = cursor {
            out.extend_from_slice(format!("\x1b[{};{}H", cy + 1, cx + 1).as_bytes());
            out.extend_from_slice(b"\x1b[?25h");
            self.cursor = Some((cx, cy));
        }

        self.last = Some(next.clone());
    }

    fn move_to(&mut self, x: u16, y: u16, out: &mut Vec<u8>) {
        if self.cursor == Some((x, y)) {
            return;
        }
        out.extend_from_slice(format!("\x1b[{};{}H", y + 1, x + 1).as_bytes());
        self.cursor = Some((x, y));
    }
}

/// Last emitted SGR state; re-emitted only on change.
#[derive(Debug, Default)]
struct StyleState {
    current: Option<(CellFlags, Color, Color)>,
}

impl StyleState {
    fn apply(&mut self, cell: &Cell, caps: ClientCaps, out: &mut Vec<u8>) {
        let flags = cell.flags
            & (CellFlags::BOLD
                | CellFlags::DIM
                | CellFlags::ITALIC
                | CellFlags::ANY_UNDERLINE
                | CellFlags::BLINK
                | CellFlags::INVERSE
                | CellFlags::HIDDEN
                | CellFlags::STRIKEOUT);
        let wanted = (flags, cell.fg, cell.bg);
        if self.current == Some(wanted) {
            return;
        }

        let mut seq = String::from("\x1b[0");
        if flags.contains(CellFlags::BOLD) {
            seq.push_str(";1");
        }
        if flags.contains(CellFlags::DIM) {
            seq.push_str(";2");
        }
        if flags.contains(CellFlags::ITALIC) {
            seq.push_str(";3");
        }
        if flags.intersects(CellFlags::ANY_UNDERLINE) {
            seq.push_str(";4");
        }
        if flags.contains(CellFlags::BLINK) {
            seq.push_str(";5");
        }
        if flags.contains(CellFlags::INVERSE) {
            seq.push_str(";7");
        }
        if flags.contains(CellFlags::HIDDEN) {
            seq.push_str(";8");
        }
        if flags.contains(CellFlags::STRIKEOUT) {
            seq.push_str(";9");
        }
        push_color(&mut seq, cell.fg, true, caps);
        push_color(&mut seq, cell.bg, false, caps);
        seq.push('m');

        out.extend_from_slice(seq.as_bytes());
        self.current = Some(wanted);
    }
}

fn push_color(seq: &mut String, color: Color, foreground: bool, caps: ClientCaps) {
    use std::fmt::Write as _;

    let base = if foreground { 30 } else { 40 };
    match color {
        Color::Named(named) => {
            let code: u16 = match named {
                NamedColor::Foreground | NamedColor::Background | NamedColor::Cursor => {
                    if foreground { 39 } else { 49 }
                }
                NamedColor::BrightForeground => 39,
                NamedColor::DimForeground => 39,
                n => {
                    let idx = n as usize;
                    if idx < 8 {
                        base + idx as u16
                    } else if idx < 16 {
                        base + 60 + (idx as u16 - 8)
                    } else if (NamedColor::DimBlack as usize..=NamedColor::DimWhite as usize)
                        .contains(&idx)
                    {
                        base + (idx - NamedColor::DimBlack as usize) as u16
                    } else if foreground {
                        39
                    } else {
                        49
                    }
                }
            };
            let _ = write!(seq, ";{code}");
        }
        Color::Indexed(i) => {
            if caps.contains(ClientCaps::COLORS_256) || i < 16 {
                let _ = write!(seq, ";{};5;{}", base + 8, i);
            } else {
                let _ = write!(seq, ";{}", base + u16::from(i % 8));
            }
        }
        Color::Spec(rgb) => {
            if caps.contains(ClientCaps::TRUE_COLOR) {
                let _ = write!(seq, ";{};2;{};{};{}", base + 8, rgb.r, rgb.g, rgb.b);
            } else if caps.contains(ClientCaps::COLORS_256) {
                let _ = write!(seq, ";{};5;{}", base + 8, rgb_to_256(rgb));
            } else {
                let _ = write!(seq, ";{}", base + 7);
            }
        }
    }
}

/// Nearest 256-color cube/grayscale index for an RGB color.
fn rgb_to_256(rgb: vte::ansi::Rgb) -> u8 {
    let to_cube = |v: u8| -> u8 {
        if v < 48 {
            0
        } else if v < 115 {
            1
        } else {
            ((v as u16 - 35) / 40) as u8
        }
    };
    if rgb.r == rgb.g && rgb.g == rgb.b {
        // Grayscale ramp when close enough.
        if rgb.r < 8 {
            return 16;
        }
        if rgb.r > 248 {
            return 231;
        }
        return 232 + ((rgb.r as u16 - 8) / 10) as u8;
    }
    16 + 36 * to_cube(rgb.r) + 6 * to_cube(rgb.g) + to_cube(rgb.b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(text: &str, cols: usize, lines: usize) -> Grid {
        let mut grid = Grid::new(cols, lines);
        for c in text.chars() {
            grid.put_char(c);
        }
        grid
    }

    fn caps() -> ClientCaps {
        ClientCaps::UTF8 | ClientCaps::COLORS_256
    }

    #[test]
    fn compose_places_panes_and_separator() {
        let left = grid_with("AA", 4, 3);
        let right = grid_with("BB", 4, 3);
        let panes = [
            (Rect::new(0, 0, 4, 3), &left),
            (Rect::new(5, 0, 4, 3), &right),
        ];
        let image = compose(9, 4, &panes, "status", false);

        assert_eq!(image.cell(0, 0).c, 'A');
        assert_eq!(image.cell(5, 0).c, 'B');
        assert_eq!(image.cell(4, 0).c, '│');
        // Status row is inverse.
        assert!(image.cell(0, 3).flags.contains(CellFlags::INVERSE));
        assert_eq!(image.cell(0, 3).c, 's');
    }

    #[test]
    fn compose_ascii_separators() {
        let g = grid_with("x", 4, 2);
        let image = compose(9, 3, &[(Rect::new(0, 0, 4, 2), &g)], "", true);
        assert_eq!(image.cell(4, 0).c, '|');
    }

    #[test]
    fn first_render_is_full_clear() {
        let g = grid_with("hi", 4, 2);
        let image = compose(5, 3, &[(Rect::new(0, 0, 4, 2), &g)], "", false);
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render(&image, caps(), Some((2, 0)), &mut out);

        let s = String::from_utf8_lossy(&out);
        assert!(s.contains("\x1b[2J"));
        assert!(s.contains("hi"));
        // Cursor parked at (2,0) 1-based (3rd column, 1st row).
        assert!(s.contains("\x1b[1;3H"));
    }

    #[test]
    fn unchanged_image_emits_no_cells() {
        let g = grid_with("hi", 4, 2);
        let image = compose(5, 3, &[(Rect::new(0, 0, 4, 2), &g)], "", false);
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render(&image, caps(), None, &mut out);

        let mut second = Vec::new();
        renderer.render(&image, caps(), None, &mut second);
        let s = String::from_utf8_lossy(&second);
        assert!(!s.contains("hi"));
        assert!(!s.contains("\x1b[2J"));
    }

    #[test]
    fn changed_cell_rerenders_only_that_run() {
        let a = grid_with("aaaa", 4, 1);
        let image_a = compose(4, 2, &[(Rect::new(0, 0, 4, 1), &a)], "", false);
        let b = grid_with("aaba", 4, 1);
        let image_b = compose(4, 2, &[(Rect::new(0, 0, 4, 1), &b)], "", false);

        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render(&image_a, caps(), None, &mut out);
        out.clear();
        renderer.render(&image_b, caps(), None, &mut out);

        let s = String::from_utf8_lossy(&out);
        // Only the changed column is addressed: row 1, column 3.
        assert!(s.contains("\x1b[1;3H"));
        assert!(s.contains('b'));
        assert!(!s.contains("aa"));
    }

    #[test]
    fn resize_forces_full_redraw() {
        let g = grid_with("x", 4, 2);
        let image = compose(5, 3, &[(Rect::new(0, 0, 4, 2), &g)], "", false);
        let mut renderer = Renderer::new();
        let mut out = Vec::new();
        renderer.render(&image, caps(), None, &mut out);

        let wider = compose(7, 3, &[(Rect::new(0, 0, 4, 2), &g)], "", false);
        out.clear();
        renderer.render(&wider, caps(), None, &mut out);
        assert!(String::from_utf8_lossy(&out).contains("\x1b[2J"));
    }

    #[test]
    fn sgr_colors_follow_caps() {
        let mut grid = Grid::new(4, 1);
        grid.cursor.template.fg = Color::Indexed(123);
        grid.put_char('x');
        let image = compose(4, 2, &[(Rect::new(0, 0, 4, 1), &grid)], "", false);

        let mut out = Vec::new();
        Renderer::new().render(&image, caps(), None, &mut out);
        assert!(String::from_utf8_lossy(&out).contains(";38;5;123"));

        let mut out = Vec::new();
        Renderer::new().render(&image, ClientCaps::empty(), None, &mut out);
        // Downgraded to the base 8 colors.
        assert!(String::from_utf8_lossy(&out).contains(";33"));
    }

    #[test]
    fn rgb_quantization() {
        assert_eq!(rgb_to_256(vte::ansi::Rgb { r: 0, g: 0, b: 0 }), 16);
        assert_eq!(rgb_to_256(vte::ansi::Rgb { r: 255, g: 255, b: 255 }), 231);
        assert_eq!(rgb_to_256(vte::ansi::Rgb { r: 128, g: 128, b: 128 }), 244);
    }

    #[test]
    fn wide_chars_emit_once() {
        let mut grid = Grid::new(6, 1);
        grid.put_wide_char('好');
        let image = compose(6, 2, &[(Rect::new(0, 0, 6, 1), &grid)], "", false);
        let mut out = Vec::new();
        Renderer::new().render(&image, caps(), None, &mut out);
        let s = String::from_utf8_lossy(&out);
        assert_eq!(s.matches('好').count(), 1);
    }
}
