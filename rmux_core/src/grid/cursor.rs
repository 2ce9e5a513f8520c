//! Terminal cursor state and attribute template.

use vte::ansi::{Color, NamedColor};

use crate::cell::{Cell, CellFlags};

/// Cursor position plus the attribute template applied to new cells.
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    /// Column position (0-based).
    pub col: usize,
    /// Row position (0-based, visible area).
    pub row: usize,
    /// Attribute template for newly written cells.
    pub template: Cell,
    /// Set after writing the last column; the next print wraps first.
    pub pending_wrap: bool,
}

impl Cursor {
    /// Resets the attribute template to default colors and no flags.
    pub fn reset_attrs(&mut self) {
        self.template.fg = Color::Named(NamedColor::Foreground);
        self.template.bg = Color::Named(NamedColor::Background);
        self.template.flags = CellFlags::empty();
        self.template.extra = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cursor_at_origin() {
        let cursor = Cursor::default();
        assert_eq!((cursor.row, cursor.col), (0, 0));
        assert!(!cursor.pending_wrap);
    }

    #[test]
    fn reset_attrs_clears_template() {
        let mut cursor = Cursor::default();
        cursor.template.flags = CellFlags::BOLD;
        cursor.template.fg = Color::Indexed(2);
        cursor.reset_attrs();
        assert!(cursor.template.flags.is_empty());
        assert_eq!(cursor.template.fg, Color::Named(NamedColor::Foreground));
    }
}
