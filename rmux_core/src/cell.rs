//! Terminal grid cell representation with attributes and flags.
//!
//! A `Cell` is one character position. Most cells are 24 bytes; only cells
//! carrying combining marks, a colored underline, or a hyperlink allocate
//! the out-of-line `CellExtra`.

use bitflags::bitflags;
use vte::ansi::{Color, Hyperlink, NamedColor};

/// Combining marks kept per cell before further ones are dropped.
pub const MAX_ZEROWIDTH: usize = 5;

bitflags! {
    /// Bitflags for cell text attributes and layout hints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u16 {
        const BOLD                     = 1 << 0;
        const DIM                      = 1 << 1;
        const ITALIC                   = 1 << 2;
        const UNDERLINE                = 1 << 3;
        const DOUBLE_UNDERLINE         = 1 << 4;
        const UNDERCURL                = 1 << 5;
        const DOTTED_UNDERLINE         = 1 << 6;
        const DASHED_UNDERLINE         = 1 << 7;
        const BLINK                    = 1 << 8;
        const INVERSE                  = 1 << 9;
        const HIDDEN                   = 1 << 10;
        const STRIKEOUT                = 1 << 11;
        const WIDE_CHAR                = 1 << 12;
        const WIDE_CHAR_SPACER         = 1 << 13;
        const WRAPLINE                 = 1 << 14;
        const LEADING_WIDE_CHAR_SPACER = 1 << 15;
    }
}

impl CellFlags {
    /// Combined mask for all underline variants.
    pub const ANY_UNDERLINE: Self = Self::UNDERLINE
        .union(Self::DOUBLE_UNDERLINE)
        .union(Self::UNDERCURL)
        .union(Self::DOTTED_UNDERLINE)
        .union(Self::DASHED_UNDERLINE);

    /// Layout flags that `reset` must never copy from a template.
    pub const LAYOUT: Self = Self::WIDE_CHAR
        .union(Self::WIDE_CHAR_SPACER)
        .union(Self::WRAPLINE)
        .union(Self::LEADING_WIDE_CHAR_SPACER);
}

/// Extended cell data stored out-of-line.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct CellExtra {
    /// Combining marks and zero-width characters appended to this cell.
    pub zerowidth: Vec<char>,
    /// Colored underline (SGR 58).
    pub underline_color: Option<Color>,
    /// OSC 8 hyperlink.
    pub hyperlink: Option<Hyperlink>,
}

impl Clone for CellExtra {
    fn clone(&self) -> Self {
        Self {
            zerowidth: self.zerowidth.clone(),
            underline_color: self.underline_color,
            hyperlink: self.hyperlink.as_ref().map(|h| Hyperlink { id: h.id.clone(), uri: h.uri.clone() }),
        }
    }
}

/// A single grid cell with character, colors, attributes, and optional
/// extended data.
#[derive(Debug, Clone)]
pub struct Cell {
    pub c: char,
    pub fg: Color,
    pub bg: Color,
    pub flags: CellFlags,
    pub extra: Option<Box<CellExtra>>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            c: ' ',
            fg: Color::Named(NamedColor::Foreground),
            bg: Color::Named(NamedColor::Background),
            flags: CellFlags::empty(),
            extra: None,
        }
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.c == other.c
            && self.fg == other.fg
            && self.bg == other.bg
            && self.flags == other.flags
            && self.extra == other.extra
    }
}

impl Eq for Cell {}

impl Cell {
    /// Returns the zero-width combining characters for this cell.
    pub fn zerowidth(&self) -> &[char] {
        match &self.extra {
            Some(extra) => &extra.zerowidth,
            None => &[],
        }
    }

    /// Returns the custom underline color if set.
    pub fn underline_color(&self) -> Option<Color> {
        self.extra.as_ref().and_then(|e| e.underline_color)
    }

    /// Returns the hyperlink associated with this cell.
    pub fn hyperlink(&self) -> Option<&Hyperlink> {
        self.extra.as_ref().and_then(|e| e.hyperlink.as_ref())
    }

    /// Returns `true` if this cell is visually blank with default colors.
    pub fn is_blank(&self) -> bool {
        (self.c == ' ' || self.c == '\0')
            && self.fg == Color::Named(NamedColor::Foreground)
            && self.bg == Color::Named(NamedColor::Background)
            && self.flags.is_empty()
            && self.extra.is_none()
    }

    /// Resets this cell to match the template, never copying layout flags.
    pub fn reset(&mut self, template: &Self) {
        self.c = template.c;
        self.fg = template.fg;
        self.bg = template.bg;
        self.flags = template.flags & !CellFlags::LAYOUT;
        self.extra = None;
    }

    /// Adds a zero-width combining character, up to [`MAX_ZEROWIDTH`].
    pub fn push_zerowidth(&mut self, c: char) {
        let extra = self.extra.get_or_insert_with(Box::default);
        if extra.zerowidth.len() < MAX_ZEROWIDTH {
            extra.zerowidth.push(c);
        }
    }

    /// Sets the custom underline color for this cell.
    pub fn set_underline_color(&mut self, color: Option<Color>) {
        if color.is_none() && self.extra.is_none() {
            return;
        }
        self.extra.get_or_insert_with(Box::default).underline_color = color;
    }

    /// Sets the hyperlink for this cell.
    pub fn set_hyperlink(&mut self, hyperlink: Option<Hyperlink>) {
        if hyperlink.is_none() && self.extra.is_none() {
            return;
        }
        self.extra.get_or_insert_with(Box::default).hyperlink = hyperlink;
    }
}

impl From<Color> for Cell {
    /// A blank cell carrying only a background color (BCE fills).
    fn from(bg: Color) -> Self {
        Self { bg, ..Self::default() }
    }
}
