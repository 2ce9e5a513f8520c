//! SGR attributes, colors, hyperlinks, and cursor style.

use vte::ansi::{Attr, Color, CursorShape, CursorStyle, Hyperlink, NamedColor, Rgb};

use crate::cell::CellFlags;
use crate::event::{EventListener, ScreenEvent};

use super::Screen;

impl<T: EventListener> Screen<T> {
    pub(super) fn handle_terminal_attribute(&mut self, attr: Attr) {
        let template = &mut self.grid_mut().cursor.template;
        match attr {
            Attr::Reset => {
                template.fg = Color::Named(NamedColor::Foreground);
                template.bg = Color::Named(NamedColor::Background);
                template.flags = CellFlags::empty();
                template.extra = None;
            }
            Attr::Bold => template.flags.insert(CellFlags::BOLD),
            Attr::Dim => template.flags.insert(CellFlags::DIM),
            Attr::Italic => template.flags.insert(CellFlags::ITALIC),
            Attr::Underline => {
                template.flags.remove(CellFlags::ANY_UNDERLINE);
                template.flags.insert(CellFlags::UNDERLINE);
            }
            Attr::DoubleUnderline => {
                template.flags.remove(CellFlags::ANY_UNDERLINE);
                template.flags.insert(CellFlags::DOUBLE_UNDERLINE);
            }
            Attr::Undercurl => {
                template.flags.remove(CellFlags::ANY_UNDERLINE);
                template.flags.insert(CellFlags::UNDERCURL);
            }
            Attr::DottedUnderline => {
                template.flags.remove(CellFlags::ANY_UNDERLINE);
                template.flags.insert(CellFlags::DOTTED_UNDERLINE);
            }
            Attr::DashedUnderline => {
                template.flags.remove(CellFlags::ANY_UNDERLINE);
                template.flags.insert(CellFlags::DASHED_UNDERLINE);
            }
            Attr::BlinkSlow | Attr::BlinkFast => template.flags.insert(CellFlags::BLINK),
            Attr::Reverse => template.flags.insert(CellFlags::INVERSE),
            Attr::Hidden => template.flags.insert(CellFlags::HIDDEN),
            Attr::Strike => template.flags.insert(CellFlags::STRIKEOUT),
            Attr::CancelBold => template.flags.remove(CellFlags::BOLD),
            Attr::CancelBoldDim => {
                template.flags.remove(CellFlags::BOLD | CellFlags::DIM);
            }
            Attr::CancelItalic => template.flags.remove(CellFlags::ITALIC),
            Attr::CancelUnderline => template.flags.remove(CellFlags::ANY_UNDERLINE),
            Attr::CancelBlink => template.flags.remove(CellFlags::BLINK),
            Attr::CancelReverse => template.flags.remove(CellFlags::INVERSE),
            Attr::CancelHidden => template.flags.remove(CellFlags::HIDDEN),
            Attr::CancelStrike => template.flags.remove(CellFlags::STRIKEOUT),
            Attr::Foreground(color) => template.fg = color,
            Attr::Background(color) => template.bg = color,
            Attr::UnderlineColor(color) => template.set_underline_color(color),
        }
    }

    pub(super) fn handle_set_color(&mut self, index: usize, color: Rgb) {
        self.palette.set_color(index, color);
        self.grid_mut().dirty_mut().mark_all();
    }

    pub(super) fn handle_reset_color(&mut self, index: usize) {
        self.palette.reset_color(index);
        self.grid_mut().dirty_mut().mark_all();
    }

    pub(super) fn handle_set_hyperlink(&mut self, hyperlink: Option<Hyperlink>) {
        self.grid_mut().cursor.template.set_hyperlink(hyperlink);
    }

    pub(super) fn handle_set_cursor_style(&mut self, style: Option<CursorStyle>) {
        self.cursor_shape = style.map_or_else(CursorShape::default, |s| s.shape);
    }

    pub(super) fn handle_set_cursor_shape(&mut self, shape: CursorShape) {
        self.cursor_shape = shape;
    }

    /// OSC 10/11/12 query: respond with the current color in
    /// XParseColor format.
    pub(super) fn handle_dynamic_color_sequence(
        &mut self,
        prefix: String,
        index: usize,
        terminator: &str,
    ) {
        let color = match index {
            0 => Some(self.palette.default_fg()),
            1 => Some(self.palette.default_bg()),
            2 => Some(self.palette.cursor_color()),
            _ => None,
        };
        if let Some(rgb) = color {
            let response = format!(
                "\x1b]{prefix};rgb:{:04x}/{:04x}/{:04x}{terminator}",
                u16::from(rgb.r) << 8 | u16::from(rgb.r),
                u16::from(rgb.g) << 8 | u16::from(rgb.g),
                u16::from(rgb.b) << 8 | u16::from(rgb.b),
            );
            self.emit(ScreenEvent::PtyWrite(response.into_bytes()));
        }
    }
}
