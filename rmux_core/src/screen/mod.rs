//! Per-pane terminal state machine.
//!
//! `Screen<T: EventListener>` owns two grids (primary + alternate), mode
//! flags, palette, charset state, and title, and implements
//! `vte::ansi::Handler` so a `vte::ansi::Processor` can drive it directly
//! from PTY bytes. Escape dispatch is split into submodules; everything
//! observable from outside flows through the attached listener.

mod attr;
mod cursor;
mod erase;
mod input;
mod mode;
mod osc;
mod scroll;

#[cfg(test)]
mod tests;

pub use input::GraphemeState;

use vte::ansi::CursorShape;

use crate::charset::CharsetState;
use crate::event::{EventListener, ScreenEvent};
use crate::grid::Grid;
use crate::mode::TermMode;
use crate::palette::Palette;

pub struct Screen<T: EventListener> {
    /// Primary grid (scrollback-backed).
    grid: Grid,
    /// Alternate grid (no scrollback).
    alt_grid: Grid,
    /// Which grid is currently active.
    active_is_alt: bool,
    /// DECSET/DECRST mode flags.
    mode: TermMode,
    /// Color palette with OSC overrides.
    palette: Palette,
    /// G0–G3 translation state.
    charset: CharsetState,
    /// Pane title (OSC 0/2).
    title: String,
    /// Pushed title stack (xterm extension).
    title_stack: Vec<String>,
    /// Cursor shape for rendering (DECSCUSR).
    cursor_shape: CursorShape,
    /// ZWJ grapheme continuation state.
    grapheme: GraphemeState,
    /// Event sink.
    listener: T,
}

impl<T: EventListener> Screen<T> {
    pub fn new(cols: usize, lines: usize, history_limit: usize, listener: T) -> Self {
        Self {
            grid: Grid::with_history(cols, lines, history_limit),
            alt_grid: Grid::with_history(cols, lines, 0),
            active_is_alt: false,
            mode: TermMode::default(),
            palette: Palette::new(),
            charset: CharsetState::default(),
            title: String::new(),
            title_stack: Vec::new(),
            cursor_shape: CursorShape::default(),
            grapheme: GraphemeState::default(),
            listener,
        }
    }

    /// Reference to the active grid.
    pub fn grid(&self) -> &Grid {
        if self.active_is_alt { &self.alt_grid } else { &self.grid }
    }

    /// Mutable reference to the active grid.
    pub fn grid_mut(&mut self) -> &mut Grid {
        if self.active_is_alt { &mut self.alt_grid } else { &mut self.grid }
    }

    /// The primary grid regardless of which one is active.
    pub fn primary_grid(&self) -> &Grid {
        &self.grid
    }

    pub fn mode(&self) -> TermMode {
        self.mode
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor_shape(&self) -> CursorShape {
        self.cursor_shape
    }

    pub fn listener(&self) -> &T {
        &self.listener
    }

    pub fn is_alt_screen(&self) -> bool {
        self.active_is_alt
    }

    pub fn cols(&self) -> usize {
        self.grid().cols
    }

    pub fn lines(&self) -> usize {
        self.grid().lines
    }

    /// Resize both grids. The primary reflows; the alternate truncates.
    pub fn resize(&mut self, cols: usize, lines: usize) {
        self.grid.resize(cols, lines, true);
        self.alt_grid.resize(cols, lines, false);
    }

    /// Change the primary grid's scrollback bound.
    pub fn set_history_limit(&mut self, limit: usize) {
        self.grid.set_history_limit(limit);
    }

    /// Whether any visible row changed since damage was last consumed.
    pub fn any_damage(&self) -> bool {
        self.grid().dirty().any_dirty()
    }

    /// Take and clear the damaged-row set of the active grid.
    pub fn consume_damage(&mut self) -> Vec<usize> {
        self.grid_mut().dirty_mut().consume()
    }

    pub(super) fn emit(&self, event: ScreenEvent) {
        self.listener.send_event(event);
    }

    /// Switch to the alternate screen (mode 1049/47).
    pub(super) fn swap_alt_screen(&mut self, save_cursor: bool) {
        if !self.active_is_alt {
            if save_cursor {
                self.grid.save_cursor();
            }
            self.active_is_alt = true;
            self.alt_grid.clear_all();
            self.mode.insert(TermMode::ALT_SCREEN);
            self.alt_grid.dirty_mut().mark_all();
        }
    }

    /// Switch back to the primary screen.
    pub(super) fn restore_primary_screen(&mut self, restore_cursor: bool) {
        if self.active_is_alt {
            self.active_is_alt = false;
            if restore_cursor {
                self.grid.restore_cursor();
            }
            self.mode.remove(TermMode::ALT_SCREEN);
            self.grid.dirty_mut().mark_all();
        }
    }
}

impl<T: EventListener> vte::ansi::Handler for Screen<T> {
    fn input(&mut self, c: char) {
        self.handle_input(c);
    }

    fn goto(&mut self, line: i32, col: usize) {
        self.handle_goto(line, col);
    }

    fn goto_line(&mut self, line: i32) {
        self.handle_goto_line(line);
    }

    fn goto_col(&mut self, col: usize) {
        self.handle_goto_col(col);
    }

    fn move_up(&mut self, n: usize) {
        self.handle_move_up(n);
    }

    fn move_down(&mut self, n: usize) {
        self.handle_move_down(n);
    }

    fn move_forward(&mut self, n: usize) {
        self.handle_move_forward(n);
    }

    fn move_backward(&mut self, n: usize) {
        self.handle_move_backward(n);
    }

    fn move_down_and_cr(&mut self, n: usize) {
        self.handle_move_down_and_cr(n);
    }

    fn move_up_and_cr(&mut self, n: usize) {
        self.handle_move_up_and_cr(n);
    }

    fn save_cursor_position(&mut self) {
        self.handle_save_cursor_position();
    }

    fn restore_cursor_position(&mut self) {
        self.handle_restore_cursor_position();
    }

    fn terminal_attribute(&mut self, attr: vte::ansi::Attr) {
        self.handle_terminal_attribute(attr);
    }

    fn set_color(&mut self, index: usize, color: vte::ansi::Rgb) {
        self.handle_set_color(index, color);
    }

    fn reset_color(&mut self, index: usize) {
        self.handle_reset_color(index);
    }

    fn set_hyperlink(&mut self, hyperlink: Option<vte::ansi::Hyperlink>) {
        self.handle_set_hyperlink(hyperlink);
    }

    fn set_cursor_style(&mut self, style: Option<vte::ansi::CursorStyle>) {
        self.handle_set_cursor_style(style);
    }

    fn set_cursor_shape(&mut self, shape: CursorShape) {
        self.handle_set_cursor_shape(shape);
    }

    fn dynamic_color_sequence(&mut self, prefix: String, index: usize, terminator: &str) {
        self.handle_dynamic_color_sequence(prefix, index, terminator);
    }

    fn clear_screen(&mut self, mode: vte::ansi::ClearMode) {
        self.handle_clear_screen(mode);
    }

    fn clear_line(&mut self, mode: vte::ansi::LineClearMode) {
        self.handle_clear_line(mode);
    }

    fn clear_tabs(&mut self, mode: vte::ansi::TabulationClearMode) {
        self.handle_clear_tabs(mode);
    }

    fn erase_chars(&mut self, count: usize) {
        self.handle_erase_chars(count);
    }

    fn delete_chars(&mut self, count: usize) {
        self.handle_delete_chars(count);
    }

    fn insert_blank(&mut self, count: usize) {
        self.handle_insert_blank(count);
    }

    fn insert_blank_lines(&mut self, count: usize) {
        self.handle_insert_blank_lines(count);
    }

    fn delete_lines(&mut self, count: usize) {
        self.handle_delete_lines(count);
    }

    fn scroll_up(&mut self, count: usize) {
        self.handle_scroll_up(count);
    }

    fn scroll_down(&mut self, count: usize) {
        self.handle_scroll_down(count);
    }

    fn set_scrolling_region(&mut self, top: usize, bottom: Option<usize>) {
        self.handle_set_scrolling_region(top, bottom);
    }

    fn reverse_index(&mut self) {
        self.handle_reverse_index();
    }

    fn linefeed(&mut self) {
        self.handle_linefeed();
    }

    fn carriage_return(&mut self) {
        self.handle_carriage_return();
    }

    fn backspace(&mut self) {
        self.handle_backspace();
    }

    fn newline(&mut self) {
        self.handle_newline();
    }

    fn put_tab(&mut self, count: u16) {
        self.handle_put_tab(count);
    }

    fn move_forward_tabs(&mut self, count: u16) {
        self.handle_put_tab(count);
    }

    fn move_backward_tabs(&mut self, count: u16) {
        self.handle_move_backward_tabs(count);
    }

    fn set_horizontal_tabstop(&mut self) {
        self.handle_set_horizontal_tabstop();
    }

    fn set_mode(&mut self, mode: vte::ansi::Mode) {
        self.handle_set_mode(mode);
    }

    fn unset_mode(&mut self, mode: vte::ansi::Mode) {
        self.handle_unset_mode(mode);
    }

    fn set_private_mode(&mut self, mode: vte::ansi::PrivateMode) {
        self.handle_set_private_mode(mode);
    }

    fn unset_private_mode(&mut self, mode: vte::ansi::PrivateMode) {
        self.handle_unset_private_mode(mode);
    }

    fn set_keypad_application_mode(&mut self) {
        self.handle_set_keypad_application_mode();
    }

    fn unset_keypad_application_mode(&mut self) {
        self.handle_unset_keypad_application_mode();
    }

    fn report_mode(&mut self, mode: vte::ansi::Mode) {
        self.handle_report_mode(mode);
    }

    fn report_private_mode(&mut self, mode: vte::ansi::PrivateMode) {
        self.handle_report_private_mode(mode);
    }

    fn device_status(&mut self, status: usize) {
        self.handle_device_status(status);
    }

    fn identify_terminal(&mut self, intermediate: Option<char>) {
        self.handle_identify_terminal(intermediate);
    }

    fn text_area_size_chars(&mut self) {
        self.handle_text_area_size_chars();
    }

    fn bell(&mut self) {
        self.handle_bell();
    }

    fn decaln(&mut self) {
        self.handle_decaln();
    }

    fn reset_state(&mut self) {
        self.handle_reset_state();
    }

    fn set_title(&mut self, title: Option<String>) {
        self.handle_set_title(title);
    }

    fn push_title(&mut self) {
        self.handle_push_title();
    }

    fn pop_title(&mut self) {
        self.handle_pop_title();
    }

    fn configure_charset(&mut self, index: vte::ansi::CharsetIndex, charset: vte::ansi::StandardCharset) {
        self.handle_configure_charset(index, charset);
    }

    fn set_active_charset(&mut self, index: vte::ansi::CharsetIndex) {
        self.handle_set_active_charset(index);
    }

    fn clipboard_store(&mut self, clipboard: u8, data: &[u8]) {
        self.handle_clipboard_store(clipboard, data);
    }

    fn clipboard_load(&mut self, clipboard: u8, terminator: &str) {
        self.handle_clipboard_load(clipboard, terminator);
    }

    fn substitute(&mut self) {
        self.handle_substitute();
    }
}
