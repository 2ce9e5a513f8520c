//! Title, clipboard, and miscellaneous OSC operations.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use vte::ansi::{CharsetIndex, StandardCharset};

use crate::event::{EventListener, ScreenEvent};

use super::Screen;

impl<T: EventListener> Screen<T> {
    pub(super) fn handle_set_title(&mut self, title: Option<String>) {
        if let Some(t) = title {
            self.title = t.clone();
            self.emit(ScreenEvent::Title(t));
        }
    }

    pub(super) fn handle_push_title(&mut self) {
        self.title_stack.push(self.title.clone());
    }

    pub(super) fn handle_pop_title(&mut self) {
        if let Some(t) = self.title_stack.pop() {
            self.title = t.clone();
            self.emit(ScreenEvent::Title(t));
        }
    }

    pub(super) fn handle_configure_charset(
        &mut self,
        index: CharsetIndex,
        charset: StandardCharset,
    ) {
        self.charset.set_charset(index, charset);
    }

    pub(super) fn handle_set_active_charset(&mut self, index: CharsetIndex) {
        self.charset.set_active(index);
    }

    /// OSC 52 store: decode and hand the text to the owner. Invalid
    /// base64 is dropped.
    pub(super) fn handle_clipboard_store(&mut self, clipboard: u8, data: &[u8]) {
        if let Ok(decoded) = BASE64.decode(data) {
            if let Ok(text) = String::from_utf8(decoded) {
                self.emit(ScreenEvent::ClipboardStore(clipboard, text));
            }
        }
    }

    /// OSC 52 load: applications may not read other panes' clipboards, so
    /// always answer with an empty payload.
    pub(super) fn handle_clipboard_load(&mut self, clipboard: u8, terminator: &str) {
        let selector = clipboard as char;
        let response = format!("\x1b]52;{selector};{terminator}");
        self.emit(ScreenEvent::PtyWrite(response.into_bytes()));
    }

    /// SUB — shows up as a replacement space.
    pub(super) fn handle_substitute(&mut self) {
        self.grid_mut().put_char(' ');
    }
}
