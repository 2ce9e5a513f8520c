//! Screen event types and listener traits.
//!
//! Events flow outward from the `Screen` state machine to whoever owns the
//! pane. The `EventListener` trait decouples the emulation core from the
//! server: tests use `VoidListener`, the server drains an `EventQueue`
//! after each chunk of PTY bytes.

use std::cell::RefCell;
use std::fmt;

/// Events produced while processing escape sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenEvent {
    /// BEL character received.
    Bell,
    /// Pane title changed (OSC 0/2).
    Title(String),
    /// Response bytes to write back to the PTY (DA, DSR, DECRPM, OSC
    /// queries).
    PtyWrite(Vec<u8>),
    /// OSC 52 clipboard store: selector byte and decoded text.
    ClipboardStore(u8, String),
    /// The application toggled a mode the outer layers care about
    /// (mouse reporting, bracketed paste, focus events).
    ModesChanged,
}

impl fmt::Display for ScreenEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bell => write!(f, "Bell"),
            Self::Title(t) => write!(f, "Title({t})"),
            Self::PtyWrite(b) => write!(f, "PtyWrite({} bytes)", b.len()),
            Self::ClipboardStore(sel, text) => {
                write!(f, "ClipboardStore({sel}, {} chars)", text.len())
            }
            Self::ModesChanged => write!(f, "ModesChanged"),
        }
    }
}

/// Receives events from a `Screen`.
///
/// The default implementation is a no-op, so `VoidListener` needs no
/// method body. Everything runs on the server's single thread, so no
/// `Send` bound is required.
pub trait EventListener {
    /// Handle a screen event. Default: no-op.
    fn send_event(&self, _event: ScreenEvent) {}
}

/// No-op event listener for tests and headless operation.
pub struct VoidListener;

impl EventListener for VoidListener {}

/// Accumulates events for the owner to drain after each parser advance.
#[derive(Default)]
pub struct EventQueue {
    events: RefCell<Vec<ScreenEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all queued events, oldest first.
    pub fn drain(&self) -> Vec<ScreenEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Whether any event is pending.
    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

impl EventListener for EventQueue {
    fn send_event(&self, event: ScreenEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_accumulates_in_order() {
        let queue = EventQueue::new();
        queue.send_event(ScreenEvent::Bell);
        queue.send_event(ScreenEvent::Title("vim".into()));

        let events = queue.drain();
        assert_eq!(events, vec![ScreenEvent::Bell, ScreenEvent::Title("vim".into())]);
        assert!(queue.is_empty());
    }

    #[test]
    fn drain_resets_queue() {
        let queue = EventQueue::new();
        queue.send_event(ScreenEvent::Bell);
        assert_eq!(queue.drain().len(), 1);
        assert_eq!(queue.drain().len(), 0);
    }

    #[test]
    fn void_listener_ignores_everything() {
        VoidListener.send_event(ScreenEvent::Bell);
    }
}
