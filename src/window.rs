//! Window: an ordered set of panes tiled by one layout tree.

use bitflags::bitflags;

use crate::layout::{Direction, Layout};
use crate::options::Options;
use crate::registry::{PaneId, WindowId};

bitflags! {
    /// Alert flags, set by the alert pipeline and cleared when the
    /// window is visited.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowFlags: u8 {
        const BELL     = 1 << 0;
        const ACTIVITY = 1 << 1;
        const SILENCE  = 1 << 2;
    }
}

pub struct Window {
    pub id: WindowId,
    pub name: String,
    /// Panes in insertion order.
    panes: Vec<PaneId>,
    active: Option<PaneId>,
    /// Previous active pane (depth-1 stack).
    last_active: Option<PaneId>,
    pub layout: Layout,
    pub flags: WindowFlags,
    pub options: Options,
    /// Applied size in cells.
    size: (u16, u16),
    /// Marked when the last pane leaves; swept at end of tick.
    pub dead: bool,
}

impl Window {
    pub fn new(id: WindowId, name: String, first_pane: PaneId, cols: u16, rows: u16) -> Self {
        Self {
            id,
            name,
            panes: vec![first_pane],
            active: Some(first_pane),
            last_active: None,
            layout: Layout::single(first_pane, cols, rows),
            flags: WindowFlags::empty(),
            options: Options::new(),
            size: (cols, rows),
            dead: false,
        }
    }

    pub fn size(&self) -> (u16, u16) {
        self.size
    }

    pub fn panes(&self) -> &[PaneId] {
        &self.panes
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        self.panes.contains(&pane)
    }

    pub fn active_pane(&self) -> Option<PaneId> {
        self.active
    }

    /// Insert a pane after `after` (or at the end). The caller has
    /// already placed it in the layout.
    pub fn add_pane(&mut self, pane: PaneId, after: Option<PaneId>) {
        let pos = after
            .and_then(|a| self.panes.iter().position(|&p| p == a))
            .map_or(self.panes.len(), |p| p + 1);
        self.panes.insert(pos, pane);
    }

    /// Drop a pane from the set and the layout. Returns true when the
    /// window is now empty (and should be destroyed).
    pub fn remove_pane(&mut self, pane: PaneId) -> bool {
        self.panes.retain(|&p| p != pane);
        self.layout.close(pane);

        if self.last_active == Some(pane) {
            self.last_active = None;
        }
        if self.active == Some(pane) {
            // Fall back to the last-active pane, then to the first.
            self.active = self.last_active.take().or_else(|| self.panes.first().copied());
        }
        self.panes.is_empty()
    }

    /// Make `pane` active, pushing the previous active pane onto the
    /// depth-1 last stack.
    pub fn set_active(&mut self, pane: PaneId) -> bool {
        if !self.contains(pane) {
            return false;
        }
        if self.active != Some(pane) {
            self.last_active = self.active;
            self.active = Some(pane);
        }
        true
    }

    /// Switch to the previously active pane.
    pub fn select_last(&mut self) -> Option<PaneId> {
        let last = self.last_active?;
        if self.contains(last) {
            self.set_active(last);
            Some(last)
        } else {
            self.last_active = None;
            None
        }
    }

    /// Nearest pane in `dir` from the active one; adjacency ties go to
    /// the most recently active candidate.
    pub fn select_direction(&mut self, dir: Direction) -> Option<PaneId> {
        let from = self.active?;
        let candidates = self.layout.neighbors(from, dir);
        let pick = candidates
            .iter()
            .find(|&&c| Some(c) == self.last_active)
            .copied()
            .or_else(|| candidates.first().copied())?;
        self.set_active(pick);
        Some(pick)
    }

    /// Apply a new window size: retile the layout and report the new
    /// per-pane rectangles for PTY resizes.
    pub fn apply_size(&mut self, cols: u16, rows: u16) -> bool {
        if self.size == (cols, rows) {
            return false;
        }
        self.size = (cols, rows);
        self.layout.resize(cols, rows);
        true
    }
}
