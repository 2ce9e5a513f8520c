//! Session: an indexed collection of windows plus selection state.
//!
//! Windows are attached through winlinks (index → window id). A window
//! may be linked into any number of sessions; sessions only own the
//! edges, never the windows themselves.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::options::Options;
use crate::registry::{SessionId, WindowId};
use crate::window::WindowFlags;

pub struct Session {
    pub id: SessionId,
    pub name: String,
    /// Winlinks ordered by index.
    winlinks: BTreeMap<u16, WindowId>,
    current: Option<u16>,
    /// Previously current indices, most recent last.
    last_stack: Vec<u16>,
    pub options: Options,
    pub created: Instant,
    pub activity: Instant,
    /// Alert kinds already notified per winlink, cleared on visit.
    pub alerts_sent: BTreeMap<u16, WindowFlags>,
}

impl Session {
    pub fn new(id: SessionId, name: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            name,
            winlinks: BTreeMap::new(),
            current: None,
            last_stack: Vec::new(),
            options: Options::new(),
            created: now,
            activity: now,
            alerts_sent: BTreeMap::new(),
        }
    }

    pub fn winlinks(&self) -> impl Iterator<Item = (u16, WindowId)> + '_ {
        self.winlinks.iter().map(|(&i, &w)| (i, w))
    }

    pub fn is_empty(&self) -> bool {
        self.winlinks.is_empty()
    }

    pub fn window_at(&self, index: u16) -> Option<WindowId> {
        self.winlinks.get(&index).copied()
    }

    /// First index at which `window` is linked.
    pub fn index_of(&self, window: WindowId) -> Option<u16> {
        self.winlinks
            .iter()
            .find(|&(_, &w)| w == window)
            .map(|(&i, _)| i)
    }

    pub fn current_index(&self) -> Option<u16> {
        self.current
    }

    pub fn current_window(&self) -> Option<WindowId> {
        self.current.and_then(|i| self.window_at(i))
    }

    /// Link a window at `index`, or at the first free index at or above
    /// `base` when `None`. Returns the index used, or `None` if the
    /// requested index is taken.
    pub fn link_window(&mut self, window: WindowId, index: Option<u16>, base: u16) -> Option<u16> {
        let index = match index {
            Some(i) => {
                if self.winlinks.contains_key(&i) {
                    return None;
                }
                i
            }
            None => {
                let mut i = base;
                while self.winlinks.contains_key(&i) {
                    i += 1;
                }
                i
            }
        };
        self.winlinks.insert(index, window);
        if self.current.is_none() {
            self.current = Some(index);
        }
        Some(index)
    }

    /// Remove the winlink at `index`. The window itself lives on if
    /// other sessions link it. Returns the unlinked window.
    pub fn unlink_index(&mut self, index: u16) -> Option<WindowId> {
        let window = self.winlinks.remove(&index)?;
        self.last_stack.retain(|&i| i != index);
        self.alerts_sent.remove(&index);

        if self.current == Some(index) {
            // Prefer the most recent surviving index from the last
            // stack, then the nearest neighbor.
            self.current = self
                .last_stack
                .pop()
                .filter(|i| self.winlinks.contains_key(i))
                .or_else(|| self.nearest_index(index));
        }
        Some(window)
    }

    fn nearest_index(&self, gone: u16) -> Option<u16> {
        let below = self.winlinks.range(..gone).next_back().map(|(&i, _)| i);
        let above = self.winlinks.range(gone..).next().map(|(&i, _)| i);
        below.into_iter().chain(above).min_by_key(|&i| {
            if i < gone { gone - i } else { i - gone }
        })
    }

    /// Make `index` current, pushing the previous current onto the last
    /// stack. Visiting clears pending alert bookkeeping for the index.
    pub fn select_index(&mut self, index: u16) -> Option<WindowId> {
        let window = self.window_at(index)?;
        if self.current != Some(index) {
            if let Some(prev) = self.current {
                self.last_stack.retain(|&i| i != prev);
                self.last_stack.push(prev);
            }
            self.current = Some(index);
        }
        self.alerts_sent.remove(&index);
        self.activity = Instant::now();
        Some(window)
    }

    /// Switch to the next-higher index, wrapping around.
    pub fn next_window(&mut self) -> Option<WindowId> {
        let current = self.current?;
        let next = self
            .winlinks
            .range(current + 1..)
            .next()
            .or_else(|| self.winlinks.iter().next())
            .map(|(&i, _)| i)?;
        self.select_index(next)
    }

    /// Switch to the next-lower index, wrapping around.
    pub fn previous_window(&mut self) -> Option<WindowId> {
        let current = self.current?;
        let prev = self
            .winlinks
            .range(..current)
            .next_back()
            .or_else(|| self.winlinks.iter().next_back())
            .map(|(&i, _)| i)?;
        self.select_index(prev)
    }

    /// Switch to the most recently used other window.
    pub fn last_window(&mut self) -> Option<WindowId> {
        while let Some(index) = self.last_stack.pop() {
            if self.winlinks.contains_key(&index) {
                return self.select_index(index);
            }
        }
        None
    }

    /// Re-index all winlinks contiguously from `base`, keeping order.
    /// The current winlink follows its window to the new index.
    pub fn renumber(&mut self, base: u16) {
        let old: Vec<(u16, WindowId)> = self.winlinks.iter().map(|(&i, &w)| (i, w)).collect();
        let current_window = self.current_window();

        let mut mapping: BTreeMap<u16, u16> = BTreeMap::new();
        self.winlinks.clear();
        for (new_offset, (old_index, window)) in old.iter().enumerate() {
            let new_index = base + new_offset as u16;
            self.winlinks.insert(new_index, *window);
            mapping.insert(*old_index, new_index);
        }

        self.current = current_window
            .and_then(|w| self.index_of(w))
            .or_else(|| self.winlinks.keys().next().copied());
        self.last_stack = self
            .last_stack
            .iter()
            .filter_map(|i| mapping.get(i).copied())
            .collect();
        self.alerts_sent = std::mem::take(&mut self.alerts_sent)
            .into_iter()
            .filter_map(|(i, f)| mapping.get(&i).map(|&ni| (ni, f)))
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(SessionId(0), "work".into())
    }

    fn w(n: u32) -> WindowId {
        WindowId(n)
    }

    #[test]
    fn linking_assigns_first_free_index() {
        let mut s = session();
        assert_eq!(s.link_window(w(0), None, 0), Some(0));
        assert_eq!(s.link_window(w(1), None, 0), Some(1));
        assert_eq!(s.link_window(w(2), Some(5), 0), Some(5));
        assert_eq!(s.link_window(w(3), None, 0), Some(2));
    }

    #[test]
    fn duplicate_index_refused() {
        let mut s = session();
        s.link_window(w(0), Some(1), 0);
        assert_eq!(s.link_window(w(1), Some(1), 0), None);
    }

    #[test]
    fn first_link_becomes_current() {
        let mut s = session();
        s.link_window(w(0), None, 0);
        assert_eq!(s.current_window(), Some(w(0)));
    }

    #[test]
    fn next_and_previous_wrap() {
        let mut s = session();
        for n in 0..3 {
            s.link_window(w(n), None, 0);
        }
        assert_eq!(s.next_window(), Some(w(1)));
        assert_eq!(s.next_window(), Some(w(2)));
        assert_eq!(s.next_window(), Some(w(0)));
        assert_eq!(s.previous_window(), Some(w(2)));
    }

    #[test]
    fn last_window_restores_previous() {
        let mut s = session();
        for n in 0..3 {
            s.link_window(w(n), None, 0);
        }
        s.select_index(2);
        s.select_index(1);
        assert_eq!(s.last_window(), Some(w(2)));
        assert_eq!(s.last_window(), Some(w(1)));
    }

    #[test]
    fn unlink_moves_current_to_neighbor() {
        let mut s = session();
        for n in 0..3 {
            s.link_window(w(n), None, 0);
        }
        s.select_index(1);
        assert_eq!(s.unlink_index(1), Some(w(1)));
        // Current falls back to the most recent from the last stack.
        assert_eq!(s.current_index(), Some(0));
    }

    #[test]
    fn unlink_last_link_leaves_session_empty() {
        let mut s = session();
        s.link_window(w(0), None, 0);
        s.unlink_index(0);
        assert!(s.is_empty());
        assert_eq!(s.current_index(), None);
    }

    #[test]
    fn renumber_compacts_and_keeps_current_window() {
        let mut s = session();
        s.link_window(w(0), Some(2), 0);
        s.link_window(w(1), Some(5), 0);
        s.link_window(w(2), Some(9), 0);
        s.select_index(9);

        s.renumber(0);
        let indices: Vec<u16> = s.winlinks().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        // The current window kept its identity under a new index.
        assert_eq!(s.current_window(), Some(w(2)));
        assert_eq!(s.current_index(), Some(2));
    }

    #[test]
    fn renumber_respects_base_index() {
        let mut s = session();
        s.link_window(w(0), Some(0), 0);
        s.link_window(w(1), Some(7), 0);
        s.renumber(1);
        let indices: Vec<u16> = s.winlinks().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2]);
    }

    #[test]
    fn no_duplicate_indices_ever() {
        let mut s = session();
        for n in 0..10 {
            s.link_window(w(n), None, 0);
        }
        let indices: Vec<u16> = s.winlinks().map(|(i, _)| i).collect();
        let mut dedup = indices.clone();
        dedup.dedup();
        assert_eq!(indices, dedup);
    }
}
