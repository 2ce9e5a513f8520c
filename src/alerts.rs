//! Alert pipeline: bell, activity, and silence detection with per-tick
//! coalescing and routing to interested clients.
//!
//! Pane parsing raises window flags during the read phase; once per tick
//! the coalescer walks every (session, winlink) whose window raised a
//! monitored flag and delivers at most one notification per kind until
//! the winlink is visited again. Routing follows `bell-action` (and its
//! activity/silence siblings): `none`, `any`, `current`, or `other`,
//! with the audible/visual split from `visual-*`.

use std::time::{Duration, Instant};

use crate::registry::{SessionId, WindowId};
use crate::server::{Server, MESSAGE_TTL};
use crate::window::WindowFlags;

/// One alert category and its option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Bell,
    Activity,
    Silence,
}

impl AlertKind {
    pub fn flag(self) -> WindowFlags {
        match self {
            Self::Bell => WindowFlags::BELL,
            Self::Activity => WindowFlags::ACTIVITY,
            Self::Silence => WindowFlags::SILENCE,
        }
    }

    fn action_option(self) -> &'static str {
        match self {
            Self::Bell => "bell-action",
            Self::Activity => "activity-action",
            Self::Silence => "silence-action",
        }
    }

    fn visual_option(self) -> &'static str {
        match self {
            Self::Bell => "visual-bell",
            Self::Activity => "visual-activity",
            Self::Silence => "visual-silence",
        }
    }

    fn monitor_enabled(server: &Server, window: WindowId, kind: Self) -> bool {
        let chain = server.options_for_window(window);
        match kind {
            Self::Bell => chain.flag("monitor-bell"),
            Self::Activity => chain.flag("monitor-activity"),
            Self::Silence => chain.number("monitor-silence") > 0,
        }
    }

    fn describe(self, index: u16) -> String {
        match self {
            Self::Bell => format!("Bell in window {index}"),
            Self::Activity => format!("Activity in window {index}"),
            Self::Silence => format!("Silence in window {index}"),
        }
    }
}

const KINDS: [AlertKind; 3] = [AlertKind::Bell, AlertKind::Activity, AlertKind::Silence];

impl Server {
    /// Arm silence: windows monitored for silence whose panes have been
    /// quiet past the interval raise SILENCE.
    pub fn check_silence(&mut self, now: Instant) {
        let window_ids = self.windows.ids();
        for window_id in window_ids {
            let interval = self.options_for_window(window_id).number("monitor-silence");
            if interval <= 0 {
                continue;
            }
            let quiet_for = Duration::from_secs(interval as u64);
            let last = self
                .windows
                .get(window_id)
                .map(|w| w.panes().to_vec())
                .unwrap_or_default()
                .iter()
                .filter_map(|&p| self.panes.get(p))
                .map(|p| p.last_activity)
                .max();
            let Some(last) = last else { continue };

            if now.duration_since(last) >= quiet_for {
                let already = self
                    .windows
                    .get(window_id)
                    .is_some_and(|w| w.flags.contains(WindowFlags::SILENCE));
                if !already {
                    if let Some(w) = self.windows.get_mut(window_id) {
                        w.flags |= WindowFlags::SILENCE;
                    }
                    self.pending_alerts.push((window_id, WindowFlags::SILENCE));
                }
            }
        }
    }

    /// The earliest instant `check_silence` could have work to do.
    pub fn next_silence_deadline(&self, now: Instant) -> Option<Instant> {
        let mut next: Option<Instant> = None;
        for (window_id, window) in self.windows.iter() {
            let interval = self.options_for_window(window_id).number("monitor-silence");
            if interval <= 0 || window.flags.contains(WindowFlags::SILENCE) {
                continue;
            }
            let last = window
                .panes()
                .iter()
                .filter_map(|&p| self.panes.get(p))
                .map(|p| p.last_activity)
                .max();
            if let Some(last) = last {
                let deadline = last + Duration::from_secs(interval as u64);
                let deadline = deadline.max(now);
                next = Some(next.map_or(deadline, |n: Instant| n.min(deadline)));
            }
        }
        next
    }

    /// Once-per-tick coalescer: deliver pending alerts, at most one per
    /// (session, winlink, kind) until the winlink is visited.
    pub fn alerts_tick(&mut self) {
        let pending = std::mem::take(&mut self.pending_alerts);
        if pending.is_empty() {
            return;
        }

        // Collapse to one flag set per window for this tick.
        let mut per_window: Vec<(WindowId, WindowFlags)> = Vec::new();
        for (window, flags) in pending {
            match per_window.iter_mut().find(|(w, _)| *w == window) {
                Some((_, f)) => *f |= flags,
                None => per_window.push((window, flags)),
            }
        }

        for (window_id, raised) in per_window {
            for session_id in self.sessions_of_window(window_id) {
                self.deliver_window_alerts(session_id, window_id, raised);
            }
        }
    }

    fn deliver_window_alerts(
        &mut self,
        session_id: SessionId,
        window_id: WindowId,
        raised: WindowFlags,
    ) {
        let Some(index) = self.sessions.get(session_id).and_then(|s| s.index_of(window_id)) else {
            return;
        };
        let current = self
            .sessions
            .get(session_id)
            .and_then(|s| s.current_window())
            == Some(window_id);

        for kind in KINDS {
            if !raised.contains(kind.flag()) {
                continue;
            }
            if !AlertKind::monitor_enabled(self, window_id, kind) {
                continue;
            }

            // Activity on the window a client is looking at is not an
            // alert; the render shows it directly.
            if current && kind == AlertKind::Activity {
                continue;
            }

            // Coalescing: one notification per kind per visit.
            let sent = self
                .sessions
                .get(session_id)
                .and_then(|s| s.alerts_sent.get(&index).copied())
                .unwrap_or(WindowFlags::empty());
            if sent.contains(kind.flag()) {
                continue;
            }
            if let Some(s) = self.sessions.get_mut(session_id) {
                *s.alerts_sent.entry(index).or_insert(WindowFlags::empty()) |= kind.flag();
            }

            let chain = self.options_for_session(Some(session_id));
            let action = chain.choice(kind.action_option());
            let visual = chain.flag(kind.visual_option());

            let applies = match action {
                "any" => true,
                "none" => false,
                "current" => current,
                "other" => !current,
                _ => false,
            };
            if !applies {
                continue;
            }

            let message = kind.describe(index);
            for client_id in self.clients_of_session(session_id) {
                if let Some(client) = self.clients.get_mut(client_id) {
                    if visual {
                        // Visual: the status line carries the alert.
                        client.set_message(message.clone(), MESSAGE_TTL);
                    } else {
                        if kind == AlertKind::Bell {
                            client.queue_output(vec![0x07]);
                        }
                        // An alert in a window the session is not showing
                        // still names itself on the status line.
                        if !current {
                            client.set_message(message.clone(), MESSAGE_TTL);
                        }
                    }
                    client.needs_redraw = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_kind_flags_match() {
        assert_eq!(AlertKind::Bell.flag(), WindowFlags::BELL);
        assert_eq!(AlertKind::Activity.flag(), WindowFlags::ACTIVITY);
        assert_eq!(AlertKind::Silence.flag(), WindowFlags::SILENCE);
    }

    #[test]
    fn describe_names_the_window() {
        assert_eq!(AlertKind::Bell.describe(2), "Bell in window 2");
        assert_eq!(AlertKind::Silence.describe(0), "Silence in window 0");
    }
}
