//! Core terminal emulation for rmux.
//!
//! This crate provides the per-pane emulation state: cell representation,
//! grid storage with scrollback and reflow, damage tracking, and the
//! `Screen` state machine that consumes `vte` escape-sequence events. It
//! contains no I/O, no PTY handling, and no knowledge of windows, sessions,
//! or clients — the `rmux` server crate layers those on top.

#![deny(unsafe_code)]

pub mod cell;
pub mod charset;
pub mod event;
pub mod grid;
pub mod mode;
pub mod palette;
pub mod screen;

pub use cell::{Cell, CellExtra, CellFlags};
pub use charset::CharsetState;
pub use event::{EventQueue, EventListener, ScreenEvent, VoidListener};
pub use grid::{Cursor, DirtyTracker, Grid, Row};
pub use mode::TermMode;
pub use palette::Palette;
pub use screen::Screen;
