//! rmux: a terminal multiplexer.
//!
//! One server process owns sessions, windows, and panes; any number of
//! clients attach over a Unix socket and view one session each. Panes are
//! real PTYs driven through `rmux_core`'s terminal emulation. The server
//! is a single-threaded readiness loop — all state lives in [`server::Server`]
//! and is only touched between poll wakeups.

pub mod alerts;
pub mod cli;
pub mod client;
pub mod client_run;
pub mod command;
pub mod input;
pub mod layout;
pub mod options;
pub mod pane;
pub mod paste;
pub mod protocol;
pub mod registry;
pub mod render;
pub mod server;
pub mod session;
pub mod socket;
pub mod window;

/// Protocol version spoken on the control socket. Mismatches are fatal at
/// IDENTIFY time.
pub const PROTOCOL_VERSION: u32 = 1;
