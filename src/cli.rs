//! Command-line surface.
//!
//! `rmux [global flags] <subcommand> [args]`. Subcommands map onto
//! COMMAND frames; the hidden `server` subcommand is how a spawned
//! server process starts.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "rmux", about = "A terminal multiplexer", version)]
pub struct Cli {
    /// Socket label under the per-user socket directory.
    #[arg(short = 'L', long = "socket-name", default_value = "default", global = true)]
    pub label: String,

    /// Full path to the control socket (overrides -L).
    #[arg(short = 'S', long = "socket-path", global = true)]
    pub socket_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Cmd>,
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Create a new session (and attach unless -d).
    #[command(name = "new-session", alias = "new")]
    NewSession {
        /// Do not attach; create detached.
        #[arg(short = 'd')]
        detached: bool,
        /// Session name.
        #[arg(short = 's')]
        name: Option<String>,
        /// Working directory for the initial pane.
        #[arg(short = 'c')]
        cwd: Option<String>,
        /// Width when created detached.
        #[arg(short = 'x')]
        width: Option<u16>,
        /// Height when created detached.
        #[arg(short = 'y')]
        height: Option<u16>,
        /// Command to run instead of the default shell.
        #[arg(trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Attach to an existing session.
    #[command(name = "attach-session", aliases = ["attach", "a"])]
    AttachSession {
        /// Target session name or `$id`.
        #[arg(short = 't')]
        target: Option<String>,
    },

    /// Detach a client.
    #[command(name = "detach-client", alias = "detach")]
    DetachClient {
        /// Detach all other clients of the session instead.
        #[arg(short = 'a')]
        all_others: bool,
        #[arg(short = 't')]
        target: Option<String>,
    },

    /// Stop the server and every session.
    #[command(name = "kill-server")]
    KillServer,

    /// Any other server command, passed through verbatim
    /// (list-sessions, split-window, send-keys, set-option, ...).
    #[command(external_subcommand)]
    Passthrough(Vec<String>),

    /// Run the server in the foreground (normally spawned internally).
    #[command(name = "server", hide = true)]
    Server,
}

impl Cli {
    /// Flatten the parsed subcommand back into the server's argv form.
    pub fn to_command_argv(&self) -> Vec<String> {
        let mut argv = Vec::new();
        match &self.command {
            None => argv.push("attach-session".to_string()),
            Some(Cmd::NewSession { detached, name, cwd, width, height, command }) => {
                argv.push("new-session".to_string());
                if *detached {
                    argv.push("-d".to_string());
                }
                if let Some(n) = name {
                    argv.extend(["-s".to_string(), n.clone()]);
                }
                if let Some(c) = cwd {
                    argv.extend(["-c".to_string(), c.clone()]);
                }
                if let Some(x) = width {
                    argv.extend(["-x".to_string(), x.to_string()]);
                }
                if let Some(y) = height {
                    argv.extend(["-y".to_string(), y.to_string()]);
                }
                argv.extend(command.iter().cloned());
            }
            Some(Cmd::AttachSession { target }) => {
                argv.push("attach-session".to_string());
                if let Some(t) = target {
                    argv.extend(["-t".to_string(), t.clone()]);
                }
            }
            Some(Cmd::DetachClient { all_others, target }) => {
                argv.push("detach-client".to_string());
                if *all_others {
                    argv.push("-a".to_string());
                }
                if let Some(t) = target {
                    argv.extend(["-t".to_string(), t.clone()]);
                }
            }
            Some(Cmd::KillServer) => argv.push("kill-server".to_string()),
            Some(Cmd::Passthrough(args)) => argv.extend(args.iter().cloned()),
            Some(Cmd::Server) => {}
        }
        argv
    }
}
