use clap::Parser;

use rmux::cli::{Cli, Cmd};
use rmux::{client_run, server, socket};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let socket_path = cli
        .socket_path
        .clone()
        .unwrap_or_else(|| socket::socket_path(&cli.label));

    if matches!(cli.command, Some(Cmd::Server)) {
        match server::event_loop::run(&socket_path) {
            Ok(()) => std::process::exit(0),
            Err(e) => {
                log::error!("server failed: {e}");
                std::process::exit(2);
            }
        }
    }

    let argv = cli.to_command_argv();
    let code = client_run::run(&cli.label, cli.socket_path.as_deref(), argv);
    std::process::exit(code);
}
