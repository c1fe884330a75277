use std::{net::SocketAddr, process::ExitCode, time::Duration};

use clap::Parser;
use log::error;
use tcpserver::{
    Server, ServerConfig,
    config::{DEFAULT_EVENTS_CAPACITY, DEFAULT_LISTEN},
};

/// Length prefixed echo server
#[derive(Parser, Debug)]
#[command(name = "tcpserver", version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_LISTEN)]
    listen: SocketAddr,

    /// Upper bound on one readiness wait, in milliseconds
    #[arg(long, default_value_t = 1000)]
    poll_timeout_ms: u64,

    /// Readiness events handled per poll call
    #[arg(long, default_value_t = DEFAULT_EVENTS_CAPACITY)]
    events: usize,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ServerConfig::default()
        .with_listen(args.listen)
        .with_poll_timeout(Duration::from_millis(args.poll_timeout_ms))
        .with_events_capacity(args.events);

    let result = Server::bind(&config).and_then(|mut server| server.run());
    if let Err(e) = result {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
