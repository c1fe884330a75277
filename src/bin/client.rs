use std::{
    io::{self, BufRead},
    process::ExitCode,
};

use clap::Parser;
use log::error;
use tcpserver::{Client, ClientError};

/// Sends each message as one frame and prints the echo
#[derive(Parser, Debug)]
#[command(name = "client", version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:1234")]
    addr: String,

    /// Messages to send; read from stdin line by line when empty
    messages: Vec<String>,
}

fn run(args: Args) -> Result<(), ClientError> {
    let mut client = Client::connect(args.addr.as_str())?;

    let mut exchange = |msg: &str| -> Result<(), ClientError> {
        let reply = client.request(msg.as_bytes())?;
        println!("server says: {}", String::from_utf8_lossy(&reply));
        Ok(())
    };

    if !args.messages.is_empty() {
        for msg in &args.messages {
            exchange(msg)?;
        }
        return Ok(());
    }

    for line in io::stdin().lock().lines() {
        exchange(&line?)?;
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::builder().init();

    if let Err(e) = run(Args::parse()) {
        error!("{e}");
        eprintln!("client: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
