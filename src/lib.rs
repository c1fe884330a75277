pub mod buffer;
pub mod client;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod util;

pub use client::{Client, ClientError};
pub use config::ServerConfig;
pub use connection::{CloseReason, Connection, ConnectionState, Progress};
pub use registry::ConnectionRegistry;
pub use server::Server;

use std::net::SocketAddr;

use mio::Token;
use thiserror::Error;

/// Errors that stop the event loop. Anything that only concerns a single
/// connection ends up as a [`CloseReason`] instead.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Derived IO error
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Creating or waiting on the poller failed
    #[error("Poll error: {0}")]
    Poll(#[source] std::io::Error),

    /// A live connection already holds this handle
    #[error("Registry slot {0:?} is already occupied")]
    SlotOccupied(Token),
}
