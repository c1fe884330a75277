use crate::{
    ServerError,
    connection::{Connection, ConnectionState},
};
use log::{trace, warn};
use mio::{Interest, Registry, Token};
use std::io;

/// Owning index from connection handle to [`Connection`].
///
/// Slots are indexed by the token value (the socket descriptor) and the
/// table grows to fit the highest one seen. Each connection's socket
/// registration with the poller is kept in step with its slot.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    slots: Vec<Option<Connection>>,
    live: usize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Size of the index space, live or not.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Stores `conn` under its token and registers its socket with the poller.
    ///
    /// On failure `conn` is dropped here, which closes its socket.
    pub fn register(&mut self, mut conn: Connection, registry: &Registry) -> Result<Token, ServerError> {
        let token = conn.token();
        let idx = token.0;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        if self.slots[idx].is_some() {
            return Err(ServerError::SlotOccupied(token));
        }

        let interest = conn.interest().unwrap_or(Interest::READABLE);
        registry.register(conn.stream_mut(), token, interest)?;
        conn.set_registered(interest);

        self.slots[idx] = Some(conn);
        self.live += 1;
        trace!(target: "registry", "registered {token:?}, {} live", self.live);
        Ok(token)
    }

    pub fn lookup(&self, token: Token) -> Option<&Connection> {
        self.slots.get(token.0).and_then(Option::as_ref)
    }

    pub fn lookup_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.slots.get_mut(token.0).and_then(Option::as_mut)
    }

    pub fn tokens(&self) -> impl Iterator<Item = Token> + '_ {
        self.slots.iter().flatten().map(|c| c.token())
    }

    /// Re-registers the socket if the connection now waits for a different
    /// kind of readiness.
    pub fn refresh(&mut self, token: Token, registry: &Registry) -> io::Result<()> {
        let Some(conn) = self.lookup_mut(token) else {
            return Ok(());
        };
        let Some(interest) = conn.interest() else {
            return Ok(());
        };
        if conn.registered() != Some(interest) {
            registry.reregister(conn.stream_mut(), token, interest)?;
            conn.set_registered(interest);
        }
        Ok(())
    }

    /// Deregisters and drops the connection, closing its socket and freeing
    /// the slot. Returns the state it was in.
    pub fn remove(&mut self, token: Token, registry: &Registry) -> Option<ConnectionState> {
        let mut conn = self.slots.get_mut(token.0)?.take()?;
        self.live -= 1;
        if let Err(e) = registry.deregister(conn.stream_mut()) {
            warn!(target: "registry", "deregister {token:?} failed: {e}");
        }
        trace!(target: "registry", "removed {token:?}, {} live", self.live);
        Some(conn.into_state())
    }
}
