use crate::{
    ServerError, ServerConfig,
    connection::{CloseReason, Connection, ConnectionState, Progress},
    registry::ConnectionRegistry,
    util::{handle_of, interrupted, would_block},
};
use log::{debug, info, trace, warn};
use mio::{Events, Interest, Poll, Registry, Token, net::TcpListener};
use std::{
    io, mem,
    net::SocketAddr,
    time::{Duration, Instant},
};

/// Single threaded echo server driven by one readiness loop.
pub struct Server {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    listener_token: Token,
    connections: ConnectionRegistry,
    poll_timeout: Duration,
    /// Accept stopped on an error with the backlog possibly non-empty.
    /// mio sends no new listener event for those, so retry every iteration.
    accept_pending: bool,
    /// Connections that used up their step budget and still have work.
    yielded: Vec<Token>,
    last_housekeeping: Instant,
}

impl Server {
    /// Binds the listener and registers it with a fresh poller.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let poll = Poll::new().map_err(ServerError::Poll)?;
        let mut listener = TcpListener::bind(config.listen).map_err(|source| ServerError::Bind {
            addr: config.listen,
            source,
        })?;

        // descriptors are unique, so the listener's never collides with a connection's
        let listener_token = handle_of(&listener);
        poll.registry()
            .register(&mut listener, listener_token, Interest::READABLE)?;
        info!("listening on {}", listener.local_addr()?);

        Ok(Self {
            poll,
            events: Events::with_capacity(config.events_capacity),
            listener,
            listener_token,
            connections: ConnectionRegistry::new(),
            poll_timeout: config.poll_timeout,
            accept_pending: false,
            yielded: Vec::new(),
            last_housekeeping: Instant::now(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// When housekeeping last ran.
    pub fn last_housekeeping(&self) -> Instant {
        self.last_housekeeping
    }

    /// Serves forever. Only returns on a poller failure.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            self.poll_once()?;
        }
    }

    /// One loop iteration: wait for readiness, service ready connections,
    /// then accept whatever is pending on the listener.
    pub fn poll_once(&mut self) -> Result<(), ServerError> {
        // yielded connections must not wait out a full timeout
        let timeout = if self.yielded.is_empty() {
            self.poll_timeout
        } else {
            Duration::ZERO
        };
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(ref e) if interrupted(e) => return Ok(()),
            Err(e) => return Err(ServerError::Poll(e)),
        }

        let retry = mem::take(&mut self.yielded);
        let mut listener_ready = false;
        for event in self.events.iter() {
            let token = event.token();
            if token == self.listener_token {
                listener_ready = true;
                continue;
            }
            trace!(target: "new_token", "event for {token:?}: {event:?}");
            if dispatch(&mut self.connections, self.poll.registry(), token) == Progress::Yielded {
                self.yielded.push(token);
            }
        }
        for token in retry {
            if self.yielded.contains(&token) {
                continue;
            }
            trace!(target: "new_token", "resuming {token:?}");
            if dispatch(&mut self.connections, self.poll.registry(), token) == Progress::Yielded {
                self.yielded.push(token);
            }
        }

        if listener_ready || self.accept_pending {
            self.accept();
        }

        if self.last_housekeeping.elapsed() >= self.poll_timeout {
            self.housekeeping();
        }
        Ok(())
    }

    fn accept(&mut self) {
        loop {
            let (stream, peer) = match self.listener.accept() {
                Ok(s) => s,
                Err(ref e) if would_block(e) => {
                    self.accept_pending = false;
                    return;
                }
                Err(ref e) if interrupted(e) => continue,
                Err(e) => {
                    // e.g. out of descriptors
                    warn!(target: "accept", "accept failed, will retry: {e}");
                    self.accept_pending = true;
                    return;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                debug!(target: "accept", "set_nodelay for {peer}: {e}");
            }

            let token = handle_of(&stream);
            match self
                .connections
                .register(Connection::new(stream, token), self.poll.registry())
            {
                Ok(token) => info!(target: "accept", "new connection from {peer} as {token:?}"),
                // the socket was dropped along with the connection
                Err(e) => warn!(target: "accept", "dropping connection from {peer}: {e}"),
            }
        }
    }

    fn housekeeping(&mut self) {
        trace!(
            target: "housekeeping",
            "{} live connections, {} yielded, accept pending: {}",
            self.connections.len(),
            self.yielded.len(),
            self.accept_pending
        );
        self.last_housekeeping = Instant::now();
    }
}

/// Runs the state machine of a ready connection and tears it down if it
/// ended up closing.
fn dispatch(connections: &mut ConnectionRegistry, registry: &Registry, token: Token) -> Progress {
    let Some(conn) = connections.lookup_mut(token) else {
        trace!(target: "new_token", "spurious wake for {token:?}");
        return Progress::Idle;
    };
    let progress = conn.ready();

    if !conn.is_closing() {
        match connections.refresh(token, registry) {
            Ok(()) => return progress,
            Err(e) => {
                if let Some(conn) = connections.lookup_mut(token) {
                    conn.close(CloseReason::Io(e));
                }
            }
        }
    }

    if let Some(ConnectionState::Closing(reason)) = connections.remove(token, registry) {
        match reason {
            CloseReason::Protocol(_) => warn!(target: "close", "closing {token:?}: {reason}"),
            _ => debug!(target: "close", "closing {token:?}: {reason}"),
        }
    }
    Progress::Idle
}
