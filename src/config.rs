use std::{net::SocketAddr, time::Duration};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:1234";
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_EVENTS_CAPACITY: usize = 128;

/// Settings for [`crate::Server::bind`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Upper bound on a single readiness wait.
    pub poll_timeout: Duration,
    /// How many readiness events one poll call can return.
    pub events_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 1234)),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            events_capacity: DEFAULT_EVENTS_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_events_capacity(mut self, capacity: usize) -> Self {
        // epoll_wait rejects a zero sized event list
        self.events_capacity = capacity.max(1);
        self
    }
}
