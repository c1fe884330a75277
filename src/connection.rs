use crate::{
    buffer::FixedBuf,
    protocol::{self, MAX_FRAME_LEN, ParseError},
    util::{interrupted, would_block},
};
use log::{trace, warn};
use mio::{Interest, Token, net::TcpStream};
use std::io::{self, Read, Write};
use thiserror::Error;

/// Why a connection ended up in [`ConnectionState::Closing`].
#[derive(Debug, Error)]
pub enum CloseReason {
    #[error("client dropped connection")]
    PeerClosed,

    #[error("unexpected eof with {buffered} unprocessed bytes")]
    UnexpectedEof { buffered: usize },

    #[error("{0}")]
    Protocol(ParseError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub enum ConnectionState {
    Receiving,
    Sending,
    Closing(CloseReason),
}

/// Socket operations one [`Connection::ready`] call may perform.
pub const STEP_BUDGET: usize = 64;

/// Outcome of a [`Connection::ready`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Waiting on the socket, or closing.
    Idle,
    /// Ran out of budget with work left. No new readiness event will come
    /// for it, so the caller has to call `ready` again.
    Yielded,
}

/// Outcome of a single state step.
enum Step {
    /// State may have changed, run the next step right away.
    Continue,
    /// The socket returned `WouldBlock`, wait for the next readiness event.
    Blocked,
}

/// One accepted client and its buffers.
///
/// `incoming` holds at most one maximum sized frame. `outgoing` holds the
/// response being flushed, `sent` bytes of which already went out.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    stream: S,
    token: Token,
    state: ConnectionState,
    incoming: FixedBuf,
    outgoing: FixedBuf,
    sent: usize,
    registered: Option<Interest>,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, token: Token) -> Self {
        Self {
            stream,
            token,
            state: ConnectionState::Receiving,
            incoming: FixedBuf::with_capacity(MAX_FRAME_LEN),
            outgoing: FixedBuf::with_capacity(MAX_FRAME_LEN),
            sent: 0,
            registered: None,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn into_state(self) -> ConnectionState {
        self.state
    }

    pub fn is_receiving(&self) -> bool {
        matches!(self.state, ConnectionState::Receiving)
    }
    pub fn is_sending(&self) -> bool {
        matches!(self.state, ConnectionState::Sending)
    }
    pub fn is_closing(&self) -> bool {
        matches!(self.state, ConnectionState::Closing(_))
    }

    /// Bytes received but not yet consumed as a request.
    pub fn buffered(&self) -> usize {
        self.incoming.len()
    }

    /// Response bytes still waiting to be written.
    pub fn pending(&self) -> usize {
        self.outgoing.len() - self.sent
    }

    /// Readiness the connection waits for in its current state.
    pub fn interest(&self) -> Option<Interest> {
        match self.state {
            ConnectionState::Receiving => Some(Interest::READABLE),
            ConnectionState::Sending => Some(Interest::WRITABLE),
            ConnectionState::Closing(_) => None,
        }
    }

    pub(crate) fn registered(&self) -> Option<Interest> {
        self.registered
    }

    pub(crate) fn set_registered(&mut self, interest: Interest) {
        self.registered = Some(interest);
    }

    pub(crate) fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn close(&mut self, reason: CloseReason) {
        trace!(target: "close", "{:?} closing: {}", self.token, reason);
        self.state = ConnectionState::Closing(reason);
    }

    /// Handles one readiness event.
    ///
    /// Steps run back to back until the socket would block, the connection
    /// is closing, or [`STEP_BUDGET`] steps have run. mio only reports
    /// edges, so a [`Progress::Yielded`] connection may still have readable
    /// data that no event will announce.
    pub fn ready(&mut self) -> Progress {
        for _ in 0..STEP_BUDGET {
            let step = match self.state {
                ConnectionState::Receiving => self.step_receiving(),
                ConnectionState::Sending => self.step_sending(),
                ConnectionState::Closing(_) => return Progress::Idle,
            };
            if let Step::Blocked = step {
                return Progress::Idle;
            }
        }
        if self.is_closing() {
            Progress::Idle
        } else {
            Progress::Yielded
        }
    }

    fn step_receiving(&mut self) -> Step {
        // a request left over from an earlier read goes first
        match self.try_one_request() {
            Ok(()) => return Step::Continue,
            Err(e) if e.is_fatal() => {
                warn!(target: "on_request", "{:?} protocol violation: {}", self.token, e);
                self.close(CloseReason::Protocol(e));
                return Step::Continue;
            }
            Err(_) => {}
        }

        // the buffer fits a maximum sized frame, so a full buffer always decodes
        debug_assert!(!self.incoming.is_full(), "full receive buffer did not decode");

        match self.stream.read(self.incoming.spare_mut()) {
            Ok(0) => {
                let reason = if self.incoming.is_empty() {
                    CloseReason::PeerClosed
                } else {
                    CloseReason::UnexpectedEof {
                        buffered: self.incoming.len(),
                    }
                };
                self.close(reason);
                Step::Continue
            }
            Ok(n) => {
                self.incoming.commit(n);
                trace!(target: "on_read", "{:?} got {n} bytes, {} buffered", self.token, self.incoming.len());
                Step::Continue
            }
            Err(ref e) if would_block(e) => Step::Blocked,
            Err(ref e) if interrupted(e) => Step::Continue,
            Err(e) => {
                self.close(e.into());
                Step::Continue
            }
        }
    }

    fn step_sending(&mut self) -> Step {
        debug_assert!(self.sent < self.outgoing.len(), "sending with nothing to send");

        match self.stream.write(&self.outgoing.as_slice()[self.sent..]) {
            Ok(0) => {
                self.close(io::Error::from(io::ErrorKind::WriteZero).into());
                Step::Continue
            }
            Ok(n) => {
                self.sent += n;
                trace!(target: "on_write", "{:?} wrote {} bytes, out of {}", self.token, self.sent, self.outgoing.len());
                if self.sent == self.outgoing.len() {
                    self.outgoing.clear();
                    self.sent = 0;
                    self.state = ConnectionState::Receiving;
                }
                Step::Continue
            }
            Err(ref e) if would_block(e) => Step::Blocked,
            Err(ref e) if interrupted(e) => Step::Continue,
            Err(e) => {
                self.close(e.into());
                Step::Continue
            }
        }
    }

    /// Decodes one request from `incoming` and queues its echo.
    /// Moves to `Sending` on success.
    fn try_one_request(&mut self) -> Result<(), ParseError> {
        let (body, used) = protocol::try_decode(self.incoming.as_slice())?;
        trace!(target: "on_request", "{:?} frame with {} byte body", self.token, body.len());

        // echo
        protocol::encode_into(body, &mut self.outgoing)?;
        self.incoming.consume_front(used);
        self.state = ConnectionState::Sending;
        Ok(())
    }
}
