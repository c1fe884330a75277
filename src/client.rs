//! Blocking framed client, one request and one response at a time.

use crate::{
    protocol::{self, HEADER_LEN, ParseError},
    util::interrupted,
};
use log::trace;
use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Io error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame: {0}")]
    Frame(#[from] ParseError),

    /// Peer closed the stream between frames
    #[error("connection closed by server")]
    Closed,
}

/// Writes `body` as one frame.
pub fn write_frame<W: Write>(w: &mut W, body: &[u8]) -> Result<(), ClientError> {
    let frame = protocol::encode(body)?;
    w.write_all(&frame)?;
    Ok(())
}

/// Reads one whole frame and returns its body.
///
/// EOF before the first header byte is [`ClientError::Closed`]; EOF anywhere
/// later is an `UnexpectedEof` io error.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Vec<u8>, ClientError> {
    let mut header = [0; HEADER_LEN];
    let mut got = 0;
    while got < HEADER_LEN {
        match r.read(&mut header[got..]) {
            Ok(0) if got == 0 => return Err(ClientError::Closed),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => got += n,
            Err(ref e) if interrupted(e) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let len = protocol::decode_len(&header)?;
    let mut body = vec![0; len];
    r.read_exact(&mut body)?;
    Ok(body)
}

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn send(&mut self, body: &[u8]) -> Result<(), ClientError> {
        write_frame(&mut self.stream, body)?;
        trace!(target: "client", "sent {} byte frame", body.len());
        Ok(())
    }

    pub fn recv(&mut self) -> Result<Vec<u8>, ClientError> {
        read_frame(&mut self.stream)
    }

    pub fn request(&mut self, body: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.send(body)?;
        self.recv()
    }

    /// Underlying socket, for sending raw bytes.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}
