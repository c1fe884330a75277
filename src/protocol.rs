use thiserror::Error;

use crate::buffer::FixedBuf;

/// Size of the little endian length prefix.
pub const HEADER_LEN: usize = 4;
/// Largest body a frame may declare.
pub const MAX_MSG_LEN: usize = 4096;
/// Largest frame on the wire, header included.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_MSG_LEN;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Should try to read more after this
    #[error("not enough bytes (want: {want}, got: {got})")]
    NotEnoughBytes { want: usize, got: usize },

    /// Should close connection after this
    #[error("protocol error: message length {len} exceeds maximum {max}")]
    TooLong { len: usize, max: usize },

    /// Destination buffer cannot hold the encoded frame
    #[error("buffer full (need: {need}, free: {free})")]
    BufferFull { need: usize, free: usize },
}

impl ParseError {
    /// Anything but a short read means the peer broke the protocol.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ParseError::NotEnoughBytes { .. })
    }
}

fn check_len(len: usize) -> Result<(), ParseError> {
    if len > MAX_MSG_LEN {
        Err(ParseError::TooLong {
            len,
            max: MAX_MSG_LEN,
        })
    } else {
        Ok(())
    }
}

fn prefix(len: usize) -> [u8; HEADER_LEN] {
    (len as u32).to_le_bytes()
}

pub fn encode(body: &[u8]) -> Result<Vec<u8>, ParseError> {
    check_len(body.len())?;
    let mut v = Vec::with_capacity(HEADER_LEN + body.len());
    v.extend_from_slice(&prefix(body.len()));
    v.extend_from_slice(body);
    Ok(v)
}

pub fn encode_into(body: &[u8], dst: &mut FixedBuf) -> Result<(), ParseError> {
    check_len(body.len())?;
    let need = HEADER_LEN + body.len();
    if need > dst.remaining() {
        return Err(ParseError::BufferFull {
            need,
            free: dst.remaining(),
        });
    }
    dst.append(&prefix(body.len()));
    dst.append(body);
    Ok(())
}

/// Declared body length of a frame header at the start of `src`.
pub fn decode_len(src: &[u8]) -> Result<usize, ParseError> {
    if src.len() < HEADER_LEN {
        return Err(ParseError::NotEnoughBytes {
            want: HEADER_LEN,
            got: src.len(),
        });
    }
    let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
    check_len(len)?;
    Ok(len)
}

/// Decodes one frame from the front of `src`.
///
/// Returns the body and the number of bytes the frame occupies, which the
/// caller removes from its buffer. An oversized length is reported as soon
/// as the header is in, without waiting for the body.
pub fn try_decode(src: &[u8]) -> Result<(&[u8], usize), ParseError> {
    let len = decode_len(src)?;
    let end = HEADER_LEN + len;
    if src.len() < end {
        return Err(ParseError::NotEnoughBytes {
            want: end,
            got: src.len(),
        });
    }
    Ok((&src[HEADER_LEN..end], end))
}
