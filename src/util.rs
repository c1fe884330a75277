use std::{io, os::fd::AsRawFd};

use mio::Token;

#[inline]
pub fn would_block(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
}

#[inline]
pub fn interrupted(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::Interrupted
}

/// Poll token of a socket: its raw descriptor. The OS hands a descriptor out
/// again only after the previous owner closed it, so live tokens never collide.
#[inline]
pub fn handle_of(source: &impl AsRawFd) -> Token {
    Token(source.as_raw_fd() as usize)
}
