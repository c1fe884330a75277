/// Fixed capacity byte buffer.
///
/// Bytes are appended at the back and consumed from the front. Consuming
/// slides the remaining bytes down to offset 0, which is O(n) in the number
/// of bytes left over.
#[derive(Debug)]
pub struct FixedBuf {
    data: Box<[u8]>,
    len: usize,
}

impl FixedBuf {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            data: vec![0; cap].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.data.len()
    }

    /// Free space left at the back.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Copies `src` to the back. Returns false, leaving the buffer untouched,
    /// when it does not fit.
    pub fn append(&mut self, src: &[u8]) -> bool {
        if src.len() > self.remaining() {
            return false;
        }
        self.data[self.len..self.len + src.len()].copy_from_slice(src);
        self.len += src.len();
        true
    }

    /// Unfilled tail, for reading straight from a socket. Follow up with
    /// [`FixedBuf::commit`].
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Marks `n` bytes of the spare tail as filled.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.remaining(), "commit past capacity");
        self.len += n;
    }

    /// Drops `n` bytes from the front.
    pub fn consume_front(&mut self, n: usize) {
        assert!(n <= self.len, "consume past fill length");
        self.data.copy_within(n..self.len, 0);
        self.len -= n;
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}
