use core::fmt;

/// Byte FIFO that overwrites its oldest content when full.
pub struct ByteRing<const N: usize> {
    buf: [u8; N],
    /// Index of the oldest byte.
    head: usize,
    len: usize,
    dropped: usize,
}

impl<const N: usize> ByteRing<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0; N],
            head: 0,
            len: 0,
            dropped: 0,
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn push(&mut self, bytes: &[u8]) {
        if N == 0 {
            self.dropped += bytes.len();
            return;
        }

        for &b in bytes {
            let tail = (self.head + self.len) % N;
            self.buf[tail] = b;
            if self.len == N {
                self.head = (self.head + 1) % N;
                self.dropped += 1;
            } else {
                self.len += 1;
            }
        }
    }

    pub fn pop_into(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len);
        for slot in &mut out[..count] {
            *slot = self.buf[self.head];
            self.head = (self.head + 1) % N;
        }
        self.len -= count;
        count
    }
}

impl<const N: usize> fmt::Write for ByteRing<N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s.as_bytes());
        Ok(())
    }
}
