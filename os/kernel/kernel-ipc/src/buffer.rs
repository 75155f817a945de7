use crate::header::IpcHeader;
use core::ops::{Index, IndexMut};

/// Offset of the command buffer inside a thread's TLS page.
pub const COMMAND_BUFFER_TLS_OFFSET: usize = 0x80;

/// Offset of the static buffer descriptors inside a thread's TLS page.
pub const STATIC_BUFFERS_TLS_OFFSET: usize = 0x180;

/// Words in a command buffer, header included.
pub const COMMAND_BUFFER_WORDS: usize = (STATIC_BUFFERS_TLS_OFFSET - COMMAND_BUFFER_TLS_OFFSET) / 4;

/// Words in the static buffer descriptor area.
pub const STATIC_BUFFER_WORDS: usize = 32;

/// A thread's command buffer.
///
/// Borrowed, never owned: whoever writes into it on behalf of somebody else
/// must put the original words back before returning.
#[derive(Clone, PartialEq, Eq, Debug)]
#[repr(C, align(4))]
pub struct CommandBuffer {
    words: [u32; COMMAND_BUFFER_WORDS],
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; COMMAND_BUFFER_WORDS],
        }
    }

    /// Buffer whose leading words are `prefix`; the rest is zero.
    ///
    /// # Panics
    /// If `prefix` is longer than the buffer.
    #[must_use]
    pub fn from_words(prefix: &[u32]) -> Self {
        let mut buf = Self::new();
        buf.words[..prefix.len()].copy_from_slice(prefix);
        buf
    }

    #[inline]
    #[must_use]
    pub const fn raw_header(&self) -> u32 {
        self.words[0]
    }

    #[inline]
    pub const fn set_raw_header(&mut self, header: u32) {
        self.words[0] = header;
    }

    #[inline]
    #[must_use]
    pub const fn header(&self) -> IpcHeader {
        IpcHeader::from_bits(self.words[0])
    }

    #[inline]
    #[must_use]
    pub const fn command_id(&self) -> u16 {
        self.header().command_id()
    }

    #[inline]
    #[must_use]
    pub const fn words(&self) -> &[u32; COMMAND_BUFFER_WORDS] {
        &self.words
    }

    /// Copy of the first `N` words.
    #[inline]
    #[must_use]
    pub fn snapshot<const N: usize>(&self) -> [u32; N] {
        const { assert!(N <= COMMAND_BUFFER_WORDS) };
        let mut out = [0; N];
        out.copy_from_slice(&self.words[..N]);
        out
    }

    /// Write `saved` back over the leading words.
    #[inline]
    pub fn restore(&mut self, saved: &[u32]) {
        self.words[..saved.len()].copy_from_slice(saved);
    }

    /// `B` bytes read from the words starting at `first`, in memory
    /// (little-endian) order.
    #[must_use]
    pub fn word_bytes<const B: usize>(&self, first: usize) -> [u8; B] {
        const { assert!(B % 4 == 0) };
        let mut out = [0u8; B];
        for (chunk, word) in out.chunks_exact_mut(4).zip(&self.words[first..]) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Overwrite consecutive words starting at `first` with `bytes`.
    pub fn set_word_bytes(&mut self, first: usize, bytes: &[u8]) {
        for (word, chunk) in self.words[first..].iter_mut().zip(bytes.chunks(4)) {
            let mut le = [0u8; 4];
            le[..chunk.len()].copy_from_slice(chunk);
            *word = u32::from_le_bytes(le);
        }
    }
}

impl Index<usize> for CommandBuffer {
    type Output = u32;

    #[inline]
    fn index(&self, index: usize) -> &u32 {
        &self.words[index]
    }
}

impl IndexMut<usize> for CommandBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut u32 {
        &mut self.words[index]
    }
}

/// Receive-side static buffer descriptors: pairs of `(descriptor, address)`.
#[derive(Clone, PartialEq, Eq, Debug)]
#[repr(C, align(4))]
pub struct StaticBufferTable {
    words: [u32; STATIC_BUFFER_WORDS],
}

impl Default for StaticBufferTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticBufferTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; STATIC_BUFFER_WORDS],
        }
    }

    /// Install `(descriptor, address)` for static buffer `slot`.
    pub const fn set(&mut self, slot: usize, descriptor: u32, address: u32) {
        self.words[slot * 2] = descriptor;
        self.words[slot * 2 + 1] = address;
    }

    /// Address registered for static buffer `slot`.
    #[inline]
    #[must_use]
    pub const fn address(&self, slot: usize) -> u32 {
        self.words[slot * 2 + 1]
    }
}

/// The IPC part of a thread's TLS page (`TLS + 0x80 .. TLS + 0x200`).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[repr(C)]
pub struct IpcRegion {
    pub command: CommandBuffer,
    pub static_buffers: StaticBufferTable,
}

const _: () = assert!(size_of::<CommandBuffer>() == STATIC_BUFFERS_TLS_OFFSET - COMMAND_BUFFER_TLS_OFFSET);
const _: () = assert!(core::mem::offset_of!(IpcRegion, static_buffers) == STATIC_BUFFERS_TLS_OFFSET - COMMAND_BUFFER_TLS_OFFSET);

impl IpcRegion {
    /// View the IPC region of a thread's TLS page.
    ///
    /// # Safety
    /// `tls` must point to the TLS page of a thread that stays alive and
    /// does not touch its TLS for the lifetime `'a` (it is blocked in the
    /// syscall being serviced).
    #[must_use]
    pub unsafe fn from_tls<'a>(tls: *mut u8) -> &'a mut Self {
        unsafe { &mut *tls.add(COMMAND_BUFFER_TLS_OFFSET).cast::<Self>() }
    }
}
