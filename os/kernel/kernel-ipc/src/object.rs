use core::fmt;
use core::num::NonZeroU32;

/// Identity of a kernel `KSession`: its address, stable for the session's
/// lifetime and reused once the session is destroyed.
///
/// The extension never owns a session through this value.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SessionId(NonZeroU32);

impl SessionId {
    #[inline]
    #[must_use]
    pub const fn new(address: u32) -> Option<Self> {
        match NonZeroU32::new(address) {
            Some(a) => Some(Self(a)),
            None => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn address(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({:#010x})", self.0)
    }
}

/// A handle in some process's handle table.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(transparent)]
pub struct Handle(pub u32);

impl Handle {
    pub const INVALID: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}
