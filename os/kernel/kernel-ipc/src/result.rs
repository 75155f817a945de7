use bitfield_struct::bitfield;
use core::fmt;

/// Field view of a Horizon result word.
///
/// | Bits    | Field        |
/// |---------|--------------|
/// | 0–9     | description  |
/// | 10–17   | module       |
/// | 18–20   | reserved     |
/// | 21–26   | summary      |
/// | 27–31   | level        |
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct ResultBits {
    #[bits(10)]
    pub description: u16,
    pub module: u8,
    #[bits(3)]
    __: u8,
    #[bits(6)]
    pub summary: u8,
    #[bits(5)]
    pub level: u8,
}

/// Result word returned by a syscall or placed in word 1 of a reply.
///
/// Negative values are failures.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ResultCode(i32);

impl ResultCode {
    pub const SUCCESS: Self = Self(0);

    /// Reported by the extension when a side-band request it depends on
    /// could not be delivered (level fatal, summary internal, module kernel).
    pub const EXTENSION_FATAL: Self = Self::from_bits(
        ResultBits::new()
            .with_description(0x3FE)
            .with_module(1)
            .with_summary(11)
            .with_level(0x1F),
    );

    #[inline]
    #[must_use]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw.cast_signed())
    }

    #[inline]
    #[must_use]
    pub const fn from_bits(bits: ResultBits) -> Self {
        Self::from_raw(bits.into_bits())
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.cast_unsigned()
    }

    #[inline]
    #[must_use]
    pub const fn bits(self) -> ResultBits {
        ResultBits::from_bits(self.raw())
    }

    #[inline]
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    #[inline]
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Debug for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultCode({:#010x})", self.raw())
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.raw())
    }
}
