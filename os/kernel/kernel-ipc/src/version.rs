use bitfield_struct::bitfield;

/// Kernel version word as exposed by the configuration memory page.
///
/// ### Example
/// ```rust
/// # use kernel_ipc::KernelVersion;
/// let v = KernelVersion::from_bits(0x0233_0000);
/// assert_eq!((v.major(), v.minor()), (2, 0x33));
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct KernelVersion {
    #[bits(8)]
    __: u8,
    pub revision: u8,
    pub minor: u8,
    pub major: u8,
}

impl KernelVersion {
    #[inline]
    #[must_use]
    pub const fn make(major: u8, minor: u8, revision: u8) -> Self {
        Self::new()
            .with_major(major)
            .with_minor(minor)
            .with_revision(revision)
    }
}
