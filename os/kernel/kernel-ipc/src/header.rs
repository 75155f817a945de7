use bitfield_struct::bitfield;

/// Word 0 of every command buffer.
///
/// | Bits    | Field                      |
/// |---------|----------------------------|
/// | 0–5     | translate parameter count  |
/// | 6–11    | normal parameter count     |
/// | 12–15   | unused                     |
/// | 16–31   | command id                 |
///
/// ### Example
/// ```rust
/// # use kernel_ipc::IpcHeader;
/// let h = IpcHeader::make(15, 16, 4);
/// assert_eq!(h.into_bits(), 0x000F_0404);
/// assert_eq!(h.command_id(), 15);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct IpcHeader {
    #[bits(6)]
    pub translate_params: u8,
    #[bits(6)]
    pub normal_params: u8,
    #[bits(4)]
    __: u8,
    pub command_id: u16,
}

impl IpcHeader {
    /// Build a header; parameter counts are truncated to six bits like the
    /// kernel does.
    #[inline]
    #[must_use]
    pub const fn make(command_id: u16, normal_params: u8, translate_params: u8) -> Self {
        Self::new()
            .with_command_id(command_id)
            .with_normal_params(normal_params & 0x3F)
            .with_translate_params(translate_params & 0x3F)
    }
}

/// Raw header word for `(command_id, normal, translate)`.
#[inline]
#[must_use]
pub const fn make_header(command_id: u16, normal_params: u8, translate_params: u8) -> u32 {
    IpcHeader::make(command_id, normal_params, translate_params).into_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_kernel_encoding() {
        assert_eq!(make_header(1, 2, 2), 0x0001_0082);
        assert_eq!(make_header(0x801, 2, 2), 0x0801_0082);
        assert_eq!(make_header(5, 4, 0), 0x0005_0100);
        assert_eq!(make_header(0x804, 5, 2), 0x0804_0142);
    }

    #[test]
    fn header_decodes_fields() {
        let h = IpcHeader::from_bits(0x0006_0084);
        assert_eq!(h.command_id(), 6);
        assert_eq!(h.normal_params(), 2);
        assert_eq!(h.translate_params(), 4);
    }

    #[test]
    fn counts_are_masked_to_six_bits() {
        assert_eq!(make_header(1, 0x41, 0x42), make_header(1, 1, 2));
    }
}
