use core::fmt;

/// Longest service name the service manager accepts.
pub const SERVICE_NAME_CAPACITY: usize = 8;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("service name is empty")]
    Empty,
    #[error("service name is {0} bytes long (at most 8)")]
    TooLong(usize),
    #[error("service name is not ASCII")]
    NotAscii,
}

/// A service name as carried by `srv:GetServiceHandle`: up to eight ASCII
/// bytes, NUL-padded on the wire.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName {
    bytes: [u8; SERVICE_NAME_CAPACITY],
    len: u8,
}

impl ServiceName {
    /// # Errors
    /// The name is empty, longer than eight bytes, or not ASCII.
    pub const fn new(name: &str) -> Result<Self, NameError> {
        Self::from_bytes(name.as_bytes())
    }

    /// Parse a wire name; everything from the first NUL on is ignored.
    ///
    /// # Errors
    /// See [`ServiceName::new`].
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_bytes(raw: &[u8]) -> Result<Self, NameError> {
        let mut len = 0;
        while len < raw.len() && raw[len] != 0 {
            len += 1;
        }

        if len == 0 {
            return Err(NameError::Empty);
        }
        if len > SERVICE_NAME_CAPACITY {
            return Err(NameError::TooLong(len));
        }

        let mut bytes = [0u8; SERVICE_NAME_CAPACITY];
        let mut i = 0;
        while i < len {
            if !raw[i].is_ascii() {
                return Err(NameError::NotAscii);
            }
            bytes[i] = raw[i];
            i += 1;
        }

        Ok(Self {
            bytes,
            len: len as u8,
        })
    }

    /// NUL-padded wire form.
    #[inline]
    #[must_use]
    pub const fn to_wire(&self) -> [u8; SERVICE_NAME_CAPACITY] {
        self.bytes
    }

    #[inline]
    #[must_use]
    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len()]
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        // ASCII is checked on construction.
        core::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    /// Identity of the service this name refers to.
    #[inline]
    #[must_use]
    pub fn service(&self) -> ServiceId {
        ServiceId::from_name(self.as_str())
    }
}

impl PartialEq<str> for ServiceName {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ServiceName {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The services the extension treats specially, resolved once from the
/// name a session was opened with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ServiceId {
    /// `cfg:u`
    CfgU,
    /// `cfg:s`
    CfgS,
    /// `cfg:i`
    CfgI,
    /// `err:f`
    ErrF,
    /// `ndm:u`
    NdmU,
    /// `soc:U`
    SocU,
    /// `srv:`
    Srv,
    /// `srv:pm`, an alias of the service manager on older kernels.
    SrvPm,
    /// Any `APT:` port.
    Apt,
    /// `fs:USER`
    FsUser,
    /// `cam:u`
    CamU,
    /// `plg:UDS`
    PlgUds,
    /// `plg:ldr`
    PlgLdr,
    /// `nwm::UDS`
    NwmUds,
    Unknown,
}

impl ServiceId {
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "cfg:u" => Self::CfgU,
            "cfg:s" => Self::CfgS,
            "cfg:i" => Self::CfgI,
            "err:f" => Self::ErrF,
            "ndm:u" => Self::NdmU,
            "soc:U" => Self::SocU,
            "srv:" => Self::Srv,
            "srv:pm" => Self::SrvPm,
            "fs:USER" => Self::FsUser,
            "cam:u" => Self::CamU,
            "plg:UDS" => Self::PlgUds,
            "plg:ldr" => Self::PlgLdr,
            "nwm::UDS" => Self::NwmUds,
            n if n.starts_with("APT:") => Self::Apt,
            _ => Self::Unknown,
        }
    }

    /// Exact name of a single-port service; `None` for `APT:*` and unknown.
    #[must_use]
    pub const fn port_name(self) -> Option<&'static str> {
        Some(match self {
            Self::CfgU => "cfg:u",
            Self::CfgS => "cfg:s",
            Self::CfgI => "cfg:i",
            Self::ErrF => "err:f",
            Self::NdmU => "ndm:u",
            Self::SocU => "soc:U",
            Self::Srv => "srv:",
            Self::SrvPm => "srv:pm",
            Self::FsUser => "fs:USER",
            Self::CamU => "cam:u",
            Self::PlgUds => "plg:UDS",
            Self::PlgLdr => "plg:ldr",
            Self::NwmUds => "nwm::UDS",
            Self::Apt | Self::Unknown => return None,
        })
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, self.port_name()) {
            (_, Some(name)) => f.write_str(name),
            (Self::Apt, None) => f.write_str("APT:*"),
            (_, None) => f.write_str("<unknown service>"),
        }
    }
}
