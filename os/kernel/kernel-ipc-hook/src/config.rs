use core::sync::atomic::{AtomicBool, Ordering};
use kernel_ipc::KernelVersion;

/// Last kernel minor version on which `srv:pm` also served as the service
/// manager's port.
const SRV_PM_ALIAS_BEFORE_MINOR: u8 = 39;

/// What to do when a side-band signal the extension depends on fails.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SignalFailurePolicy {
    /// Log and answer the caller with `ResultCode::EXTENSION_FATAL`.
    #[default]
    Report,
    /// Panic.
    Halt,
}

/// Fixed at hook construction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HookConfig {
    pub kernel_version: KernelVersion,
    /// Processes with a lower id are early system modules and never get
    /// the `ndm:u` workarounds.
    pub section0_module_count: u32,
    pub signal_failure: SignalFailurePolicy,
}

impl HookConfig {
    #[must_use]
    pub const fn new(kernel_version: KernelVersion) -> Self {
        Self {
            kernel_version,
            section0_module_count: 0,
            signal_failure: SignalFailurePolicy::Report,
        }
    }

    #[must_use]
    pub const fn with_section0_module_count(mut self, count: u32) -> Self {
        self.section0_module_count = count;
        self
    }

    #[must_use]
    pub const fn with_signal_failure(mut self, policy: SignalFailurePolicy) -> Self {
        self.signal_failure = policy;
        self
    }

    /// Whether `srv:pm` sessions are treated like `srv:`.
    #[inline]
    #[must_use]
    pub const fn honours_srv_pm_alias(&self) -> bool {
        self.kernel_version.minor() < SRV_PM_ALIAS_BEFORE_MINOR
    }
}

/// Runtime switches flipped by the controlling process.
#[derive(Debug, Default)]
pub struct ExtensionFlags {
    network_funcs_started: AtomicBool,
}

impl ExtensionFlags {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            network_funcs_started: AtomicBool::new(false),
        }
    }

    /// Set once the menu has brought up its network functions. Gates the
    /// `ndm:u` workarounds.
    pub fn set_network_funcs_started(&self, started: bool) {
        self.network_funcs_started.store(started, Ordering::Relaxed);
    }

    #[must_use]
    pub fn network_funcs_started(&self) -> bool {
        self.network_funcs_started.load(Ordering::Relaxed)
    }
}
