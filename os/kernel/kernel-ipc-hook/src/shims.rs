//! Header-keyed shims.
//!
//! Each rule pairs one exact header word with the services it applies to.
//! The hook looks the intercepted call up here once it knows which service
//! the session belongs to, and runs the action of the first rule that
//! matches.

use crate::config::HookConfig;
use kernel_ipc::{ResultCode, ServiceId};

/// Outcome of a shim.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the call, possibly modified.
    Pass,
    /// The call has been answered; return this result without forwarding.
    Complete(ResultCode),
}

impl Verdict {
    #[inline]
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Operation reported to the plugin watcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum WatchKind {
    DeleteFile = 0,
    DeleteDirectory = 1,
    Connect = 2,
    CameraCapture = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShimAction {
    /// `ndm:u` workaround: answer with `reply_header` and a zero result so
    /// the menu's network session survives.
    NdmAbsorb { reply_header: u32 },
    /// Answered by the language emulation.
    LangEmu,
    /// Answered by the `err:f` throw handler.
    ErrfThrow,
    /// `srv:` GetServiceHandle: forwarded here so the new session can be
    /// registered.
    GetServiceHandle,
    /// `srv:` PublishToSubscriber.
    PublishToSubscriber,
    /// `APT:` ReceiveParameter.
    ReceiveParameter,
    /// Offered to the plugin watcher first.
    Watch(WatchKind),
}

#[derive(Copy, Clone, Debug)]
pub struct ShimRule {
    pub header: u32,
    pub services: &'static [ServiceId],
    pub action: ShimAction,
}

impl ShimRule {
    const fn new(header: u32, services: &'static [ServiceId], action: ShimAction) -> Self {
        Self {
            header,
            services,
            action,
        }
    }

    #[must_use]
    pub fn matches(&self, header: u32, service: ServiceId, config: &HookConfig) -> bool {
        if self.header != header || !self.services.contains(&service) {
            return false;
        }
        // srv:pm stopped being an alias of srv: in later kernels.
        service != ServiceId::SrvPm || config.honours_srv_pm_alias()
    }
}

const CFG_ANY: &[ServiceId] = &[ServiceId::CfgU, ServiceId::CfgS, ServiceId::CfgI];
const CFG_SYSTEM: &[ServiceId] = &[ServiceId::CfgS, ServiceId::CfgI];
const CFG_INIT: &[ServiceId] = &[ServiceId::CfgI];
const NDM: &[ServiceId] = &[ServiceId::NdmU];
const SRV: &[ServiceId] = &[ServiceId::Srv];
const SRV_OR_PM: &[ServiceId] = &[ServiceId::Srv, ServiceId::SrvPm];

pub static SHIM_TABLE: [ShimRule; 20] = [
    // ndm:u EnterExclusiveState
    ShimRule::new(0x0001_0042, NDM, ShimAction::NdmAbsorb { reply_header: 0x0001_0040 }),
    // cfg GetConfigInfoBlk2
    ShimRule::new(0x0001_0082, CFG_ANY, ShimAction::LangEmu),
    // err:f Throw
    ShimRule::new(0x0001_0800, &[ServiceId::ErrF], ShimAction::ErrfThrow),
    // cfg SecureInfoGetRegion
    ShimRule::new(0x0002_0000, CFG_ANY, ShimAction::LangEmu),
    // ndm:u LeaveExclusiveState
    ShimRule::new(0x0002_0002, NDM, ShimAction::NdmAbsorb { reply_header: 0x0002_0040 }),
    // srv: GetServiceHandle
    ShimRule::new(0x0005_0100, SRV_OR_PM, ShimAction::GetServiceHandle),
    // ndm:u SuspendScheduler
    ShimRule::new(0x0008_0040, NDM, ShimAction::NdmAbsorb { reply_header: 0x0008_0040 }),
    // ndm:u ResumeScheduler
    ShimRule::new(0x0009_0000, NDM, ShimAction::NdmAbsorb { reply_header: 0x0009_0040 }),
    // srv: PublishToSubscriber
    ShimRule::new(0x000C_0080, SRV, ShimAction::PublishToSubscriber),
    // APT: ReceiveParameter
    ShimRule::new(0x000D_0080, &[ServiceId::Apt], ShimAction::ReceiveParameter),
    // cfg:s GetConfigInfoBlk4
    ShimRule::new(0x0401_0082, CFG_SYSTEM, ShimAction::LangEmu),
    // cfg:s GetConfigInfoBlk8
    ShimRule::new(0x0402_0082, CFG_SYSTEM, ShimAction::LangEmu),
    // cfg:i GetConfigInfoBlk4, also reachable through cfg:s
    ShimRule::new(0x0801_0082, CFG_SYSTEM, ShimAction::LangEmu),
    // cfg:i GetConfigInfoBlk8
    ShimRule::new(0x0802_0082, CFG_INIT, ShimAction::LangEmu),
    // cfg:s SecureInfoGetRegion
    ShimRule::new(0x0406_0000, CFG_SYSTEM, ShimAction::LangEmu),
    // cfg:i SecureInfoGetRegion
    ShimRule::new(0x0816_0000, CFG_INIT, ShimAction::LangEmu),
    // fs:USER DeleteFile
    ShimRule::new(0x0804_0142, &[ServiceId::FsUser], ShimAction::Watch(WatchKind::DeleteFile)),
    // fs:USER DeleteDirectoryRecursively
    ShimRule::new(0x0807_0142, &[ServiceId::FsUser], ShimAction::Watch(WatchKind::DeleteDirectory)),
    // soc:U connect
    ShimRule::new(0x0006_0084, &[ServiceId::SocU], ShimAction::Watch(WatchKind::Connect)),
    // cam:u StartCapture
    ShimRule::new(0x0001_0040, &[ServiceId::CamU], ShimAction::Watch(WatchKind::CameraCapture)),
];

/// Action of the first rule matching `header` on a `service` session.
#[must_use]
pub fn find(header: u32, service: ServiceId, config: &HookConfig) -> Option<ShimAction> {
    SHIM_TABLE
        .iter()
        .find(|rule| rule.matches(header, service, config))
        .map(|rule| rule.action)
}
