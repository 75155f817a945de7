//! `plg:UDS`: local wireless for plugins.
//!
//! A plugin's UDS traffic is sent to the `plg:UDS` service instead of
//! `nwm::UDS`. That service only understands an older layout of some
//! commands, in which buffers travel as plain words instead of translate
//! descriptors, so those headers are rewritten on the way through. A few
//! extra command ids configure the extension itself and never leave it.

use crate::error::HookError;
use crate::interrupt::InterruptiveRequest;
use crate::kernel::Kernel;
use crate::shims::Verdict;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use kernel_ipc::{CommandBuffer, IpcHeader, ResultCode, ServiceId, StaticBufferTable, make_header};
use kernel_session_registry::SessionRegistry;

/// `ndm:u` EnterExclusiveState.
pub const NDM_ENTER_EXCLUSIVE_STATE: u32 = 0x0001_0042;
const EXCLUSIVE_STATE_LOCAL_COMMUNICATIONS: u32 = 2;
const EXCLUSIVE_STATE_INFRASTRUCTURE: u32 = 1;

/// `soc:U` InitializeSockets, the call that attaches a process.
pub const SOC_ATTACH_PROCESS: u32 = 0x0001_0044;
/// `soc:U` ShutdownSockets.
pub const SOC_DETACH_PROCESS: u32 = 0x0019_0000;

const PLGUDS_INITIALIZE: u16 = 100;
const PLGUDS_FINALIZE: u16 = 101;
const PLGUDS_SIGNAL_EVENT: u16 = 102;
const PLGUDS_SET_SIGNAL_STATE: u16 = 104;
const PLGUDS_SET_PAUSE: u16 = 105;

/// `nwm::UDS` command ids mirrored in log mode.
const LOGGED_COMMANDS: core::ops::Range<u16> = 2..0x24;
const LOG_BACKUP_WORDS: usize = 30;

/// Static buffer whose address replaces a receive buffer descriptor.
const OUTPUT_STATIC_BUFFER: usize = 1;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PlgUdsEvent {
    SocketAttached = 0,
    SocketDetached = 1,
}

/// A header accepted by `plg:UDS` in its older layout.
struct Rewrite {
    from: IpcHeader,
    to: IpcHeader,
    /// Word that receives the output static buffer's address.
    output_word: Option<usize>,
}

const fn rewrite(from: (u16, u8, u8), to: (u16, u8, u8), output_word: Option<usize>) -> Rewrite {
    Rewrite {
        from: IpcHeader::make(from.0, from.1, from.2),
        to: IpcHeader::make(to.0, to.1, to.2),
        output_word,
    }
}

// Finalize (3) passes through untouched.
const REWRITES: [Rewrite; 10] = [
    // GetNodeInformationList
    rewrite((14, 0, 6), (31, 7, 0), Some(7)),
    // Scan
    rewrite((15, 16, 4), (15, 20, 0), None),
    // SetApplicationData
    rewrite((16, 1, 2), (16, 3, 0), None),
    // GetApplicationData
    rewrite((17, 1, 0), (17, 2, 0), Some(2)),
    // PullPacket
    rewrite((20, 3, 0), (20, 4, 0), Some(4)),
    // SendTo
    rewrite((23, 6, 2), (23, 8, 0), None),
    // Initialize
    rewrite((27, 12, 2), (27, 14, 0), None),
    // CreateNetwork
    rewrite((29, 1, 4), (29, 5, 0), None),
    // ConnectToNetwork
    rewrite((30, 2, 4), (30, 6, 0), None),
    // GetNodeInformationList, newer id
    rewrite((31, 0, 6), (31, 7, 0), Some(7)),
];

/// Extension-wide `plg:UDS` state, written by the plugin's controlling
/// process through the configuration commands.
///
/// Each field is read and written on its own; calls racing on different
/// cores see some interleaving of whole-field updates.
#[derive(Debug, Default)]
pub struct PlgUdsContext {
    process_id: AtomicU32,
    log_mode: AtomicBool,
    paused: AtomicBool,
    signal_on_attach: AtomicBool,
}

impl PlgUdsContext {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            process_id: AtomicU32::new(0),
            log_mode: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            signal_on_attach: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn process_id(&self) -> u32 {
        self.process_id.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_log_mode(&self) -> bool {
        self.log_mode.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn signals_on_attach(&self) -> bool {
        self.signal_on_attach.load(Ordering::Relaxed)
    }

    /// Whether `pid` is the process whose UDS traffic is being redirected.
    #[must_use]
    pub fn is_connected_process(&self, pid: u32) -> bool {
        self.process_id() == pid && !self.is_log_mode()
    }

    /// Handle a call made on a `plg:UDS` session.
    ///
    /// Headers in the older layout are rewritten and the call goes on.
    /// Configuration commands update the context and are answered here.
    /// Anything whose header does not have the expected shape is left
    /// alone.
    pub fn process_command(&self, cmdbuf: &mut CommandBuffer, statics: &StaticBufferTable) -> Verdict {
        let header = cmdbuf.header();

        if let Some(rw) = REWRITES.iter().find(|rw| rw.from == header) {
            cmdbuf.set_raw_header(rw.to.into_bits());
            if let Some(word) = rw.output_word {
                cmdbuf[word] = statics.address(OUTPUT_STATIC_BUFFER);
            }
            log::trace!(
                "plg:UDS: command {} rewritten to {:#x}",
                header.command_id(),
                rw.to.into_bits()
            );
            return Verdict::Pass;
        }

        let raw = cmdbuf.raw_header();
        let id = header.command_id();
        match id {
            PLGUDS_INITIALIZE if raw == make_header(id, 2, 0) => {
                self.process_id.store(cmdbuf[1], Ordering::Relaxed);
                self.log_mode.store(cmdbuf[2] == 1, Ordering::Relaxed);
                self.signal_on_attach.store(false, Ordering::Relaxed);
                log::debug!("plg:UDS: bound to process {} (log mode: {})", cmdbuf[1], cmdbuf[2] == 1);
            }
            PLGUDS_FINALIZE if raw == make_header(id, 0, 0) => {
                self.process_id.store(0, Ordering::Relaxed);
                self.log_mode.store(false, Ordering::Relaxed);
                self.signal_on_attach.store(false, Ordering::Relaxed);
                log::debug!("plg:UDS: unbound");
            }
            PLGUDS_SET_SIGNAL_STATE if raw == make_header(id, 1, 0) => {
                self.signal_on_attach.store(cmdbuf[1] != 0, Ordering::Relaxed);
            }
            PLGUDS_SET_PAUSE if raw == make_header(id, 1, 0) => {
                self.paused.store(cmdbuf[1] != 0, Ordering::Relaxed);
            }
            _ => return Verdict::Pass,
        }

        cmdbuf.set_raw_header(make_header(id, 1, 0));
        cmdbuf[1] = ResultCode::SUCCESS.raw();
        Verdict::Complete(ResultCode::SUCCESS)
    }
}

/// Rewrite a connected process's request for exclusive local
/// communications into one for infrastructure mode, so `ndm:u` does not
/// tear down the network the plugin is using.
///
/// Returns whether the request was changed.
pub fn redirect_exclusive_state(cmdbuf: &mut CommandBuffer) -> bool {
    if cmdbuf.raw_header() == NDM_ENTER_EXCLUSIVE_STATE
        && cmdbuf[1] == EXCLUSIVE_STATE_LOCAL_COMMUNICATIONS
    {
        cmdbuf[1] = EXCLUSIVE_STATE_INFRASTRUCTURE;
        true
    } else {
        false
    }
}

/// Tell `plg:UDS` about `event`.
///
/// # Errors
/// The service is not registered, no handle could be opened, or the request
/// failed. The buffer is restored in every case.
pub fn signal_event<K: Kernel>(
    kernel: &K,
    registry: &SessionRegistry,
    cmdbuf: &mut CommandBuffer,
    event: PlgUdsEvent,
) -> Result<(), HookError> {
    let mut request = InterruptiveRequest::<K>::init(kernel, registry, ServiceId::PlgUds, cmdbuf)?;
    request.set(0, make_header(PLGUDS_SIGNAL_EVENT, 1, 0));
    request.set(1, event as u32);

    let result = request.send();
    if result.is_failure() {
        return Err(HookError::Send(result));
    }

    log::debug!("plg:UDS: signalled {event:?}");
    Ok(())
}

/// Log mode: show `plg:UDS` the id of each command the process sends to
/// the real `nwm::UDS`. Best effort.
pub fn mirror_command<K: Kernel>(kernel: &K, registry: &SessionRegistry, cmdbuf: &mut CommandBuffer) {
    let id = cmdbuf.command_id();
    if !LOGGED_COMMANDS.contains(&id) {
        return;
    }

    match InterruptiveRequest::<K, LOG_BACKUP_WORDS>::init(kernel, registry, ServiceId::PlgUds, cmdbuf) {
        Ok(mut request) => {
            request.set(0, make_header(id, 0, 0));
            let result = request.send();
            if result.is_failure() {
                log::warn!("plg:UDS: mirroring command {id} failed with {result}");
            }
        }
        Err(e) => log::trace!("plg:UDS: command {id} not mirrored: {e}"),
    }
}
