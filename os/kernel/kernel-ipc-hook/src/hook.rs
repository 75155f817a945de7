use crate::collaborators::{Collaborators, PluginLoaderStatus};
use crate::config::{ExtensionFlags, HookConfig, SignalFailurePolicy};
use crate::error::HookError;
use crate::interrupt::InterruptiveRequest;
use crate::kernel::{Kernel, ObjectGuard};
use crate::plguds::{self, PlgUdsContext, PlgUdsEvent};
use crate::shims::{self, ShimAction, Verdict, WatchKind};
use kernel_ipc::{CommandBuffer, Handle, IpcRegion, ResultCode, ServiceId, ServiceName, make_header};
use kernel_session_registry::{Insertion, SessionInfo, SessionRegistry};

const PUBLISH_NOTIFICATION_WAKE_APP: u32 = 0x1002;
const PUBLISH_TO_SUBSCRIBER_REPLY: u32 = 0x000C_0040;

const APT_PARAMETER_APP_ID: u32 = 0x300;
const APT_COMMAND_RESPONSE: u32 = 3;
/// WAKEUP_BY_EXIT, WAKEUP_BY_PAUSE and WAKEUP_CANCEL.
const APT_COMMAND_WAKEUP: core::ops::RangeInclusive<u32> = 10..=12;

const WATCHER_COMMAND: u16 = 100;
/// Words of the intercepted request a watcher exchange may overwrite.
const WATCHER_BACKUP_WORDS: usize = 8;
const FS_PATH_UTF16: u32 = 4;
/// Where a socket address structure has to live to be inspected.
const CONNECT_ADDRESS_RANGE: core::ops::Range<u32> = 0x0600_0000..0x0800_0000;

/// Replacement for `svcSendSyncRequest`.
///
/// Holds everything the shims need, so nothing lives in statics.
pub struct DispatchHook<K, C> {
    kernel: K,
    collaborators: C,
    registry: &'static SessionRegistry,
    plguds: PlgUdsContext,
    flags: ExtensionFlags,
    config: HookConfig,
}

impl<K: Kernel, C: Collaborators> DispatchHook<K, C> {
    #[must_use]
    pub const fn new(
        kernel: K,
        collaborators: C,
        registry: &'static SessionRegistry,
        config: HookConfig,
    ) -> Self {
        Self {
            kernel,
            collaborators,
            registry,
            plguds: PlgUdsContext::new(),
            flags: ExtensionFlags::new(),
            config,
        }
    }

    #[must_use]
    pub const fn kernel(&self) -> &K {
        &self.kernel
    }

    #[must_use]
    pub const fn collaborators(&self) -> &C {
        &self.collaborators
    }

    #[must_use]
    pub const fn registry(&self) -> &'static SessionRegistry {
        self.registry
    }

    #[must_use]
    pub const fn plguds(&self) -> &PlgUdsContext {
        &self.plguds
    }

    #[must_use]
    pub const fn flags(&self) -> &ExtensionFlags {
        &self.flags
    }

    #[must_use]
    pub const fn config(&self) -> &HookConfig {
        &self.config
    }

    /// Service `svcSendSyncRequest(handle)` for the calling thread, whose
    /// IPC region is `ipc`.
    ///
    /// Calls on sessions the registry does not know are forwarded as they
    /// are. Otherwise the session-name shims run first, then the
    /// header-keyed ones; either may answer the call instead of the
    /// service.
    ///
    /// # Panics
    /// With [`SignalFailurePolicy::Halt`], when a `plg:UDS` socket signal
    /// cannot be delivered.
    pub fn send_sync_request(&self, handle: Handle, ipc: &mut IpcRegion) -> ResultCode {
        let pid = self.kernel.current_process_id();
        let mut signal_detach = false;

        let object = ObjectGuard::acquire(&self.kernel, handle);
        let info = object
            .as_ref()
            .and_then(ObjectGuard::parent_session)
            .and_then(|session| self.registry.lookup(session));

        let mut verdict = Verdict::Pass;
        if let Some(info) = info {
            log::trace!("pid {pid}: {:#010x} on {}", ipc.command.raw_header(), info.name);

            match self.session_stage(pid, info, ipc, &mut signal_detach) {
                Ok(v) => verdict = v,
                Err(e) => return self.side_band_failed(e),
            }

            if !verdict.is_complete() {
                verdict = self.header_stage(handle, pid, info, &mut ipc.command);
            }
        }
        drop(object);

        let result = match verdict {
            Verdict::Complete(result) => result,
            Verdict::Pass => self.kernel.send_sync_request(handle, &mut ipc.command),
        };

        if signal_detach
            && let Err(e) = plguds::signal_event(
                &self.kernel,
                self.registry,
                &mut ipc.command,
                PlgUdsEvent::SocketDetached,
            )
        {
            return self.side_band_failed(e);
        }

        result
    }

    /// Shims keyed on the destination service alone.
    fn session_stage(
        &self,
        pid: u32,
        info: SessionInfo,
        ipc: &mut IpcRegion,
        signal_detach: &mut bool,
    ) -> Result<Verdict, HookError> {
        if self.plguds.is_connected_process(pid) {
            match info.service {
                ServiceId::NdmU if !self.plguds.is_paused() => {
                    if plguds::redirect_exclusive_state(&mut ipc.command) {
                        log::debug!("pid {pid}: exclusive local communications requested as infrastructure");
                    }
                }
                ServiceId::SocU if self.plguds.signals_on_attach() => {
                    match ipc.command.raw_header() {
                        plguds::SOC_ATTACH_PROCESS => plguds::signal_event(
                            &self.kernel,
                            self.registry,
                            &mut ipc.command,
                            PlgUdsEvent::SocketAttached,
                        )?,
                        plguds::SOC_DETACH_PROCESS => *signal_detach = true,
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        let verdict = if info.service == ServiceId::PlgUds {
            self.plguds
                .process_command(&mut ipc.command, &ipc.static_buffers)
        } else {
            Verdict::Pass
        };

        if self.plguds.is_log_mode() && info.service == ServiceId::NwmUds {
            plguds::mirror_command(&self.kernel, self.registry, &mut ipc.command);
        }

        Ok(verdict)
    }

    /// Shims keyed on the exact header word.
    fn header_stage(
        &self,
        handle: Handle,
        pid: u32,
        info: SessionInfo,
        cmdbuf: &mut CommandBuffer,
    ) -> Verdict {
        let header = cmdbuf.raw_header();
        let Some(action) = shims::find(header, info.service, &self.config) else {
            return Verdict::Pass;
        };

        match action {
            ShimAction::NdmAbsorb { reply_header } => {
                if !self.ndm_workaround_applies(pid) {
                    return Verdict::Pass;
                }
                log::debug!("pid {pid}: ndm:u {header:#010x} answered locally");
                cmdbuf.set_raw_header(reply_header);
                cmdbuf[1] = ResultCode::SUCCESS.raw();
                Verdict::Complete(ResultCode::SUCCESS)
            }
            ShimAction::LangEmu => self
                .collaborators
                .lang_emu(pid, cmdbuf)
                .map_or(Verdict::Pass, Verdict::Complete),
            ShimAction::ErrfThrow => {
                if self.collaborators.errf_throw(cmdbuf) {
                    Verdict::Complete(ResultCode::SUCCESS)
                } else {
                    Verdict::Pass
                }
            }
            ShimAction::GetServiceHandle => self.get_service_handle(handle, pid, cmdbuf),
            ShimAction::PublishToSubscriber => {
                if cmdbuf[1] != PUBLISH_NOTIFICATION_WAKE_APP {
                    return Verdict::Pass;
                }
                self.collaborators.wake_app_thread();
                cmdbuf.set_raw_header(PUBLISH_TO_SUBSCRIBER_REPLY);
                cmdbuf[1] = ResultCode::SUCCESS.raw();
                Verdict::Complete(ResultCode::SUCCESS)
            }
            ShimAction::ReceiveParameter => self.receive_parameter(handle, cmdbuf),
            ShimAction::Watch(kind) => self.watch(pid, kind, cmdbuf),
        }
    }

    fn ndm_workaround_applies(&self, pid: u32) -> bool {
        self.flags.network_funcs_started() && pid >= self.config.section0_module_count
    }

    /// Forward `srv:` GetServiceHandle and register the session it returns.
    ///
    /// The connected `plg:UDS` process asking for `nwm::UDS` is handed a
    /// `plg:UDS` session instead.
    fn get_service_handle(&self, handle: Handle, pid: u32, cmdbuf: &mut CommandBuffer) -> Verdict {
        let mut name = ServiceName::from_bytes(&cmdbuf.word_bytes::<8>(1)).ok();

        if self.plguds.is_connected_process(pid)
            && !self.plguds.is_paused()
            && name.is_some_and(|n| n.service() == ServiceId::NwmUds)
            && let Ok(plg_uds) = ServiceName::new("plg:UDS")
        {
            cmdbuf.set_word_bytes(1, &plg_uds.to_wire());
            cmdbuf[3] = u32::try_from(plg_uds.len()).unwrap_or_default();
            name = Some(plg_uds);
            log::debug!("pid {pid}: nwm::UDS handed out as plg:UDS");
        }

        let result = self.kernel.send_sync_request(handle, cmdbuf);
        if result.is_failure() {
            // Older kernels leave the output handle as it was, and the
            // caller would close whatever it holds.
            cmdbuf[3] = Handle::INVALID.raw();
            return Verdict::Complete(result);
        }

        let client = Handle(cmdbuf[3]);
        if let Some(name) = name
            && client.is_valid()
            && let Some(object) = ObjectGuard::acquire(&self.kernel, client)
            && let Some(session) = object.parent_session()
            && self.registry.add(session, name) == Insertion::New
        {
            self.registry.observe_destruction(session, &self.kernel);
        }

        Verdict::Complete(result)
    }

    /// Forward `APT:` ReceiveParameter and wake the plugin loader when the
    /// HOME menu answers.
    fn receive_parameter(&self, handle: Handle, cmdbuf: &mut CommandBuffer) -> Verdict {
        if cmdbuf[1] != APT_PARAMETER_APP_ID {
            return Verdict::Pass;
        }

        let result = self.kernel.send_sync_request(handle, cmdbuf);
        if result.is_success() {
            let command = cmdbuf[3];
            let wake = match self.collaborators.plugin_loader_status() {
                PluginLoaderStatus::Running => command == APT_COMMAND_RESPONSE,
                PluginLoaderStatus::InHome => APT_COMMAND_WAKEUP.contains(&command),
                PluginLoaderStatus::Idle => false,
            };
            if wake {
                self.collaborators.signal_home_event();
            }
        }

        Verdict::Complete(result)
    }

    /// Ask `plg:ldr` whether the plugin wants `kind` blocked.
    ///
    /// A request the watcher cannot be told about is forwarded untouched.
    fn watch(&self, pid: u32, kind: WatchKind, cmdbuf: &mut CommandBuffer) -> Verdict {
        let mut args = [0u32; 2];
        let arg_count: u8 = match kind {
            WatchKind::DeleteFile | WatchKind::DeleteDirectory => {
                let (path_type, path_size, path_ptr) = (cmdbuf[4], cmdbuf[5], cmdbuf[7]);
                if path_type != FS_PATH_UTF16 || path_size == 0 || path_ptr == 0 {
                    return Verdict::Pass;
                }
                args = [path_ptr, path_size];
                2
            }
            WatchKind::Connect => {
                let address = cmdbuf[6].wrapping_add(4);
                if !CONNECT_ADDRESS_RANGE.contains(&address) {
                    return Verdict::Pass;
                }
                let Some(word) = self.kernel.read_process_word(address) else {
                    return Verdict::Pass;
                };
                args[0] = word;
                1
            }
            WatchKind::CameraCapture => 0,
        };

        let mut request = match InterruptiveRequest::<K, WATCHER_BACKUP_WORDS>::init(
            &self.kernel,
            self.registry,
            ServiceId::PlgLdr,
            cmdbuf,
        ) {
            Ok(request) => request,
            Err(e) => {
                log::trace!("pid {pid}: {kind:?} not watched: {e}");
                return Verdict::Pass;
            }
        };

        request.set(0, make_header(WATCHER_COMMAND, 2 + arg_count, 0));
        request.set(1, pid);
        request.set(2, kind as u32);
        for (i, arg) in args.iter().take(usize::from(arg_count)).enumerate() {
            request.set(3 + i, *arg);
        }

        let result = request.send();
        if result.is_success() && request.get(2) != 0 {
            log::debug!("pid {pid}: {kind:?} blocked by the plugin");
            request.keep_reply();
            return Verdict::Complete(ResultCode::SUCCESS);
        }

        Verdict::Pass
    }

    fn side_band_failed(&self, error: HookError) -> ResultCode {
        match self.config.signal_failure {
            SignalFailurePolicy::Report => {
                log::error!("plg:UDS signal failed: {error}");
                ResultCode::EXTENSION_FATAL
            }
            SignalFailurePolicy::Halt => panic!("plg:UDS signal failed: {error}"),
        }
    }
}
