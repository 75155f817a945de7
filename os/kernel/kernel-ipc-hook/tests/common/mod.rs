//! In-test host kernel: sessions, handles and services are plain maps, and
//! every request that reaches a service is recorded.

#![allow(dead_code)]

use kernel_ipc::{
    CommandBuffer, Handle, IpcRegion, KernelVersion, ResultCode, ServiceName, SessionId,
    make_header,
};
use kernel_ipc_hook::{
    Collaborators, DispatchHook, HookConfig, Kernel, ObjectRef, PluginLoaderStatus,
};
use kernel_session_registry::{DestroyNotifier, SessionObserver, SessionRegistry};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

pub const PID: u32 = 0x30;
pub const SECTION0_MODULES: u32 = 5;

pub const INVALID_HANDLE: ResultCode = ResultCode::from_raw(0xD8E0_07F7);
pub const OUT_OF_HANDLES: ResultCode = ResultCode::from_raw(0xD860_0413);
pub const NOT_FOUND: ResultCode = ResultCode::from_raw(0xD880_1BFA);

pub fn thread_identity() -> usize {
    thread_local! {
        static ANCHOR: u8 = const { 0 };
    }
    ANCHOR.with(|a| std::ptr::from_ref(a) as usize)
}

pub type Responder = Rc<dyn Fn(&MockKernel, &mut CommandBuffer) -> ResultCode>;

/// A request as it reached a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    pub session: SessionId,
    pub words: [u32; 8],
}

/// Reply `(id, 1, 0)` with a zero result word.
pub fn default_reply(cmdbuf: &mut CommandBuffer) -> ResultCode {
    let id = cmdbuf.command_id();
    cmdbuf.set_raw_header(make_header(id, 1, 0));
    cmdbuf[1] = 0;
    ResultCode::SUCCESS
}

pub struct MockKernel {
    pid: Cell<u32>,
    next_handle: Cell<u32>,
    next_session: Cell<u32>,
    handles: RefCell<HashMap<Handle, SessionId>>,
    responders: RefCell<HashMap<SessionId, Responder>>,
    memory: RefCell<HashMap<u32, u32>>,
    observers: RefCell<Vec<(SessionId, &'static dyn SessionObserver)>>,
    sent: RefCell<Vec<Sent>>,
    live_references: Cell<i32>,
    private_handles: Cell<i32>,
    refuse_handles: Cell<bool>,
}

impl MockKernel {
    pub fn new(pid: u32) -> Self {
        Self {
            pid: Cell::new(pid),
            next_handle: Cell::new(0x0001_0002),
            next_session: Cell::new(0xFFF0_0100),
            handles: RefCell::default(),
            responders: RefCell::default(),
            memory: RefCell::default(),
            observers: RefCell::default(),
            sent: RefCell::default(),
            live_references: Cell::new(0),
            private_handles: Cell::new(0),
            refuse_handles: Cell::new(false),
        }
    }

    pub fn set_pid(&self, pid: u32) {
        self.pid.set(pid);
    }

    pub fn new_session(&self) -> SessionId {
        let address = self.next_session.get();
        self.next_session.set(address + 0x100);
        SessionId::new(address).unwrap()
    }

    /// Give the calling process a handle to `session`.
    pub fn open(&self, session: SessionId) -> Handle {
        let handle = Handle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.handles.borrow_mut().insert(handle, session);
        handle
    }

    pub fn session_of(&self, handle: Handle) -> Option<SessionId> {
        self.handles.borrow().get(&handle).copied()
    }

    pub fn respond(
        &self,
        session: SessionId,
        f: impl Fn(&MockKernel, &mut CommandBuffer) -> ResultCode + 'static,
    ) {
        self.responders.borrow_mut().insert(session, Rc::new(f));
    }

    /// Make `session` answer GetServiceHandle by opening a fresh session.
    pub fn serve_service_manager(&self, session: SessionId) {
        self.respond(session, |k, cmd| {
            if ServiceName::from_bytes(&cmd.word_bytes::<8>(1)).is_err() {
                return NOT_FOUND;
            }
            let handle = k.open(k.new_session());
            cmd.set_raw_header(make_header(5, 1, 2));
            cmd[1] = 0;
            cmd[2] = 0x20;
            cmd[3] = handle.raw();
            ResultCode::SUCCESS
        });
    }

    pub fn map_word(&self, address: u32, value: u32) {
        self.memory.borrow_mut().insert(address, value);
    }

    pub fn refuse_handles(&self, refuse: bool) {
        self.refuse_handles.set(refuse);
    }

    /// Destroy `session`, telling whoever asked.
    pub fn destroy_session(&self, session: SessionId) {
        self.handles.borrow_mut().retain(|_, s| *s != session);
        let observers: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, o)| *o)
            .collect();
        for observer in observers {
            observer.session_destroyed(session);
        }
    }

    /// Destruction observers registered for `session`.
    pub fn observers_of(&self, session: SessionId) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|(s, _)| *s == session)
            .count()
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.borrow().clone()
    }

    pub fn sent_to(&self, session: SessionId) -> Vec<Sent> {
        self.sent
            .borrow()
            .iter()
            .filter(|s| s.session == session)
            .cloned()
            .collect()
    }

    pub fn live_references(&self) -> i32 {
        self.live_references.get()
    }

    /// Handles opened by the hook and not yet closed.
    pub fn open_private_handles(&self) -> i32 {
        self.private_handles.get()
    }
}

impl DestroyNotifier for MockKernel {
    fn notify_on_destroy(&self, session: SessionId, observer: &'static dyn SessionObserver) {
        self.observers.borrow_mut().push((session, observer));
    }
}

impl Kernel for MockKernel {
    fn current_process_id(&self) -> u32 {
        self.pid.get()
    }

    fn acquire_object(&self, handle: Handle) -> Option<ObjectRef> {
        let session = self.session_of(handle)?;
        self.live_references.set(self.live_references.get() + 1);
        Some(ObjectRef {
            address: handle.raw(),
            parent_session: Some(session),
        })
    }

    fn release_object(&self, _object: ObjectRef) {
        self.live_references.set(self.live_references.get() - 1);
    }

    fn create_handle_for_this_process(&self, session: SessionId) -> Result<Handle, ResultCode> {
        if self.refuse_handles.get() {
            return Err(OUT_OF_HANDLES);
        }
        self.private_handles.set(self.private_handles.get() + 1);
        Ok(self.open(session))
    }

    fn close_handle(&self, handle: Handle) {
        if self.handles.borrow_mut().remove(&handle).is_some() {
            self.private_handles.set(self.private_handles.get() - 1);
        }
    }

    fn send_sync_request(&self, handle: Handle, cmdbuf: &mut CommandBuffer) -> ResultCode {
        let Some(session) = self.session_of(handle) else {
            return INVALID_HANDLE;
        };
        self.sent.borrow_mut().push(Sent {
            session,
            words: cmdbuf.snapshot::<8>(),
        });

        let responder = self.responders.borrow().get(&session).cloned();
        match responder {
            Some(respond) => respond(self, cmdbuf),
            None => default_reply(cmdbuf),
        }
    }

    fn read_process_word(&self, address: u32) -> Option<u32> {
        self.memory.borrow().get(&address).copied()
    }
}

#[derive(Default)]
pub struct MockCollaborators {
    pub emulate_locale: Cell<bool>,
    pub lang_emu_calls: Cell<u32>,
    pub errf_calls: Cell<u32>,
    pub status: Cell<PluginLoaderStatus>,
    pub home_events: Cell<u32>,
    pub app_wakeups: Cell<u32>,
}

impl Collaborators for MockCollaborators {
    fn lang_emu(&self, _pid: u32, cmdbuf: &mut CommandBuffer) -> Option<ResultCode> {
        self.lang_emu_calls.set(self.lang_emu_calls.get() + 1);
        if !self.emulate_locale.get() {
            return None;
        }
        let id = cmdbuf.command_id();
        cmdbuf.set_raw_header(make_header(id, 2, 0));
        cmdbuf[1] = 0;
        // emulated region: EUR
        cmdbuf[2] = 2;
        Some(ResultCode::SUCCESS)
    }

    fn errf_throw(&self, cmdbuf: &mut CommandBuffer) -> bool {
        self.errf_calls.set(self.errf_calls.get() + 1);
        cmdbuf.set_raw_header(make_header(1, 1, 0));
        cmdbuf[1] = 0;
        true
    }

    fn plugin_loader_status(&self) -> PluginLoaderStatus {
        self.status.get()
    }

    fn signal_home_event(&self) {
        self.home_events.set(self.home_events.get() + 1);
    }

    fn wake_app_thread(&self) {
        self.app_wakeups.set(self.app_wakeups.get() + 1);
    }
}

pub fn config() -> HookConfig {
    HookConfig::new(KernelVersion::make(2, 46, 0)).with_section0_module_count(SECTION0_MODULES)
}

/// A hook wired to a fresh mock kernel and registry.
pub struct Rig {
    pub hook: DispatchHook<MockKernel, MockCollaborators>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: HookConfig) -> Self {
        let registry: &'static SessionRegistry =
            Box::leak(Box::new(SessionRegistry::new(thread_identity)));
        Self {
            hook: DispatchHook::new(
                MockKernel::new(PID),
                MockCollaborators::default(),
                registry,
                config,
            ),
        }
    }

    pub fn kernel(&self) -> &MockKernel {
        self.hook.kernel()
    }

    pub fn collab(&self) -> &MockCollaborators {
        self.hook.collaborators()
    }

    pub fn registry(&self) -> &'static SessionRegistry {
        self.hook.registry()
    }

    /// A registered session of service `name` and the caller's handle to it.
    pub fn service(&self, name: &str) -> (SessionId, Handle) {
        let session = self.kernel().new_session();
        self.registry().add(session, ServiceName::new(name).unwrap());
        (session, self.kernel().open(session))
    }

    /// A session the registry knows nothing about.
    pub fn unregistered(&self) -> (SessionId, Handle) {
        let session = self.kernel().new_session();
        (session, self.kernel().open(session))
    }

    pub fn call(&self, handle: Handle, words: &[u32]) -> (ResultCode, IpcRegion) {
        self.call_buffer(handle, CommandBuffer::from_words(words))
    }

    pub fn call_buffer(&self, handle: Handle, command: CommandBuffer) -> (ResultCode, IpcRegion) {
        let mut ipc = IpcRegion {
            command,
            ..IpcRegion::default()
        };
        let result = self.hook.send_sync_request(handle, &mut ipc);
        (result, ipc)
    }

    /// Bind the `plg:UDS` state to `pid` through the service's own
    /// configuration command.
    pub fn connect_plugin(&self, plg_uds: Handle, pid: u32, log_mode: bool) {
        let (result, _) = self.call(plg_uds, &[make_header(100, 2, 0), pid, u32::from(log_mode)]);
        assert!(result.is_success());
    }
}
