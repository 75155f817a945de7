use kernel_ipc::{CommandBuffer, Handle, ResultCode, SessionId};
use kernel_session_registry::DestroyNotifier;

/// A kernel object resolved from a handle, with a reference held on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ObjectRef {
    /// Address of the `KAutoObject`.
    pub address: u32,
    /// The owning `KSession` when the object is a `KClientSession`.
    pub parent_session: Option<SessionId>,
}

/// What the hook needs from the host kernel.
///
/// Every method acts on behalf of the thread currently inside
/// `svcSendSyncRequest`.
pub trait Kernel: DestroyNotifier {
    /// Id of the calling process.
    fn current_process_id(&self) -> u32;

    /// Look `handle` up in the calling process's handle table and take a
    /// reference on the object.
    fn acquire_object(&self, handle: Handle) -> Option<ObjectRef>;

    /// Drop the reference taken by [`Kernel::acquire_object`].
    fn release_object(&self, object: ObjectRef);

    /// Open a new client handle to `session` in the calling process.
    ///
    /// # Errors
    /// The kernel's result when the handle table is full or the session is
    /// closing.
    fn create_handle_for_this_process(&self, session: SessionId) -> Result<Handle, ResultCode>;

    fn close_handle(&self, handle: Handle);

    /// Issue the unhooked synchronous request. The reply is written back
    /// into `cmdbuf`.
    fn send_sync_request(&self, handle: Handle, cmdbuf: &mut CommandBuffer) -> ResultCode;

    /// Read a word of the calling process's memory; `None` if unmapped.
    fn read_process_word(&self, address: u32) -> Option<u32>;
}

/// Reference on a kernel object, released on drop.
pub struct ObjectGuard<'k, K: Kernel> {
    kernel: &'k K,
    object: ObjectRef,
}

impl<'k, K: Kernel> ObjectGuard<'k, K> {
    pub fn acquire(kernel: &'k K, handle: Handle) -> Option<Self> {
        kernel
            .acquire_object(handle)
            .map(|object| Self { kernel, object })
    }

    #[inline]
    #[must_use]
    pub const fn parent_session(&self) -> Option<SessionId> {
        self.object.parent_session
    }
}

impl<K: Kernel> Drop for ObjectGuard<'_, K> {
    fn drop(&mut self) {
        self.kernel.release_object(self.object);
    }
}
