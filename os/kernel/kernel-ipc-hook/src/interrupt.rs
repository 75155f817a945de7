//! Side-band requests sent from inside the hook.
//!
//! The hook runs on the thread that is blocked in `svcSendSyncRequest`, and
//! the only command buffer it can send with is that thread's. An
//! [`InterruptiveRequest`] borrows it, backs up the leading words, lets the
//! caller build and send a different request, and puts the original words
//! back when it is dropped.

use crate::error::InterruptError;
use crate::kernel::Kernel;
use kernel_ipc::{CommandBuffer, Handle, ResultCode, ServiceId};
use kernel_session_registry::SessionRegistry;

/// Words backed up when no other size is asked for.
pub const DEFAULT_BACKUP_WORDS: usize = 10;

/// A request to a registered service, sent through a borrowed command
/// buffer.
///
/// Dropping the value restores the first `N` words of the buffer and closes
/// the private handle, whatever the outcome of [`send`](Self::send). `N` must
/// cover every word written with [`set`](Self::set) and every word of the
/// reply.
pub struct InterruptiveRequest<'a, K: Kernel, const N: usize = DEFAULT_BACKUP_WORDS> {
    kernel: &'a K,
    handle: Handle,
    cmdbuf: &'a mut CommandBuffer,
    backup: [u32; N],
    restore_on_drop: bool,
}

impl<'a, K: Kernel, const N: usize> InterruptiveRequest<'a, K, N> {
    /// Open a private handle to the first registered session of `target`
    /// and back up the buffer.
    ///
    /// # Errors
    /// No `target` session is registered, or the kernel refused the handle.
    /// The buffer is untouched and nothing stays open.
    pub fn init(
        kernel: &'a K,
        registry: &SessionRegistry,
        target: ServiceId,
        cmdbuf: &'a mut CommandBuffer,
    ) -> Result<Self, InterruptError> {
        let info = registry
            .find_first_service(target)
            .ok_or(InterruptError::ServiceNotRegistered(target))?;

        let handle = kernel
            .create_handle_for_this_process(info.session)
            .map_err(|result| InterruptError::HandleCreation {
                session: info.session,
                result,
            })?;

        Ok(Self {
            kernel,
            handle,
            backup: cmdbuf.snapshot::<N>(),
            cmdbuf,
            restore_on_drop: true,
        })
    }

    /// Write word `index` of the outgoing request.
    #[inline]
    pub fn set(&mut self, index: usize, value: u32) {
        self.cmdbuf[index] = value;
    }

    /// Read word `index`; after [`send`](Self::send) this is the reply.
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> u32 {
        self.cmdbuf[index]
    }

    /// Send the request. The result is returned as is.
    pub fn send(&mut self) -> ResultCode {
        self.kernel.send_sync_request(self.handle, self.cmdbuf)
    }

    /// Close the handle but leave the reply in the buffer, so it can stand
    /// in for the reply to the intercepted call.
    pub fn keep_reply(mut self) {
        self.restore_on_drop = false;
    }
}

impl<K: Kernel, const N: usize> Drop for InterruptiveRequest<'_, K, N> {
    fn drop(&mut self) {
        if self.restore_on_drop {
            self.cmdbuf.restore(&self.backup);
        }
        self.kernel.close_handle(self.handle);
    }
}
