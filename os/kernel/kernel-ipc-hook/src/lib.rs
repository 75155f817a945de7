//! # IPC interception
//!
//! The extension replaces `svcSendSyncRequest` with
//! [`DispatchHook::send_sync_request`]. Every synchronous request in the
//! system passes through it on the calling thread, before the kernel
//! delivers it.
//!
//! ## Per call
//! 1. Resolve the calling process and the destination session. Sessions
//!    the [`SessionRegistry`](kernel_session_registry::SessionRegistry) does
//!    not know are forwarded untouched.
//! 2. Session-name shims: `plg:UDS` layout rewrites and configuration
//!    commands, the connected plugin process's `ndm:u` and `soc:U`
//!    workarounds, and log-mode mirroring of `nwm::UDS`.
//! 3. Header shims ([`shims::SHIM_TABLE`]): locale emulation, `err:f`,
//!    `ndm:u` workarounds, service-handle registration, plugin loader
//!    relays and the plugin watcher.
//! 4. Unless a shim answered it, the call is forwarded.
//! 5. Deferred work, such as the `soc:U` detach signal, runs after the
//!    call.
//!
//! Side-band requests go through [`InterruptiveRequest`], which borrows the
//! caller's command buffer and always restores it.
//!
//! ## Host interface
//! The host kernel is reached through [`Kernel`]; the rest of the extension
//! through [`Collaborators`]. Neither is global: both are owned by the hook.

#![cfg_attr(not(any(test, doctest)), no_std)]

mod collaborators;
mod config;
mod error;
mod hook;
mod interrupt;
mod kernel;
pub mod plguds;
pub mod shims;

pub use collaborators::{Collaborators, PluginLoaderStatus};
pub use config::{ExtensionFlags, HookConfig, SignalFailurePolicy};
pub use error::{HookError, InterruptError};
pub use hook::DispatchHook;
pub use interrupt::{DEFAULT_BACKUP_WORDS, InterruptiveRequest};
pub use kernel::{Kernel, ObjectGuard, ObjectRef};
pub use plguds::{PlgUdsContext, PlgUdsEvent};
pub use shims::{ShimAction, Verdict, WatchKind};
