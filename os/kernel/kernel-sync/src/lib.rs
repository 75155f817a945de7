//! # Kernel synchronization primitives
//!
//! Two lock flavours are used by the IPC extension:
//!
//! * [`SpinMutex`]: a plain exclusive spin lock for short, non-reentrant
//!   critical sections (e.g. the log ring).
//! * [`RecursiveMutex`]: a reentrant lock keyed on the identity of the
//!   current thread. A thread that already owns the lock may take it again;
//!   the lock is released when the outermost guard is dropped.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod recursive;
mod spin;

pub use recursive::{OwnerFn, RawRecursive, RecursiveGuard, RecursiveMutex};
pub use spin::{SpinGuard, SpinMutex};
