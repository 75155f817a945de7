//! Reentrant lock keyed on thread identity.
//!
//! The kernel's own `KRecursiveLock` semantics: the owning thread may lock
//! again without deadlocking, every lock must be paired with an unlock, and
//! the lock becomes available to other threads when the depth returns to
//! zero. Because a thread can hold several guards at once, the guard only
//! hands out shared references; use interior mutability (e.g. `RefCell`)
//! for the protected data and keep those borrows short.

use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::marker::PhantomData;
use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Returns a non-zero identity for the running thread.
///
/// On the device this is the address of the current `KThread`; host tests
/// use the address of a thread-local.
pub type OwnerFn = fn() -> usize;

/// Sentinel for "no owner".
const FREE: usize = 0;

pub struct RawRecursive {
    owner: AtomicUsize,
    /// Only ever written by the owner.
    depth: AtomicUsize,
    current: OwnerFn,
}

impl RawRecursive {
    #[must_use]
    pub const fn new(current: OwnerFn) -> Self {
        Self {
            owner: AtomicUsize::new(FREE),
            depth: AtomicUsize::new(0),
            current,
        }
    }

    fn me(&self) -> usize {
        let me = (self.current)();
        debug_assert_ne!(me, FREE, "thread identity must be non-zero");
        me
    }

    #[inline]
    pub fn lock(&self) {
        let me = self.me();
        if self.owner.load(Ordering::Relaxed) == me {
            self.depth.fetch_add(1, Ordering::Relaxed);
            return;
        }

        while self
            .owner
            .compare_exchange_weak(FREE, me, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.owner.load(Ordering::Relaxed) != FREE {
                spin_loop();
            }
        }
        self.depth.store(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        let me = self.me();
        if self.owner.load(Ordering::Relaxed) == me {
            self.depth.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        if self
            .owner
            .compare_exchange(FREE, me, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            self.depth.store(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// # Safety
    /// The calling thread must own the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        debug_assert!(self.is_owned_by_current());
        if self.depth.fetch_sub(1, Ordering::Relaxed) == 1 {
            self.owner.store(FREE, Ordering::Release);
        }
    }

    /// Whether the calling thread owns the lock.
    #[inline]
    pub fn is_owned_by_current(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == (self.current)()
    }

    /// Current recursion depth; zero when free. Only meaningful to the owner.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

/// Reentrant mutex handing out shared access to `T`.
pub struct RecursiveMutex<T> {
    raw: RawRecursive,
    cell: UnsafeCell<T>,
}

// Safety: only the owning thread can reach the cell, and it only gets `&T`.
unsafe impl<T: Send> Sync for RecursiveMutex<T> {}
unsafe impl<T: Send> Send for RecursiveMutex<T> {}

impl<T> RecursiveMutex<T> {
    pub const fn new(current: OwnerFn, value: T) -> Self {
        Self {
            raw: RawRecursive::new(current),
            cell: UnsafeCell::new(value),
        }
    }

    #[inline]
    pub fn lock(&self) -> RecursiveGuard<'_, T> {
        self.raw.lock();
        RecursiveGuard {
            m: self,
            _not_send: PhantomData,
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<RecursiveGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(RecursiveGuard {
                m: self,
                _not_send: PhantomData,
            })
        } else {
            None
        }
    }

    #[inline]
    pub fn with_lock<U>(&self, f: impl FnOnce(&T) -> U) -> U {
        let g = self.lock();
        f(&g)
    }

    #[inline]
    pub const fn get_mut(&mut self) -> &mut T {
        self.cell.get_mut()
    }

    /// Whether the calling thread currently holds the lock.
    #[inline]
    pub fn is_held_by_current(&self) -> bool {
        self.raw.is_owned_by_current()
    }
}

/// Shared access to the value while the current thread owns the lock.
///
/// Ownership is tied to the thread that locked, so the guard cannot be
/// sent elsewhere:
///
/// ```compile_fail
/// use kernel_sync::RecursiveMutex;
///
/// fn owner() -> usize {
///     1
/// }
/// fn requires_send<S: Send>(_: S) {}
///
/// let m = RecursiveMutex::new(owner, 0u8);
/// requires_send(m.lock());
/// ```
pub struct RecursiveGuard<'a, T> {
    m: &'a RecursiveMutex<T>,
    _not_send: PhantomData<*const ()>,
}

impl<T> Deref for RecursiveGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.m.cell.get() }
    }
}

impl<T> Drop for RecursiveGuard<'_, T> {
    fn drop(&mut self) {
        unsafe { self.m.raw.unlock() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_thread() -> usize {
        1
    }

    #[test]
    fn nested_locks_track_depth() {
        let raw = RawRecursive::new(single_thread);
        raw.lock();
        raw.lock();
        assert_eq!(raw.depth(), 2);
        unsafe { raw.unlock() };
        assert!(raw.is_owned_by_current());
        unsafe { raw.unlock() };
        assert_eq!(raw.depth(), 0);
        assert!(!raw.is_owned_by_current());
    }

    #[test]
    fn try_lock_reenters_for_owner() {
        let m = RecursiveMutex::new(single_thread, 5u8);
        let outer = m.lock();
        let inner = m.try_lock().expect("owner must be able to re-enter");
        assert_eq!(*inner + *outer, 10);
    }
}
