use kernel_sync::{RecursiveGuard, RecursiveMutex, SpinMutex};
use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

fn thread_identity() -> usize {
    thread_local! {
        static ANCHOR: u8 = const { 0 };
    }
    ANCHOR.with(|a| std::ptr::from_ref(a) as usize)
}

#[test]
fn spin_mutex_lock_and_raii() {
    let m = SpinMutex::new(0_u32);

    {
        let mut g = m.lock();
        *g = 41;
    }

    // previous guard must have unlocked
    let mut g = m.lock();
    *g += 1;
    assert_eq!(*g, 42);
}

#[test]
fn spin_mutex_try_lock_fails_while_held() {
    let m = SpinMutex::new(1u8);

    let g1 = m.try_lock();
    assert!(g1.is_some());
    assert!(m.try_lock().is_none());

    drop(g1);
    assert!(m.try_lock().is_some());
}

#[test]
fn recursive_mutex_reenters_on_same_thread() {
    let m = RecursiveMutex::new(thread_identity, Cell::new(0u32));

    let outer = m.lock();
    outer.set(1);
    {
        // would deadlock with a plain spin lock
        let inner = m.lock();
        inner.set(inner.get() + 1);
    }
    assert_eq!(outer.get(), 2);
    assert!(m.is_held_by_current());
    drop(outer);
    assert!(!m.is_held_by_current());
}

#[test]
fn recursive_mutex_excludes_other_threads() {
    let m = Arc::new(RecursiveMutex::new(thread_identity, Cell::new(0u32)));
    let held = m.lock();

    let other = Arc::clone(&m);
    let acquired = thread::spawn(move || other.try_lock().is_some())
        .join()
        .unwrap();
    assert!(!acquired, "another thread must not enter while held");

    drop(held);
    let other = Arc::clone(&m);
    let acquired = thread::spawn(move || other.try_lock().is_some())
        .join()
        .unwrap();
    assert!(acquired);
}

#[test]
fn recursive_mutex_released_only_by_outermost_guard() {
    let m = Arc::new(RecursiveMutex::new(thread_identity, Cell::new(0u32)));

    let outer = m.lock();
    let inner = m.lock();
    drop(inner);

    let other = Arc::clone(&m);
    let acquired = thread::spawn(move || other.try_lock().is_some())
        .join()
        .unwrap();
    assert!(!acquired, "inner guard drop must not release the lock");
    drop(outer);
}

#[test]
fn contended_recursive_increments_are_exact() {
    let threads = 8;
    let iters = 2_000;

    let lock = Arc::new(RecursiveMutex::new(thread_identity, RefCell::new(0usize)));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let mut handles = Vec::with_capacity(threads);
    for _ in 0..threads {
        let lock = Arc::clone(&lock);
        let in_cs = Arc::clone(&in_cs);
        let start = Arc::clone(&start);
        handles.push(thread::spawn(move || {
            start.wait();
            for _ in 0..iters {
                lock.with_lock(|v| {
                    let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(prev, 0, "mutual exclusion violated");
                    // nested entry from inside the critical section
                    lock.with_lock(|again| *again.borrow_mut() += 1);
                    assert!(*v.borrow() > 0);
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                });
                thread::yield_now();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.with_lock(|v| *v.borrow()), threads * iters);
}

#[test]
fn recursive_lock_released_on_panic() {
    let m = Arc::new(RecursiveMutex::new(thread_identity, Cell::new(0u32)));

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        m.with_lock(|v| {
            v.set(123);
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");

    let other = Arc::clone(&m);
    let value = thread::spawn(move || other.try_lock().map(|g| g.get()))
        .join()
        .unwrap();
    assert_eq!(value, Some(123));
}

#[test]
fn recursive_mutex_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let m = RecursiveMutex::new(thread_identity, RefCell::new(0u8));
    takes_sync(&m);
}

/// Resolves only when `T` is not `Send`; with a `Send` type both impls
/// apply and the call is ambiguous.
trait AmbiguousIfSend<A> {
    fn check() {}
}
impl<T: ?Sized> AmbiguousIfSend<()> for T {}
impl<T: ?Sized + Send> AmbiguousIfSend<u8> for T {}

#[test]
fn recursive_guard_stays_on_its_thread() {
    <RecursiveGuard<'static, Cell<u32>> as AmbiguousIfSend<_>>::check();

    // the owning thread keeps exclusive access while any guard lives
    let m = Arc::new(RecursiveMutex::new(thread_identity, Cell::new(0u32)));
    let guard = m.lock();
    let other = Arc::clone(&m);
    let acquired = thread::spawn(move || other.try_lock().is_some())
        .join()
        .unwrap();
    assert!(!acquired);
    assert!(m.is_held_by_current());
    drop(guard);
}
