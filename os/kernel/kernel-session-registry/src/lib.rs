//! # Named-session registry
//!
//! A bounded table mapping kernel sessions to the service name they were
//! opened with. The dispatch hook consults it on every synchronous request
//! to learn which service a call is destined for, and the interruptive
//! request path uses it in reverse to find a live session of a named
//! service.
//!
//! ## Semantics
//!
//! - Entries are keyed by [`SessionId`] and hold no reference on the
//!   session. The kernel reports destruction through [`SessionObserver`],
//!   which evicts the entry.
//! - Tracking is best-effort. When all [`MAX_SESSIONS`] slots are taken,
//!   [`SessionRegistry::add`] does nothing; a later lookup simply misses,
//!   and callers treat a miss as "nothing to special-case".
//! - Every operation takes a recursive lock for the duration of one scan,
//!   insert or remove. Nothing blocks while it is held.

#![cfg_attr(not(any(test, doctest)), no_std)]

use core::cell::RefCell;
use kernel_ipc::{ServiceId, ServiceName, SessionId};
use kernel_sync::{OwnerFn, RecursiveMutex};

/// Number of sessions that can be tracked at once.
pub const MAX_SESSIONS: usize = 345;

/// A tracked session and the service behind it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    pub session: SessionId,
    pub name: ServiceName,
    /// Resolved from `name` when the entry was added.
    pub service: ServiceId,
}

/// Receives destruction notices for sessions it asked to observe.
pub trait SessionObserver: Sync {
    fn session_destroyed(&self, session: SessionId);
}

/// Implemented by the host kernel: arranges for `observer` to be told when
/// `session` is destroyed.
pub trait DestroyNotifier {
    fn notify_on_destroy(&self, session: SessionId, observer: &'static dyn SessionObserver);
}

/// What [`SessionRegistry::add`] did with a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Insertion {
    /// The session was not tracked before and now has a slot.
    New,
    /// The session already had a slot; its name was overwritten.
    Replaced,
    /// No slot was free; the session stays untracked.
    Full,
}

impl Insertion {
    /// Whether the session is tracked after the call.
    #[must_use]
    pub const fn is_tracked(self) -> bool {
        !matches!(self, Self::Full)
    }
}

struct Table {
    slots: [Option<SessionInfo>; MAX_SESSIONS],
}

impl Table {
    fn position(&self, session: SessionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.is_some_and(|info| info.session == session))
    }
}

pub struct SessionRegistry {
    table: RecursiveMutex<RefCell<Table>>,
}

impl SessionRegistry {
    /// `current_thread` identifies the calling thread for the recursive lock.
    #[must_use]
    pub const fn new(current_thread: OwnerFn) -> Self {
        Self {
            table: RecursiveMutex::new(
                current_thread,
                RefCell::new(Table {
                    slots: [None; MAX_SESSIONS],
                }),
            ),
        }
    }

    /// The entry tracking `session`, if any.
    #[must_use]
    pub fn lookup(&self, session: SessionId) -> Option<SessionInfo> {
        self.table.with_lock(|t| {
            let t = t.borrow();
            t.position(session).and_then(|i| t.slots[i])
        })
    }

    /// First entry, in slot order, whose name is exactly `name`.
    ///
    /// Several sessions may be open to the same service; which one is
    /// returned depends on insertion history. Any of them is an equally
    /// valid target for a new request.
    #[must_use]
    pub fn find_first(&self, name: &str) -> Option<SessionInfo> {
        self.table.with_lock(|t| {
            t.borrow()
                .slots
                .iter()
                .flatten()
                .find(|info| info.name == name)
                .copied()
        })
    }

    /// First entry, in slot order, resolved to `service`.
    #[must_use]
    pub fn find_first_service(&self, service: ServiceId) -> Option<SessionInfo> {
        self.table.with_lock(|t| {
            t.borrow()
                .slots
                .iter()
                .flatten()
                .find(|info| info.service == service)
                .copied()
        })
    }

    /// Track `session` under `name`, replacing whatever name it had.
    ///
    /// Only an [`Insertion::New`] session needs its destruction observed;
    /// a replaced one is already being watched.
    pub fn add(&self, session: SessionId, name: ServiceName) -> Insertion {
        let info = SessionInfo {
            session,
            name,
            service: name.service(),
        };

        let guard = self.table.lock();
        // Nested entry: `lookup` takes the same lock again.
        let replaced = self.lookup(session);
        let mut t = guard.borrow_mut();
        let slot = t
            .position(session)
            .or_else(|| t.slots.iter().position(Option::is_none));

        match slot {
            Some(i) => {
                t.slots[i] = Some(info);
                match replaced {
                    Some(old) => {
                        if old.name != name {
                            log::debug!("session {session:?}: renamed {} -> {name}", old.name);
                        }
                        Insertion::Replaced
                    }
                    None => {
                        log::debug!("session {session:?}: tracking {name} in slot {i}");
                        Insertion::New
                    }
                }
            }
            None => {
                log::warn!("session registry full; {name} session {session:?} left untracked");
                Insertion::Full
            }
        }
    }

    /// Stop tracking `session`. Returns whether it was tracked.
    pub fn remove(&self, session: SessionId) -> bool {
        self.table.with_lock(|t| {
            let mut t = t.borrow_mut();
            match t.position(session) {
                Some(i) => {
                    if let Some(info) = t.slots[i].take() {
                        log::debug!("session {session:?}: dropped {}", info.name);
                    }
                    true
                }
                None => false,
            }
        })
    }

    /// Ask the kernel to report the destruction of `session` so its entry
    /// cannot outlive it.
    pub fn observe_destruction(&'static self, session: SessionId, notifier: &impl DestroyNotifier) {
        notifier.notify_on_destroy(session, self);
    }

    /// Number of tracked sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table
            .with_lock(|t| t.borrow().slots.iter().flatten().count())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionObserver for SessionRegistry {
    fn session_destroyed(&self, session: SessionId) {
        self.remove(session);
    }
}
