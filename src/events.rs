//! Lifecycle notifications: `Started` / `Stopped` listener registries.
//!
//! Listeners are invoked in registration order. Each invocation is isolated
//! with `catch_unwind`, so one panicking listener cannot suppress the
//! listeners registered after it; the panic is logged and swallowed.
//! Listeners run on whichever thread triggered the notification (the caller
//! of `start`/`stop`), never on the timer's tick thread.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// Opaque payload forwarded to lifecycle listeners.
///
/// Stored once via [`set_event_args`](crate::PrecisionTimer::set_event_args)
/// or passed per-call to `start`/`stop`; listeners downcast it back to the
/// concrete type they expect.
pub type EventArgs = Arc<dyn Any + Send + Sync>;

/// Handle identifying a registered listener, used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(Option<&EventArgs>) + Send + Sync>;

/// Ordered set of listeners for one notification kind.
pub(crate) struct ListenerSet {
    /// Notification name, used only in log output.
    name: &'static str,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl ListenerSet {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Append a listener; later registrations are notified later.
    pub(crate) fn add<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&EventArgs>) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; returns whether it was present.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Invoke every listener in registration order, isolating panics.
    ///
    /// The registry lock is released before invocation, so a listener may
    /// register or remove listeners without deadlocking; such changes take
    /// effect from the next notification.
    pub(crate) fn notify(&self, args: Option<&EventArgs>) {
        let snapshot: Vec<Listener> = self.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(args)));
            if outcome.is_err() {
                warn!("{} listener panicked; remaining listeners still run", self.name);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        // A panic inside notify() never holds this lock, but a panicking
        // add/remove caller could poison it; recover rather than wedge.
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("name", &self.name)
            .field("len", &self.lock().len())
            .finish()
    }
}
