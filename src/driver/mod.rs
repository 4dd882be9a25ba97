//! Platform timer capability.
//!
//! The façade is written against [`TimerDriver`], not a specific OS call, so
//! the same `PrecisionTimer` can be backed by different platform shims: the
//! default dedicated-thread driver in [`thread`], or a test double that
//! scripts arm outcomes.
//!
//! Real high-resolution timer APIs cap the number of timers a process can
//! hold armed at once. That limit is modeled here as an explicit, injectable
//! [`TimerSlots`] registry rather than ambient global state, so tests can
//! substitute a tiny registry and drive it to exhaustion deterministically.

mod thread;

pub use thread::ThreadTimer;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::events::EventArgs;

/// Callback invoked on the driver's tick thread.
pub type TickCallback = Arc<dyn Fn() + Send + Sync>;

/// Abstract capability of one platform timer resource.
///
/// Implementations own exactly one timer resource and drive a background
/// execution thread that invokes the registered tick callback according to
/// the period/resolution/auto-reset settings. All methods must be callable
/// from any thread; the configuration accessors must be tear-free with
/// respect to concurrent reads on the tick thread.
pub trait TimerDriver: Send + Sync {
    /// Attempt to arm the timer with the current settings.
    ///
    /// Returns `true` only when this call transitioned the timer to armed.
    /// Returns `false` when arming is refused (no tick callback or period
    /// configured, slot registry exhausted, driver disposed) and also when
    /// the timer is already armed; callers disambiguate the latter via
    /// [`is_armed`](Self::is_armed).
    fn arm(&self) -> bool;

    /// Disarm the timer.
    ///
    /// Safe from any thread and in any state. When called from a thread
    /// other than the tick thread, returns only after any in-flight tick
    /// callback has completed; when called from inside the tick callback it
    /// requests disarmament and returns immediately.
    fn disarm(&self);

    /// Whether the timer is currently armed.
    fn is_armed(&self) -> bool;

    /// Replace the tick callback. Takes effect on the next arm.
    fn set_tick(&self, callback: TickCallback);

    /// Set the tick period in milliseconds.
    ///
    /// A live change is picked up when the driver schedules the next tick;
    /// the wait already in progress is not retimed.
    fn set_period_ms(&self, ms: u64);

    /// Current tick period in milliseconds.
    fn period_ms(&self) -> u64;

    /// Set the resolution hint in milliseconds (0 = finest).
    fn set_resolution_ms(&self, ms: u64);

    /// Current resolution hint in milliseconds.
    fn resolution_ms(&self) -> u64;

    /// Set periodic (`true`) or one-shot (`false`) mode.
    fn set_auto_reset(&self, periodic: bool);

    /// Whether the timer re-arms after each tick.
    fn auto_reset(&self) -> bool;

    /// Replace the stored notification payload.
    fn set_args(&self, args: Option<EventArgs>);

    /// Current stored notification payload.
    fn args(&self) -> Option<EventArgs>;

    /// Release the timer resource.
    ///
    /// Disarms first if needed. Idempotent; every operation after dispose is
    /// a refusal (`arm` returns `false`) or a no-op.
    fn dispose(&self);
}

// =============================================================================
// Slot registry
// =============================================================================

/// Default capacity of the process-wide slot registry.
const DEFAULT_SLOT_CAPACITY: usize = 64;

/// Counts armed timers against a process-wide capacity.
///
/// One slot is held per armed timer and released on disarm (or when a
/// one-shot run completes). [`TimerSlots::global`] is shared by every driver
/// that was not given an explicit registry.
#[derive(Debug)]
pub struct TimerSlots {
    active: AtomicUsize,
    capacity: usize,
}

impl TimerSlots {
    /// Create a registry with the given capacity.
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            capacity,
        })
    }

    /// The process-wide default registry.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TimerSlots>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| TimerSlots::with_capacity(DEFAULT_SLOT_CAPACITY)))
    }

    /// Number of currently held slots.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Total capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Try to take one slot; `None` when the registry is exhausted.
    pub fn acquire(self: &Arc<Self>) -> Option<SlotGuard> {
        let mut current = self.active.load(Ordering::Relaxed);
        loop {
            if current >= self.capacity {
                return None;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    return Some(SlotGuard {
                        slots: Arc::clone(self),
                    })
                }
                Err(observed) => current = observed,
            }
        }
    }
}

/// RAII guard for one held timer slot; releases on drop.
#[derive(Debug)]
pub struct SlotGuard {
    slots: Arc<TimerSlots>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_exhaust_and_release() {
        let slots = TimerSlots::with_capacity(2);

        let a = slots.acquire().expect("first slot");
        let _b = slots.acquire().expect("second slot");
        assert_eq!(slots.active(), 2);
        assert!(slots.acquire().is_none());

        drop(a);
        assert_eq!(slots.active(), 1);
        assert!(slots.acquire().is_some());
    }

    #[test]
    fn global_registry_is_shared() {
        let a = TimerSlots::global();
        let b = TimerSlots::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.capacity(), DEFAULT_SLOT_CAPACITY);
    }
}
