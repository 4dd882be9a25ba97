//! Dedicated-thread timer driver.
//!
//! `ThreadTimer` backs one timer with one worker thread per armed run. The
//! worker follows a drift-free schedule (`deadline += period`) and splits
//! each wait in two: an interruptible condvar sleep for the bulk of the
//! period, then a spin-sleep tail for the final few milliseconds, which is
//! where the precision beyond the host scheduler tick comes from. The
//! resolution hint controls how much of that tail is busy-spun: 0 requests
//! the finest timing, larger values trade accuracy for idle CPU.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;
use tracing::{debug, warn};

use super::{SlotGuard, TickCallback, TimerDriver, TimerSlots};
use crate::events::EventArgs;

/// Width of the wait tail handed to the spin sleeper.
///
/// The condvar sleep is only accurate to the host scheduler tick (commonly
/// 1-16ms), so everything inside this window is delegated to the spin
/// sleeper to hit the deadline.
const SPIN_HANDOFF: Duration = Duration::from_millis(3);

/// Floor for the spin sleeper's native accuracy, in nanoseconds.
///
/// A resolution hint of 0 maps to this: thread-sleep until ~50µs before the
/// deadline, then spin.
const MIN_SPIN_ACCURACY_NS: u32 = 50_000;

/// Default platform timer driver: one worker thread per armed run.
pub struct ThreadTimer {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

/// State shared between the façade-facing handle and the worker thread.
struct Inner {
    period_ms: AtomicU64,
    resolution_ms: AtomicU64,
    auto_reset: AtomicBool,
    armed: AtomicBool,
    disposed: AtomicBool,
    /// Bumped on every disarm; a worker whose generation no longer matches
    /// winds down without ticking again.
    generation: AtomicU64,
    tick: Mutex<Option<TickCallback>>,
    args: Mutex<Option<EventArgs>>,
    wake: Mutex<()>,
    wake_cv: Condvar,
    slots: Arc<TimerSlots>,
}

struct Worker {
    handle: JoinHandle<()>,
    thread_id: ThreadId,
}

impl ThreadTimer {
    /// Create a driver drawing from the process-wide slot registry.
    pub fn new() -> Self {
        Self::with_slots(TimerSlots::global())
    }

    /// Create a driver drawing from an explicit slot registry.
    pub fn with_slots(slots: Arc<TimerSlots>) -> Self {
        Self {
            inner: Arc::new(Inner {
                period_ms: AtomicU64::new(0),
                resolution_ms: AtomicU64::new(0),
                auto_reset: AtomicBool::new(true),
                armed: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                tick: Mutex::new(None),
                args: Mutex::new(None),
                wake: Mutex::new(()),
                wake_cv: Condvar::new(),
                slots,
            }),
            worker: Mutex::new(None),
        }
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reap a previous worker without blocking on a live one.
    ///
    /// Called under the worker lock with `armed == false`, so the previous
    /// thread has either exited or is past its last cancellation check.
    fn reap(worker: &mut Option<Worker>) {
        if let Some(old) = worker.take() {
            if old.thread_id != thread::current().id() {
                let _ = old.handle.join();
            }
        }
    }
}

impl Default for ThreadTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerDriver for ThreadTimer {
    fn arm(&self) -> bool {
        if self.inner.disposed.load(Ordering::Acquire) {
            return false;
        }

        let mut worker = self.lock_worker();
        if self.inner.armed.load(Ordering::Acquire) {
            // Already running; the schedule is kept as-is and the caller
            // resolves this through is_armed().
            return false;
        }
        Self::reap(&mut worker);

        let period_ms = self.inner.period_ms.load(Ordering::Acquire);
        if period_ms == 0 {
            return false;
        }
        let tick = match lock(&self.inner.tick).clone() {
            Some(tick) => tick,
            None => return false,
        };
        let slot = match self.inner.slots.acquire() {
            Some(slot) => slot,
            None => {
                warn!(
                    active = self.inner.slots.active(),
                    capacity = self.inner.slots.capacity(),
                    "timer slot registry exhausted; refusing to arm"
                );
                return false;
            }
        };

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.armed.store(true, Ordering::Release);

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("precision-timer".into())
            .spawn(move || run(inner, generation, tick, slot));
        let handle = match handle {
            Ok(handle) => handle,
            Err(err) => {
                warn!("failed to spawn timer thread: {err}");
                self.inner.armed.store(false, Ordering::Release);
                return false;
            }
        };

        debug!(period_ms, generation, "timer armed");
        let thread_id = handle.thread().id();
        *worker = Some(Worker { handle, thread_id });
        true
    }

    fn disarm(&self) {
        let taken = {
            let mut worker = self.lock_worker();
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
            self.inner.armed.store(false, Ordering::Release);
            // Pairs with the cancellation re-check the worker performs
            // under the wake lock before sleeping.
            drop(lock(&self.inner.wake));
            self.inner.wake_cv.notify_all();
            worker.take()
        };

        if let Some(old) = taken {
            if old.thread_id == thread::current().id() {
                // Disarm from inside the tick callback: joining would
                // self-deadlock. The thread winds down right after the
                // callback returns and releases its slot then.
                debug!("disarm requested from tick thread; detaching");
            } else {
                let _ = old.handle.join();
                debug!("timer disarmed");
            }
        }
    }

    fn is_armed(&self) -> bool {
        self.inner.armed.load(Ordering::Acquire)
    }

    fn set_tick(&self, callback: TickCallback) {
        *lock(&self.inner.tick) = Some(callback);
    }

    fn set_period_ms(&self, ms: u64) {
        self.inner.period_ms.store(ms, Ordering::Release);
    }

    fn period_ms(&self) -> u64 {
        self.inner.period_ms.load(Ordering::Acquire)
    }

    fn set_resolution_ms(&self, ms: u64) {
        self.inner.resolution_ms.store(ms, Ordering::Release);
    }

    fn resolution_ms(&self) -> u64 {
        self.inner.resolution_ms.load(Ordering::Acquire)
    }

    fn set_auto_reset(&self, periodic: bool) {
        self.inner.auto_reset.store(periodic, Ordering::Release);
    }

    fn auto_reset(&self) -> bool {
        self.inner.auto_reset.load(Ordering::Acquire)
    }

    fn set_args(&self, args: Option<EventArgs>) {
        *lock(&self.inner.args) = args;
    }

    fn args(&self) -> Option<EventArgs> {
        lock(&self.inner.args).clone()
    }

    fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.disarm();
        debug!("timer disposed");
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for ThreadTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadTimer")
            .field("armed", &self.is_armed())
            .field("period_ms", &self.period_ms())
            .field("resolution_ms", &self.resolution_ms())
            .field("auto_reset", &self.auto_reset())
            .field("disposed", &self.inner.disposed.load(Ordering::Acquire))
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Worker loop
// =============================================================================

/// Body of the tick thread for one armed run.
fn run(inner: Arc<Inner>, generation: u64, tick: TickCallback, _slot: SlotGuard) {
    let mut period = Duration::from_millis(inner.period_ms.load(Ordering::Acquire).max(1));
    let mut deadline = Instant::now() + period;

    loop {
        if !wait_until(&inner, deadline, generation) {
            break;
        }

        tick();

        if !inner.auto_reset.load(Ordering::Acquire) {
            // One-shot: self-disarm, unless a disarm already superseded us.
            if inner.generation.load(Ordering::Acquire) == generation {
                inner.armed.store(false, Ordering::Release);
            }
            break;
        }

        // Live period changes apply from here; the completed wait is not
        // retroactively retimed.
        period = Duration::from_millis(inner.period_ms.load(Ordering::Acquire).max(1));
        deadline += period;
        let now = Instant::now();
        if deadline < now {
            debug!(
                overrun_ms = (now - deadline).as_millis() as u64,
                "tick callback overran its period; skipping missed ticks"
            );
            deadline = now + period;
        }
    }
    // Slot guard dropped here, freeing the registry entry.
}

/// Sleep until `deadline`, or return `false` if the run was cancelled.
///
/// Coarse, interruptible condvar sleep down to the spin handoff window,
/// then an uninterruptible spin-sleep tail (bounded by the window, so
/// cancellation latency stays within a few milliseconds).
fn wait_until(inner: &Inner, deadline: Instant, generation: u64) -> bool {
    let cancelled =
        || inner.generation.load(Ordering::Acquire) != generation || !inner.armed.load(Ordering::Acquire);

    loop {
        if cancelled() {
            return false;
        }

        let now = Instant::now();
        if now >= deadline {
            return !cancelled();
        }
        let remaining = deadline - now;
        let tail = spin_tail(inner);

        if remaining > tail {
            let guard = lock(&inner.wake);
            // Re-check under the wake lock: disarm touches this lock before
            // notifying, so a cancellation cannot slip between the check
            // and the wait.
            if cancelled() {
                return false;
            }
            let _ = inner
                .wake_cv
                .wait_timeout(guard, remaining - tail)
                .unwrap_or_else(PoisonError::into_inner);
        } else {
            sleeper(inner).sleep(remaining);
            return !cancelled();
        }
    }
}

/// How much of the wait is left to the spin sleeper.
///
/// A resolution hint at or beyond the handoff width means the caller
/// tolerates scheduler-tick slack; skip spinning entirely.
fn spin_tail(inner: &Inner) -> Duration {
    if inner.resolution_ms.load(Ordering::Acquire) >= SPIN_HANDOFF.as_millis() as u64 {
        Duration::ZERO
    } else {
        SPIN_HANDOFF
    }
}

/// Spin sleeper tuned from the resolution hint.
fn sleeper(inner: &Inner) -> SpinSleeper {
    let resolution_ns = inner
        .resolution_ms
        .load(Ordering::Acquire)
        .saturating_mul(1_000_000)
        .min(u32::MAX as u64) as u32;
    SpinSleeper::new(resolution_ns.max(MIN_SPIN_ACCURACY_NS))
}
