//! Shared test doubles for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use precision_timer::driver::{TickCallback, TimerDriver};
use precision_timer::EventArgs;

/// Scriptable in-process driver: no thread, no clock.
///
/// Arm outcomes are controlled by the test; ticks are fired manually with
/// [`MockDriver::fire_tick`].
#[derive(Default)]
pub struct MockDriver {
    accept_arm: AtomicBool,
    armed: AtomicBool,
    disposed: AtomicBool,
    pub arm_calls: AtomicUsize,
    pub disarm_calls: AtomicUsize,
    period_ms: AtomicU64,
    resolution_ms: AtomicU64,
    auto_reset: AtomicBool,
    tick: Mutex<Option<TickCallback>>,
    args: Mutex<Option<EventArgs>>,
}

impl MockDriver {
    /// A driver that accepts every arm request.
    pub fn accepting() -> Arc<Self> {
        let driver = Self::default();
        driver.accept_arm.store(true, Ordering::SeqCst);
        driver.auto_reset.store(true, Ordering::SeqCst);
        Arc::new(driver)
    }

    /// A driver that refuses every arm request (simulated resource
    /// exhaustion).
    pub fn refusing() -> Arc<Self> {
        let driver = Self::default();
        driver.auto_reset.store(true, Ordering::SeqCst);
        Arc::new(driver)
    }

    /// Invoke the registered tick callback, as the platform thread would.
    pub fn fire_tick(&self) {
        let tick = self.tick.lock().unwrap().clone();
        if let Some(tick) = tick {
            tick();
            if !self.auto_reset.load(Ordering::SeqCst) {
                self.armed.store(false, Ordering::SeqCst);
            }
        }
    }
}

impl TimerDriver for MockDriver {
    fn arm(&self) -> bool {
        self.arm_calls.fetch_add(1, Ordering::SeqCst);
        if self.disposed.load(Ordering::SeqCst) || !self.accept_arm.load(Ordering::SeqCst) {
            return false;
        }
        !self.armed.swap(true, Ordering::SeqCst)
    }

    fn disarm(&self) {
        self.disarm_calls.fetch_add(1, Ordering::SeqCst);
        self.armed.store(false, Ordering::SeqCst);
    }

    fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn set_tick(&self, callback: TickCallback) {
        *self.tick.lock().unwrap() = Some(callback);
    }

    fn set_period_ms(&self, ms: u64) {
        self.period_ms.store(ms, Ordering::SeqCst);
    }

    fn period_ms(&self) -> u64 {
        self.period_ms.load(Ordering::SeqCst)
    }

    fn set_resolution_ms(&self, ms: u64) {
        self.resolution_ms.store(ms, Ordering::SeqCst);
    }

    fn resolution_ms(&self) -> u64 {
        self.resolution_ms.load(Ordering::SeqCst)
    }

    fn set_auto_reset(&self, periodic: bool) {
        self.auto_reset.store(periodic, Ordering::SeqCst);
    }

    fn auto_reset(&self) -> bool {
        self.auto_reset.load(Ordering::SeqCst)
    }

    fn set_args(&self, args: Option<EventArgs>) {
        *self.args.lock().unwrap() = args;
    }

    fn args(&self) -> Option<EventArgs> {
        self.args.lock().unwrap().clone()
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.armed.store(false, Ordering::SeqCst);
    }
}
