//! The `PrecisionTimer` façade.
//!
//! One `PrecisionTimer` owns at most one platform driver, created lazily on
//! first use behind a mutex so two threads racing through first use can
//! never construct (and leak) two drivers. Configuration is readable and
//! writable in any state; lifecycle notifications follow an intentional
//! asymmetry: `Started` fires only after a confirmed successful arm, while
//! `Stopped` fires on every `stop()` call, making it usable as a general
//! "tear-down happened" signal.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::config::{TimerConfig, MAX_PERIOD_MS, MIN_PERIOD_MS};
use crate::driver::{ThreadTimer, TimerDriver};
use crate::error::TimerError;
use crate::events::{EventArgs, ListenerId, ListenerSet};

type DriverFactory = Box<dyn Fn() -> Arc<dyn TimerDriver> + Send + Sync>;

/// High-resolution callback timer.
///
/// Invokes a user-supplied task at a configured interval, once or
/// repeatedly, on a dedicated timing thread; never on the caller's thread.
/// All methods are callable from any thread.
///
/// # Example
///
/// ```no_run
/// use precision_timer::{PrecisionTimer, TimerConfig};
///
/// let timer = PrecisionTimer::new();
/// timer.configure(|| println!("tick"), TimerConfig::periodic(50), None)?;
/// std::thread::sleep(std::time::Duration::from_millis(500));
/// timer.stop(None);
/// timer.dispose();
/// # Ok::<(), precision_timer::TimerError>(())
/// ```
pub struct PrecisionTimer {
    /// Ownership slot for the driver; absent until first use.
    driver: Mutex<Option<Arc<dyn TimerDriver>>>,
    factory: DriverFactory,
    started: ListenerSet,
    stopped: ListenerSet,
}

impl PrecisionTimer {
    /// Create a timer backed by the default dedicated-thread driver.
    pub fn new() -> Self {
        Self::with_driver(|| Arc::new(ThreadTimer::new()))
    }

    /// Create a timer backed by a custom driver.
    ///
    /// The factory runs at most once, on the first operation that needs a
    /// driver. Intended for injecting platform shims or test doubles.
    pub fn with_driver<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn TimerDriver> + Send + Sync + 'static,
    {
        Self {
            driver: Mutex::new(None),
            factory: Box::new(factory),
            started: ListenerSet::new("Started"),
            stopped: ListenerSet::new("Stopped"),
        }
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Configure the timer in one call: task, interval, mode, payload.
    ///
    /// Replaces any previously registered task (last writer wins; tasks do
    /// not compose), applies the period/resolution/periodic settings, and
    /// arms the timer immediately when `config.auto_start` is set. A `Some`
    /// payload replaces the stored lifecycle payload; `None` leaves it
    /// untouched.
    pub fn configure<F>(
        &self,
        task: F,
        config: TimerConfig,
        args: Option<EventArgs>,
    ) -> Result<(), TimerError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        config.validate()?;

        let driver = self.handle();
        driver.set_tick(Arc::new(task));
        driver.set_period_ms(config.period_ms);
        driver.set_resolution_ms(config.resolution_ms);
        driver.set_auto_reset(config.periodic);
        if args.is_some() {
            driver.set_args(args);
        }

        if config.auto_start {
            self.start(None)?;
        }
        Ok(())
    }

    /// Replace the tick task without arming.
    pub fn set_action<F>(&self, task: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.handle().set_tick(Arc::new(task));
    }

    /// Set the tick interval in milliseconds.
    ///
    /// While running, the change applies when the driver schedules the next
    /// tick; the wait already in progress is not retimed.
    pub fn set_interval(&self, ms: u64) -> Result<(), TimerError> {
        if !(MIN_PERIOD_MS..=MAX_PERIOD_MS).contains(&ms) {
            return Err(TimerError::InvalidPeriod(ms));
        }
        self.handle().set_period_ms(ms);
        Ok(())
    }

    /// Current tick interval in milliseconds (0 when never configured).
    pub fn interval(&self) -> u64 {
        self.handle().period_ms()
    }

    /// Set the resolution hint in milliseconds (0 = finest available).
    ///
    /// Rejected eagerly when it exceeds an already-configured interval.
    pub fn set_resolution(&self, ms: u64) -> Result<(), TimerError> {
        let driver = self.handle();
        let period = driver.period_ms();
        if period != 0 && ms > period {
            return Err(TimerError::InvalidResolution {
                resolution: ms,
                period,
            });
        }
        driver.set_resolution_ms(ms);
        Ok(())
    }

    /// Current resolution hint in milliseconds.
    pub fn resolution(&self) -> u64 {
        self.handle().resolution_ms()
    }

    /// Set periodic (`true`) or one-shot (`false`) mode.
    ///
    /// A change while running applies after the next tick fires.
    pub fn set_periodic(&self, periodic: bool) {
        self.handle().set_auto_reset(periodic);
    }

    /// Whether the timer is in periodic mode.
    pub fn periodic(&self) -> bool {
        self.handle().auto_reset()
    }

    /// Store the payload forwarded to lifecycle listeners.
    ///
    /// An explicit `args` argument to [`start`](Self::start) or
    /// [`stop`](Self::stop) takes precedence over this stored payload.
    pub fn set_event_args(&self, args: Option<EventArgs>) {
        self.handle().set_args(args);
    }

    /// The stored lifecycle payload, if any.
    pub fn event_args(&self) -> Option<EventArgs> {
        self.handle().args()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Arm the timer with the current configuration.
    ///
    /// Validates the stored configuration eagerly, then asks the driver to
    /// arm. `Started` listeners are notified only after the driver confirms
    /// the arm; a refused arm raises no notification and surfaces as
    /// [`TimerError::ArmFailed`]. Calling `start` on a timer that is
    /// already running is an accepted no-op: `Ok(())`, no second `Started`,
    /// no restart.
    pub fn start(&self, args: Option<EventArgs>) -> Result<(), TimerError> {
        let driver = self.handle();
        if driver.is_armed() {
            return Ok(());
        }

        self.stored_config(&driver).validate()?;

        if driver.arm() {
            debug!("timer started");
            let payload = args.or_else(|| driver.args());
            self.started.notify(payload.as_ref());
            Ok(())
        } else if driver.is_armed() {
            // Lost a start/start race; the winner sent the notification.
            Ok(())
        } else {
            Err(TimerError::ArmFailed)
        }
    }

    /// Stop the timer.
    ///
    /// Disarms the driver if one exists and waits for any in-flight tick on
    /// the timing thread to finish (unless called from the tick task
    /// itself, where the disarm is asynchronous; see [`ThreadTimer`]).
    /// Exactly one `Stopped` notification is raised per call, whether or
    /// not the timer was running; stopping is always safe to announce.
    pub fn stop(&self, args: Option<EventArgs>) {
        let driver = self.lock_slot().clone();
        let payload = args.or_else(|| driver.as_ref().and_then(|d| d.args()));
        if let Some(driver) = driver {
            driver.disarm();
            debug!("timer stopped");
        }
        self.stopped.notify(payload.as_ref());
    }

    /// Whether the timer is currently running.
    ///
    /// `false` when no driver was ever created; otherwise the driver's live
    /// armed state. Does not lazily create.
    pub fn is_running(&self) -> bool {
        self.lock_slot().as_ref().is_some_and(|d| d.is_armed())
    }

    /// Release the owned driver and its timer resource.
    ///
    /// Idempotent, and safe on a never-started timer. The instance returns
    /// to the unconfigured state: a later mutating call lazily creates a
    /// fresh driver with default settings.
    pub fn dispose(&self) {
        let taken = self.lock_slot().take();
        if let Some(driver) = taken {
            driver.dispose();
            debug!("timer disposed");
        }
    }

    // =========================================================================
    // Lifecycle listeners
    // =========================================================================

    /// Register a listener for the `Started` notification.
    ///
    /// Listeners run in registration order on the thread that called
    /// `start`, after the driver confirmed the arm. A panicking listener is
    /// logged and does not suppress the listeners after it.
    pub fn on_started<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&EventArgs>) + Send + Sync + 'static,
    {
        self.started.add(listener)
    }

    /// Register a listener for the `Stopped` notification.
    ///
    /// Runs on every `stop()` call, in registration order, on the calling
    /// thread.
    pub fn on_stopped<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(Option<&EventArgs>) + Send + Sync + 'static,
    {
        self.stopped.add(listener)
    }

    /// Remove a `Started` listener; returns whether it was registered.
    pub fn remove_started_listener(&self, id: ListenerId) -> bool {
        self.started.remove(id)
    }

    /// Remove a `Stopped` listener; returns whether it was registered.
    pub fn remove_stopped_listener(&self, id: ListenerId) -> bool {
        self.stopped.remove(id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Get the driver, creating it on first use.
    ///
    /// The slot mutex makes create-if-absent atomic: two threads racing
    /// through first use observe exactly one driver. The lock is released
    /// before any blocking driver call (`disarm` joins the tick thread), so
    /// a listener or tick task may re-enter the façade freely.
    fn handle(&self) -> Arc<dyn TimerDriver> {
        let mut slot = self.lock_slot();
        Arc::clone(slot.get_or_insert_with(|| (self.factory)()))
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Arc<dyn TimerDriver>>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the driver-held settings for eager validation.
    fn stored_config(&self, driver: &Arc<dyn TimerDriver>) -> TimerConfig {
        TimerConfig {
            period_ms: driver.period_ms(),
            resolution_ms: driver.resolution_ms(),
            periodic: driver.auto_reset(),
            auto_start: false,
        }
    }
}

impl Default for PrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrecisionTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrecisionTimer")
            .field("configured", &self.lock_slot().is_some())
            .field("running", &self.is_running())
            .finish()
    }
}
