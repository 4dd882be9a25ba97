//! # precision-timer
//!
//! High-resolution callback timer: invokes user-supplied work at a
//! configured interval with sub-millisecond-class precision, once
//! ("one-shot") or repeatedly ("periodic"), independent of the host's
//! coarse default scheduler tick.
//!
//! Intended for latency-sensitive work (media pacing, polling loops,
//! soft-real-time control) that cannot tolerate the jitter of ordinary
//! interval timers. The tick task runs on a dedicated timing thread, never
//! on the caller's thread; what this crate does *not* promise is hard
//! real-time determinism; the driver's own jitter bound is inherited, not
//! improved upon.
//!
//! ## Quick Start
//!
//! ```no_run
//! use precision_timer::{PrecisionTimer, TimerConfig};
//!
//! let timer = PrecisionTimer::new();
//!
//! // Fires every 50ms until stopped.
//! timer.configure(|| do_work(), TimerConfig::periodic(50), None)?;
//!
//! std::thread::sleep(std::time::Duration::from_millis(500));
//! timer.stop(None);   // waits for an in-flight tick, fires `Stopped`
//! timer.dispose();
//! # fn do_work() {}
//! # Ok::<(), precision_timer::TimerError>(())
//! ```
//!
//! ## Lifecycle notifications
//!
//! `Started` fires only after the driver confirms a successful arm;
//! `Stopped` fires on every [`PrecisionTimer::stop`] call, running or not.
//! This asymmetry is intentional: stopping is always safe to announce,
//! starting is announced only on confirmed success.
//!
//! ```no_run
//! use precision_timer::{PrecisionTimer, TimerConfig};
//!
//! let timer = PrecisionTimer::new();
//! timer.on_started(|_args| println!("armed"));
//! timer.on_stopped(|_args| println!("torn down"));
//! timer.configure(|| {}, TimerConfig::one_shot(100), None)?;
//! # Ok::<(), precision_timer::TimerError>(())
//! ```
//!
//! ## Backing drivers
//!
//! The façade is written against the [`driver::TimerDriver`] capability,
//! not a specific OS call. The default [`driver::ThreadTimer`] paces a
//! dedicated thread with a condvar sleep plus spin-sleep tail; tests and
//! alternative platforms can inject their own driver via
//! [`PrecisionTimer::with_driver`].

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod events;
mod timer;

pub mod driver;

pub use config::{TimerConfig, MAX_PERIOD_MS, MIN_PERIOD_MS};
pub use error::TimerError;
pub use events::{EventArgs, ListenerId};
pub use timer::PrecisionTimer;
