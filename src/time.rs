//! Time sources — microsecond timestamps for the scheduler
//!
//! The engine never reads a hardware counter itself. It asks a [`Clock`]
//! once per pass and once per observed suspension. On real hardware the
//! clock wraps SysTick (Cortex-M) or MTIME (RISC-V); for testing,
//! [`SysTimer`] is a software counter advanced by hand.

use core::cell::Cell;
use core::fmt;
use core::ops::Add;
use core::time::Duration;

/// Monotonic timestamp in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Instant(u64);

impl Instant {
    /// The origin. Tasks that never ran are due at this point.
    pub const ZERO: Instant = Instant(0);

    pub const fn from_micros(us: u64) -> Self {
        Self(us)
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1000))
    }

    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Elapsed time since `earlier`, zero if `earlier` is in the future
    pub fn saturating_duration_since(self, earlier: Instant) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    /// Saturates at `u64::MAX` microseconds
    fn add(self, rhs: Duration) -> Instant {
        let us = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Instant(self.0.saturating_add(us))
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}s", self.0 / 1_000_000, self.0 % 1_000_000)
    }
}

/// Source of the current time
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Software system timer
///
/// Advanced through `&self`, so a test can keep moving time forward while the
/// scheduler holds a shared reference to the same timer.
/// Size: 16 bytes
pub struct SysTimer {
    /// Current tick count (microseconds)
    ticks_us: Cell<u64>,
    /// Overflow count
    overflows: Cell<u32>,
}

impl SysTimer {
    /// Timer starting at zero
    pub const fn new() -> Self {
        Self {
            ticks_us: Cell::new(0),
            overflows: Cell::new(0),
        }
    }

    /// Timer starting at `start`
    pub const fn starting_at(start: Instant) -> Self {
        Self {
            ticks_us: Cell::new(start.as_micros()),
            overflows: Cell::new(0),
        }
    }

    /// Advance time by microseconds
    pub fn advance_us(&self, us: u64) {
        let old = self.ticks_us.get();
        let new = old.wrapping_add(us);
        if new < old {
            self.overflows.set(self.overflows.get() + 1);
        }
        self.ticks_us.set(new);
    }

    /// Advance time by a duration
    pub fn advance(&self, by: Duration) {
        self.advance_us(u64::try_from(by.as_micros()).unwrap_or(u64::MAX));
    }

    /// Current time in microseconds
    pub fn now_us(&self) -> u64 {
        self.ticks_us.get()
    }

    /// Current time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.ticks_us.get() / 1000
    }

    /// Reset timer
    pub fn reset(&self) {
        self.ticks_us.set(0);
        self.overflows.set(0);
    }

    /// Number of overflows
    pub fn overflows(&self) -> u32 {
        self.overflows.get()
    }

    /// Elapsed microseconds since a reference point
    pub fn elapsed_since(&self, reference: u64) -> u64 {
        self.ticks_us.get().wrapping_sub(reference)
    }
}

impl Default for SysTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SysTimer {
    fn now(&self) -> Instant {
        Instant(self.ticks_us.get())
    }
}

/// Host clock backed by `std::time::Instant`, anchored at construction
#[cfg(feature = "std")]
pub struct StdClock {
    epoch: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now(&self) -> Instant {
        let us = self.epoch.elapsed().as_micros();
        Instant(u64::try_from(us).unwrap_or(u64::MAX))
    }
}
