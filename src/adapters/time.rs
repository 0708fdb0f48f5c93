//! Monotonic clock adapter for the framer's deadlines.

use crate::link::framer::Clock;

/// Millisecond clock over the ESP-IDF high-resolution timer, which keeps
/// counting through light sleep.
#[cfg(feature = "espidf")]
pub struct MonotonicClock;

#[cfg(feature = "espidf")]
impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "espidf")]
impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time has no preconditions once the system
        // timer is running, which esp-idf-svc guarantees before main.
        let micros = unsafe { esp_idf_svc::sys::esp_timer_get_time() };
        (micros / 1000) as u64
    }
}

/// Host stand-in: milliseconds since construction.
#[cfg(not(feature = "espidf"))]
pub struct MonotonicClock {
    start: std::time::Instant,
}

#[cfg(not(feature = "espidf"))]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(not(feature = "espidf"))]
impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}
