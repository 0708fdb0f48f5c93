//! Interrupt-driven local event system.
//!
//! Events are produced by:
//! - GPIO ISRs (wake pin from the radio, physical lock/unlock buttons)
//! - Timer callbacks (motor rotation watchdog)
//!
//! Events are consumed by the main control loop between FSM ticks.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Wake ISR    │────▶│              │     │              │
//! │ Button ISR  │────▶│  Event Queue │────▶│  Main Loop   │
//! │ Timer ISR   │────▶│  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Unlike the receive byte ring, these events are droppable: losing a
//! button edge degrades the user experience, losing ciphertext bytes
//! desynchronises the protocol.  A full queue therefore drops the newest
//! event and counts it instead of faulting.

use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 16;

/// Local (non-radio) event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    /// The radio pulsed the wake pin; leave light sleep and poll the link.
    WakePin = 0,
    /// Physical lock button pressed (clockwise rotation).
    ButtonLock = 1,
    /// Physical unlock button pressed (counter-clockwise rotation).
    ButtonUnlock = 2,
    /// The motor rotation watchdog expired (jam).
    MotorTimerExpired = 3,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// ISRs write (produce), main loop reads (consume).
// Uses atomic head/tail indices.  The buffer is intentionally
// kept in a static so ISR callbacks can access it.

static EVENT_HEAD: AtomicU8 = AtomicU8::new(0);
static EVENT_TAIL: AtomicU8 = AtomicU8::new(0);
static DROPPED: AtomicU32 = AtomicU32::new(0);
// SAFETY: EVENT_BUFFER is written only by the single producer side
// (ISR/timer context) at the head index and read only by the single
// consumer (main loop) at the tail index; the acquire/release pairs on
// EVENT_HEAD/EVENT_TAIL order those accesses.
static mut EVENT_BUFFER: [u8; EVENT_QUEUE_CAP] = [0; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from ISR context (lock-free).
/// Returns `false` if the queue is full (event dropped and counted).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP as u8;

    if next_head == tail {
        DROPPED.fetch_add(1, Ordering::Relaxed);
        return false;
    }

    // SAFETY: single producer; see buffer declaration.
    unsafe {
        EVENT_BUFFER[head as usize] = event as u8;
    }

    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None;
    }

    // SAFETY: single consumer; see buffer declaration.
    let raw = unsafe { EVENT_BUFFER[tail as usize] };
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP as u8, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed) as usize;
    let tail = EVENT_TAIL.load(Ordering::Relaxed) as usize;
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

/// Total events dropped because the queue was full.
pub fn dropped_count() -> u32 {
    DROPPED.load(Ordering::Relaxed)
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::WakePin),
        1 => Some(Event::ButtonLock),
        2 => Some(Event::ButtonUnlock),
        3 => Some(Event::MotorTimerExpired),
        _ => None,
    }
}
