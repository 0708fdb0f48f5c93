//! ISR→main byte accumulator.
//!
//! The UART receive interrupt pushes raw bytes into a fixed-capacity SPSC
//! ring; the framer drains them from the main loop.  The ISR half can
//! never block and never reports errors upward — on overflow it latches a
//! flag, and the *consumer* surfaces [`LinkError::Overflow`] on its next
//! poll.  Lost ciphertext bytes can never be resynchronised, so overflow
//! is a fatal link fault rather than a silent drop.

use core::sync::atomic::{AtomicBool, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

use crate::error::LinkError;

/// Ring capacity in bytes.  Generously above the largest packet plus the
/// worst-case ISR latency backlog.
pub const RX_CAPACITY: usize = 256;

/// Owner of the ring storage.  Split once at startup; the producer half
/// moves into the ISR, the consumer half into the serial adapter.
pub struct RxAccumulator {
    queue: Queue<u8, RX_CAPACITY>,
    overflowed: AtomicBool,
}

impl RxAccumulator {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            overflowed: AtomicBool::new(false),
        }
    }

    pub fn split(&mut self) -> (RxProducer<'_>, RxConsumer<'_>) {
        let (producer, consumer) = self.queue.split();
        (
            RxProducer {
                inner: producer,
                overflowed: &self.overflowed,
            },
            RxConsumer {
                inner: consumer,
                overflowed: &self.overflowed,
            },
        )
    }
}

impl Default for RxAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR-side half.  `push` is lock-free and never blocks.
pub struct RxProducer<'a> {
    inner: Producer<'a, u8, RX_CAPACITY>,
    overflowed: &'a AtomicBool,
}

impl RxProducer<'_> {
    pub fn push(&mut self, byte: u8) {
        if self.inner.enqueue(byte).is_err() {
            self.overflowed.store(true, Ordering::Release);
        }
    }
}

/// Main-loop half.
pub struct RxConsumer<'a> {
    inner: Consumer<'a, u8, RX_CAPACITY>,
    overflowed: &'a AtomicBool,
}

impl RxConsumer<'_> {
    /// Pop the next byte, or report that the ring has overflowed.
    ///
    /// Once the overflow flag is latched every subsequent poll fails; the
    /// main loop escalates to a soft reset, which also clears the flag.
    pub fn pop(&mut self) -> Result<Option<u8>, LinkError> {
        if self.overflowed.load(Ordering::Acquire) {
            return Err(LinkError::Overflow);
        }
        Ok(self.inner.dequeue())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
