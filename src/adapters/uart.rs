//! UART serial link to the radio co-processor.
//!
//! Flow control is GPIO-based rather than the UART peripheral's own
//! RTS/CTS: the radio asserts its clear-to-send input before we may
//! transmit a byte, and we assert ready-to-receive only while the framer
//! is actually draining a frame (the radio holds bytes back otherwise,
//! which is what lets the lock sit in light sleep between packets).
//!
//! The ESP-IDF UART driver buffers received bytes at interrupt time;
//! [`UartLink::pump`] moves them into the SPSC ring so that a backlog the
//! main loop failed to drain surfaces as a latched, fatal overflow instead
//! of silently corrupting the byte stream.

use esp_idf_hal::delay::NON_BLOCK;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, Input, Output, PinDriver};
use esp_idf_hal::uart::UartDriver;
use log::warn;

use crate::error::LinkError;
use crate::link::accumulator::{RxConsumer, RxProducer};
use crate::link::framer::SerialLink;

pub struct UartLink<'d> {
    uart: UartDriver<'d>,
    clear_to_send: PinDriver<'d, AnyIOPin, Input>,
    ready_to_receive: PinDriver<'d, AnyOutputPin, Output>,
    rx_producer: RxProducer<'static>,
    rx_consumer: RxConsumer<'static>,
}

impl<'d> UartLink<'d> {
    pub fn new(
        uart: UartDriver<'d>,
        clear_to_send: PinDriver<'d, AnyIOPin, Input>,
        ready_to_receive: PinDriver<'d, AnyOutputPin, Output>,
        rx_producer: RxProducer<'static>,
        rx_consumer: RxConsumer<'static>,
    ) -> Self {
        Self {
            uart,
            clear_to_send,
            ready_to_receive,
            rx_producer,
            rx_consumer,
        }
    }

    /// Drain the driver's interrupt-time FIFO into the byte ring.
    ///
    /// Call once per loop iteration, before polling the framer.
    pub fn pump(&mut self) {
        let mut chunk = [0u8; 16];
        loop {
            match self.uart.read(&mut chunk, NON_BLOCK) {
                Ok(0) => break,
                Ok(n) => {
                    for &byte in &chunk[..n] {
                        self.rx_producer.push(byte);
                    }
                }
                Err(e) => {
                    warn!("uart read fault: {e}");
                    break;
                }
            }
        }
    }
}

impl SerialLink for UartLink<'_> {
    fn poll_byte(&mut self) -> Result<Option<u8>, LinkError> {
        self.rx_consumer.pop()
    }

    fn try_write_byte(&mut self, byte: u8) -> Result<bool, LinkError> {
        if self.clear_to_send.is_low() {
            return Ok(false);
        }
        match self.uart.write(&[byte]) {
            Ok(1) => Ok(true),
            // TX FIFO full or a driver fault; the framer retries until its
            // deadline, so report not-sent rather than inventing an error.
            Ok(_) => Ok(false),
            Err(e) => {
                warn!("uart write fault: {e}");
                Ok(false)
            }
        }
    }

    fn set_ready_to_receive(&mut self, ready: bool) {
        let result = if ready {
            self.ready_to_receive.set_high()
        } else {
            self.ready_to_receive.set_low()
        };
        if let Err(e) = result {
            warn!("ready-to-receive pin fault: {e}");
        }
    }
}
