//! H-bridge motor adapter for the bolt actuator.
//!
//! A rotation energises one direction input, waits out the spin-up grace
//! (the end-stop switch releases as the bolt leaves its seat and bounces
//! while the motor starts), then polls the end-stop until the bolt lands
//! in the opposite seat or the hard time cap expires.  The cap is the jam
//! guard: a seized bolt must not leave the motor energised indefinitely.
//!
//! Generic over `embedded-hal` pins and delay, so the same adapter drives
//! ESP-IDF `PinDriver`s on the device and plain fakes in host tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::app::ports::{ActuatorPort, RotateOutcome};
use crate::config::SystemConfig;

const POLL_INTERVAL_MS: u32 = 10;

pub struct MotorAdapter<Cw, Ccw, Stop, D> {
    clockwise_pin: Cw,
    counter_clockwise_pin: Ccw,
    end_stop: Stop,
    delay: D,
    spinup_ms: u32,
    timeout_ms: u32,
}

impl<Cw, Ccw, Stop, D> MotorAdapter<Cw, Ccw, Stop, D>
where
    Cw: OutputPin,
    Ccw: OutputPin,
    Stop: InputPin,
    D: DelayNs,
{
    pub fn new(
        clockwise_pin: Cw,
        counter_clockwise_pin: Ccw,
        end_stop: Stop,
        delay: D,
        config: &SystemConfig,
    ) -> Self {
        Self {
            clockwise_pin,
            counter_clockwise_pin,
            end_stop,
            delay,
            spinup_ms: config.motor_spinup_ms,
            timeout_ms: config.motor_timeout_ms,
        }
    }

    fn rotate(&mut self, clockwise: bool) -> RotateOutcome {
        let energise = if clockwise {
            self.clockwise_pin
                .set_high()
                .map_err(|e| warn!("motor drive pin fault: {e:?}"))
        } else {
            self.counter_clockwise_pin
                .set_high()
                .map_err(|e| warn!("motor drive pin fault: {e:?}"))
        };
        if energise.is_err() {
            return RotateOutcome::TimedOut;
        }

        self.delay.delay_ms(self.spinup_ms);

        let mut elapsed = self.spinup_ms;
        let outcome = loop {
            if matches!(self.end_stop.is_high(), Ok(true)) {
                break RotateOutcome::Completed;
            }
            if elapsed >= self.timeout_ms {
                warn!("rotation hit the {}ms cap, stopping", self.timeout_ms);
                break RotateOutcome::TimedOut;
            }
            self.delay.delay_ms(POLL_INTERVAL_MS);
            elapsed += POLL_INTERVAL_MS;
        };

        self.stop();
        outcome
    }

    fn stop(&mut self) {
        if let Err(e) = self.clockwise_pin.set_low() {
            warn!("motor stop pin fault: {e:?}");
        }
        if let Err(e) = self.counter_clockwise_pin.set_low() {
            warn!("motor stop pin fault: {e:?}");
        }
    }
}

impl<Cw, Ccw, Stop, D> ActuatorPort for MotorAdapter<Cw, Ccw, Stop, D>
where
    Cw: OutputPin,
    Ccw: OutputPin,
    Stop: InputPin,
    D: DelayNs,
{
    fn rotate_clockwise(&mut self) -> RotateOutcome {
        self.rotate(true)
    }

    fn rotate_counter_clockwise(&mut self) -> RotateOutcome {
        self.rotate(false)
    }
}
