//! Battery supervision via an external voltage comparator.
//!
//! The comparator pulls its output low once the cell drops below the
//! threshold set by its divider, so the adapter is a single GPIO read.
//! Generic over any `embedded-hal` input pin.

use embedded_hal::digital::InputPin;
use log::warn;

use crate::app::ports::BatteryPort;

pub struct ComparatorBattery<P> {
    sense: P,
}

impl<P: InputPin> ComparatorBattery<P> {
    pub fn new(sense: P) -> Self {
        Self { sense }
    }
}

impl<P: InputPin> BatteryPort for ComparatorBattery<P> {
    fn is_low(&mut self) -> bool {
        match self.sense.is_low() {
            Ok(low) => low,
            Err(e) => {
                // An unreadable sense pin reads as low: the exchange still
                // completes, with the battery flag raised.
                warn!("battery sense pin fault: {e:?}");
                true
            }
        }
    }
}
