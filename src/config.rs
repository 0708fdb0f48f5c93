//! System configuration parameters
//!
//! All tunable parameters for the deadbolt firmware.  The lock ships with
//! the defaults below; values can be overridden from non-volatile storage
//! at boot.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Serial link ---
    /// Per-byte serial deadline (milliseconds).  Applies to both the
    /// clear-to-send wait on transmit and the inter-byte gap on receive.
    pub uart_timeout_ms: u32,

    // --- Advertising ---
    /// Minimum advertising interval, in 625 us radio units.
    pub adv_interval_min: u16,
    /// Maximum advertising interval, in 625 us radio units.
    pub adv_interval_max: u16,
    /// Advertising channel bitmap (bit 0 = ch 37, bit 1 = ch 38, bit 2 = ch 39).
    pub adv_channels: u8,

    // --- Motor ---
    /// Spin-up grace before the stall current sense is trusted (milliseconds).
    pub motor_spinup_ms: u32,
    /// Hard cap on a single rotation, jam or not (milliseconds).
    pub motor_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Serial link
            uart_timeout_ms: 100,

            // Advertising: 200-218.75 ms interval on all three channels
            adv_interval_min: 320,
            adv_interval_max: 350,
            adv_channels: 0b0000_0111,

            // Motor
            motor_spinup_ms: 400,
            motor_timeout_ms: 10_000,
        }
    }
}

/// Validate a configuration before use.
///
/// Rejecting here keeps a corrupted NVS blob from bricking the radio
/// bring-up sequence with parameters the co-processor would refuse.
pub fn validate_config(config: &SystemConfig) -> Result<(), &'static str> {
    if config.uart_timeout_ms == 0 {
        return Err("uart_timeout_ms must be non-zero");
    }
    if config.adv_interval_min == 0 || config.adv_interval_min > config.adv_interval_max {
        return Err("adv interval min must be in 1..=max");
    }
    if config.adv_channels == 0 || config.adv_channels > 0b0000_0111 {
        return Err("adv_channels must select at least one of the three channels");
    }
    if config.motor_timeout_ms <= config.motor_spinup_ms {
        return Err("motor_timeout_ms must exceed motor_spinup_ms");
    }
    Ok(())
}
