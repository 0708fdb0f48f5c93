//! Concrete adapters behind the port traits.
//!
//! | Adapter            | Port / trait           | Backing                         |
//! |--------------------|------------------------|---------------------------------|
//! | `SecretboxCipher`  | `CipherPort`           | XSalsa20Poly1305 (pure Rust)    |
//! | `UartLink`         | `SerialLink`           | ESP-IDF UART + flow-control GPIO|
//! | `MonotonicClock`   | `Clock`                | `esp_timer` / `std::Instant`    |
//! | `NvsStorage`       | `StoragePort`          | ESP-IDF NVS partition           |
//! | `MotorAdapter`     | `ActuatorPort`         | H-bridge GPIO + end-stop sense  |
//! | `ComparatorBattery`| `BatteryPort`          | Voltage comparator GPIO         |
//! | `LogEventSink`     | `EventSink`            | `log` crate                     |
//! | `MemStorage`       | `StoragePort`          | In-memory map (host tests)      |
//!
//! The cipher adapter lives in [`crate::crypto`].  The motor and battery
//! adapters are generic over `embedded-hal` pins and build anywhere; the
//! ESP-IDF-backed ones are gated on the `espidf` feature so the library
//! and its tests build on the host.

pub mod battery;
pub mod log_sink;
#[cfg(any(test, not(feature = "espidf")))]
pub mod mem;
pub mod motor;
#[cfg(feature = "espidf")]
pub mod nvs;
pub mod time;
#[cfg(feature = "espidf")]
pub mod uart;
