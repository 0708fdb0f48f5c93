//! Deadbolt firmware — main entry point.
//!
//! Hexagonal architecture around a superloop:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  UartLink        NvsStorage    MotorAdapter   ComparatorBattery│
//! │  (SerialLink)    (StoragePort) (ActuatorPort) (BatteryPort)    │
//! │  SecretboxCipher MonotonicClock LogEventSink                   │
//! │  (CipherPort)    (Clock)        (EventSink)                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          LockService (pure logic)                      │    │
//! │  │  FSM · auth engine · credential store                  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pin assignment (ESP32-S3):
//!
//! | GPIO | Function                                  |
//! |------|-------------------------------------------|
//! | 17   | UART1 TX → radio                          |
//! | 18   | UART1 RX ← radio                          |
//! | 8    | clear-to-send sense (radio → MCU)         |
//! | 9    | ready-to-receive drive (MCU → radio)      |
//! | 10   | wake pulse from radio (light-sleep exit)  |
//! | 11   | lock button                               |
//! | 12   | unlock button                             |
//! | 13   | motor H-bridge, clockwise input           |
//! | 14   | motor H-bridge, counter-clockwise input   |
//! | 15   | bolt end-stop switch                      |
//! | 16   | battery comparator output                 |
#![deny(unused_must_use)]

use anyhow::{Context as _, Result, anyhow};
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyIOPin, IOPin, InterruptType, OutputPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sys::{
    esp, esp_light_sleep_start, esp_restart, esp_sleep_enable_gpio_wakeup, esp_task_wdt_deinit,
    gpio_int_type_t_GPIO_INTR_LOW_LEVEL, gpio_wakeup_enable,
};
use log::{debug, error, info, warn};

use deadbolt::adapters::battery::ComparatorBattery;
use deadbolt::adapters::log_sink::LogEventSink;
use deadbolt::adapters::motor::MotorAdapter;
use deadbolt::adapters::nvs::NvsStorage;
use deadbolt::adapters::time::MonotonicClock;
use deadbolt::adapters::uart::UartLink;
use deadbolt::app::ports::{StorageError, StoragePort};
use deadbolt::app::service::LockService;
use deadbolt::config::{SystemConfig, validate_config};
use deadbolt::crypto::SecretboxCipher;
use deadbolt::events::{self, Event, push_event};
use deadbolt::fsm::context::LockContext;
use deadbolt::link::accumulator::RxAccumulator;
use deadbolt::link::framer::Framer;
use deadbolt::link::wire::RadioMessage;
use deadbolt::store::CredentialStore;
use deadbolt::Error;

/// Development master key, replaced during manufacturing provisioning.
const DEV_MASTER_KEY: [u8; 32] = [
    0x64, 0x65, 0x61, 0x64, 0x62, 0x6F, 0x6C, 0x74, 0x2D, 0x64, 0x65, 0x76, 0x2D, 0x6B, 0x65,
    0x79, 0x2D, 0x64, 0x6F, 0x2D, 0x6E, 0x6F, 0x74, 0x2D, 0x73, 0x68, 0x69, 0x70, 0x2D, 0x76,
    0x30, 0x33,
];

/// GPIO number of the radio wake pin, for the sleep wakeup registration.
const WAKE_GPIO_NUM: i32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("deadbolt v{}", env!("CARGO_PKG_VERSION"));

    // Bolt rotations block for seconds; run without the task watchdog and
    // use the soft-reset path for fault recovery instead.
    if let Err(e) = esp!(unsafe { esp_task_wdt_deinit() }) {
        debug!("task watchdog already disabled: {e}");
    }

    let peripherals = Peripherals::take().context("peripherals already taken")?;

    // ── 2. Storage, config, credential ────────────────────────
    let partition = EspDefaultNvsPartition::take().context("NVS partition unavailable")?;
    let storage = NvsStorage::new(partition);

    let config = load_config(&storage);

    let store = match CredentialStore::open(storage.clone()) {
        Ok(store) => store,
        Err(StorageError::NotFound) => {
            warn!("no credential record, provisioning development key");
            CredentialStore::provision(storage.clone(), DEV_MASTER_KEY)
                .map_err(|e| anyhow!("credential provisioning failed: {e}"))?
        }
        Err(e) => {
            // A lock that cannot tell replayed tickets apart must not run.
            error!("credential store unusable ({e}) — halting");
            return Err(anyhow!("credential store unusable: {e}"));
        }
    };

    // ── 3. Serial link to the radio ───────────────────────────
    let uart = UartDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio17,
        peripherals.pins.gpio18,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart::config::Config::new().baudrate(Hertz(115_200)),
    )
    .context("UART init failed")?;

    let clear_to_send = PinDriver::input(peripherals.pins.gpio8.downgrade())?;
    let ready_to_receive = PinDriver::output(peripherals.pins.gpio9.downgrade_output())?;

    // The ring outlives the loop; leak it once so the halves are 'static.
    let ring: &'static mut RxAccumulator = Box::leak(Box::new(RxAccumulator::new()));
    let (rx_producer, rx_consumer) = ring.split();
    let link = UartLink::new(uart, clear_to_send, ready_to_receive, rx_producer, rx_consumer);
    let mut framer = Framer::new(link, MonotonicClock::new(), config.uart_timeout_ms);

    // ── 4. Wake pin and buttons ───────────────────────────────
    let mut wake_pin = PinDriver::input(peripherals.pins.gpio10.downgrade())?;
    wake_pin.set_pull(Pull::Up)?;
    wake_pin.set_interrupt_type(InterruptType::NegEdge)?;
    // SAFETY: the callback only touches the lock-free event queue.
    unsafe {
        wake_pin.subscribe(|| {
            push_event(Event::WakePin);
        })?;
    }
    wake_pin.enable_interrupt()?;

    let mut lock_button = PinDriver::input(peripherals.pins.gpio11.downgrade())?;
    lock_button.set_pull(Pull::Up)?;
    lock_button.set_interrupt_type(InterruptType::NegEdge)?;
    // SAFETY: as above.
    unsafe {
        lock_button.subscribe(|| {
            push_event(Event::ButtonLock);
        })?;
    }
    lock_button.enable_interrupt()?;

    let mut unlock_button = PinDriver::input(peripherals.pins.gpio12.downgrade())?;
    unlock_button.set_pull(Pull::Up)?;
    unlock_button.set_interrupt_type(InterruptType::NegEdge)?;
    // SAFETY: as above.
    unsafe {
        unlock_button.subscribe(|| {
            push_event(Event::ButtonUnlock);
        })?;
    }
    unlock_button.enable_interrupt()?;

    // Light sleep exits on the same wake pulse the ISR sees.
    esp!(unsafe { gpio_wakeup_enable(WAKE_GPIO_NUM, gpio_int_type_t_GPIO_INTR_LOW_LEVEL) })?;
    esp!(unsafe { esp_sleep_enable_gpio_wakeup() })?;

    // ── 5. Actuator, battery, service ─────────────────────────
    let motor = MotorAdapter::new(
        PinDriver::output(peripherals.pins.gpio13.downgrade_output())?,
        PinDriver::output(peripherals.pins.gpio14.downgrade_output())?,
        PinDriver::input(peripherals.pins.gpio15.downgrade())?,
        FreeRtos,
        &config,
    );
    let battery = ComparatorBattery::new(PinDriver::input(peripherals.pins.gpio16.downgrade())?);

    let mut ctx = LockContext::new(config);
    let mut service = LockService::new(SecretboxCipher::new(), motor, battery, store, LogEventSink::new());
    service.start(&mut ctx);

    info!("system ready, entering control loop");

    // ── 6. Superloop ──────────────────────────────────────────
    loop {
        framer.link_mut().pump();

        // Drain every complete frame the radio has queued.
        let mut fault: Option<Error> = None;
        loop {
            match framer.poll_frame() {
                Ok(Some((header, payload))) => match RadioMessage::decode(&header, &payload) {
                    Ok(message) => service.handle_message(&mut ctx, &message),
                    Err(e) => {
                        fault = Some(e.into());
                        break;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    fault = Some(e);
                    break;
                }
            }
        }

        // Local events (ISR-produced) and one FSM tick.
        events::drain_events(|event| service.handle_local_event(event));
        if fault.is_none() {
            if let Err(e) = service.tick(&mut ctx) {
                fault = Some(e);
            }
        }

        // Flush the commands this tick queued.
        if fault.is_none() {
            for command in &ctx.commands.radio {
                let (header, payload) = command.encode();
                if let Err(e) = framer.send(&header, &payload) {
                    fault = Some(e.into());
                    break;
                }
            }
        }
        ctx.commands.radio.clear();

        if let Some(e) = fault {
            soft_reset(e);
        }

        // One-shot GPIO interrupts: re-arm after every drain.
        wake_pin.enable_interrupt()?;
        lock_button.enable_interrupt()?;
        unlock_button.enable_interrupt()?;

        if ctx.commands.power_down && ctx.commands.radio.is_empty() && !ctx.chunker.is_active() {
            // Nothing in flight: sleep until the radio pulses the wake pin
            // or a button edge fires.
            // SAFETY: wake sources were registered during bring-up.
            unsafe {
                esp_light_sleep_start();
            }
        } else {
            FreeRtos::delay_ms(2);
        }
    }
}

/// Fatal faults leave the co-processor conversation in an unknown state;
/// the only recovery that re-runs the bring-up handshake is a restart.
fn soft_reset(e: Error) -> ! {
    debug_assert!(e.is_fatal());
    error!("fatal fault: {e} — soft reset");
    // Give the log line time to leave the debug UART.
    FreeRtos::delay_ms(50);
    unsafe { esp_restart() }
}

/// Load and validate the stored configuration, falling back to defaults.
fn load_config(storage: &NvsStorage) -> SystemConfig {
    let mut buf = [0u8; 128];
    match storage.read("config", "system", &mut buf) {
        Ok(len) => match postcard::from_bytes::<SystemConfig>(&buf[..len]) {
            Ok(config) => match validate_config(&config) {
                Ok(()) => {
                    info!("config loaded from NVS");
                    config
                }
                Err(reason) => {
                    warn!("stored config rejected ({reason}), using defaults");
                    SystemConfig::default()
                }
            },
            Err(_) => {
                warn!("stored config undecodable, using defaults");
                SystemConfig::default()
            }
        },
        Err(StorageError::NotFound) => {
            info!("no stored config, using defaults");
            SystemConfig::default()
        }
        Err(e) => {
            warn!("config read failed ({e}), using defaults");
            SystemConfig::default()
        }
    }
}
