//! Serial link to the BLE radio co-processor.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     Link Stack                           │
//! │                                                          │
//! │  ┌───────────┐   ┌──────────┐   ┌────────────────────┐  │
//! │  │ UART ISR  │──▶│ Rx ring  │──▶│ Framer             │  │
//! │  │ (bytes)   │   │ (spsc)   │   │ (deadline framing) │  │
//! │  └───────────┘   └──────────┘   └─────────┬──────────┘  │
//! │                                           ▼             │
//! │                                 ┌────────────────────┐  │
//! │                                 │ Wire codec         │  │
//! │                                 │ (typed messages)   │  │
//! │                                 └────────────────────┘  │
//! │                                                          │
//! │  Outbound responses pass through the chunker (20/20/1). │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod accumulator;
pub mod chunker;
pub mod framer;
pub mod wire;
