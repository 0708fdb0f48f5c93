//! Deadbolt firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection.  Everything that touches ESP-IDF is gated behind the
//! `espidf` feature, so the library and its test suite build on the host.
//!
//! ```text
//!   UART ISR ──▶ byte ring ──▶ framer ──▶ wire codec ──▶ dispatch
//!                                                           │
//!                              FSM ◀── context blackboard ◀─┘
//!                               │
//!                         auth engine ──▶ motor / battery / store
//! ```

#![deny(unused_must_use)]

pub mod app;
pub mod auth;
pub mod config;
pub mod crypto;
pub mod events;
pub mod fsm;
pub mod link;
pub mod store;

mod error;

pub mod adapters;

pub use error::{AuthError, Error, LinkError, ProtocolError, Result};
