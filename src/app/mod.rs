//! Application layer: port traits, outbound events, and the service
//! gluing dispatch, FSM, and auth engine together.

pub mod events;
pub mod ports;
pub mod service;
