//! Authenticated session protocol: nonce arithmetic and the
//! ticket/request exchange engine.

pub mod engine;
pub mod nonce;
