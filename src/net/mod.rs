//! Client-facing transport: framing, wire messages and connection handling

pub mod framing;
pub mod protocol;
pub mod session;
pub mod transport;
