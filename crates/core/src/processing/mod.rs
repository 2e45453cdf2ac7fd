//! Item processing and work discovery ports.

pub mod ports;
