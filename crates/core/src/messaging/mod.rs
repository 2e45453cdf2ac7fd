//! Publish/subscribe ports.

pub mod ports;
