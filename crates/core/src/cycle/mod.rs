//! Work-cycle bookkeeping: queue and checkpoint ports plus the tracker facade.

pub mod ports;
pub mod tracker;

pub use tracker::CycleTracker;
