//! Shared HTTP client used by the processor adapters

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
