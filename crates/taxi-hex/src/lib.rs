//! taxi-hex: hexagonal ride-hailing API library (core + inbound HTTP)

pub mod config;
pub mod errors;

pub mod application;

pub use taxi_types::{domain, ports};

pub mod inbound; // HTTP adapter (server + handlers)
