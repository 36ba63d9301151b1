//! taxi-types: domain model and repository ports shared by every taxi crate

pub mod domain;
pub mod ports;
