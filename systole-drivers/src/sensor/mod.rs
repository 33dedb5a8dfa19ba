//! Pulse oximetry sensors

pub mod max30100;

pub use max30100::{Max30100, Max30100Error};
