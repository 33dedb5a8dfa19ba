//! Board-agnostic core logic for the pulse oximeter monitor
//!
//! This crate contains all application logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware abstraction traits (sensor, display, console)
//! - Validity filter for heart-rate/SpO2 samples
//! - The throttled reporting loop
//! - Configuration type definitions

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod monitor;
pub mod traits;
