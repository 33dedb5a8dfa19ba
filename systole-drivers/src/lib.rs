//! Hardware driver implementations
//!
//! This crate provides concrete implementations of the traits defined
//! in systole-core for the monitor's hardware:
//!
//! - MAX30100 pulse oximeter front-end (I2C)
//! - HD44780 16x2 character LCD behind a PCF8574 I2C backpack

#![no_std]
#![deny(unsafe_code)]

pub mod display;
pub mod sensor;
