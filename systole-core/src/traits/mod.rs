//! Hardware abstraction traits
//!
//! These traits define the interface between the application logic
//! and hardware-specific implementations.

pub mod console;
pub mod display;
pub mod sensor;

pub use console::Console;
pub use display::{CharDisplay, DISPLAY_COLS, DISPLAY_ROWS};
pub use sensor::{PulseOximeter, VitalSample};
