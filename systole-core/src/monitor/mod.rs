//! The sampling/filter/report loop

pub mod filter;
pub mod report;

pub use filter::HeartRateBounds;
pub use report::{
    Monitor, TickOutcome, BOOT_BOTTOM, BOOT_TOP, NO_FINGER_BOTTOM, NO_FINGER_TOP, PROMPT_MSG,
    SENSOR_ERROR_MSG,
};
