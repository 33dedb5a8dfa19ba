//! Validity filter for sensor samples

use crate::traits::VitalSample;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Heart-rate acceptance band, inclusive on both ends.
///
/// The default band of 70-100 bpm is a narrow resting-adult range that
/// doubles as a finger-presence check: a sample outside it is reported
/// as "no finger" even when it is a physiologically plausible rate.
/// Callers that want a wider band supply their own bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HeartRateBounds {
    /// Lowest accepted heart rate (bpm)
    pub min_bpm: f32,
    /// Highest accepted heart rate (bpm)
    pub max_bpm: f32,
}

impl Default for HeartRateBounds {
    fn default() -> Self {
        Self {
            min_bpm: 70.0,
            max_bpm: 100.0,
        }
    }
}

impl HeartRateBounds {
    /// Classify a sample as a valid reading.
    ///
    /// Valid iff both scalars are positive and the heart rate falls
    /// inside the band. SpO2 has no bound beyond positivity.
    pub fn accepts(&self, sample: &VitalSample) -> bool {
        sample.heart_rate_bpm > 0.0
            && sample.spo2_percent > 0.0
            && sample.heart_rate_bpm >= self.min_bpm
            && sample.heart_rate_bpm <= self.max_bpm
    }
}
