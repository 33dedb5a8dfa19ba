//! Throttled reporting loop
//!
//! `Monitor` is ticked at the polling cadence with an injected timestamp
//! and drives both output sinks. It holds all loop state, so the tick
//! function is testable against fake hardware.

use core::fmt::Write;

use heapless::String;

use crate::config::MonitorConfig;
use crate::traits::{CharDisplay, Console, PulseOximeter, VitalSample, DISPLAY_COLS};

/// Prompt shown while waiting for a finger
pub const PROMPT_MSG: &str = "Place Finger";

/// Display rows for a rejected sample
pub const NO_FINGER_TOP: &str = "No finger";
pub const NO_FINGER_BOTTOM: &str = "detected";

/// Display row for a failed sensor probe at startup
pub const SENSOR_ERROR_MSG: &str = "Sensor Error!";

/// Boot splash rows
pub const BOOT_TOP: &str = "Initializing";
pub const BOOT_BOTTOM: &str = "Pulse Oximeter";

/// Console line for each detected pulse beat
const BEAT_MSG: &str = "Beat detected!";

/// Console diagnostic for a rejected sample
const NO_READING_MSG: &str = "No valid reading - Check finger placement";

/// What a tick did, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickOutcome {
    /// Sampled only; the throttle or the dwell hold suppressed output
    Sampled,
    /// Emitted a heart-rate/SpO2 report to both sinks
    ReportedVitals(VitalSample),
    /// Emitted the "no finger" status to both sinks
    ReportedNoContact,
    /// Dwell expired; the display was reset to the prompt
    PromptRestored,
}

/// Loop phase
///
/// `AwaitingReading` is the initial state and the one the loop spends
/// its life in; `Holding` keeps a fresh reading on the display until the
/// dwell deadline passes.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    AwaitingReading,
    Holding { until_ms: u64 },
}

/// The sampling/filter/report loop
#[derive(Debug)]
pub struct Monitor {
    cfg: MonitorConfig,
    phase: Phase,
    /// Timestamp of the last emitted report (either variant)
    last_report_ms: u64,
}

impl Monitor {
    pub fn new(cfg: MonitorConfig) -> Self {
        Self {
            cfg,
            phase: Phase::AwaitingReading,
            last_report_ms: 0,
        }
    }

    /// Run one tick of the loop.
    ///
    /// Refreshes the sensor, forwards any beat event to the console,
    /// and emits at most one report per reporting interval. Display
    /// errors propagate; the caller decides whether they matter.
    pub fn tick<S, D, C>(
        &mut self,
        now_ms: u64,
        sensor: &mut S,
        display: &mut D,
        console: &mut C,
    ) -> Result<TickOutcome, D::Error>
    where
        S: PulseOximeter,
        D: CharDisplay,
        C: Console,
    {
        // A transport fault this tick just reads as an empty sample below.
        let _ = sensor.refresh(now_ms);

        // Beat notifications bypass the throttle entirely.
        if sensor.take_beat() {
            console.write_line(BEAT_MSG);
        }

        let sample = sensor.sample();

        // While a reading is held on the display, only sample. Restore
        // the prompt once the dwell deadline passes.
        if let Phase::Holding { until_ms } = self.phase {
            if now_ms < until_ms {
                return Ok(TickOutcome::Sampled);
            }
            display.clear()?;
            display.text(0, 0, PROMPT_MSG)?;
            self.phase = Phase::AwaitingReading;
            return Ok(TickOutcome::PromptRestored);
        }

        if now_ms - self.last_report_ms <= u64::from(self.cfg.reporting_interval_ms) {
            return Ok(TickOutcome::Sampled);
        }

        if self.cfg.accept.accepts(&sample) {
            self.report_vitals(now_ms, &sample, display, console)?;
            Ok(TickOutcome::ReportedVitals(sample))
        } else {
            self.report_no_contact(now_ms, display, console)?;
            Ok(TickOutcome::ReportedNoContact)
        }
    }

    fn report_vitals<D, C>(
        &mut self,
        now_ms: u64,
        sample: &VitalSample,
        display: &mut D,
        console: &mut C,
    ) -> Result<(), D::Error>
    where
        D: CharDisplay,
        C: Console,
    {
        let mut line: String<48> = String::new();
        let _ = write!(
            line,
            "Heart rate: {:.1} bpm | SpO2: {:.1} %",
            sample.heart_rate_bpm, sample.spo2_percent
        );
        console.write_line(&line);

        let mut row: String<{ DISPLAY_COLS as usize }> = String::new();
        let _ = write!(row, "HR: {:.1} bpm", sample.heart_rate_bpm);
        display.clear()?;
        display.text(0, 0, &row)?;

        row.clear();
        let _ = write!(row, "SpO2: {:.1}%", sample.spo2_percent);
        display.text(1, 0, &row)?;

        self.last_report_ms = now_ms;
        self.phase = Phase::Holding {
            until_ms: now_ms + u64::from(self.cfg.dwell_ms),
        };
        Ok(())
    }

    fn report_no_contact<D, C>(
        &mut self,
        now_ms: u64,
        display: &mut D,
        console: &mut C,
    ) -> Result<(), D::Error>
    where
        D: CharDisplay,
        C: Console,
    {
        display.clear()?;
        display.text(0, 0, NO_FINGER_TOP)?;
        display.text(1, 0, NO_FINGER_BOTTOM)?;
        console.write_line(NO_READING_MSG);

        self.last_report_ms = now_ms;
        Ok(())
    }
}
