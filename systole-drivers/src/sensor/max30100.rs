//! MAX30100 pulse oximeter front-end
//!
//! The MAX30100 streams raw IR/red photodiode samples through a 16-deep
//! FIFO; heart rate and SpO2 have to be estimated host-side. This driver
//! owns the I2C register transport plus a compact estimation chain:
//! DC blocking, low-pass smoothing, threshold beat detection, and an
//! SpO2 lookup over the red/IR AC ratio.
//!
//! Estimation fidelity is deliberately modest. What the monitor loop
//! needs is the contract of [`PulseOximeter`]: both scalars are 0.0
//! until the detector locks, and fall back to 0.0 on dropout.

use embedded_hal::i2c::I2c;

use systole_core::traits::{PulseOximeter, VitalSample};

/// MAX30100 I2C address
pub const ADDRESS: u8 = 0x57;

/// PART_ID value the probe expects
const PART_ID_VALUE: u8 = 0x11;

/// FIFO depth in samples
const FIFO_DEPTH: usize = 16;

/// MAX30100 register addresses
pub mod reg {
    /// Interrupt status
    pub const INT_STATUS: u8 = 0x00;
    /// Interrupt enable
    pub const INT_ENABLE: u8 = 0x01;
    /// FIFO write pointer
    pub const FIFO_WR_PTR: u8 = 0x02;
    /// FIFO overflow counter
    pub const OVF_COUNTER: u8 = 0x03;
    /// FIFO read pointer
    pub const FIFO_RD_PTR: u8 = 0x04;
    /// FIFO data (burst reads auto-increment past it)
    pub const FIFO_DATA: u8 = 0x05;
    /// Mode configuration
    pub const MODE_CONFIG: u8 = 0x06;
    /// SpO2 configuration
    pub const SPO2_CONFIG: u8 = 0x07;
    /// LED current configuration
    pub const LED_CONFIG: u8 = 0x09;
    /// Die temperature, integer part
    pub const TEMP_INTEGER: u8 = 0x16;
    /// Die temperature, fraction part
    pub const TEMP_FRACTION: u8 = 0x17;
    /// Revision ID
    pub const REV_ID: u8 = 0xFE;
    /// Part ID
    pub const PART_ID: u8 = 0xFF;
}

/// MODE_CONFIG: combined HR + SpO2 acquisition
const MODE_SPO2: u8 = 0x03;

/// SPO2_CONFIG: high-resolution mode (1600us pulses, 16-bit samples)
const SPO2_HI_RES_EN: u8 = 0x40;
/// SPO2_CONFIG: 100 samples per second
const SPO2_SR_100HZ: u8 = 0x01 << 2;
/// SPO2_CONFIG: 1600us LED pulse width
const SPO2_PW_1600US: u8 = 0x03;

/// LED current steps in tenths of a milliamp, indexed by register code
const LED_CURRENT_STEPS_X10MA: [u16; 16] = [
    0, 44, 76, 110, 142, 174, 208, 240, 271, 306, 338, 370, 402, 436, 468, 500,
];

/// Map a requested LED current in mA to the nearest register code
pub fn led_current_code(current_ma: u16) -> u8 {
    let target = current_ma.saturating_mul(10);
    let mut best = 0;
    let mut best_diff = u16::MAX;
    for (code, &step) in LED_CURRENT_STEPS_X10MA.iter().enumerate() {
        let diff = step.abs_diff(target);
        if diff < best_diff {
            best = code;
            best_diff = diff;
        }
    }
    best as u8
}

/// Errors that can occur talking to the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Max30100Error<E> {
    /// I2C transfer failed
    Bus(E),
    /// PART_ID readback did not identify a MAX30100
    UnknownPartId(u8),
}

/// One raw FIFO entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RawSample {
    ir: u16,
    red: u16,
}

/// Decode a 4-byte FIFO entry (IR then red, big-endian)
fn decode_sample(bytes: [u8; 4]) -> RawSample {
    RawSample {
        ir: u16::from_be_bytes([bytes[0], bytes[1]]),
        red: u16::from_be_bytes([bytes[2], bytes[3]]),
    }
}

/// One-pole DC blocker
///
/// w[n] = x[n] + alpha * w[n-1]; y[n] = w[n] - w[n-1]. The integrator
/// state doubles as a DC-level estimate for ratio normalisation.
struct DcBlocker {
    w: f32,
}

const DC_ALPHA: f32 = 0.95;

impl DcBlocker {
    const fn new() -> Self {
        Self { w: 0.0 }
    }

    fn step(&mut self, x: f32) -> f32 {
        let w = x + DC_ALPHA * self.w;
        let y = w - self.w;
        self.w = w;
        y
    }

    /// Estimated DC level of the input
    fn dc_level(&self) -> f32 {
        self.w * (1.0 - DC_ALPHA)
    }
}

/// One-pole low-pass smoother for the pulsatile waveform
struct LowPass {
    y: f32,
}

const LPF_ALPHA: f32 = 0.4;

impl LowPass {
    const fn new() -> Self {
        Self { y: 0.0 }
    }

    fn step(&mut self, x: f32) -> f32 {
        self.y += LPF_ALPHA * (x - self.y);
        self.y
    }
}

/// Floor for the adaptive beat threshold
const MIN_THRESHOLD: f32 = 20.0;
/// Refractory window between beats (caps the rate at 200 bpm)
const REFRACTORY_MS: u64 = 300;
/// No beat for this long resets the rate to zero
const DROPOUT_MS: u64 = 2500;
/// Per-sample threshold decay toward the floor
const THRESHOLD_DECAY: f32 = 0.99;
/// Smoothing factor for the beat-to-beat rate estimate
const RATE_SMOOTHING: f32 = 0.2;

/// Threshold-crossing beat detector
///
/// The threshold rides at 60% of the last peak and decays toward a
/// floor, so it follows a fading signal. A refractory window rejects
/// double-triggers on one pulse; a dropout timeout zeroes the rate when
/// the finger leaves the sensor.
struct BeatDetector {
    threshold: f32,
    above: bool,
    last_beat_ms: Option<u64>,
    rate_bpm: f32,
}

impl BeatDetector {
    const fn new() -> Self {
        Self {
            threshold: MIN_THRESHOLD,
            above: false,
            last_beat_ms: None,
            rate_bpm: 0.0,
        }
    }

    /// Feed one filtered sample; returns true when a beat fires.
    fn sample(&mut self, now_ms: u64, value: f32) -> bool {
        if let Some(last) = self.last_beat_ms {
            if now_ms.saturating_sub(last) > DROPOUT_MS {
                self.rate_bpm = 0.0;
                self.last_beat_ms = None;
                self.threshold = MIN_THRESHOLD;
            }
        }

        let crossing = value > self.threshold && !self.above;
        self.above = value > self.threshold;
        self.threshold = (self.threshold * THRESHOLD_DECAY).max(MIN_THRESHOLD);

        if !crossing {
            return false;
        }

        match self.last_beat_ms {
            Some(last) if now_ms - last >= REFRACTORY_MS => {
                let bpm = 60_000.0 / (now_ms - last) as f32;
                self.rate_bpm = if self.rate_bpm > 0.0 {
                    self.rate_bpm + RATE_SMOOTHING * (bpm - self.rate_bpm)
                } else {
                    bpm
                };
                self.last_beat_ms = Some(now_ms);
                self.threshold = (value * 0.6).max(MIN_THRESHOLD);
                true
            }
            // Inside the refractory window
            Some(_) => false,
            None => {
                self.last_beat_ms = Some(now_ms);
                self.threshold = (value * 0.6).max(MIN_THRESHOLD);
                true
            }
        }
    }

    fn rate_bpm(&self) -> f32 {
        self.rate_bpm
    }
}

/// SpO2 lookup table: squared ratio R^2 -> saturation percent, where
/// R = (AC_red/DC_red)/(AC_ir/DC_ir). Working on R^2 avoids a square
/// root; entries are linearised from the usual empirical calibration.
const SPO2_TABLE: &[(f32, f32)] = &[
    (0.16, 100.0), // R = 0.4
    (0.25, 97.5),  // R = 0.5
    (0.36, 95.0),  // R = 0.6
    (0.49, 92.5),  // R = 0.7
    (0.64, 90.0),  // R = 0.8
    (0.81, 87.5),  // R = 0.9
    (1.00, 85.0),  // R = 1.0
    (1.44, 80.0),  // R = 1.2
    (1.96, 75.0),  // R = 1.4
    (2.56, 70.0),  // R = 1.6
];

/// Saturation from the squared AC ratio, clamped to the table ends.
/// Linear interpolation between entries.
fn spo2_from_ratio_sq(r_sq: f32) -> f32 {
    if r_sq <= SPO2_TABLE[0].0 {
        return SPO2_TABLE[0].1;
    }
    let (r_last, s_last) = SPO2_TABLE[SPO2_TABLE.len() - 1];
    if r_sq >= r_last {
        return s_last;
    }

    for pair in SPO2_TABLE.windows(2) {
        let (r_lo, s_hi) = pair[0];
        let (r_hi, s_lo) = pair[1];
        if r_sq >= r_lo && r_sq <= r_hi {
            let frac = (r_sq - r_lo) / (r_hi - r_lo);
            return s_hi + frac * (s_lo - s_hi);
        }
    }

    s_last
}

/// Per-beat SpO2 estimator
///
/// Accumulates squared DC-normalised AC energy between beats and
/// resolves a saturation value at each beat boundary.
struct SpO2Estimator {
    ir_ac_sq: f32,
    red_ac_sq: f32,
    samples: u32,
    spo2_percent: f32,
}

impl SpO2Estimator {
    const fn new() -> Self {
        Self {
            ir_ac_sq: 0.0,
            red_ac_sq: 0.0,
            samples: 0,
            spo2_percent: 0.0,
        }
    }

    fn sample(&mut self, ir_ac: f32, ir_dc: f32, red_ac: f32, red_dc: f32) {
        // Normalise by the DC level so LED drive differences cancel out
        if ir_dc > 0.0 && red_dc > 0.0 {
            let ir = ir_ac / ir_dc;
            let red = red_ac / red_dc;
            self.ir_ac_sq += ir * ir;
            self.red_ac_sq += red * red;
            self.samples += 1;
        }
    }

    fn on_beat(&mut self) {
        if self.samples > 0 && self.ir_ac_sq > 0.0 {
            self.spo2_percent = spo2_from_ratio_sq(self.red_ac_sq / self.ir_ac_sq);
        }
        self.ir_ac_sq = 0.0;
        self.red_ac_sq = 0.0;
        self.samples = 0;
    }

    fn value(&self) -> f32 {
        self.spo2_percent
    }
}

/// MAX30100 driver
pub struct Max30100<I2C> {
    i2c: I2C,
    red_code: u8,
    ir_code: u8,
    dc_ir: DcBlocker,
    dc_red: DcBlocker,
    lpf: LowPass,
    detector: BeatDetector,
    spo2: SpO2Estimator,
    beat_pending: bool,
}

impl<I2C: I2c> Max30100<I2C> {
    /// Create a new driver with default LED currents (27.1mA red,
    /// 50mA IR). Nothing touches the bus until [`Self::begin`].
    pub fn new(i2c: I2C) -> Self {
        Self {
            i2c,
            red_code: led_current_code(27),
            ir_code: led_current_code(50),
            dc_ir: DcBlocker::new(),
            dc_red: DcBlocker::new(),
            lpf: LowPass::new(),
            detector: BeatDetector::new(),
            spo2: SpO2Estimator::new(),
            beat_pending: false,
        }
    }

    /// Probe and configure the sensor.
    ///
    /// Verifies the part ID, selects combined HR+SpO2 acquisition at
    /// 100 samples/s with 1600us high-resolution pulses, programs the
    /// LED currents and empties the FIFO.
    pub fn begin(&mut self) -> Result<(), Max30100Error<I2C::Error>> {
        let part_id = self.read_register(reg::PART_ID)?;
        if part_id != PART_ID_VALUE {
            return Err(Max30100Error::UnknownPartId(part_id));
        }

        self.write_register(reg::MODE_CONFIG, MODE_SPO2)?;
        self.write_register(
            reg::SPO2_CONFIG,
            SPO2_HI_RES_EN | SPO2_SR_100HZ | SPO2_PW_1600US,
        )?;
        self.write_led_config()?;
        self.clear_fifo()
    }

    fn read_register(&mut self, r: u8) -> Result<u8, Max30100Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[r], &mut buf)
            .map_err(Max30100Error::Bus)?;
        Ok(buf[0])
    }

    fn write_register(&mut self, r: u8, value: u8) -> Result<(), Max30100Error<I2C::Error>> {
        self.i2c
            .write(ADDRESS, &[r, value])
            .map_err(Max30100Error::Bus)
    }

    fn write_led_config(&mut self) -> Result<(), Max30100Error<I2C::Error>> {
        self.write_register(reg::LED_CONFIG, (self.red_code << 4) | self.ir_code)
    }

    fn clear_fifo(&mut self) -> Result<(), Max30100Error<I2C::Error>> {
        self.write_register(reg::FIFO_WR_PTR, 0)?;
        self.write_register(reg::OVF_COUNTER, 0)?;
        self.write_register(reg::FIFO_RD_PTR, 0)
    }

    /// Read all pending FIFO entries in one burst.
    ///
    /// WR_PTR, OVF_COUNTER and RD_PTR are consecutive registers, so one
    /// 3-byte read fetches all the bookkeeping.
    fn drain_fifo(
        &mut self,
    ) -> Result<heapless::Vec<RawSample, FIFO_DEPTH>, Max30100Error<I2C::Error>> {
        let mut ptrs = [0u8; 3];
        self.i2c
            .write_read(ADDRESS, &[reg::FIFO_WR_PTR], &mut ptrs)
            .map_err(Max30100Error::Bus)?;
        let [wr, ovf, rd] = ptrs;

        let pending = if ovf > 0 {
            FIFO_DEPTH
        } else {
            (wr.wrapping_sub(rd) & 0x0F) as usize
        };

        let mut out = heapless::Vec::new();
        if pending == 0 {
            return Ok(out);
        }

        let mut buf = [0u8; FIFO_DEPTH * 4];
        let bytes = &mut buf[..pending * 4];
        self.i2c
            .write_read(ADDRESS, &[reg::FIFO_DATA], bytes)
            .map_err(Max30100Error::Bus)?;

        for chunk in bytes.chunks_exact(4) {
            let _ = out.push(decode_sample([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(out)
    }

    fn process(&mut self, now_ms: u64, raw: RawSample) {
        let ir_ac = self.dc_ir.step(raw.ir as f32);
        let red_ac = self.dc_red.step(raw.red as f32);

        // Absorption dips on each pulse; invert so beats are positive peaks
        let pulse = self.lpf.step(-ir_ac);

        self.spo2
            .sample(ir_ac, self.dc_ir.dc_level(), red_ac, self.dc_red.dc_level());

        if self.detector.sample(now_ms, pulse) {
            self.beat_pending = true;
            self.spo2.on_beat();
        }
    }
}

impl<I2C: I2c> PulseOximeter for Max30100<I2C> {
    type Error = Max30100Error<I2C::Error>;

    fn refresh(&mut self, now_ms: u64) -> Result<(), Self::Error> {
        let samples = self.drain_fifo()?;
        for raw in samples {
            self.process(now_ms, raw);
        }
        Ok(())
    }

    fn sample(&self) -> VitalSample {
        let heart_rate_bpm = self.detector.rate_bpm();
        // SpO2 is only meaningful while the beat detector is locked
        let spo2_percent = if heart_rate_bpm > 0.0 {
            self.spo2.value()
        } else {
            0.0
        };
        VitalSample {
            heart_rate_bpm,
            spo2_percent,
        }
    }

    fn take_beat(&mut self) -> bool {
        core::mem::take(&mut self.beat_pending)
    }

    fn set_ir_led_current_ma(&mut self, current_ma: u16) -> Result<(), Self::Error> {
        self.ir_code = led_current_code(current_ma);
        self.write_led_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::i2c::{ErrorType, Operation};
    use heapless::{Deque, Vec};

    /// Records register writes and serves queued bytes to reads
    #[derive(Default)]
    struct FakeI2c {
        writes: Vec<(u8, Vec<u8, 8>), 32>,
        read_data: Deque<u8, 128>,
    }

    impl FakeI2c {
        fn queue(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.read_data.push_back(b).unwrap();
            }
        }

        fn wrote(&self, register: u8, value: u8) -> bool {
            self.writes
                .iter()
                .any(|(_, data)| data.len() == 2 && data[0] == register && data[1] == value)
        }
    }

    impl ErrorType for FakeI2c {
        type Error = Infallible;
    }

    impl embedded_hal::i2c::I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Infallible> {
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        let mut data = Vec::new();
                        for &b in bytes.iter() {
                            let _ = data.push(b);
                        }
                        self.writes.push((address, data)).unwrap();
                    }
                    Operation::Read(buf) => {
                        for slot in buf.iter_mut() {
                            *slot = self.read_data.pop_front().expect("fake read underrun");
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_begin_configures_sensor() {
        let mut i2c = FakeI2c::default();
        i2c.queue(&[PART_ID_VALUE]);

        let mut sensor = Max30100::new(i2c);
        sensor.begin().unwrap();

        assert!(sensor.i2c.wrote(reg::MODE_CONFIG, MODE_SPO2));
        assert!(sensor.i2c.wrote(reg::SPO2_CONFIG, 0x47));
        // Defaults: red 27mA (code 8), IR 50mA (code 15)
        assert!(sensor.i2c.wrote(reg::LED_CONFIG, 0x8F));
        assert!(sensor.i2c.wrote(reg::FIFO_WR_PTR, 0));
        assert!(sensor.i2c.wrote(reg::FIFO_RD_PTR, 0));
    }

    #[test]
    fn test_begin_rejects_unknown_part() {
        let mut i2c = FakeI2c::default();
        i2c.queue(&[0x00]);

        let mut sensor = Max30100::new(i2c);
        assert_eq!(sensor.begin(), Err(Max30100Error::UnknownPartId(0x00)));
    }

    #[test]
    fn test_led_current_code_nearest_step() {
        assert_eq!(led_current_code(0), 0);
        assert_eq!(led_current_code(24), 7);
        assert_eq!(led_current_code(27), 8);
        assert_eq!(led_current_code(50), 15);
        // Rounds toward the nearest step, saturates at the top
        assert_eq!(led_current_code(25), 7);
        assert_eq!(led_current_code(100), 15);
    }

    #[test]
    fn test_set_ir_current_reprograms_leds() {
        let mut sensor = Max30100::new(FakeI2c::default());
        sensor.set_ir_led_current_ma(24).unwrap();
        // Red stays at code 8, IR drops to code 7
        assert!(sensor.i2c.wrote(reg::LED_CONFIG, 0x87));
    }

    #[test]
    fn test_decode_sample_big_endian() {
        let raw = decode_sample([0x12, 0x34, 0x56, 0x78]);
        assert_eq!(raw.ir, 0x1234);
        assert_eq!(raw.red, 0x5678);
    }

    #[test]
    fn test_refresh_drains_pending_samples() {
        let mut i2c = FakeI2c::default();
        // Two pending samples: wr=2, ovf=0, rd=0
        i2c.queue(&[0x02, 0x00, 0x00]);
        i2c.queue(&[0x12, 0x34, 0x56, 0x78, 0x23, 0x45, 0x67, 0x89]);

        let mut sensor = Max30100::new(i2c);
        sensor.refresh(0).unwrap();

        assert!(sensor.i2c.read_data.is_empty());
        // Two raw samples are nowhere near a beat lock
        assert_eq!(sensor.sample(), VitalSample::EMPTY);
    }

    #[test]
    fn test_dc_blocker_removes_constant() {
        let mut dc = DcBlocker::new();
        let mut y = 0.0;
        for _ in 0..100 {
            y = dc.step(1000.0);
        }
        assert!(y > 0.0 && y < 10.0);
        // The DC estimate converges on the input level
        let level = dc.dc_level();
        assert!(level > 990.0 && level < 1010.0);
    }

    #[test]
    fn test_beat_detector_locks_onto_pulse_train() {
        let mut detector = BeatDetector::new();
        let mut beats = 0;

        // 75 bpm pulse train sampled at 100Hz: 40ms-wide peaks every 800ms
        for t in (0..6000u64).step_by(10) {
            let value = if t % 800 < 40 { 100.0 } else { 0.0 };
            if detector.sample(t, value) {
                beats += 1;
            }
        }

        assert!(beats >= 6);
        let rate = detector.rate_bpm();
        assert!(rate > 74.0 && rate < 76.0);
    }

    #[test]
    fn test_beat_detector_refractory_rejects_double_trigger() {
        let mut detector = BeatDetector::new();
        assert!(detector.sample(0, 100.0));
        // Dip below and spike again inside the refractory window
        assert!(!detector.sample(50, 0.0));
        assert!(!detector.sample(100, 100.0));
    }

    #[test]
    fn test_beat_detector_dropout_zeroes_rate() {
        let mut detector = BeatDetector::new();
        detector.sample(0, 100.0);
        detector.sample(800, 100.0);
        assert!(detector.rate_bpm() > 0.0);

        // Finger removed: flat signal past the dropout window
        for t in (810..4200u64).step_by(10) {
            detector.sample(t, 0.0);
        }
        assert_eq!(detector.rate_bpm(), 0.0);
    }

    #[test]
    fn test_spo2_lookup_interpolates_and_clamps() {
        assert_eq!(spo2_from_ratio_sq(0.01), 100.0);
        assert_eq!(spo2_from_ratio_sq(0.25), 97.5);
        assert_eq!(spo2_from_ratio_sq(1.0), 85.0);
        assert_eq!(spo2_from_ratio_sq(9.0), 70.0);

        // Midway between R^2 = 0.25 and 0.36 sits midway in saturation
        let mid = spo2_from_ratio_sq(0.305);
        assert!(mid < 97.5 && mid > 95.0);
    }
}
