//! Systole - Pulse Oximeter Monitor Firmware
//!
//! Main firmware binary for RP2040-based pulse oximeter monitors.
//! One MAX30100 and one 16x2 character LCD share an I2C bus; status is
//! echoed to a serial console at 115200 baud.
//!
//! All application logic lives in systole-core behind hardware traits;
//! this binary owns the peripherals, the boot sequence and the single
//! polling loop.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_embedded_hal::shared_bus::blocking::i2c::I2cDevice;
use embassy_executor::Spawner;
use embassy_rp::i2c::{self, I2c};
use embassy_rp::uart::{Config as UartConfig, Uart};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Delay, Duration, Instant, Ticker, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use systole_core::config::{MonitorConfig, SensorConfig};
use systole_core::monitor::{self, Monitor, TickOutcome};
use systole_core::traits::{CharDisplay, Console, PulseOximeter};
use systole_drivers::display::Lcd1602;
use systole_drivers::sensor::Max30100;

mod console;
use console::UartConsole;

/// Polling cadence of the sampling loop
const TICK_INTERVAL_MS: u64 = 10;

/// How long the boot splash stays up
const SPLASH_MS: u64 = 1000;

type SharedI2c = Mutex<NoopRawMutex, RefCell<I2c<'static, i2c::Blocking>>>;

// The bus must outlive both device handles
static I2C_BUS: StaticCell<SharedI2c> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Systole firmware starting...");

    let p = embassy_rp::init(Default::default());

    // Serial console on UART0 (115200 8N1 default)
    let uart = Uart::new_blocking(p.UART0, p.PIN_0, p.PIN_1, UartConfig::default());
    let (tx, _rx) = uart.split();
    let mut console = UartConsole::new(tx);

    // One I2C bus carries both the sensor (0x57) and the LCD backpack (0x27)
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, i2c::Config::default());
    let bus = I2C_BUS.init(Mutex::new(RefCell::new(i2c)));

    let mut lcd = Lcd1602::new(I2cDevice::new(bus), Delay);
    if let Err(e) = lcd.init() {
        warn!("LCD init failed: {:?}", Debug2Format(&e));
    }
    let _ = lcd.set_backlight(true);

    // Boot splash
    let _ = lcd.clear();
    let _ = lcd.text(0, 0, monitor::BOOT_TOP);
    let _ = lcd.text(1, 0, monitor::BOOT_BOTTOM);
    Timer::after_millis(SPLASH_MS).await;

    console.write_line("Attempting to initialize MAX30100");

    let mut sensor = Max30100::new(I2cDevice::new(bus));
    if let Err(e) = sensor.begin() {
        error!("Sensor initialization failed: {:?}", Debug2Format(&e));
        let _ = lcd.clear();
        let _ = lcd.text(0, 0, monitor::SENSOR_ERROR_MSG);
        console.write_line("Sensor initialization failed!");
        halt().await;
    }

    let sensor_cfg = SensorConfig::default();
    if let Err(e) = sensor.set_ir_led_current_ma(sensor_cfg.ir_led_current_ma) {
        warn!("LED current config failed: {:?}", Debug2Format(&e));
    }

    let _ = lcd.clear();
    let _ = lcd.text(0, 0, monitor::PROMPT_MSG);

    let mut monitor = Monitor::new(MonitorConfig::default());
    let mut ticker = Ticker::every(Duration::from_millis(TICK_INTERVAL_MS));
    info!("Monitor loop running");

    loop {
        ticker.next().await;
        let now_ms = Instant::now().as_millis();

        match monitor.tick(now_ms, &mut sensor, &mut lcd, &mut console) {
            Ok(TickOutcome::ReportedVitals(sample)) => {
                info!(
                    "Report: {} bpm, {} %",
                    sample.heart_rate_bpm, sample.spo2_percent
                );
            }
            Ok(TickOutcome::ReportedNoContact) => {
                debug!("No valid reading");
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Display write failed: {:?}", Debug2Format(&e));
            }
        }
    }
}

/// Park forever after an unrecoverable startup fault.
///
/// There is deliberately no retry or watchdog; the condition needs a
/// power cycle and a screwdriver, not a reboot loop.
async fn halt() -> ! {
    loop {
        Timer::after_secs(1).await;
    }
}
