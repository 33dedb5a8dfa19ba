//! HD44780 16x2 character LCD behind a PCF8574 I2C backpack
//!
//! The backpack wires the expander's high nibble to the LCD data lines,
//! so every byte goes out as two 4-bit writes with an enable pulse each.
//! Timing uses the caller-supplied delay; the HD44780 needs a few long
//! waits during the reset dance and after clear.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use systole_core::traits::display::{CharDisplay, DISPLAY_COLS, DISPLAY_ROWS};

/// Common backpack address (A0-A2 open)
pub const DEFAULT_ADDRESS: u8 = 0x27;

/// PCF8574 control lines (low nibble of the expander)
mod pin {
    /// Register select: command (0) or data (1)
    pub const RS: u8 = 0x01;
    /// Enable strobe
    pub const EN: u8 = 0x04;
    /// Backlight drive
    pub const BACKLIGHT: u8 = 0x08;
}

/// HD44780 commands
mod cmd {
    pub const CLEAR: u8 = 0x01;
    pub const ENTRY_MODE_SET: u8 = 0x04;
    pub const ENTRY_SHIFT_LEFT_TO_RIGHT: u8 = 0x02;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const DISPLAY_ON: u8 = 0x04;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const FUNCTION_TWO_LINES: u8 = 0x08;
    pub const SET_DDRAM_ADDR: u8 = 0x80;
}

/// DDRAM base address per row
const ROW_OFFSETS: [u8; DISPLAY_ROWS as usize] = [0x00, 0x40];

/// HD44780 16x2 LCD driver
pub struct Lcd1602<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    backlight: u8,
}

impl<I2C, D> Lcd1602<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver at the common backpack address
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    /// Create a driver at a specific backpack address
    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
            backlight: pin::BACKLIGHT,
        }
    }

    /// Run the 4-bit initialization sequence.
    ///
    /// The controller powers up in 8-bit mode; the 0x03/0x03/0x03/0x02
    /// nibble dance is the documented path into 4-bit operation.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        self.delay.delay_ms(50);

        self.write_nibble(0x03, false)?;
        self.delay.delay_ms(5);
        self.write_nibble(0x03, false)?;
        self.delay.delay_ms(5);
        self.write_nibble(0x03, false)?;
        self.delay.delay_ms(1);
        self.write_nibble(0x02, false)?;

        self.command(cmd::FUNCTION_SET | cmd::FUNCTION_TWO_LINES)?;
        self.command(cmd::DISPLAY_CONTROL | cmd::DISPLAY_ON)?;
        self.command(cmd::CLEAR)?;
        self.delay.delay_ms(2);
        self.command(cmd::ENTRY_MODE_SET | cmd::ENTRY_SHIFT_LEFT_TO_RIGHT)
    }

    fn expander_write(&mut self, byte: u8) -> Result<(), I2C::Error> {
        self.i2c.write(self.address, &[byte | self.backlight])
    }

    /// Put a nibble on the data lines and strobe enable
    fn write_nibble(&mut self, nibble: u8, rs: bool) -> Result<(), I2C::Error> {
        let mut byte = nibble << 4;
        if rs {
            byte |= pin::RS;
        }
        self.expander_write(byte | pin::EN)?;
        self.delay.delay_us(1);
        self.expander_write(byte)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn send(&mut self, value: u8, rs: bool) -> Result<(), I2C::Error> {
        self.write_nibble(value >> 4, rs)?;
        self.write_nibble(value & 0x0F, rs)
    }

    fn command(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.send(value, false)
    }

    fn data(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.send(value, true)
    }
}

impl<I2C, D> CharDisplay for Lcd1602<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    type Error = I2C::Error;

    fn clear(&mut self) -> Result<(), I2C::Error> {
        self.command(cmd::CLEAR)?;
        // Clear is the one slow HD44780 instruction
        self.delay.delay_ms(2);
        Ok(())
    }

    fn text(&mut self, row: u8, col: u8, text: &str) -> Result<(), I2C::Error> {
        if row >= DISPLAY_ROWS || col >= DISPLAY_COLS {
            return Ok(());
        }

        self.command(cmd::SET_DDRAM_ADDR | (ROW_OFFSETS[row as usize] + col))?;

        let remaining = (DISPLAY_COLS - col) as usize;
        for ch in text.chars().take(remaining) {
            let byte = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.data(byte)?;
        }
        Ok(())
    }

    fn set_backlight(&mut self, on: bool) -> Result<(), I2C::Error> {
        self.backlight = if on { pin::BACKLIGHT } else { 0 };
        self.expander_write(0)
    }
}
