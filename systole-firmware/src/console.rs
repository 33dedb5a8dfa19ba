//! Serial debug console
//!
//! Line-oriented wrapper over a blocking UART transmitter. The console
//! is a debugging aid; a wedged serial line must never stall the
//! sampling loop, so write errors are swallowed here.

use systole_core::traits::Console;

/// Console over any blocking byte writer
pub struct UartConsole<W> {
    tx: W,
}

impl<W: embedded_io::Write> UartConsole<W> {
    pub fn new(tx: W) -> Self {
        Self { tx }
    }
}

impl<W: embedded_io::Write> Console for UartConsole<W> {
    fn write_line(&mut self, line: &str) {
        let _ = self.tx.write_all(line.as_bytes());
        let _ = self.tx.write_all(b"\r\n");
    }
}
