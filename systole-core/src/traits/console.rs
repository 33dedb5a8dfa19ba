//! Debug console trait

/// Trait for the line-oriented debug console
///
/// The console is a best-effort human-readable sink (a serial line on
/// real hardware). Writes are infallible from the caller's point of
/// view; implementations swallow transport errors rather than stall the
/// sampling loop.
pub trait Console {
    /// Write one line of text, terminating it as the transport requires.
    fn write_line(&mut self, line: &str);
}
