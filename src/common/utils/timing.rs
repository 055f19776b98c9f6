use std::time::Instant;

/// Timing tool for startup performance logging
#[must_use]
pub struct Timing {
    now: Instant,
}

impl Default for Timing {
    fn default() -> Self {
        Self::new()
    }
}

impl Timing {
    /// Create a Timing
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
        }
    }

    /// Get the time difference from the creation time, and reset the creation time to the current time
    #[inline]
    pub fn elapsed(&mut self) -> String {
        let time = self.now.elapsed();
        self.now = Instant::now();

        let mut elapsed = time.as_millis();
        let mut unit = "ms";

        if elapsed <= 1 {
            elapsed = time.as_micros();
            unit = "μs";
        }
        if elapsed <= 1 {
            elapsed = time.as_nanos();
            unit = "ns";
        }

        format!("{elapsed}{unit}")
    }
}
