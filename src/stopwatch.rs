use std::fmt;
use std::time::{Duration, Instant};

/// Measures the work time of a search session.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Elapsed time without stopping.
    pub fn elapsed(&self) -> WorkTime {
        WorkTime(self.started.elapsed())
    }
}

/// Elapsed wall-clock time, with a compact human-readable rendering.
///
/// `Display` prints `00s`, `01M05s` or `02H01M05s` depending on magnitude;
/// the alternate form (`{:#}`) always includes hours and appends milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct WorkTime(pub Duration);

impl WorkTime {
    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u128 {
        self.0.as_millis()
    }

    fn parts(&self) -> (u64, u64, u64, u32) {
        let total = self.0.as_secs();
        (total / 3600, (total / 60) % 60, total % 60, self.0.subsec_millis())
    }
}

impl From<Duration> for WorkTime {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl fmt::Display for WorkTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, mins, secs, millis) = self.parts();
        if f.alternate() {
            return write!(f, "{hours:02}H{mins:02}M{secs:02}s{millis:03}ms");
        }
        if hours > 0 {
            write!(f, "{hours:02}H{mins:02}M{secs:02}s")
        } else if mins > 0 {
            write!(f, "{mins:02}M{secs:02}s")
        } else {
            write!(f, "{secs:02}s")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_by_magnitude() {
        assert_eq!(WorkTime(Duration::from_millis(250)).to_string(), "00s");
        assert_eq!(WorkTime(Duration::from_secs(65)).to_string(), "01M05s");
        assert_eq!(WorkTime(Duration::from_secs(7265)).to_string(), "02H01M05s");
    }

    #[test]
    fn alternate_form_is_full() {
        let t = WorkTime(Duration::from_millis(61_042));
        assert_eq!(format!("{t:#}"), "00H01M01s042ms");
    }

    #[test]
    fn stopwatch_is_monotonic() {
        let watch = Stopwatch::start();
        let first = watch.elapsed();
        let second = watch.elapsed();
        assert!(second >= first);
    }
}
