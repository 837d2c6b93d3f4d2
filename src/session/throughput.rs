use std::time::Instant;

/// Frames-per-second over fixed windows of `every` frames.
///
/// Each report covers only the frames of its own window, so a slow start
/// does not drag later numbers down.
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    every: u64,
    count: u64,
    window_start: Instant,
}

impl ThroughputMeter {
    pub fn new(every: u64, start: Instant) -> Self {
        Self {
            every,
            count: 0,
            window_start: start,
        }
    }

    /// Count one frame finished at `now`. Returns the window FPS when this
    /// frame closes a window. `every == 0` disables reporting.
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.count += 1;

        if self.every == 0 || self.count % self.every != 0 {
            return None;
        }

        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        self.window_start = now;
        Some(self.every as f64 / elapsed.max(f64::EPSILON))
    }

    pub fn frames(&self) -> u64 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_reports_every_window() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(3, t0);

        assert_eq!(meter.tick(t0 + Duration::from_millis(100)), None);
        assert_eq!(meter.tick(t0 + Duration::from_millis(200)), None);
        let fps = meter.tick(t0 + Duration::from_millis(300)).unwrap();
        assert!((fps - 10.0).abs() < 1e-6);
        assert_eq!(meter.frames(), 3);
    }

    #[test]
    fn test_window_is_trailing_not_cumulative() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(2, t0);

        // Slow first window: 2 frames in 2s
        meter.tick(t0 + Duration::from_secs(1));
        let slow = meter.tick(t0 + Duration::from_secs(2)).unwrap();
        assert!((slow - 1.0).abs() < 1e-6);

        // Fast second window: 2 frames in 0.1s
        meter.tick(t0 + Duration::from_millis(2050));
        let fast = meter.tick(t0 + Duration::from_millis(2100)).unwrap();
        assert!((fast - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_disabled() {
        let t0 = Instant::now();
        let mut meter = ThroughputMeter::new(0, t0);
        for i in 1..10 {
            assert_eq!(meter.tick(t0 + Duration::from_millis(i)), None);
        }
    }
}
