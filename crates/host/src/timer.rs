/// Rolling window of frame deltas in milliseconds.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<f64>,
    capacity: usize,
    index: usize,
    filled: bool,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: vec![0.0; capacity],
            capacity,
            index: 0,
            filled: false,
        }
    }

    pub fn record(&mut self, delta_ms: f64) {
        self.history[self.index] = delta_ms;
        self.index = (self.index + 1) % self.capacity;
        if self.index == 0 {
            self.filled = true;
        }
    }

    fn window(&self) -> &[f64] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> f64 {
        let window = self.window();
        if window.is_empty() {
            return 0.0;
        }
        window.iter().sum::<f64>() / window.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.window().iter().copied().fold(0.0, f64::max)
    }

    pub fn min(&self) -> f64 {
        self.window()
            .iter()
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Frames per second implied by the average delta; zero until a
    /// non-zero delta is recorded.
    pub fn fps(&self) -> f64 {
        let avg = self.average();
        if avg > 0.0 { 1000.0 / avg } else { 0.0 }
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.capacity
        } else {
            self.index
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_recorded_deltas() {
        let mut timer = FrameTimer::new(3);
        timer.record(10.0);
        timer.record(20.0);
        timer.record(30.0);

        assert_eq!(timer.count(), 3);
        assert_eq!(timer.average(), 20.0);
        assert_eq!(timer.max(), 30.0);
        assert_eq!(timer.min(), 10.0);
        assert_eq!(timer.fps(), 50.0);
    }

    #[test]
    fn window_wraps_around() {
        let mut timer = FrameTimer::new(2);
        timer.record(10.0);
        timer.record(20.0);
        timer.record(30.0);

        assert_eq!(timer.count(), 2);
        assert_eq!(timer.average(), 25.0);
    }

    #[test]
    fn empty_timer_reports_zero() {
        let timer = FrameTimer::default();
        assert_eq!(timer.count(), 0);
        assert_eq!(timer.average(), 0.0);
        assert_eq!(timer.min(), 0.0);
        assert_eq!(timer.fps(), 0.0);
    }
}
