use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct RollingSma {
    window: usize,
    buf: VecDeque<f64>,
    sum: f64,
}

impl RollingSma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::new(),
            sum: 0.0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        self.sum += value;
        while self.buf.len() > self.window {
            if let Some(front) = self.buf.pop_front() {
                self.sum -= front;
            }
        }

        if self.buf.len() == self.window {
            Some(self.sum / self.window as f64)
        } else {
            None
        }
    }
}

/// Population standard deviation over a fixed window.
#[derive(Debug, Clone)]
pub struct RollingStd {
    window: usize,
    buf: VecDeque<f64>,
}

impl RollingStd {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            buf: VecDeque::new(),
        }
    }

    pub fn update(&mut self, value: f64) -> Option<f64> {
        if self.window == 0 {
            return None;
        }

        self.buf.push_back(value);
        while self.buf.len() > self.window {
            self.buf.pop_front();
        }
        if self.buf.len() < self.window {
            return None;
        }

        // Two passes over a small window: no cancellation drift on flat series.
        let n = self.window as f64;
        let mean = self.buf.iter().sum::<f64>() / n;
        let var = self
            .buf
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / n;
        Some(var.max(0.0).sqrt())
    }
}

/// Highest high / lowest low over the last `window` bars.
#[derive(Debug, Clone)]
pub struct RollingRange {
    window: usize,
    highs: VecDeque<f64>,
    lows: VecDeque<f64>,
}

impl RollingRange {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            highs: VecDeque::new(),
            lows: VecDeque::new(),
        }
    }

    pub fn update(&mut self, high: f64, low: f64) -> Option<(f64, f64)> {
        if self.window == 0 {
            return None;
        }

        self.highs.push_back(high);
        self.lows.push_back(low);
        while self.highs.len() > self.window {
            self.highs.pop_front();
            self.lows.pop_front();
        }
        if self.highs.len() < self.window {
            return None;
        }

        let highest = self.highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lowest = self.lows.iter().copied().fold(f64::INFINITY, f64::min);
        Some((highest, lowest))
    }
}

/// Wilder smoothing: seeded with the simple mean of the first `period` samples, then
/// `avg = (avg * (period - 1) + value) / period`.
#[derive(Debug, Clone)]
pub struct WilderAverage {
    period: usize,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl WilderAverage {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, sample: f64) -> Option<f64> {
        if self.period == 0 {
            return None;
        }
        let p = self.period as f64;
        match self.value {
            Some(prev) => {
                let next = (prev * (p - 1.0) + sample) / p;
                self.value = Some(next);
            }
            None => {
                self.count += 1;
                self.seed_sum += sample;
                if self.count == self.period {
                    self.value = Some(self.seed_sum / p);
                }
            }
        }
        self.value
    }
}
