//! Passive statistics sinks
//!
//! A [`Monitor`] is an append-only list of observations. Every statistic is
//! computed on demand from the full list, so it always reflects everything
//! recorded up to the query.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// One recorded value, optionally stamped with the virtual time it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: f64,
    pub time: Option<f64>,
}

/// Named sample recorder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Monitor {
    name: String,
    observations: Vec<Observation>,
}

impl Monitor {
    pub fn new(name: impl Into<String>) -> Self {
        Monitor {
            name: name.into(),
            observations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a value without a timestamp
    pub fn observe(&mut self, value: f64) {
        self.observations.push(Observation { value, time: None });
    }

    /// Record a value taken at virtual time `time`
    pub fn observe_at(&mut self, value: f64, time: f64) {
        self.observations.push(Observation {
            value,
            time: Some(time),
        });
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(|o| o.value)
    }

    pub fn count(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.values().sum()
    }

    /// Arithmetic mean, or `None` for an empty monitor
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.total() / self.count() as f64)
        }
    }

    /// Mean, with 0.0 for an empty monitor
    pub fn mean_or_zero(&self) -> f64 {
        self.mean().unwrap_or(0.0)
    }

    pub fn min(&self) -> Option<f64> {
        self.values().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values().reduce(f64::max)
    }

    /// Time-weighted average of a step function sampled by timestamped
    /// observations, integrated from the first stamp up to `now`.
    ///
    /// Each value holds from its own timestamp until the next one. Untimed
    /// observations are ignored. Returns `None` when there is nothing to
    /// integrate over.
    pub fn time_average(&self, now: f64) -> Option<f64> {
        let mut stamped = self
            .observations
            .iter()
            .filter_map(|o| o.time.map(|t| (t, o.value)));

        let (start, mut value) = stamped.next()?;
        let mut last = start;
        let mut area = 0.0;
        for (t, v) in stamped {
            area += value * (t - last);
            last = t;
            value = v;
        }
        area += value * (now - last);

        let span = now - start;
        if span > 0.0 {
            Some(area / span)
        } else {
            None
        }
    }

    /// Bin the observations into `nbins` equal-width bins over `[low, high)`.
    pub fn histogram(&self, low: f64, high: f64, nbins: usize) -> Result<Histogram> {
        if nbins == 0 {
            return Err(SimError::config("histogram needs at least one bin"));
        }
        if !(low.is_finite() && high.is_finite() && high > low) {
            return Err(SimError::config(format!(
                "histogram range [{low}, {high}) is empty"
            )));
        }

        let mut histogram = Histogram {
            low,
            high,
            bin_width: (high - low) / nbins as f64,
            underflow: 0,
            bins: vec![0; nbins],
            overflow: 0,
        };
        for value in self.values() {
            histogram.add(value);
        }
        Ok(histogram)
    }
}

/// Equal-width histogram with explicit under/overflow counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub low: f64,
    pub high: f64,
    pub bin_width: f64,
    /// Values below `low`
    pub underflow: usize,
    pub bins: Vec<usize>,
    /// Values at or above `high` (and NaN)
    pub overflow: usize,
}

impl Histogram {
    fn add(&mut self, value: f64) {
        if value < self.low {
            self.underflow += 1;
        } else if value >= self.high || value.is_nan() {
            self.overflow += 1;
        } else {
            let idx = ((value - self.low) / self.bin_width) as usize;
            // Rounding can push a value just under `high` into a phantom bin
            let idx = idx.min(self.bins.len() - 1);
            self.bins[idx] += 1;
        }
    }

    /// Total count across all bins including under/overflow
    pub fn total(&self) -> usize {
        self.underflow + self.bins.iter().sum::<usize>() + self.overflow
    }

    /// Lower edge of bin `i`
    pub fn bin_start(&self, i: usize) -> f64 {
        self.low + i as f64 * self.bin_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_monitor() {
        let monitor = Monitor::new("Seek time");
        assert_eq!(monitor.count(), 0);
        assert_eq!(monitor.total(), 0.0);
        assert_eq!(monitor.mean(), None);
        assert_eq!(monitor.mean_or_zero(), 0.0);
        assert_eq!(monitor.time_average(10.0), None);
    }

    #[test]
    fn test_mean_equals_total_over_count() {
        let mut monitor = Monitor::new("Access time");
        for v in [1.0, 2.5, 4.0, 8.5] {
            monitor.observe(v);
        }
        assert_eq!(monitor.count(), 4);
        assert_eq!(monitor.total(), 16.0);
        assert_eq!(monitor.mean(), Some(monitor.total() / monitor.count() as f64));
        assert_eq!(monitor.min(), Some(1.0));
        assert_eq!(monitor.max(), Some(8.5));

        // Statistics reflect later observations too
        monitor.observe(4.0);
        assert_eq!(monitor.mean(), Some(4.0));
    }

    #[test]
    fn test_histogram_counts_sum_to_count() {
        let mut monitor = Monitor::new("Seek time");
        for v in [-1.0, 0.0, 0.5, 9.99, 10.0, 25.0, 3.3, 3.3] {
            monitor.observe(v);
        }
        let histogram = monitor.histogram(0.0, 10.0, 5).unwrap();

        assert_eq!(histogram.underflow, 1);
        assert_eq!(histogram.overflow, 2);
        assert_eq!(histogram.bins, vec![2, 2, 0, 0, 1]);
        assert_eq!(histogram.total(), monitor.count());
        assert_eq!(histogram.bin_start(2), 4.0);
    }

    #[test]
    fn test_histogram_rejects_bad_range() {
        let monitor = Monitor::new("x");
        assert!(monitor.histogram(0.0, 10.0, 0).is_err());
        assert!(monitor.histogram(5.0, 5.0, 3).is_err());
        assert!(monitor.histogram(0.0, f64::INFINITY, 3).is_err());
    }

    #[test]
    fn test_time_average_of_queue_length() {
        let mut monitor = Monitor::new("Queue length");
        monitor.observe_at(0.0, 0.0);
        monitor.observe_at(2.0, 10.0);
        monitor.observe_at(1.0, 15.0);
        // 0 for 10ms, 2 for 5ms, 1 for 5ms
        let avg = monitor.time_average(20.0).unwrap();
        assert!((avg - 0.75).abs() < 1e-12);
    }
}
