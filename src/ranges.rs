use crate::error::{Result, TurbidError};
use serde::{Deserialize, Serialize};

/// Evenly spaced bin edges `start, start + delta, ..., stop`.
///
/// `count` is the number of edges, so a range holds `count - 1` bins:
/// [e0, e1), [e1, e2), ..., [e(n-2), e(n-1)]. The last bin includes `stop`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoubleRange {
    pub start: f64,
    pub stop: f64,
    pub count: usize,
}

impl DoubleRange {
    pub fn new(start: f64, stop: f64, count: usize) -> Self {
        Self { start, stop, count }
    }

    /// Check the edges describe at least one bin of positive width.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.count < 2 {
            return Err(TurbidError::InvalidInput(format!(
                "{} range needs at least 2 edges (1 bin), got {}",
                name, self.count
            )));
        }
        if !(self.start.is_finite() && self.stop.is_finite()) || self.stop <= self.start {
            return Err(TurbidError::InvalidInput(format!(
                "{} range must be finite and strictly ascending, got [{}, {}]",
                name, self.start, self.stop
            )));
        }
        Ok(())
    }

    /// Number of bins
    pub fn num_bins(&self) -> usize {
        self.count.saturating_sub(1)
    }

    /// Width of each bin
    pub fn delta(&self) -> f64 {
        (self.stop - self.start) / self.num_bins() as f64
    }

    /// Bin index containing `x`, or `None` when `x` falls outside the range.
    pub fn get_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.start && x <= self.stop) {
            return None;
        }
        let bins = self.num_bins();
        if bins == 0 {
            return None;
        }
        let i = ((x - self.start) / self.delta()).floor() as usize;
        Some(i.min(bins - 1))
    }

    pub fn edges(&self) -> Vec<f64> {
        let delta = self.delta();
        (0..self.count).map(|i| self.start + i as f64 * delta).collect()
    }

    /// Centre of every bin
    pub fn midpoints(&self) -> Vec<f64> {
        let delta = self.delta();
        (0..self.num_bins())
            .map(|i| self.start + (i as f64 + 0.5) * delta)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bins() {
        let range = DoubleRange::new(0.0, 10.0, 101);
        assert_eq!(range.num_bins(), 100);
        assert!((range.delta() - 0.1).abs() < 1e-15);
        assert_eq!(range.get_bin(0.0), Some(0));
        assert_eq!(range.get_bin(0.05), Some(0));
        assert_eq!(range.get_bin(0.15), Some(1));
        assert_eq!(range.get_bin(9.99), Some(99));
        // the stop edge belongs to the last bin
        assert_eq!(range.get_bin(10.0), Some(99));
    }

    #[test]
    fn test_out_of_range_is_dropped() {
        let range = DoubleRange::new(0.0, 10.0, 11);
        assert_eq!(range.get_bin(-0.001), None);
        assert_eq!(range.get_bin(10.001), None);
        assert_eq!(range.get_bin(f64::NAN), None);
        assert_eq!(range.get_bin(f64::INFINITY), None);
    }

    #[test]
    fn test_edges_and_midpoints() {
        let range = DoubleRange::new(1.0, 2.0, 3);
        assert_eq!(range.edges(), vec![1.0, 1.5, 2.0]);
        assert_eq!(range.midpoints(), vec![1.25, 1.75]);
    }

    #[test]
    fn test_validate() {
        assert!(DoubleRange::new(0.0, 1.0, 2).validate("rho").is_ok());
        assert!(DoubleRange::new(0.0, 1.0, 1).validate("rho").is_err());
        assert!(DoubleRange::new(1.0, 1.0, 5).validate("rho").is_err());
        assert!(DoubleRange::new(0.0, f64::INFINITY, 5).validate("rho").is_err());
    }
}
