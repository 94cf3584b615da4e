use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized output of one detector.
///
/// Arrays are flattened row-major over `dims`. Complex-valued detectors
/// carry their imaginary parts in the `*_imaginary` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    pub name: String,
    pub dims: Vec<usize>,
    pub mean: Vec<f64>,
    pub mean_imaginary: Option<Vec<f64>>,
    /// Per-photon second moment, normalized like `mean`
    pub second_moment: Option<Vec<f64>>,
    pub second_moment_imaginary: Option<Vec<f64>>,
    /// Standard error of the mean of the real part
    pub standard_deviation: Option<Vec<f64>>,
    /// Raw number of contributions per bin
    pub tally_count: Vec<u64>,
    /// pMC/dMC contributions dropped as non-finite or out of domain
    pub rejected_contributions: u64,
}

impl DetectorResult {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Value at a multi-dimensional bin index.
    pub fn get(&self, indices: &[usize]) -> Option<f64> {
        if indices.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0;
        for (i, d) in indices.iter().zip(&self.dims) {
            if i >= d {
                return None;
            }
            flat = flat * d + i;
        }
        self.mean.get(flat).copied()
    }

    pub fn total_count(&self) -> u64 {
        self.tally_count.iter().sum()
    }
}

impl fmt::Display for DetectorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Detector: {}", self.name)?;
        writeln!(f, "  Dims: {:?}", self.dims)?;
        if self.mean.len() == 1 {
            write!(f, "  Mean: {:.6}", self.mean[0])?;
            if let Some(sd) = &self.standard_deviation {
                write!(f, " +/- {:.6}", sd[0])?;
            }
            writeln!(f)?;
        } else {
            writeln!(f, "  Sum of bins: {:.6}", self.mean.iter().sum::<f64>())?;
        }
        if self.rejected_contributions > 0 {
            writeln!(f, "  Rejected contributions: {}", self.rejected_contributions)?;
        }
        write!(f, "  Total tallies: {}", self.total_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> DetectorResult {
        DetectorResult {
            name: "ROfRhoAndTime".to_string(),
            dims: vec![2, 3],
            mean: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            mean_imaginary: None,
            second_moment: None,
            second_moment_imaginary: None,
            standard_deviation: None,
            tally_count: vec![1; 6],
            rejected_contributions: 0,
        }
    }

    #[test]
    fn test_get_is_row_major() {
        let r = result();
        assert_eq!(r.get(&[0, 2]), Some(2.0));
        assert_eq!(r.get(&[1, 0]), Some(3.0));
        assert_eq!(r.get(&[2, 0]), None);
        assert_eq!(r.total_count(), 6);
    }

    #[test]
    fn test_display() {
        let text = format!("{}", result());
        assert!(text.contains("Detector: ROfRhoAndTime"));
        assert!(text.contains("Sum of bins: 15.000000"));
    }
}
