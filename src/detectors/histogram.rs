use nalgebra::Complex;

/// Dense N-dimensional accumulator shared by every detector.
///
/// Bins are stored row-major. Each photon's contributions are staged and
/// folded into the second moment once the photon is finished, so a photon
/// depositing several times in one bin counts as a single squared sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    dims: Vec<usize>,
    mean: Vec<Complex<f64>>,
    second_moment: Vec<Complex<f64>>,
    tally_count: Vec<u64>,
    track_second_moment: bool,
    pending: Vec<(usize, Complex<f64>)>,
}

impl Histogram {
    pub fn new(dims: Vec<usize>, track_second_moment: bool) -> Self {
        let len = dims.iter().product::<usize>();
        Self {
            dims,
            mean: vec![Complex::new(0.0, 0.0); len],
            second_moment: if track_second_moment {
                vec![Complex::new(0.0, 0.0); len]
            } else {
                Vec::new()
            },
            tally_count: vec![0; len],
            track_second_moment,
            pending: Vec::new(),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn tracks_second_moment(&self) -> bool {
        self.track_second_moment
    }

    /// Row-major flat index, `None` if any index is out of range.
    pub fn flat_index(&self, indices: &[usize]) -> Option<usize> {
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
        Some(flat)
    }

    /// Add a real contribution at the given bin.
    pub fn add(&mut self, indices: &[usize], value: f64) {
        self.add_complex(indices, Complex::new(value, 0.0));
    }

    pub fn add_complex(&mut self, indices: &[usize], value: Complex<f64>) {
        if let Some(flat) = self.flat_index(indices) {
            self.mean[flat] += value;
            self.tally_count[flat] += 1;
            if self.track_second_moment {
                self.pending.push((flat, value));
            }
        }
    }

    /// Fold the staged contributions of the current photon into the second moment.
    pub fn commit_photon(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.pending.sort_by_key(|(flat, _)| *flat);
        let mut i = 0;
        while i < self.pending.len() {
            let flat = self.pending[i].0;
            let mut sum = Complex::new(0.0, 0.0);
            while i < self.pending.len() && self.pending[i].0 == flat {
                sum += self.pending[i].1;
                i += 1;
            }
            self.second_moment[flat] += Complex::new(sum.re * sum.re, sum.im * sum.im);
        }
        self.pending.clear();
    }

    /// Add another worker's accumulators into this one.
    pub fn merge(&mut self, other: &Histogram) {
        for (a, b) in self.mean.iter_mut().zip(&other.mean) {
            *a += b;
        }
        for (a, b) in self.second_moment.iter_mut().zip(&other.second_moment) {
            *a += b;
        }
        for (a, b) in self.tally_count.iter_mut().zip(&other.tally_count) {
            *a += b;
        }
    }

    pub fn mean(&self) -> &[Complex<f64>] {
        &self.mean
    }

    pub fn second_moment(&self) -> &[Complex<f64>] {
        &self.second_moment
    }

    pub fn tally_count(&self) -> &[u64] {
        &self.tally_count
    }

    /// Sum of the real parts of every bin.
    pub fn total(&self) -> f64 {
        self.mean.iter().map(|m| m.re).sum()
    }
}
