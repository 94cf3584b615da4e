/// Axis-aligned box, possibly unbounded along some axes.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub lower_left: [f64; 3],
    pub upper_right: [f64; 3],
}

impl BoundingBox {
    pub fn new(lower_left: [f64; 3], upper_right: [f64; 3]) -> Self {
        BoundingBox {
            lower_left,
            upper_right,
        }
    }

    pub fn infinite() -> Self {
        Self::new([f64::NEG_INFINITY; 3], [f64::INFINITY; 3])
    }

    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.lower_left[0] + self.upper_right[0]),
            0.5 * (self.lower_left[1] + self.upper_right[1]),
            0.5 * (self.lower_left[2] + self.upper_right[2]),
        ]
    }

    pub fn width(&self) -> [f64; 3] {
        [
            self.upper_right[0] - self.lower_left[0],
            self.upper_right[1] - self.lower_left[1],
            self.upper_right[2] - self.lower_left[2],
        ]
    }

    /// True when `other` lies inside this box (touching faces allowed).
    pub fn encloses(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| {
            other.lower_left[i] >= self.lower_left[i] && other.upper_right[i] <= self.upper_right[i]
        })
    }

    /// True when the interiors of the two boxes overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| {
            self.lower_left[i] < other.upper_right[i] && other.lower_left[i] < self.upper_right[i]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_width() {
        let bb = BoundingBox::new([-1.0, 0.0, 2.0], [1.0, 4.0, 3.0]);
        assert_eq!(bb.center(), [0.0, 2.0, 2.5]);
        assert_eq!(bb.width(), [2.0, 4.0, 1.0]);
    }

    #[test]
    fn test_encloses_and_overlaps() {
        let layer = BoundingBox::new([f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0], [f64::INFINITY, f64::INFINITY, 10.0]);
        let inside = BoundingBox::new([-1.0, -1.0, 1.0], [1.0, 1.0, 3.0]);
        let crossing = BoundingBox::new([-1.0, -1.0, 9.0], [1.0, 1.0, 11.0]);
        assert!(layer.encloses(&inside));
        assert!(!layer.encloses(&crossing));
        assert!(layer.overlaps(&crossing));

        let apart = BoundingBox::new([2.0, -1.0, 1.0], [3.0, 1.0, 3.0]);
        assert!(!inside.overlaps(&apart));
        // shared face is not an overlap
        let touching = BoundingBox::new([1.0, -1.0, 1.0], [2.0, 1.0, 3.0]);
        assert!(!inside.overlaps(&touching));
    }
}
