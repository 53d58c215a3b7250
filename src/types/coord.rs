//! Global grid coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Global `(i, j)` position of a node; `i` runs along x, `j` along y.
///
/// Ordered lexicographically by `(i, j)`, which is the tie-break order for
/// residual maxima.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GridCoord {
    pub i: usize,
    pub j: usize,
}

impl GridCoord {
    #[inline]
    pub const fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    /// Euclidean distance between two nodes for the given spacing.
    pub fn distance(&self, other: GridCoord, dx: f64, dy: f64) -> f64 {
        let di = (self.i as f64 - other.i as f64) * dx;
        let dj = (self.j as f64 - other.j as f64) * dy;
        (di * di + dj * dj).sqrt()
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.i, self.j)
    }
}

impl From<(usize, usize)> for GridCoord {
    fn from((i, j): (usize, usize)) -> Self {
        Self { i, j }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_ordering_is_row_major() {
        assert!(GridCoord::new(0, 9) < GridCoord::new(1, 0));
        assert!(GridCoord::new(2, 3) < GridCoord::new(2, 4));
    }

    #[test]
    fn test_coord_distance() {
        let a = GridCoord::new(0, 0);
        let b = GridCoord::new(3, 4);
        assert!((a.distance(b, 1.0, 1.0) - 5.0).abs() < 1e-12);
        assert!((a.distance(b, 2.0, 0.5) - (36.0f64 + 4.0).sqrt()).abs() < 1e-12);
    }
}
