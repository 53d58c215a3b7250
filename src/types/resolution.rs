//! Grid resolution and spacing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of nodes of a structured grid in each direction.
///
/// # Example
///
/// ```
/// use deeps2d::types::Resolution2D;
///
/// let res = Resolution2D::new(100, 50);
/// assert_eq!(res.nx(), 100);
/// assert_eq!(res.total_nodes(), 5000);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Resolution2D {
    nx: usize,
    ny: usize,
}

impl Resolution2D {
    /// Create a new resolution.
    ///
    /// # Panics
    ///
    /// Panics if either `nx` or `ny` is zero.
    pub fn new(nx: usize, ny: usize) -> Self {
        assert!(nx > 0, "nx must be positive, got {}", nx);
        assert!(ny > 0, "ny must be positive, got {}", ny);
        Self { nx, ny }
    }

    /// Nodes along x (rows).
    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Nodes along y (columns).
    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total number of nodes.
    #[inline]
    pub fn total_nodes(&self) -> usize {
        self.nx * self.ny
    }
}

impl fmt::Display for Resolution2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{}", self.nx, self.ny)
    }
}

impl From<(usize, usize)> for Resolution2D {
    fn from((nx, ny): (usize, usize)) -> Self {
        Self::new(nx, ny)
    }
}

/// Uniform node spacing of the grid in metres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridSpacing {
    pub dx: f64,
    pub dy: f64,
}

impl GridSpacing {
    /// Create a spacing.
    ///
    /// # Panics
    ///
    /// Panics if `dx` or `dy` is not strictly positive.
    pub fn new(dx: f64, dy: f64) -> Self {
        assert!(dx > 0.0, "dx must be positive, got {}", dx);
        assert!(dy > 0.0, "dy must be positive, got {}", dy);
        Self { dx, dy }
    }

    /// Smaller of the two spacings.
    #[inline]
    pub fn min(&self) -> f64 {
        self.dx.min(self.dy)
    }

    /// Weight of the x-neighbours in the implicit average, `dy/(dx+dy)`.
    #[inline]
    pub fn dxx(&self) -> f64 {
        self.dy / (self.dx + self.dy)
    }

    /// Weight of the y-neighbours in the implicit average, `dx/(dx+dy)`.
    #[inline]
    pub fn dyy(&self) -> f64 {
        self.dx / (self.dx + self.dy)
    }
}
