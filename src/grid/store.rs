//! Row-major 2D node storage.

use std::ops::{Index, IndexMut, Range};

use crate::error::{Result, SolverError};
use crate::types::{GridCoord, Resolution2D};

/// Dense `nx × ny` array stored by x-rows: row `i` is the contiguous slice
/// of its `ny` nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid2D<T> {
    nx: usize,
    ny: usize,
    data: Vec<T>,
}

impl<T: Clone> Grid2D<T> {
    /// Allocate a grid filled with clones of `value`.
    ///
    /// Fails with [`SolverError::Allocation`] when the storage cannot be
    /// reserved.
    pub fn filled(resolution: Resolution2D, value: T) -> Result<Self> {
        let (nx, ny) = (resolution.nx(), resolution.ny());
        let nodes = resolution.total_nodes();
        let mut data = Vec::new();
        data.try_reserve_exact(nodes)
            .map_err(|_| SolverError::Allocation { nodes })?;
        data.resize(nodes, value);
        Ok(Self { nx, ny, data })
    }
}

impl<T> Grid2D<T> {
    /// Build a grid from row-major data.
    pub fn from_vec(resolution: Resolution2D, data: Vec<T>) -> Result<Self> {
        if data.len() != resolution.total_nodes() {
            return Err(SolverError::InvalidConfig(format!(
                "grid data has {} nodes, expected {} for {}",
                data.len(),
                resolution.total_nodes(),
                resolution
            )));
        }
        Ok(Self {
            nx: resolution.nx(),
            ny: resolution.ny(),
            data,
        })
    }

    #[inline]
    pub fn nx(&self) -> usize {
        self.nx
    }

    #[inline]
    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn resolution(&self) -> Resolution2D {
        Resolution2D::new(self.nx, self.ny)
    }

    #[inline]
    fn offset(&self, i: usize, j: usize) -> usize {
        i * self.ny + j
    }

    #[inline]
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.i < self.nx && coord.j < self.ny
    }

    /// Checked access.
    pub fn try_get(&self, coord: GridCoord) -> Result<&T> {
        if !self.contains(coord) {
            return Err(SolverError::IndexOutOfBounds {
                coord,
                nx: self.nx,
                ny: self.ny,
            });
        }
        Ok(&self.data[self.offset(coord.i, coord.j)])
    }

    /// Checked mutable access.
    pub fn try_get_mut(&mut self, coord: GridCoord) -> Result<&mut T> {
        if !self.contains(coord) {
            return Err(SolverError::IndexOutOfBounds {
                coord,
                nx: self.nx,
                ny: self.ny,
            });
        }
        let offset = self.offset(coord.i, coord.j);
        Ok(&mut self.data[offset])
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[T] {
        let start = i * self.ny;
        &self.data[start..start + self.ny]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        let start = i * self.ny;
        &mut self.data[start..start + self.ny]
    }

    /// Contiguous slice of a range of rows.
    pub fn rows(&self, rows: Range<usize>) -> &[T] {
        &self.data[rows.start * self.ny..rows.end * self.ny]
    }

    pub fn rows_mut(&mut self, rows: Range<usize>) -> &mut [T] {
        &mut self.data[rows.start * self.ny..rows.end * self.ny]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterate over `(coord, value)` in storage order.
    pub fn iter_coords(&self) -> impl Iterator<Item = (GridCoord, &T)> {
        let ny = self.ny;
        self.data
            .iter()
            .enumerate()
            .map(move |(n, v)| (GridCoord::new(n / ny, n % ny), v))
    }
}

impl<T> Index<(usize, usize)> for Grid2D<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j): (usize, usize)) -> &T {
        debug_assert!(i < self.nx && j < self.ny, "({},{}) outside grid", i, j);
        &self.data[self.offset(i, j)]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid2D<T> {
    #[inline]
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut T {
        debug_assert!(i < self.nx && j < self.ny, "({},{}) outside grid", i, j);
        let offset = self.offset(i, j);
        &mut self.data[offset]
    }
}

impl<T> Index<GridCoord> for Grid2D<T> {
    type Output = T;

    #[inline]
    fn index(&self, c: GridCoord) -> &T {
        &self[(c.i, c.j)]
    }
}

impl<T> IndexMut<GridCoord> for Grid2D<T> {
    #[inline]
    fn index_mut(&mut self, c: GridCoord) -> &mut T {
        &mut self[(c.i, c.j)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let mut g = Grid2D::filled(Resolution2D::new(3, 4), 0usize).unwrap();
        g[(1, 2)] = 7;
        assert_eq!(g.row(1), &[0, 0, 7, 0]);
        assert_eq!(g.as_slice()[6], 7);
        assert_eq!(g.rows(1..3).len(), 8);
    }

    #[test]
    fn test_try_get_out_of_bounds() {
        let g = Grid2D::filled(Resolution2D::new(2, 2), 1.0).unwrap();
        assert!(g.try_get(GridCoord::new(1, 1)).is_ok());
        match g.try_get(GridCoord::new(2, 0)) {
            Err(SolverError::IndexOutOfBounds { coord, nx, ny }) => {
                assert_eq!(coord, GridCoord::new(2, 0));
                assert_eq!((nx, ny), (2, 2));
            }
            other => panic!("expected out-of-bounds error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_vec_length_checked() {
        assert!(Grid2D::from_vec(Resolution2D::new(2, 2), vec![0; 3]).is_err());
        let g = Grid2D::from_vec(Resolution2D::new(2, 2), vec![1, 2, 3, 4]).unwrap();
        assert_eq!(g[GridCoord::new(1, 0)], 3);
    }

    #[test]
    fn test_iter_coords() {
        let g = Grid2D::from_vec(Resolution2D::new(2, 3), (0..6).collect()).unwrap();
        let (c, v) = g.iter_coords().nth(4).unwrap();
        assert_eq!(c, GridCoord::new(1, 1));
        assert_eq!(*v, 4);
    }
}
