//! Flow-field snapshots in gnuplot block format.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::OutputError;
use crate::grid::{EquationLayout, FlowNode, Grid2D};
use crate::types::GridSpacing;

/// How a snapshot file is opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotMode {
    /// Replace the file with the current state.
    Overwrite,
    /// Add the current state after the existing content.
    Append,
}

/// Everything a sink needs to write one state of the global grid.
#[derive(Clone, Copy, Debug)]
pub struct SnapshotFrame<'a> {
    pub grid: &'a Grid2D<FlowNode>,
    pub layout: &'a EquationLayout,
    pub spacing: GridSpacing,
    /// x-coordinate of row 0.
    pub x0: f64,
    pub iteration: usize,
    pub time: f64,
}

/// Destination of periodic flow-field snapshots.
pub trait SnapshotSink: Send {
    fn write_snapshot(&mut self, frame: &SnapshotFrame<'_>, mode: SnapshotMode) -> Result<(), OutputError>;
}

/// Discards every snapshot.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSnapshot;

impl SnapshotSink for NullSnapshot {
    fn write_snapshot(&mut self, _frame: &SnapshotFrame<'_>, _mode: SnapshotMode) -> Result<(), OutputError> {
        Ok(())
    }
}

/// Writes `x y U V Tg p Rho Y1.. mut y+` rows, one block per grid row,
/// separated by blank lines so gnuplot's `splot` reads it as a surface.
#[derive(Clone, Debug)]
pub struct GnuplotSnapshot {
    path: PathBuf,
}

impl GnuplotSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn open(&self, mode: SnapshotMode) -> Result<File, OutputError> {
        let file = match mode {
            SnapshotMode::Overwrite => File::create(&self.path)?,
            SnapshotMode::Append => OpenOptions::new().create(true).append(true).open(&self.path)?,
        };
        Ok(file)
    }
}

impl SnapshotSink for GnuplotSnapshot {
    fn write_snapshot(&mut self, frame: &SnapshotFrame<'_>, mode: SnapshotMode) -> Result<(), OutputError> {
        let mut w = BufWriter::new(self.open(mode)?);
        write_frame(&mut w, frame)?;
        w.flush()?;
        Ok(())
    }
}

fn write_frame<W: Write>(w: &mut W, frame: &SnapshotFrame<'_>) -> Result<(), OutputError> {
    let layout = frame.layout;
    writeln!(w, "# iteration={} time={:e}", frame.iteration, frame.time)?;
    write!(w, "# x y U V Tg p Rho")?;
    for k in layout.species() {
        write!(w, " {}", layout.equation_name(k))?;
    }
    writeln!(w, " mut y+")?;

    let grid = frame.grid;
    for i in 0..grid.nx() {
        let x = frame.x0 + i as f64 * frame.spacing.dx;
        for (j, node) in grid.row(i).iter().enumerate() {
            let y = j as f64 * frame.spacing.dy;
            let rho = node.s[EquationLayout::RHO];
            write!(
                w,
                "{:e} {:e} {:e} {:e} {:e} {:e} {:e}",
                x, y, node.u, node.v, node.tg, node.p, rho
            )?;
            for k in layout.species() {
                let y_k = if rho > 0.0 { node.s[k] / rho } else { 0.0 };
                write!(w, " {:e}", y_k)?;
            }
            writeln!(w, " {:e} {:e}", node.mu_t, node.y_plus)?;
        }
        writeln!(w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Primitive, uniform_grid};
    use crate::types::Resolution2D;
    use tempfile::tempdir;

    fn sample_grid(layout: &EquationLayout) -> Grid2D<FlowNode> {
        let state = Primitive {
            rho: 1.0,
            u: 10.0,
            v: 0.0,
            p: 1.0e5,
        };
        uniform_grid(layout, Resolution2D::new(3, 2), state, &[1.0]).unwrap()
    }

    #[test]
    fn test_gnuplot_overwrite_layout() {
        let dir = tempdir().unwrap();
        let layout = EquationLayout::new(1);
        let grid = sample_grid(&layout);
        let frame = SnapshotFrame {
            grid: &grid,
            layout: &layout,
            spacing: GridSpacing::new(0.5, 0.25),
            x0: 1.0,
            iteration: 7,
            time: 1.0e-3,
        };
        let mut sink = GnuplotSnapshot::new(dir.path().join("flow.dat"));
        sink.write_snapshot(&frame, SnapshotMode::Overwrite).unwrap();
        sink.write_snapshot(&frame, SnapshotMode::Overwrite).unwrap();

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.matches("# iteration=7").count(), 1);
        assert!(text.contains("# x y U V Tg p Rho Y1 mut y+"));

        let data: Vec<&str> = text.lines().filter(|l| !l.starts_with('#')).collect();
        // 3 blocks of 2 rows, each followed by a blank separator
        assert_eq!(data.len(), 9);
        assert!(data[2].is_empty());
        let first: Vec<f64> = data[0].split_whitespace().map(|v| v.parse().unwrap()).collect();
        assert_eq!(first.len(), 10);
        assert_eq!(first[0], 1.0);
        assert_eq!(first[2], 10.0);
        assert_eq!(first[7], 1.0);
        let last_x: f64 = data[6].split_whitespace().next().unwrap().parse().unwrap();
        assert_eq!(last_x, 2.0);
    }

    #[test]
    fn test_gnuplot_append_accumulates() {
        let dir = tempdir().unwrap();
        let layout = EquationLayout::new(1);
        let grid = sample_grid(&layout);
        let mut sink = GnuplotSnapshot::new(dir.path().join("flow.save"));
        for iteration in [10, 20] {
            let frame = SnapshotFrame {
                grid: &grid,
                layout: &layout,
                spacing: GridSpacing::new(1.0, 1.0),
                x0: 0.0,
                iteration,
                time: 0.0,
            };
            sink.write_snapshot(&frame, SnapshotMode::Append).unwrap();
        }
        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert!(text.contains("# iteration=10"));
        assert!(text.contains("# iteration=20"));
    }
}
