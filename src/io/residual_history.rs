//! Residual history: one row of per-equation RMS residuals per output step.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::OutputError;
use crate::solver::GlobalResiduals;

/// Whitespace-separated table with a `#`-prefixed header naming each
/// equation.
///
/// ```text
/// # Step Rho RhoU RhoV RhoE
/// 100 1.2e-5 3.4e-4 2.2e-4 8.0e-6
/// ```
pub struct ResidualHistory {
    writer: BufWriter<Box<dyn Write + Send>>,
    columns: usize,
}

impl ResidualHistory {
    /// Create (truncate) a history file and write its header.
    pub fn create(path: impl AsRef<Path>, names: &[String]) -> Result<Self, OutputError> {
        let file = File::create(path)?;
        Self::new(file, names)
    }

    /// Wrap an arbitrary writer and write the header.
    pub fn new(writer: impl Write + Send + 'static, names: &[String]) -> Result<Self, OutputError> {
        let mut writer: BufWriter<Box<dyn Write + Send>> = BufWriter::new(Box::new(writer));
        write!(writer, "# Step")?;
        for name in names {
            write!(writer, " {}", name)?;
        }
        writeln!(writer)?;
        Ok(Self {
            writer,
            columns: names.len(),
        })
    }

    /// Append the RMS residuals of one step.
    pub fn write_row(&mut self, iteration: usize, residuals: &GlobalResiduals) -> Result<(), OutputError> {
        if residuals.equations.len() < self.columns {
            return Err(OutputError::InvalidData(format!(
                "{} residual columns, header has {}",
                residuals.equations.len(),
                self.columns
            )));
        }
        write!(self.writer, "{}", iteration)?;
        for k in 0..self.columns {
            write!(self.writer, " {:e}", residuals.rms(k))?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), OutputError> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for ResidualHistory {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
