/// Sum/count intensity grid aligned with the bathymetry bounds
use bevy_math::DVec2;
use constants::texture::TEXTURE_BACKGROUND;
use tracing::debug;

use crate::bounds::GridBounds;
use crate::error::{DrapingError, Result};

/// Running intensity sums and observation counts over the survey extent.
/// Cells are addressed with mesh-local coordinates, row-major with y outer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureAccumulator {
    bounds: GridBounds,
    rows: usize,
    cols: usize,
    sums: Vec<f64>,
    counts: Vec<u32>,
}

impl TextureAccumulator {
    pub fn new(bounds: GridBounds, rows: usize, cols: usize) -> Result<Self> {
        bounds.validate()?;
        if rows == 0 || cols == 0 {
            return Err(DrapingError::TextureShapeMismatch(format!(
                "texture needs at least one cell, got {rows}x{cols}"
            )));
        }
        Ok(Self {
            bounds,
            rows,
            cols,
            sums: vec![0.0; rows * cols],
            counts: vec![0; rows * cols],
        })
    }

    /// Texture covering `bounds` with square cells of side `res`.
    pub fn with_resolution(bounds: GridBounds, res: f64) -> Result<Self> {
        if !res.is_finite() || res <= 0.0 {
            return Err(DrapingError::InvalidResolution(res));
        }
        bounds.validate()?;
        let cols = ((bounds.width() / res).ceil() as usize).max(1);
        let rows = ((bounds.height() / res).ceil() as usize).max(1);
        Self::new(bounds, rows, cols)
    }

    /// Seed an accumulator from a normalized texture; every non-background cell counts once.
    pub fn from_texture(bounds: GridBounds, rows: usize, cols: usize, texture: &[f64]) -> Result<Self> {
        if texture.len() != rows * cols {
            return Err(DrapingError::TextureShapeMismatch(format!(
                "{} values for a {rows}x{cols} texture",
                texture.len()
            )));
        }
        let mut accumulator = Self::new(bounds, rows, cols)?;
        for (index, &value) in texture.iter().enumerate() {
            if value != TEXTURE_BACKGROUND {
                accumulator.sums[index] = value;
                accumulator.counts[index] = 1;
            }
        }
        Ok(accumulator)
    }

    /// Add one observation at a mesh-local point. Returns false outside the extent.
    pub fn accumulate(&mut self, local: DVec2, intensity: f64) -> bool {
        match self.bounds.local_cell(local, self.rows, self.cols) {
            Some((row, col)) => {
                let index = row * self.cols + col;
                self.sums[index] += intensity;
                self.counts[index] += 1;
                true
            }
            None => false,
        }
    }

    /// Fold another accumulator of the same shape into this one.
    pub fn merge(&mut self, other: &TextureAccumulator) -> Result<()> {
        if self.rows != other.rows || self.cols != other.cols || self.bounds != other.bounds {
            return Err(DrapingError::TextureShapeMismatch(format!(
                "cannot merge {}x{} into {}x{}",
                other.rows, other.cols, self.rows, self.cols
            )));
        }
        for (sum, other_sum) in self.sums.iter_mut().zip(&other.sums) {
            *sum += other_sum;
        }
        for (count, other_count) in self.counts.iter_mut().zip(&other.counts) {
            *count += other_count;
        }
        debug!(rows = self.rows, cols = self.cols, "Merged texture accumulator");
        Ok(())
    }

    /// Normalized texture: mean intensity per cell, `TEXTURE_BACKGROUND` where nothing landed.
    pub fn read(&self) -> Vec<f64> {
        self.sums
            .iter()
            .zip(&self.counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    TEXTURE_BACKGROUND
                } else {
                    sum / f64::from(count)
                }
            })
            .collect()
    }

    pub fn read_cell(&self, row: usize, col: usize) -> f64 {
        let index = row * self.cols + col;
        match self.counts[index] {
            0 => TEXTURE_BACKGROUND,
            count => self.sums[index] / f64::from(count),
        }
    }

    /// Fraction of cells with at least one observation.
    pub fn coverage(&self) -> f64 {
        let touched = self.counts.iter().filter(|&&c| c > 0).count();
        touched as f64 / self.counts.len() as f64
    }

    pub fn total_observations(&self) -> u64 {
        self.counts.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn bounds(&self) -> &GridBounds {
        &self.bounds
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn sums(&self) -> &[f64] {
        &self.sums
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds() -> GridBounds {
        GridBounds::new(DVec2::new(500.0, 200.0), DVec2::new(510.0, 204.0)).unwrap()
    }

    #[test]
    fn test_double_accumulate_averages() {
        let mut texture = TextureAccumulator::new(bounds(), 4, 10).unwrap();
        let point = DVec2::new(3.2, 1.7);
        assert!(texture.accumulate(point, 0.8));
        assert!(texture.accumulate(point, 0.8));

        let index = 10 + 3;
        assert_relative_eq!(texture.sums()[index], 1.6);
        assert_eq!(texture.counts()[index], 2);
        assert_relative_eq!(texture.read()[index], 0.8);
        assert_relative_eq!(texture.read_cell(1, 3), 0.8);
    }

    #[test]
    fn test_untouched_cells_read_background() {
        let mut texture = TextureAccumulator::new(bounds(), 4, 10).unwrap();
        texture.accumulate(DVec2::new(0.5, 0.5), 2.0);
        let values = texture.read();
        assert_eq!(values.iter().filter(|&&v| v == TEXTURE_BACKGROUND).count(), 39);
        assert_relative_eq!(texture.coverage(), 1.0 / 40.0);
    }

    #[test]
    fn test_out_of_extent_rejected() {
        let mut texture = TextureAccumulator::new(bounds(), 4, 10).unwrap();
        assert!(!texture.accumulate(DVec2::new(-0.1, 1.0), 1.0));
        assert!(!texture.accumulate(DVec2::new(10.0, 1.0), 1.0));
        assert!(!texture.accumulate(DVec2::new(2.0, 4.5), 1.0));
        assert_eq!(texture.total_observations(), 0);
    }

    #[test]
    fn test_with_resolution_rounds_up() {
        let texture = TextureAccumulator::with_resolution(bounds(), 0.3).unwrap();
        assert_eq!(texture.cols(), 34);
        assert_eq!(texture.rows(), 14);
        assert!(TextureAccumulator::with_resolution(bounds(), 0.0).is_err());
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut a = TextureAccumulator::new(bounds(), 4, 10).unwrap();
        let mut b = TextureAccumulator::new(bounds(), 4, 10).unwrap();
        a.accumulate(DVec2::new(1.5, 1.5), 1.0);
        b.accumulate(DVec2::new(1.5, 1.5), 3.0);
        b.accumulate(DVec2::new(8.5, 3.5), 5.0);

        let mut ab = a.clone();
        ab.merge(&b).unwrap();
        let mut ba = b.clone();
        ba.merge(&a).unwrap();

        assert_eq!(ab, ba);
        assert_relative_eq!(ab.read_cell(1, 1), 2.0);
        assert_relative_eq!(ab.read_cell(3, 8), 5.0);

        let other = TextureAccumulator::new(bounds(), 2, 10).unwrap();
        assert!(matches!(
            ab.merge(&other),
            Err(DrapingError::TextureShapeMismatch(_))
        ));
    }

    #[test]
    fn test_from_texture_counts_each_cell_once() {
        let values = vec![TEXTURE_BACKGROUND, 0.5, 2.0, TEXTURE_BACKGROUND];
        let mut texture = TextureAccumulator::from_texture(bounds(), 2, 2, &values).unwrap();
        assert_eq!(texture.counts(), &[0, 1, 1, 0]);
        assert_eq!(texture.read(), values);

        texture.accumulate(DVec2::new(7.0, 0.5), 1.5);
        assert_relative_eq!(texture.read_cell(0, 1), 1.0);
        assert!(TextureAccumulator::from_texture(bounds(), 3, 2, &values).is_err());
    }
}
