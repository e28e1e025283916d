/// Height grid reconstruction from scattered depth samples
use bevy_math::DVec3;
use constants::grid::EMPTY_CELL;
use tracing::{debug, info};

use crate::bounds::GridBounds;
use crate::error::{DrapingError, Result};
use crate::ping::MultibeamPing;

/// Dense row-major grid of mean elevations; `EMPTY_CELL` marks cells without samples.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    counts: Vec<u32>,
}

impl HeightGrid {
    /// Wrap externally produced elevations; every non-sentinel cell counts as one sample.
    pub fn from_values(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 || values.len() != rows * cols {
            return Err(DrapingError::GridShapeMismatch {
                rows,
                cols,
                actual: values.len(),
            });
        }
        let counts = values
            .iter()
            .map(|&v| u32::from(v != EMPTY_CELL))
            .collect();
        Ok(Self {
            rows,
            cols,
            values,
            counts,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Samples binned into each cell.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }

    pub fn is_empty_cell(&self, row: usize, col: usize) -> bool {
        self.get(row, col) == EMPTY_CELL
    }

    pub fn filled_cells(&self) -> usize {
        self.values.iter().filter(|&&v| v != EMPTY_CELL).count()
    }
}

/// Bins scattered points into a fixed-resolution height grid.
#[derive(Debug, Clone, Copy)]
pub struct GridBinner {
    res: f64,
}

impl GridBinner {
    pub fn new(res: f64) -> Result<Self> {
        if !res.is_finite() || res <= 0.0 {
            return Err(DrapingError::InvalidResolution(res));
        }
        Ok(Self { res })
    }

    pub fn resolution(&self) -> f64 {
        self.res
    }

    /// Bin a point cloud into mean heights and the grown grid bounds.
    pub fn bin(&self, points: &[DVec3]) -> Result<(HeightGrid, GridBounds)> {
        let mut bounds = GridBounds::from_points(points)?;

        let cols = ((bounds.width() / self.res).ceil() as usize).max(1);
        let rows = ((bounds.height() / self.res).ceil() as usize).max(1);
        bounds.max_x = bounds.min_x + cols as f64 * self.res;
        bounds.max_y = bounds.min_y + rows as f64 * self.res;

        debug!(rows, cols, res = self.res, "Binning {} points", points.len());

        let mut sums = vec![0.0f64; rows * cols];
        let mut counts = vec![0u32; rows * cols];
        let mut skipped = 0usize;

        for point in points {
            let col = ((point.x - bounds.min_x) / self.res).floor();
            let row = ((point.y - bounds.min_y) / self.res).floor();
            if col >= 0.0 && row >= 0.0 && (col as usize) < cols && (row as usize) < rows {
                let index = row as usize * cols + col as usize;
                sums[index] += point.z;
                counts[index] += 1;
            } else {
                skipped += 1;
            }
        }

        let values = sums
            .iter()
            .zip(&counts)
            .map(|(&sum, &count)| {
                if count == 0 {
                    EMPTY_CELL
                } else {
                    sum / count as f64
                }
            })
            .collect();

        let grid = HeightGrid {
            rows,
            cols,
            values,
            counts,
        };

        info!(
            rows,
            cols,
            filled = grid.filled_cells(),
            skipped,
            "Height grid binned ({:.2}, {:.2}) to ({:.2}, {:.2})",
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y
        );

        Ok((grid, bounds))
    }

    /// Bin every beam of a multibeam survey.
    pub fn bin_pings(&self, pings: &[MultibeamPing]) -> Result<(HeightGrid, GridBounds)> {
        let beams: Vec<DVec3> = pings
            .iter()
            .flat_map(|ping| ping.beams.iter().copied())
            .collect();
        self.bin(&beams)
    }
}

/// Height grid from a multibeam survey at resolution `res`.
pub fn height_map_from_pings(pings: &[MultibeamPing], res: f64) -> Result<(HeightGrid, GridBounds)> {
    GridBinner::new(res)?.bin_pings(pings)
}

/// Height grid from an arbitrary point cloud at resolution `res`.
pub fn height_map_from_cloud(cloud: &[DVec3], res: f64) -> Result<(HeightGrid, GridBounds)> {
    GridBinner::new(res)?.bin(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_invalid_resolution() {
        assert!(matches!(
            GridBinner::new(0.0),
            Err(DrapingError::InvalidResolution(_))
        ));
        assert!(GridBinner::new(-1.0).is_err());
        assert!(GridBinner::new(f64::NAN).is_err());
    }

    #[test]
    fn test_empty_points() {
        let binner = GridBinner::new(1.0).unwrap();
        assert!(matches!(binner.bin(&[]), Err(DrapingError::EmptyPointSet)));
    }

    #[test]
    fn test_bounds_grow_to_whole_cells() {
        let points = vec![DVec3::new(0.0, 0.0, -1.0), DVec3::new(2.5, 1.2, -1.0)];
        let (grid, bounds) = GridBinner::new(1.0).unwrap().bin(&points).unwrap();

        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.rows(), 2);
        assert_eq!(bounds.max_x, 3.0);
        assert_eq!(bounds.max_y, 2.0);
    }

    #[test]
    fn test_counts_sum_to_in_bounds_points() {
        let points: Vec<DVec3> = (0..500)
            .map(|i| {
                let f = i as f64;
                DVec3::new((f * 0.37) % 9.3, (f * 0.61) % 7.1, -10.0 - (f % 5.0))
            })
            .collect();
        let (grid, bounds) = GridBinner::new(0.7).unwrap().bin(&points).unwrap();

        let in_bounds = points
            .iter()
            .filter(|p| {
                let col = ((p.x - bounds.min_x) / 0.7).floor();
                let row = ((p.y - bounds.min_y) / 0.7).floor();
                col >= 0.0
                    && row >= 0.0
                    && (col as usize) < grid.cols()
                    && (row as usize) < grid.rows()
            })
            .count();

        let total: u32 = grid.counts().iter().sum();
        assert_eq!(total as usize, in_bounds);
        assert_eq!(grid.values().len(), grid.rows() * grid.cols());
    }

    #[test]
    fn test_cell_mean_matches_assigned_points() {
        // Cell (0, 0) gets three points, cell (1, 1) gets two, the rest stay empty.
        let points = vec![
            DVec3::new(0.0, 0.0, -4.0),
            DVec3::new(0.5, 0.4, -6.0),
            DVec3::new(0.9, 0.9, -8.0),
            DVec3::new(1.2, 1.3, -2.0),
            DVec3::new(1.8, 1.7, -3.0),
            DVec3::new(3.0, 3.0, -7.0),
        ];
        let (grid, _) = GridBinner::new(1.0).unwrap().bin(&points).unwrap();

        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 3);
        assert_relative_eq!(grid.get(0, 0), -6.0, epsilon = 1e-12);
        assert_relative_eq!(grid.get(1, 1), -2.5, epsilon = 1e-12);
        assert_eq!(grid.counts()[0], 3);
        assert_eq!(grid.counts()[4], 2);
        assert!(grid.is_empty_cell(0, 1));
        assert!(grid.is_empty_cell(2, 0));
        // The max corner lands on the grown edge and is dropped.
        assert_eq!(grid.counts().iter().sum::<u32>(), 5);
    }

    #[test]
    fn test_bin_pings_flattens_beams() {
        let pings = vec![
            MultibeamPing {
                timestamp_ms: 0,
                position: DVec3::ZERO,
                beams: vec![DVec3::new(0.2, 0.2, -5.0), DVec3::new(1.6, 0.2, -5.0)],
            },
            MultibeamPing {
                timestamp_ms: 100,
                position: DVec3::ZERO,
                beams: vec![DVec3::new(0.3, 1.1, -7.0)],
            },
        ];
        let (grid, _) = height_map_from_pings(&pings, 0.5).unwrap();
        assert_eq!(grid.counts().iter().sum::<u32>(), 3);
        assert_relative_eq!(grid.get(0, 0), -5.0);
    }

    #[test]
    fn test_from_values_shape() {
        assert!(HeightGrid::from_values(2, 2, vec![1.0; 3]).is_err());
        let grid = HeightGrid::from_values(1, 2, vec![0.0, -3.0]).unwrap();
        assert_eq!(grid.counts(), &[0, 1]);
    }
}
