/// Planar survey bounds tracking and cell mapping
use bevy_math::{DVec2, DVec3};
use constants::grid::BOUNDS_CHUNK_SIZE;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{DrapingError, Result};

/// Axis-aligned planar extent of a height grid or texture, in world metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl GridBounds {
    /// Create new bounds initialised to infinity values
    pub fn empty() -> Self {
        Self {
            min_x: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            min_y: f64::INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }

    pub fn new(min: DVec2, max: DVec2) -> Result<Self> {
        let bounds = Self {
            min_x: min.x,
            max_x: max.x,
            min_y: min.y,
            max_y: max.y,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Update bounds with a new point
    pub fn update(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.max_x = self.max_x.max(x);
        self.min_y = self.min_y.min(y);
        self.max_y = self.max_y.max(y);
    }

    /// Union of two bounds, used when reducing per-chunk results.
    pub fn union(mut self, other: &Self) -> Self {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self
    }

    /// Planar bounds of a point set, reduced over parallel chunks.
    pub fn from_points(points: &[DVec3]) -> Result<Self> {
        if points.is_empty() {
            return Err(DrapingError::EmptyPointSet);
        }

        let bounds = points
            .par_chunks(BOUNDS_CHUNK_SIZE)
            .map(|chunk| {
                let mut local_bounds = GridBounds::empty();
                for point in chunk {
                    local_bounds.update(point.x, point.y);
                }
                local_bounds
            })
            .reduce_with(|a, b| a.union(&b))
            .unwrap_or_else(GridBounds::empty);

        if !bounds.is_finite() {
            return Err(DrapingError::DegenerateBounds(
                "point set contains non-finite coordinates".to_string(),
            ));
        }
        Ok(bounds)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
    }

    /// Reject bounds without positive area.
    pub fn validate(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(DrapingError::DegenerateBounds(format!("{:?}", self)));
        }
        if self.width() <= 0.0 || self.height() <= 0.0 {
            return Err(DrapingError::DegenerateBounds(format!(
                "extent {} x {} has no area",
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn min(&self) -> DVec2 {
        DVec2::new(self.min_x, self.min_y)
    }

    pub fn max(&self) -> DVec2 {
        DVec2::new(self.max_x, self.max_y)
    }

    /// Offset from world to the mesh-local frame (origin at the minimum corner).
    pub fn mesh_offset(&self) -> DVec3 {
        DVec3::new(self.min_x, self.min_y, 0.0)
    }

    /// Floor-division cell lookup for a mesh-local point; `None` outside the grid.
    pub fn local_cell(&self, local: DVec2, rows: usize, cols: usize) -> Option<(usize, usize)> {
        let col = (local.x / self.width() * cols as f64).floor();
        let row = (local.y / self.height() * rows as f64).floor();
        if col >= 0.0 && row >= 0.0 && (col as usize) < cols && (row as usize) < rows {
            Some((row as usize, col as usize))
        } else {
            None
        }
    }
}
