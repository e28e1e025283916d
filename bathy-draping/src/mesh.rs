/// Triangulation of height grids into bathymetry meshes
use bevy_math::DVec3;
use constants::grid::{EMPTY_CELL, RESOLUTION_TOLERANCE};
use tracing::{debug, info, warn};

use crate::bounds::GridBounds;
use crate::error::{DrapingError, Result};
use crate::heightmap::{GridBinner, HeightGrid};
use crate::ping::MultibeamPing;

/// Indexed triangle mesh in the mesh-local frame (origin at the bounds minimum corner).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BathyMesh {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<[u32; 3]>,
}

impl BathyMesh {
    /// Wrap a pre-built mesh after checking every face index.
    pub fn new(vertices: Vec<DVec3>, faces: Vec<[u32; 3]>) -> Result<Self> {
        for (face_index, face) in faces.iter().enumerate() {
            if let Some(&vertex) = face.iter().find(|&&v| v as usize >= vertices.len()) {
                return Err(DrapingError::InvalidFaceIndex {
                    face: face_index,
                    vertex,
                    vertex_count: vertices.len(),
                });
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Build the mesh of a height grid, skipping triangles that touch empty cells.
    pub fn from_height_grid(grid: &HeightGrid, bounds: &GridBounds) -> Result<Self> {
        bounds.validate()?;

        let rows = grid.rows();
        let cols = grid.cols();
        let res = bounds.width() / cols as f64;
        let yres = bounds.height() / rows as f64;
        if ((res - yres) / res).abs() > RESOLUTION_TOLERANCE {
            warn!(xres = res, yres, "Height grid cells are not square, using x resolution");
        }

        let index = |x: usize, y: usize| (y * cols + x) as u32;
        let filled = |x: usize, y: usize| grid.get(y, x) != EMPTY_CELL;

        let mut vertices = Vec::with_capacity(rows * cols);
        let mut faces = Vec::with_capacity(2 * rows.saturating_sub(1) * cols.saturating_sub(1));

        for y in 0..rows {
            for x in 0..cols {
                let height = grid.get(y, x);
                vertices.push(DVec3::new(
                    (x as f64 + 0.5) * res,
                    (y as f64 + 0.5) * res,
                    height,
                ));
                if height == EMPTY_CELL {
                    continue;
                }
                if x > 0 && y > 0 && filled(x - 1, y) && filled(x, y - 1) {
                    faces.push([index(x, y), index(x - 1, y), index(x, y - 1)]);
                }
                if x + 1 < cols && y + 1 < rows && filled(x, y + 1) && filled(x + 1, y) {
                    faces.push([index(x, y), index(x + 1, y), index(x, y + 1)]);
                }
            }
        }

        debug!(
            capacity = faces.capacity(),
            emitted = faces.len(),
            "Trimming face buffer"
        );
        faces.shrink_to_fit();

        info!(
            vertices = vertices.len(),
            faces = faces.len(),
            res,
            "Mesh built from {}x{} height grid",
            rows,
            cols
        );

        Ok(Self { vertices, faces })
    }

    pub fn face_vertices(&self, face: &[u32; 3]) -> [DVec3; 3] {
        [
            self.vertices[face[0] as usize],
            self.vertices[face[1] as usize],
            self.vertices[face[2] as usize],
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}

/// Height grid, mesh and bounds of a point cloud in one pass.
pub fn mesh_from_cloud(cloud: &[DVec3], res: f64) -> Result<(BathyMesh, HeightGrid, GridBounds)> {
    let (grid, bounds) = GridBinner::new(res)?.bin(cloud)?;
    let mesh = BathyMesh::from_height_grid(&grid, &bounds)?;
    Ok((mesh, grid, bounds))
}

/// Height grid, mesh and bounds of a multibeam survey in one pass.
pub fn mesh_from_pings(
    pings: &[MultibeamPing],
    res: f64,
) -> Result<(BathyMesh, HeightGrid, GridBounds)> {
    let (grid, bounds) = GridBinner::new(res)?.bin_pings(pings)?;
    let mesh = BathyMesh::from_height_grid(&grid, &bounds)?;
    Ok((mesh, grid, bounds))
}
