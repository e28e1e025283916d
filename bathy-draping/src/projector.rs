//! Ray queries against a cropped window of the bathymetry mesh.
//!
//! The window keeps only faces whose vertices all fall inside a square
//! centred on the vehicle. Faces are bucketed on a uniform planar grid and a
//! ray visits buckets in the order its planar footprint crosses them, so a
//! query only tests faces near the ray.

use std::sync::Arc;

use bevy_math::{DVec2, DVec3};
use constants::draping::{RAY_EPSILON, WINDOW_BUCKETS_PER_AXIS};
use tracing::debug;

use crate::error::{DrapingError, Result};
use crate::mesh::BathyMesh;
use crate::sound_speed::RayPath;

/// Nearest intersection of a ray with the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub point: DVec3,
    /// Unit face normal, oriented upwards.
    pub normal: DVec3,
    /// Distance along the queried ray or segment.
    pub distance: f64,
    /// Face index in the full mesh.
    pub face: usize,
}

/// Hit of a multi-segment path, with travel along the whole path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathHit {
    pub hit: SurfaceHit,
    /// Direction of the segment that hit.
    pub direction: DVec3,
    pub segment: usize,
    pub path_distance: f64,
    /// One-way travel time from the sensor.
    pub travel_time: f64,
}

struct FaceBuckets {
    min: DVec2,
    cell: f64,
    per_axis: usize,
    cells: Vec<Vec<u32>>,
}

impl FaceBuckets {
    fn new(min: DVec2, size: f64, per_axis: usize) -> Self {
        Self {
            min,
            cell: size / per_axis as f64,
            per_axis,
            cells: vec![Vec::new(); per_axis * per_axis],
        }
    }

    fn clamp_index(&self, value: f64) -> usize {
        (value.floor().max(0.0) as usize).min(self.per_axis - 1)
    }

    fn cell_of(&self, p: DVec2) -> (usize, usize) {
        let local = (p - self.min) / self.cell;
        (self.clamp_index(local.x), self.clamp_index(local.y))
    }

    fn insert(&mut self, face: u32, corners: &[DVec3; 3]) {
        let lo = corners[0].truncate().min(corners[1].truncate()).min(corners[2].truncate());
        let hi = corners[0].truncate().max(corners[1].truncate()).max(corners[2].truncate());
        let (x0, y0) = self.cell_of(lo);
        let (x1, y1) = self.cell_of(hi);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.cells[y * self.per_axis + x].push(face);
            }
        }
    }

    fn faces(&self, x: usize, y: usize) -> &[u32] {
        &self.cells[y * self.per_axis + x]
    }
}

struct SubmeshWindow {
    center: DVec2,
    half_size: f64,
    vertices: Vec<DVec3>,
    faces: Vec<[u32; 3]>,
    normals: Vec<DVec3>,
    /// Full-mesh face index of each window face.
    source_faces: Vec<usize>,
    buckets: FaceBuckets,
}

impl SubmeshWindow {
    fn crop(mesh: &BathyMesh, center: DVec2, size: f64) -> Self {
        let half_size = 0.5 * size;
        let min = center - DVec2::splat(half_size);
        let max = center + DVec2::splat(half_size);
        let inside = |v: DVec3| v.x >= min.x && v.x <= max.x && v.y >= min.y && v.y <= max.y;

        let mut remap = vec![u32::MAX; mesh.vertices.len()];
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut normals = Vec::new();
        let mut source_faces = Vec::new();
        let mut buckets = FaceBuckets::new(min, size, WINDOW_BUCKETS_PER_AXIS);

        for (face_index, face) in mesh.faces.iter().enumerate() {
            let corners = mesh.face_vertices(face);
            if !corners.iter().all(|&v| inside(v)) {
                continue;
            }
            let normal = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
            let length = normal.length();
            if length <= RAY_EPSILON {
                continue;
            }
            let normal = if normal.z < 0.0 { -normal / length } else { normal / length };

            let local = face.map(|v| {
                let slot = &mut remap[v as usize];
                if *slot == u32::MAX {
                    *slot = vertices.len() as u32;
                    vertices.push(mesh.vertices[v as usize]);
                }
                *slot
            });

            buckets.insert(faces.len() as u32, &corners);
            faces.push(local);
            normals.push(normal);
            source_faces.push(face_index);
        }

        Self {
            center,
            half_size,
            vertices,
            faces,
            normals,
            source_faces,
            buckets,
        }
    }

    fn contains(&self, p: DVec2) -> bool {
        (p - self.center).abs().max_element() <= self.half_size
    }

    /// Test every face of one bucket, keeping the nearest hit within `(RAY_EPSILON, max_t]`.
    fn test_bucket(
        &self,
        x: usize,
        y: usize,
        origin: DVec3,
        direction: DVec3,
        max_t: f64,
        best: &mut Option<(f64, usize)>,
    ) {
        for &face in self.buckets.faces(x, y) {
            let face = face as usize;
            let [a, b, c] = self.faces[face].map(|v| self.vertices[v as usize]);
            if let Some(t) = ray_triangle_intersect(origin, direction, a, b, c) {
                let limit = best.map_or(max_t, |(bt, _)| bt);
                if t <= limit {
                    *best = Some((t, face));
                }
            }
        }
    }

    /// Walk buckets along the planar footprint of the ray (2D DDA).
    fn intersect(&self, origin: DVec3, direction: DVec3, max_t: f64) -> Option<(f64, usize)> {
        let buckets = &self.buckets;
        let min = buckets.min;
        let max = min + DVec2::splat(2.0 * self.half_size);
        let o = origin.truncate();
        let d = direction.truncate();

        let mut best = None;

        if d.length_squared() <= RAY_EPSILON * RAY_EPSILON {
            if !self.contains(o) {
                return None;
            }
            let (x, y) = buckets.cell_of(o);
            self.test_bucket(x, y, origin, direction, max_t, &mut best);
            return best;
        }

        // Clip the parameter range to the window square.
        let (mut t_enter, mut t_exit) = (0.0f64, max_t);
        for axis in 0..2 {
            if d[axis].abs() <= RAY_EPSILON {
                if o[axis] < min[axis] || o[axis] > max[axis] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d[axis];
            let mut t0 = (min[axis] - o[axis]) * inv;
            let mut t1 = (max[axis] - o[axis]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
        }
        if t_enter > t_exit {
            return None;
        }

        let (mut x, mut y) = buckets.cell_of(o + d * t_enter);
        let step_x: isize = if d.x > 0.0 { 1 } else { -1 };
        let step_y: isize = if d.y > 0.0 { 1 } else { -1 };

        let next_boundary = |index: usize, step: isize, axis: usize| -> f64 {
            if d[axis].abs() <= RAY_EPSILON {
                return f64::INFINITY;
            }
            let edge = if step > 0 { index + 1 } else { index };
            (min[axis] + edge as f64 * buckets.cell - o[axis]) / d[axis]
        };
        let delta = |axis: usize| -> f64 {
            if d[axis].abs() <= RAY_EPSILON {
                f64::INFINITY
            } else {
                buckets.cell / d[axis].abs()
            }
        };

        let mut t_max_x = next_boundary(x, step_x, 0);
        let mut t_max_y = next_boundary(y, step_y, 1);
        let (t_delta_x, t_delta_y) = (delta(0), delta(1));

        loop {
            self.test_bucket(x, y, origin, direction, max_t, &mut best);

            let cell_exit = t_max_x.min(t_max_y);
            if let Some((t, _)) = best {
                if t <= cell_exit {
                    return best;
                }
            }
            if cell_exit > t_exit {
                return best;
            }

            if t_max_x < t_max_y {
                let next = x as isize + step_x;
                if next < 0 || next as usize >= buckets.per_axis {
                    return best;
                }
                x = next as usize;
                t_max_x += t_delta_x;
            } else {
                let next = y as isize + step_y;
                if next < 0 || next as usize >= buckets.per_axis {
                    return best;
                }
                y = next as usize;
                t_max_y += t_delta_y;
            }
        }
    }
}

/// Möller–Trumbore ray/triangle intersection; returns the ray parameter.
pub fn ray_triangle_intersect(origin: DVec3, direction: DVec3, a: DVec3, b: DVec3, c: DVec3) -> Option<f64> {
    let edge1 = b - a;
    let edge2 = c - a;
    let h = direction.cross(edge2);
    let det = edge1.dot(h);
    if det.abs() < RAY_EPSILON {
        return None; // Ray parallel to triangle
    }

    let f = 1.0 / det;
    let s = origin - a;
    let u = f * s.dot(h);
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * direction.dot(q);
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);
    (t > RAY_EPSILON).then_some(t)
}

/// Intersects sensor rays with a vehicle-centred crop of the mesh.
pub struct RayProjector {
    mesh: Arc<BathyMesh>,
    tracing_map_size: f64,
    window: Option<SubmeshWindow>,
    recrops: usize,
}

impl RayProjector {
    pub fn new(mesh: Arc<BathyMesh>, tracing_map_size: f64) -> Result<Self> {
        validate_map_size(tracing_map_size)?;
        Ok(Self {
            mesh,
            tracing_map_size,
            window: None,
            recrops: 0,
        })
    }

    pub fn tracing_map_size(&self) -> f64 {
        self.tracing_map_size
    }

    /// Change the crop size; the next `update_window` recrops.
    pub fn set_tracing_map_size(&mut self, size: f64) -> Result<()> {
        validate_map_size(size)?;
        self.tracing_map_size = size;
        self.window = None;
        Ok(())
    }

    pub fn needs_recrop(&self, position: DVec3) -> bool {
        self.window
            .as_ref()
            .is_none_or(|window| !window.contains(position.truncate()))
    }

    /// Recentre the window on `position` when the vehicle left it. Returns true on recrop.
    pub fn update_window(&mut self, position: DVec3) -> bool {
        if !self.needs_recrop(position) {
            return false;
        }
        self.recrop(position);
        true
    }

    /// Unconditionally rebuild the window around `position`.
    pub fn recrop(&mut self, position: DVec3) {
        let window = SubmeshWindow::crop(&self.mesh, position.truncate(), self.tracing_map_size);
        self.recrops += 1;
        debug!(
            faces = window.faces.len(),
            vertices = window.vertices.len(),
            center_x = window.center.x,
            center_y = window.center.y,
            "Submesh window recropped"
        );
        self.window = Some(window);
    }

    pub fn recrop_count(&self) -> usize {
        self.recrops
    }

    pub fn window_center(&self) -> Option<DVec2> {
        self.window.as_ref().map(|w| w.center)
    }

    pub fn window_face_count(&self) -> usize {
        self.window.as_ref().map_or(0, |w| w.faces.len())
    }

    /// Nearest hit of an unbounded ray.
    pub fn project(&self, origin: DVec3, direction: DVec3) -> Option<SurfaceHit> {
        self.project_segment(origin, direction, f64::INFINITY)
    }

    /// Nearest hit within `max_distance` along a ray.
    pub fn project_segment(&self, origin: DVec3, direction: DVec3, max_distance: f64) -> Option<SurfaceHit> {
        let window = self.window.as_ref()?;
        let direction = direction.normalize_or_zero();
        if direction == DVec3::ZERO {
            return None;
        }
        let (t, face) = window.intersect(origin, direction, max_distance)?;
        Some(SurfaceHit {
            point: origin + direction * t,
            normal: window.normals[face],
            distance: t,
            face: window.source_faces[face],
        })
    }

    /// First hit along a refracted path, segment by segment.
    pub fn project_path(&self, path: &RayPath) -> Option<PathHit> {
        path.segments.iter().enumerate().find_map(|(index, segment)| {
            self.project_segment(segment.origin, segment.direction, segment.length)
                .map(|hit| PathHit {
                    hit,
                    direction: segment.direction,
                    segment: index,
                    path_distance: path.distance_to(index, hit.distance),
                    travel_time: segment.time_at(hit.distance),
                })
        })
    }
}

fn validate_map_size(size: f64) -> Result<()> {
    if !size.is_finite() || size <= 0.0 {
        return Err(DrapingError::InvalidTracingMapSize(size));
    }
    Ok(())
}
