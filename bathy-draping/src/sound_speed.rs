//! Layered sound-speed profile and refracted ray paths.
//!
//! The water column is split at every profile depth. Inside a layer the
//! velocity is constant (that of the entry at the layer top, or the first
//! entry above the profile), so rays are straight within a layer and bend at
//! each boundary by Snell's law, `sin θ_i / v_i = sin θ_{i+1} / v_{i+1}`,
//! with θ measured from the vertical.

use bevy_math::{DVec2, DVec3};
use constants::acoustics::{DEFAULT_SOUND_SPEED, MIN_DESCENT_COSINE};
use constants::coordinate_system::depth_from_height;
use serde::{Deserialize, Serialize};

use crate::error::{DrapingError, Result};

/// One sample of a sound velocity profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundSpeedEntry {
    /// Depth below the surface (metres, positive down).
    pub depth: f64,
    /// Sound velocity (m/s).
    pub velocity: f64,
}

impl SoundSpeedEntry {
    pub fn new(depth: f64, velocity: f64) -> Self {
        Self { depth, velocity }
    }
}

/// Straight piece of a ray path inside one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySegment {
    pub origin: DVec3,
    /// Unit direction.
    pub direction: DVec3,
    /// Length in metres; infinite for an unbounded straight ray.
    pub length: f64,
    pub velocity: f64,
    /// One-way travel time accumulated before this segment.
    pub start_time: f64,
}

impl RaySegment {
    pub fn point_at(&self, distance: f64) -> DVec3 {
        self.origin + self.direction * distance
    }

    pub fn time_at(&self, distance: f64) -> f64 {
        self.start_time + distance / self.velocity
    }

    /// Sine of the angle between the segment and the vertical.
    pub fn sin_from_vertical(&self) -> f64 {
        DVec2::new(self.direction.x, self.direction.y).length()
    }
}

/// Ordered segments from the sensor towards the seabed.
#[derive(Debug, Clone, PartialEq)]
pub struct RayPath {
    pub segments: Vec<RaySegment>,
}

impl RayPath {
    /// Unbent ray at a single velocity.
    pub fn straight(origin: DVec3, direction: DVec3, velocity: f64) -> Self {
        Self {
            segments: vec![RaySegment {
                origin,
                direction: direction.normalize(),
                length: f64::INFINITY,
                velocity,
                start_time: 0.0,
            }],
        }
    }

    /// Path length up to `distance` along segment `segment`.
    pub fn distance_to(&self, segment: usize, distance: f64) -> f64 {
        self.segments[..segment]
            .iter()
            .map(|s| s.length)
            .sum::<f64>()
            + distance
    }
}

/// Reasons a refracted path cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceFailure {
    EmptyProfile,
    /// The launch direction does not point downwards.
    NotDescending,
    /// The sensor sits at or below the deepest profile entry.
    OriginBelowProfile,
    /// The ray turned back at a layer boundary at this depth.
    TotalInternalReflection { depth: f64 },
}

/// Depth-ordered sound velocity profile; empty means constant velocity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundSpeedProfile {
    entries: Vec<SoundSpeedEntry>,
}

impl SoundSpeedProfile {
    /// Validate and wrap profile entries.
    pub fn new(entries: Vec<SoundSpeedEntry>) -> Result<Self> {
        for (index, entry) in entries.iter().enumerate() {
            if !entry.velocity.is_finite() || entry.velocity <= 0.0 {
                return Err(DrapingError::InvalidSoundSpeed {
                    index,
                    velocity: entry.velocity,
                });
            }
            if !entry.depth.is_finite() {
                return Err(DrapingError::NonMonotonicSoundSpeed {
                    index,
                    depth: entry.depth,
                    previous: f64::NAN,
                });
            }
            if index > 0 && entry.depth <= entries[index - 1].depth {
                return Err(DrapingError::NonMonotonicSoundSpeed {
                    index,
                    depth: entry.depth,
                    previous: entries[index - 1].depth,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Profile with no entries; every query uses the default velocity.
    pub fn constant() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SoundSpeedEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Representative velocity for straight-line propagation.
    pub fn simple_velocity(&self) -> f64 {
        if self.entries.is_empty() {
            DEFAULT_SOUND_SPEED
        } else {
            self.entries.iter().map(|e| e.velocity).sum::<f64>() / self.entries.len() as f64
        }
    }

    /// Velocity of the layer containing `depth`.
    pub fn velocity_at_depth(&self, depth: f64) -> f64 {
        match self.entries.partition_point(|e| e.depth <= depth) {
            0 => self
                .entries
                .first()
                .map_or(DEFAULT_SOUND_SPEED, |e| e.velocity),
            n => self.entries[n - 1].velocity,
        }
    }

    /// Refract a ray launched at `origin` down to the deepest profile entry.
    pub fn trace(
        &self,
        origin: DVec3,
        launch_direction: DVec3,
    ) -> std::result::Result<RayPath, TraceFailure> {
        let Some(deepest) = self.entries.last() else {
            return Err(TraceFailure::EmptyProfile);
        };

        let direction = launch_direction.normalize_or_zero();
        if direction.z > -MIN_DESCENT_COSINE {
            return Err(TraceFailure::NotDescending);
        }

        let mut depth = depth_from_height(origin.z);
        if depth >= deepest.depth {
            return Err(TraceFailure::OriginBelowProfile);
        }

        let horizontal = DVec2::new(direction.x, direction.y);
        let across = horizontal.normalize_or_zero();
        let mut sin_theta = horizontal.length().min(1.0);
        let mut velocity = self.velocity_at_depth(depth);
        let mut point = origin;
        let mut time = 0.0;

        let first = self.entries.partition_point(|e| e.depth <= depth);
        let mut segments = Vec::with_capacity(self.entries.len() - first);

        for (offset, boundary) in self.entries[first..].iter().enumerate() {
            let cos_theta = (1.0 - sin_theta * sin_theta).sqrt();
            let segment_direction =
                DVec3::new(across.x * sin_theta, across.y * sin_theta, -cos_theta);
            let length = (boundary.depth - depth) / cos_theta;

            segments.push(RaySegment {
                origin: point,
                direction: segment_direction,
                length,
                velocity,
                start_time: time,
            });

            point += segment_direction * length;
            time += length / velocity;
            depth = boundary.depth;

            if first + offset + 1 == self.entries.len() {
                break;
            }

            let refracted = sin_theta * boundary.velocity / velocity;
            if refracted * refracted >= 1.0 - MIN_DESCENT_COSINE * MIN_DESCENT_COSINE {
                return Err(TraceFailure::TotalInternalReflection { depth });
            }
            sin_theta = refracted;
            velocity = boundary.velocity;
        }

        Ok(RayPath { segments })
    }
}
