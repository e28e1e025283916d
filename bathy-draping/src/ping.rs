/// Sensor records consumed by the reconstruction and draping pipeline
use bevy_math::DVec3;

/// One transducer channel of a side-scan ping.
#[derive(Debug, Clone, Default)]
pub struct PingSide {
    /// Raw amplitudes in range order.
    pub samples: Vec<i32>,
    /// Two-way travel time covered by `samples` (seconds).
    pub time_duration: f64,
    /// Slant range covered by `samples` (metres).
    pub slant_range: f64,
}

impl PingSide {
    pub fn new(samples: Vec<i32>, time_duration: f64, slant_range: f64) -> Self {
        Self {
            samples,
            time_duration,
            slant_range,
        }
    }

    /// Two-way time spanned by the record, derived from the slant range when
    /// the logged duration is missing.
    pub fn effective_duration(&self, sound_velocity: f64) -> Option<f64> {
        if self.time_duration.is_finite() && self.time_duration > 0.0 {
            Some(self.time_duration)
        } else if self.slant_range.is_finite() && self.slant_range > 0.0 && sound_velocity > 0.0 {
            Some(2.0 * self.slant_range / sound_velocity)
        } else {
            None
        }
    }
}

/// Which side of the vehicle a channel looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Port,
    Starboard,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Port, Side::Starboard];

    /// Sign of the across-track axis in the vehicle frame (y points to port).
    pub fn across_track_sign(self) -> f64 {
        match self {
            Side::Port => 1.0,
            Side::Starboard => -1.0,
        }
    }
}

/// One side-scan acquisition with vehicle pose in world coordinates.
#[derive(Debug, Clone)]
pub struct SidescanPing {
    pub timestamp_ms: i64,
    pub position: DVec3,
    /// Rotation about world z (radians, counter-clockwise from east).
    pub heading: f64,
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub port: PingSide,
    pub stbd: PingSide,
}

impl SidescanPing {
    pub fn side(&self, side: Side) -> &PingSide {
        match side {
            Side::Port => &self.port,
            Side::Starboard => &self.stbd,
        }
    }
}

/// One multibeam swath: the world-frame seabed hits of every beam.
#[derive(Debug, Clone, Default)]
pub struct MultibeamPing {
    pub timestamp_ms: i64,
    pub position: DVec3,
    pub beams: Vec<DVec3>,
}
