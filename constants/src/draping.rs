/// Range windows per side when the caller does not choose one
pub const DEFAULT_NBR_WINDOWS: usize = 256;

/// Side of the square submesh window used for ray queries (metres)
pub const DEFAULT_TRACING_MAP_SIZE: f64 = 200.0;

pub const DEFAULT_INTENSITY_MULTIPLIER: f64 = 1.0;

/// Seed for the per-engine random context
pub const DEFAULT_SEED: u64 = 0x5eab_ed00;

/// Number of face buckets along each axis of a submesh window
pub const WINDOW_BUCKETS_PER_AXIS: usize = 64;

/// Intersection epsilon for ray/triangle tests (metres)
pub const RAY_EPSILON: f64 = 1e-9;

/// Lambertian range attenuation coefficient `k` in `1 / (1 + k * distance)`
pub const DEFAULT_DISTANCE_ATTENUATION: f64 = 0.0;

/// Half-width of the uniform launch-angle jitter (radians); zero disables it
pub const DEFAULT_BEAM_JITTER: f64 = 0.0;
