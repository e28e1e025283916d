/// Sound speed used when no profile is available (m/s)
pub const DEFAULT_SOUND_SPEED: f64 = 1500.0;

/// Below this |cos θ| a ray is treated as horizontal and can no longer descend
pub const MIN_DESCENT_COSINE: f64 = 1e-6;
