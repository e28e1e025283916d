/// Normalized texture value for cells that never received an observation
pub const TEXTURE_BACKGROUND: f64 = -1.0;

/// Default texture cell size in metres
pub const DEFAULT_TEXTURE_RESOLUTION: f64 = 0.5;
