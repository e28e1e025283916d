/// Height grid value marking a cell with no depth samples
pub const EMPTY_CELL: f64 = 0.0;

/// Relative tolerance when comparing x and y cell resolution recovered from bounds
pub const RESOLUTION_TOLERANCE: f64 = 1e-6;

/// Points per chunk for the parallel bounds reduction
pub const BOUNDS_CHUNK_SIZE: usize = 25_000;

/// Height grid cell size in metres when the caller does not choose one
pub const DEFAULT_GRID_RESOLUTION: f64 = 1.0;
