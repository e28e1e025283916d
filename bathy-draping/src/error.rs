//! Central error type for reconstruction and draping.
//!
//! Every variant is a construction-time failure. Per-sample anomalies during
//! draping are never errors; they are counted in `DrapingStats` instead.

/// Errors reported while building grids, meshes, profiles or engines.
#[derive(thiserror::Error, Debug)]
pub enum DrapingError {
    #[error("Cannot bin an empty point set")]
    EmptyPointSet,

    #[error("Grid resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),

    #[error("Sound speed depths must be strictly increasing: entry {index} at {depth} m follows {previous} m")]
    NonMonotonicSoundSpeed {
        index: usize,
        depth: f64,
        previous: f64,
    },

    #[error("Sound speed entry {index} has invalid velocity {velocity} m/s")]
    InvalidSoundSpeed { index: usize, velocity: f64 },

    #[error("Tracing map size must be positive and finite, got {0}")]
    InvalidTracingMapSize(f64),

    #[error("Intensity multiplier must be non-negative and finite, got {0}")]
    InvalidIntensityMultiplier(f64),

    #[error("Window count must be at least 1")]
    InvalidWindowCount,

    #[error("Parameter {name} is out of range, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Model-based intensity needs a calibration function")]
    MissingCalibration,

    #[error("Height grid holds {actual} values but {rows}x{cols} were expected")]
    GridShapeMismatch {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("Bounds are degenerate: {0}")]
    DegenerateBounds(String),

    #[error("Texture shapes differ: {0}")]
    TextureShapeMismatch(String),

    #[error("Mesh face {face} references vertex {vertex} but only {vertex_count} vertices exist")]
    InvalidFaceIndex {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias for reconstruction and draping operations
pub type Result<T> = std::result::Result<T, DrapingError>;
