//! Seabed reconstruction from depth soundings and side-scan draping onto it.
//!
//! Depth samples are binned into a height grid, triangulated into a mesh,
//! and side-scan pings are projected onto that mesh through a layered
//! sound-speed profile to build a georeferenced intensity texture.

pub mod bounds;
pub mod config;
pub mod coordinates;
pub mod draper;
pub mod error;
pub mod heightmap;
pub mod intensity;
pub mod mesh;
pub mod ping;
pub mod projector;
pub mod sound_speed;
pub mod synthetic;
pub mod texture;

pub use bounds::GridBounds;
pub use config::{DrapingConfig, IntensityModelKind};
pub use draper::{DrapingEngine, DrapingState, DrapingStats, PingReport, SideWaveform};
pub use error::{DrapingError, Result};
pub use heightmap::{GridBinner, HeightGrid, height_map_from_cloud, height_map_from_pings};
pub use intensity::{CalibrationFn, IntensityModel, WindowBinning};
pub use mesh::{BathyMesh, mesh_from_cloud, mesh_from_pings};
pub use ping::{MultibeamPing, PingSide, Side, SidescanPing};
pub use projector::{PathHit, RayProjector, SurfaceHit};
pub use sound_speed::{RayPath, RaySegment, SoundSpeedEntry, SoundSpeedProfile, TraceFailure};
pub use texture::TextureAccumulator;
