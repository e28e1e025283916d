pub mod acoustics;
pub mod coordinate_system;
pub mod draping;
pub mod grid;
pub mod texture;
