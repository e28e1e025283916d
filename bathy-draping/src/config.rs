//! Draping engine configuration.
//!
//! Every field has a default from the `constants` crate, so a JSON document
//! only needs the values it overrides.

use constants::coordinate_system::normalize_angle;
use constants::draping::{
    DEFAULT_BEAM_JITTER, DEFAULT_DISTANCE_ATTENUATION, DEFAULT_INTENSITY_MULTIPLIER,
    DEFAULT_NBR_WINDOWS, DEFAULT_SEED, DEFAULT_TRACING_MAP_SIZE,
};
use constants::grid::DEFAULT_GRID_RESOLUTION;
use constants::texture::DEFAULT_TEXTURE_RESOLUTION;
use serde::{Deserialize, Serialize};

use crate::error::{DrapingError, Result};
use crate::intensity::{CalibrationFn, IntensityModel};

/// Which intensity model the engine evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntensityModelKind {
    #[default]
    Lambertian,
    /// Needs a calibration function supplied in code.
    ModelBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrapingConfig {
    /// Height grid cell size (metres).
    pub grid_resolution: f64,
    /// Texture cell size (metres).
    pub texture_resolution: f64,
    pub nbr_windows: usize,
    pub ray_tracing_enabled: bool,
    pub tracing_map_size: f64,
    pub intensity_multiplier: f64,
    /// Sensor mounting yaw added to the vehicle heading (radians).
    pub sensor_yaw: f64,
    /// Half-width of the uniform launch-angle jitter (radians).
    pub beam_jitter: f64,
    pub seed: u64,
    pub distance_attenuation: f64,
    pub intensity_model: IntensityModelKind,
}

impl Default for DrapingConfig {
    fn default() -> Self {
        Self {
            grid_resolution: DEFAULT_GRID_RESOLUTION,
            texture_resolution: DEFAULT_TEXTURE_RESOLUTION,
            nbr_windows: DEFAULT_NBR_WINDOWS,
            ray_tracing_enabled: true,
            tracing_map_size: DEFAULT_TRACING_MAP_SIZE,
            intensity_multiplier: DEFAULT_INTENSITY_MULTIPLIER,
            sensor_yaw: 0.0,
            beam_jitter: DEFAULT_BEAM_JITTER,
            seed: DEFAULT_SEED,
            distance_attenuation: DEFAULT_DISTANCE_ATTENUATION,
            intensity_model: IntensityModelKind::default(),
        }
    }
}

impl DrapingConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DrapingConfig = serde_json::from_str(json)?;
        config.validated()
    }

    /// Check every field and wrap `sensor_yaw` into (-π, π].
    pub fn validated(mut self) -> Result<Self> {
        if !self.grid_resolution.is_finite() || self.grid_resolution <= 0.0 {
            return Err(DrapingError::InvalidResolution(self.grid_resolution));
        }
        if !self.texture_resolution.is_finite() || self.texture_resolution <= 0.0 {
            return Err(DrapingError::InvalidResolution(self.texture_resolution));
        }
        if self.nbr_windows == 0 {
            return Err(DrapingError::InvalidWindowCount);
        }
        if !self.tracing_map_size.is_finite() || self.tracing_map_size <= 0.0 {
            return Err(DrapingError::InvalidTracingMapSize(self.tracing_map_size));
        }
        validate_multiplier(self.intensity_multiplier)?;
        non_negative("beam_jitter", self.beam_jitter)?;
        non_negative("distance_attenuation", self.distance_attenuation)?;

        self.sensor_yaw = normalize_angle(self.sensor_yaw);
        Ok(self)
    }

    /// Intensity model selected by `intensity_model`.
    pub fn build_intensity_model(&self, calibration: Option<CalibrationFn>) -> Result<IntensityModel> {
        match self.intensity_model {
            IntensityModelKind::Lambertian => Ok(IntensityModel::Lambertian {
                distance_attenuation: self.distance_attenuation,
            }),
            IntensityModelKind::ModelBased => calibration
                .map(IntensityModel::ModelBased)
                .ok_or(DrapingError::MissingCalibration),
        }
    }
}

pub(crate) fn validate_multiplier(multiplier: f64) -> Result<()> {
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(DrapingError::InvalidIntensityMultiplier(multiplier));
    }
    Ok(())
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DrapingError::InvalidParameter { name, value });
    }
    Ok(())
}
