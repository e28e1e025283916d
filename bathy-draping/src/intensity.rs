/// Per-sample intensity models and range-window binning of side-scan records
use std::fmt;
use std::sync::Arc;

use bevy_math::DVec3;

use crate::ping::PingSide;

/// Calibration curve `(slant_distance, incidence_angle) -> intensity`.
pub type CalibrationFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// How a seabed hit is turned into an intensity value.
#[derive(Clone)]
pub enum IntensityModel {
    /// Cosine of the incidence angle, attenuated by `1 / (1 + k * distance)`.
    Lambertian { distance_attenuation: f64 },
    /// Caller-supplied calibration curve.
    ModelBased(CalibrationFn),
}

impl fmt::Debug for IntensityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntensityModel::Lambertian {
                distance_attenuation,
            } => f
                .debug_struct("Lambertian")
                .field("distance_attenuation", distance_attenuation)
                .finish(),
            IntensityModel::ModelBased(_) => f.write_str("ModelBased(..)"),
        }
    }
}

impl Default for IntensityModel {
    fn default() -> Self {
        IntensityModel::Lambertian {
            distance_attenuation: 0.0,
        }
    }
}

impl IntensityModel {
    pub fn model_based<F>(calibration: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        IntensityModel::ModelBased(Arc::new(calibration))
    }

    /// Intensity of a hit with upward `normal`, reached travelling along
    /// `direction` after `distance` metres of path.
    pub fn evaluate(&self, normal: DVec3, direction: DVec3, distance: f64, multiplier: f64) -> f64 {
        let cosine = normal.dot(-direction.normalize_or_zero());
        let value = match self {
            IntensityModel::Lambertian {
                distance_attenuation,
            } => cosine.max(0.0) * multiplier / (1.0 + distance_attenuation * distance),
            IntensityModel::ModelBased(calibration) => {
                calibration(distance, incidence_angle(cosine)) * multiplier
            }
        };
        clamp_intensity(value)
    }
}

/// Incidence angle from the cosine between the surface normal and the reversed ray.
pub fn incidence_angle(cosine: f64) -> f64 {
    cosine.clamp(-1.0, 1.0).acos()
}

fn clamp_intensity(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

/// Uniform split of a side's two-way time into range windows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowBinning {
    nbr_windows: usize,
    duration: f64,
}

impl WindowBinning {
    /// `None` unless there is at least one window and a positive duration.
    pub fn new(nbr_windows: usize, duration: f64) -> Option<Self> {
        (nbr_windows > 0 && duration.is_finite() && duration > 0.0).then_some(Self {
            nbr_windows,
            duration,
        })
    }

    /// Binning of one side, using `2 * slant_range / velocity` when no duration was logged.
    pub fn for_side(side: &PingSide, nbr_windows: usize, velocity: f64) -> Option<Self> {
        Self::new(nbr_windows, side.effective_duration(velocity)?)
    }

    pub fn nbr_windows(&self) -> usize {
        self.nbr_windows
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn window_duration(&self) -> f64 {
        self.duration / self.nbr_windows as f64
    }

    /// Two-way time at the centre of window `window`.
    pub fn window_center(&self, window: usize) -> f64 {
        (window as f64 + 0.5) * self.window_duration()
    }

    /// Window holding two-way time `time`, if inside the record.
    pub fn window_of(&self, time: f64) -> Option<usize> {
        if !(0.0..self.duration).contains(&time) {
            return None;
        }
        let window = (time / self.window_duration()).floor() as usize;
        Some(window.min(self.nbr_windows - 1))
    }

    /// Mean amplitude per window; samples are spread evenly over the duration.
    pub fn bin_samples(&self, samples: &[i32]) -> Vec<Option<f64>> {
        let mut sums = vec![0.0f64; self.nbr_windows];
        let mut counts = vec![0usize; self.nbr_windows];
        let per_sample = self.nbr_windows as f64 / samples.len().max(1) as f64;

        for (index, &sample) in samples.iter().enumerate() {
            let window = (((index as f64 + 0.5) * per_sample).floor() as usize).min(self.nbr_windows - 1);
            sums[window] += f64::from(sample);
            counts[window] += 1;
        }

        sums.iter()
            .zip(&counts)
            .map(|(&sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect()
    }
}
