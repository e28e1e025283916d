//! Seeded synthetic surveys: an undulating seabed, multibeam swaths over it
//! and matching side-scan pings, all reproducible from one seed.

use std::f64::consts::PI;

use bevy_math::DVec3;
use constants::acoustics::DEFAULT_SOUND_SPEED;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DrapingError, Result};
use crate::ping::{MultibeamPing, PingSide, SidescanPing};
use crate::sound_speed::{SoundSpeedEntry, SoundSpeedProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveyConfig {
    pub seed: u64,
    /// World position of the first ping of the first line.
    pub origin_x: f64,
    pub origin_y: f64,
    pub lines: usize,
    pub line_length: f64,
    pub line_spacing: f64,
    pub ping_spacing: f64,
    /// Mean seabed depth (metres, positive down).
    pub depth: f64,
    /// Amplitude of the seabed undulation.
    pub relief: f64,
    /// Vehicle height above the mean seabed.
    pub altitude: f64,
    pub beams_per_ping: usize,
    pub swath_width: f64,
    pub depth_noise: f64,
    pub samples_per_side: usize,
    pub slant_range: f64,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            origin_x: 651_200.0,
            origin_y: 6_470_300.0,
            lines: 3,
            line_length: 300.0,
            line_spacing: 60.0,
            ping_spacing: 1.0,
            depth: 45.0,
            relief: 4.0,
            altitude: 15.0,
            beams_per_ping: 256,
            swath_width: 160.0,
            depth_noise: 0.05,
            samples_per_side: 1024,
            slant_range: 75.0,
        }
    }
}

impl SurveyConfig {
    fn validate(&self) -> Result<()> {
        for (name, count, minimum) in [
            ("lines", self.lines, 1),
            ("beams_per_ping", self.beams_per_ping, 2),
            ("samples_per_side", self.samples_per_side, 1),
        ] {
            if count < minimum {
                return Err(DrapingError::InvalidParameter {
                    name,
                    value: count as f64,
                });
            }
        }
        if !self.depth_noise.is_finite() || self.depth_noise < 0.0 {
            return Err(DrapingError::InvalidParameter {
                name: "depth_noise",
                value: self.depth_noise,
            });
        }
        for (name, value) in [
            ("line_length", self.line_length),
            ("ping_spacing", self.ping_spacing),
            ("depth", self.depth),
            ("swath_width", self.swath_width),
            ("slant_range", self.slant_range),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DrapingError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }

    /// Seabed height at a world position.
    pub fn seabed_height(&self, x: f64, y: f64) -> f64 {
        let u = (x - self.origin_x) / 70.0;
        let v = (y - self.origin_y) / 45.0;
        -self.depth + self.relief * (u * PI).sin() * (v * PI).cos()
    }
}

/// Everything a draping run consumes.
#[derive(Debug, Clone)]
pub struct SyntheticSurvey {
    pub multibeam: Vec<MultibeamPing>,
    pub sidescan: Vec<SidescanPing>,
    pub profile: SoundSpeedProfile,
}

impl SyntheticSurvey {
    /// Lawnmower pattern of lines along x, alternating heading, stepping in y.
    pub fn generate(config: &SurveyConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let pings_per_line = (config.line_length / config.ping_spacing).floor() as usize + 1;
        let mut multibeam = Vec::with_capacity(config.lines * pings_per_line);
        let mut sidescan = Vec::with_capacity(config.lines * pings_per_line);
        let mut timestamp_ms = 0i64;

        for line in 0..config.lines {
            let forward = line % 2 == 0;
            let heading = if forward { 0.0 } else { PI };
            let y = config.origin_y + line as f64 * config.line_spacing;

            for step in 0..pings_per_line {
                let along = step as f64 * config.ping_spacing;
                let x = if forward {
                    config.origin_x + along
                } else {
                    config.origin_x + config.line_length - along
                };
                let position = DVec3::new(x, y, -config.depth + config.altitude);

                multibeam.push(MultibeamPing {
                    timestamp_ms,
                    position,
                    beams: swath(config, &mut rng, x, y),
                });
                sidescan.push(SidescanPing {
                    timestamp_ms,
                    position,
                    heading,
                    pitch: None,
                    roll: Some(rng.gen_range(-0.01..=0.01)),
                    port: side_record(config, &mut rng),
                    stbd: side_record(config, &mut rng),
                });
                timestamp_ms += 250;
            }
        }

        let profile = SoundSpeedProfile::new(vec![
            SoundSpeedEntry::new(0.0, 1492.0),
            SoundSpeedEntry::new(8.0, 1496.0),
            SoundSpeedEntry::new(25.0, 1489.0),
            SoundSpeedEntry::new(2.0 * config.depth + 50.0, 1494.0),
        ])?;

        info!(
            lines = config.lines,
            pings = sidescan.len(),
            beams = config.beams_per_ping,
            "Synthetic survey generated"
        );

        Ok(Self {
            multibeam,
            sidescan,
            profile,
        })
    }
}

fn swath(config: &SurveyConfig, rng: &mut StdRng, x: f64, y: f64) -> Vec<DVec3> {
    let step = config.swath_width / (config.beams_per_ping - 1) as f64;
    (0..config.beams_per_ping)
        .map(|beam| {
            let across = -0.5 * config.swath_width + beam as f64 * step;
            let noise = rng.gen_range(-config.depth_noise..=config.depth_noise);
            DVec3::new(x, y + across, config.seabed_height(x, y + across) + noise)
        })
        .collect()
}

/// Amplitudes falling off with range past the first bottom return.
fn side_record(config: &SurveyConfig, rng: &mut StdRng) -> PingSide {
    let duration = 2.0 * config.slant_range / DEFAULT_SOUND_SPEED;
    let samples = (0..config.samples_per_side)
        .map(|k| {
            let time = (k as f64 + 0.5) * duration / config.samples_per_side as f64;
            let range = DEFAULT_SOUND_SPEED * time / 2.0;
            let level = if range < config.altitude {
                5.0
            } else {
                4000.0 * config.altitude / range
            };
            (level * rng.gen_range(0.7..1.3)).round() as i32
        })
        .collect();
    PingSide::new(samples, duration, config.slant_range)
}
