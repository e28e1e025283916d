//! Ping-by-ping draping of side-scan records onto the bathymetry mesh.
//!
//! Each `step()` handles one ping: the submesh window is recropped around
//! the vehicle if needed, the nadir altitude is found with a vertical ray,
//! and every range window of both sides is turned into a launch ray. Each
//! seabed hit is binned by its two-way travel time and receives the side's
//! measured amplitude for that window, scaled by the intensity multiplier.
//! Rays for one ping are cast in parallel; their results are collected in
//! (side, window) order and merged into the texture afterwards, so the output
//! does not depend on scheduling.

use std::sync::Arc;

use bevy_math::{DMat3, DVec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use constants::coordinate_system::normalize_angle;

use crate::bounds::GridBounds;
use crate::config::{DrapingConfig, validate_multiplier};
use crate::coordinates::{across_track_direction, transform_direction, vehicle_to_world};
use crate::error::{DrapingError, Result};
use crate::intensity::{CalibrationFn, IntensityModel, WindowBinning};
use crate::mesh::BathyMesh;
use crate::ping::{Side, SidescanPing};
use crate::projector::RayProjector;
use crate::sound_speed::{RayPath, SoundSpeedProfile};
use crate::texture::TextureAccumulator;

/// Progress through the ping sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DrapingState {
    Idle,
    /// Next ping to process.
    Stepping(usize),
    Done,
}

/// Counters for everything skipped or substituted while draping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrapingStats {
    pub pings_processed: usize,
    pub pings_outside_bathymetry: usize,
    pub sides_without_duration: usize,
    pub windows_water_column: usize,
    pub windows_missed: usize,
    /// Hits whose two-way time lies past the end of the record.
    pub windows_outside_record: usize,
    /// Hits binned into a window that holds no samples.
    pub windows_without_samples: usize,
    pub windows_outside_texture: usize,
    pub windows_accumulated: usize,
    /// Traced rays that fell back to a straight path.
    pub straight_fallbacks: usize,
}

/// Measured and modelled values of one side of a ping, one entry per window.
/// `modelled` is filled for the windows that hits were binned into.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideWaveform {
    pub measured: Vec<Option<f64>>,
    pub modelled: Vec<Option<f64>>,
}

impl SideWaveform {
    fn empty(nbr_windows: usize) -> Self {
        Self {
            measured: vec![None; nbr_windows],
            modelled: vec![None; nbr_windows],
        }
    }
}

/// Result of one `step()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PingReport {
    pub ping_index: usize,
    pub timestamp_ms: i64,
    /// Height of the vehicle above the seabed, if the nadir ray hit.
    pub altitude: Option<f64>,
    pub port: SideWaveform,
    pub stbd: SideWaveform,
    pub accumulated: usize,
    pub skipped: usize,
}

impl PingReport {
    pub fn side(&self, side: Side) -> &SideWaveform {
        match side {
            Side::Port => &self.port,
            Side::Starboard => &self.stbd,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideWaveform {
        match side {
            Side::Port => &mut self.port,
            Side::Starboard => &mut self.stbd,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BeamJob {
    side: Side,
    window: usize,
    theta: f64,
}

#[derive(Debug, Clone, Copy)]
enum BeamOutcome {
    Hit {
        point: DVec3,
        /// One-way travel time to the hit.
        travel_time: f64,
        modelled: f64,
        fell_back: bool,
    },
    Miss,
}

/// Owns the texture and walks the ping sequence one `step()` at a time.
pub struct DrapingEngine {
    pings: Vec<SidescanPing>,
    profile: SoundSpeedProfile,
    bounds: GridBounds,
    projector: RayProjector,
    accumulator: TextureAccumulator,
    intensity_model: IntensityModel,
    config: DrapingConfig,
    rng: StdRng,
    state: DrapingState,
    stats: DrapingStats,
}

impl DrapingEngine {
    /// Engine with the intensity model named in `config`.
    pub fn new(
        mesh: Arc<BathyMesh>,
        bounds: GridBounds,
        pings: Vec<SidescanPing>,
        profile: SoundSpeedProfile,
        config: DrapingConfig,
    ) -> Result<Self> {
        Self::build(mesh, bounds, pings, profile, config, None)
    }

    /// Engine using `calibration` when `config` selects the model-based intensity.
    pub fn with_calibration(
        mesh: Arc<BathyMesh>,
        bounds: GridBounds,
        pings: Vec<SidescanPing>,
        profile: SoundSpeedProfile,
        config: DrapingConfig,
        calibration: CalibrationFn,
    ) -> Result<Self> {
        Self::build(mesh, bounds, pings, profile, config, Some(calibration))
    }

    fn build(
        mesh: Arc<BathyMesh>,
        bounds: GridBounds,
        pings: Vec<SidescanPing>,
        profile: SoundSpeedProfile,
        config: DrapingConfig,
        calibration: Option<CalibrationFn>,
    ) -> Result<Self> {
        let config = config.validated()?;
        bounds.validate()?;
        let intensity_model = config.build_intensity_model(calibration)?;
        let projector = RayProjector::new(mesh, config.tracing_map_size)?;
        let accumulator = TextureAccumulator::with_resolution(bounds, config.texture_resolution)?;

        if profile.is_empty() {
            info!("Empty sound speed profile, using constant velocity");
        }
        info!(
            pings = pings.len(),
            windows = config.nbr_windows,
            texture_rows = accumulator.rows(),
            texture_cols = accumulator.cols(),
            ray_tracing = config.ray_tracing_enabled,
            "Draping engine ready"
        );

        let state = if pings.is_empty() {
            DrapingState::Done
        } else {
            DrapingState::Idle
        };

        Ok(Self {
            pings,
            profile,
            bounds,
            projector,
            accumulator,
            intensity_model,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            state,
            stats: DrapingStats::default(),
        })
    }

    pub fn state(&self) -> DrapingState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == DrapingState::Done
    }

    pub fn ping_count(&self) -> usize {
        self.pings.len()
    }

    pub fn config(&self) -> &DrapingConfig {
        &self.config
    }

    pub fn stats(&self) -> &DrapingStats {
        &self.stats
    }

    pub fn accumulator(&self) -> &TextureAccumulator {
        &self.accumulator
    }

    pub fn into_accumulator(self) -> TextureAccumulator {
        self.accumulator
    }

    /// Normalized texture and the bounds it covers.
    pub fn texture(&self) -> (Vec<f64>, GridBounds) {
        (self.accumulator.read(), self.bounds)
    }

    pub fn set_ray_tracing_enabled(&mut self, enabled: bool) {
        self.config.ray_tracing_enabled = enabled;
    }

    /// Takes effect at the next `step()`, which recrops the window.
    pub fn set_tracing_map_size(&mut self, size: f64) -> Result<()> {
        self.projector.set_tracing_map_size(size)?;
        self.config.tracing_map_size = size;
        Ok(())
    }

    pub fn set_intensity_multiplier(&mut self, multiplier: f64) -> Result<()> {
        validate_multiplier(multiplier)?;
        self.config.intensity_multiplier = multiplier;
        Ok(())
    }

    pub fn set_sensor_yaw(&mut self, yaw: f64) {
        self.config.sensor_yaw = normalize_angle(yaw);
    }

    pub fn set_intensity_model(&mut self, model: IntensityModel) {
        self.intensity_model = model;
    }

    /// Replace the texture with `accumulator`, e.g. one seeded from an earlier run.
    /// Its bounds must be the bounds the engine drapes onto.
    pub fn set_texture(&mut self, accumulator: TextureAccumulator) -> Result<()> {
        if accumulator.bounds() != &self.bounds {
            return Err(DrapingError::TextureShapeMismatch(format!(
                "texture bounds X [{}, {}] Y [{}, {}] differ from the mesh bounds",
                accumulator.bounds().min_x,
                accumulator.bounds().max_x,
                accumulator.bounds().min_y,
                accumulator.bounds().max_y
            )));
        }
        debug!(
            rows = accumulator.rows(),
            cols = accumulator.cols(),
            observations = accumulator.total_observations(),
            "Texture replaced"
        );
        self.accumulator = accumulator;
        Ok(())
    }

    /// Number of times the submesh window has been rebuilt.
    pub fn recrop_count(&self) -> usize {
        self.projector.recrop_count()
    }

    /// Drape the next ping. Returns `None` once every ping has been processed.
    pub fn step(&mut self) -> Option<PingReport> {
        let index = match self.state {
            DrapingState::Done => return None,
            DrapingState::Idle => 0,
            DrapingState::Stepping(index) => index,
        };

        let report = self.drape_ping(index);

        self.stats.pings_processed += 1;
        self.state = if index + 1 >= self.pings.len() {
            info!(pings = self.pings.len(), "Draping complete");
            DrapingState::Done
        } else {
            DrapingState::Stepping(index + 1)
        };
        Some(report)
    }

    /// Step until done; returns the number of pings processed by this call.
    pub fn run_to_end(&mut self) -> usize {
        let mut processed = 0;
        while self.step().is_some() {
            processed += 1;
        }
        processed
    }

    fn drape_ping(&mut self, index: usize) -> PingReport {
        let nbr_windows = self.config.nbr_windows;
        let velocity = self.profile.simple_velocity();
        let ping = &self.pings[index];
        let position = ping.position - self.bounds.mesh_offset();

        let mut report = PingReport {
            ping_index: index,
            timestamp_ms: ping.timestamp_ms,
            altitude: None,
            port: SideWaveform::empty(nbr_windows),
            stbd: SideWaveform::empty(nbr_windows),
            accumulated: 0,
            skipped: 0,
        };

        let mut binnings = [None, None];
        for (slot, side) in binnings.iter_mut().zip(Side::BOTH) {
            let record = ping.side(side);
            *slot = WindowBinning::for_side(record, nbr_windows, velocity);
            match slot {
                Some(binning) => report.side_mut(side).measured = binning.bin_samples(&record.samples),
                None => self.stats.sides_without_duration += 1,
            }
        }

        let rotation = vehicle_to_world(ping.heading, self.config.sensor_yaw, ping.pitch, ping.roll);

        // The window must be current before any ray is cast.
        self.projector.update_window(position);

        let Some(altitude) = self.projector.project(position, DVec3::NEG_Z).map(|hit| hit.distance) else {
            debug!(ping = index, "Vehicle outside bathymetry, skipping ping");
            self.stats.pings_outside_bathymetry += 1;
            report.skipped = 2 * nbr_windows;
            return report;
        };
        report.altitude = Some(altitude);

        let jobs = self.plan_beams(&binnings, altitude, velocity, &mut report);

        let outcomes: Vec<BeamOutcome> = jobs
            .par_iter()
            .map(|job| self.cast_beam(job, position, &rotation, velocity))
            .collect();

        let multiplier = self.config.intensity_multiplier;
        for (job, outcome) in jobs.iter().zip(outcomes) {
            let BeamOutcome::Hit {
                point,
                travel_time,
                modelled,
                fell_back,
            } = outcome
            else {
                self.stats.windows_missed += 1;
                report.skipped += 1;
                continue;
            };
            if fell_back {
                self.stats.straight_fallbacks += 1;
            }

            // Jobs are only planned for sides with a binning.
            let Some(binning) = binnings[side_slot(job.side)] else {
                continue;
            };
            let Some(window) = binning.window_of(2.0 * travel_time) else {
                self.stats.windows_outside_record += 1;
                report.skipped += 1;
                continue;
            };
            let Some(amplitude) = report.side(job.side).measured[window] else {
                self.stats.windows_without_samples += 1;
                report.skipped += 1;
                continue;
            };

            if self.accumulator.accumulate(point.truncate(), amplitude * multiplier) {
                self.stats.windows_accumulated += 1;
                report.accumulated += 1;
                report.side_mut(job.side).modelled[window] = Some(modelled);
            } else {
                self.stats.windows_outside_texture += 1;
                report.skipped += 1;
            }
        }

        debug!(
            ping = index,
            altitude,
            accumulated = report.accumulated,
            skipped = report.skipped,
            "Ping draped"
        );
        report
    }

    /// Launch angles for every window outside the water column, in (side, window) order.
    /// Jitter is drawn here, before the parallel section, so runs are reproducible.
    fn plan_beams(
        &mut self,
        binnings: &[Option<WindowBinning>; 2],
        altitude: f64,
        velocity: f64,
        report: &mut PingReport,
    ) -> Vec<BeamJob> {
        let nbr_windows = self.config.nbr_windows;
        let jitter = self.config.beam_jitter;
        let mut jobs = Vec::with_capacity(2 * nbr_windows);

        for (binning, side) in binnings.iter().zip(Side::BOTH) {
            let Some(binning) = binning else {
                report.skipped += nbr_windows;
                continue;
            };
            for window in 0..nbr_windows {
                let range = velocity * binning.window_center(window) / 2.0;
                if range <= altitude {
                    self.stats.windows_water_column += 1;
                    report.skipped += 1;
                    continue;
                }
                let mut theta = (altitude / range).acos();
                if jitter > 0.0 {
                    theta += self.rng.gen_range(-jitter..=jitter);
                }
                jobs.push(BeamJob {
                    side,
                    window,
                    theta: theta.clamp(0.0, std::f64::consts::FRAC_PI_2),
                });
            }
        }
        jobs
    }

    fn cast_beam(&self, job: &BeamJob, position: DVec3, rotation: &DMat3, velocity: f64) -> BeamOutcome {
        let launch = transform_direction(
            rotation,
            across_track_direction(job.theta, job.side.across_track_sign()),
        );

        let refract = self.config.ray_tracing_enabled && !self.profile.is_empty();
        let traced = if refract {
            self.profile
                .trace(position, launch)
                .ok()
                .and_then(|path| self.projector.project_path(&path))
        } else {
            None
        };

        let (hit, fell_back) = match traced {
            Some(hit) => (hit, false),
            None => {
                let path = RayPath::straight(position, launch, velocity);
                match self.projector.project_path(&path) {
                    Some(hit) => (hit, refract),
                    None => return BeamOutcome::Miss,
                }
            }
        };

        let modelled = self.intensity_model.evaluate(
            hit.hit.normal,
            hit.direction,
            hit.path_distance,
            self.config.intensity_multiplier,
        );
        if !modelled.is_finite() {
            warn!(side = ?job.side, window = job.window, "Non-finite intensity dropped");
            return BeamOutcome::Miss;
        }

        BeamOutcome::Hit {
            point: hit.hit.point,
            travel_time: hit.travel_time,
            modelled,
            fell_back,
        }
    }
}

fn side_slot(side: Side) -> usize {
    match side {
        Side::Port => 0,
        Side::Starboard => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::HeightGrid;
    use crate::ping::PingSide;
    use crate::sound_speed::SoundSpeedEntry;
    use approx::assert_relative_eq;
    use bevy_math::DVec2;
    use constants::texture::TEXTURE_BACKGROUND;

    /// Flat seabed at z = -30 over 200 m x 200 m starting at (1000, 2000).
    fn flat_survey() -> (Arc<BathyMesh>, GridBounds) {
        flat_survey_at(-30.0)
    }

    fn flat_survey_at(height: f64) -> (Arc<BathyMesh>, GridBounds) {
        let grid = HeightGrid::from_values(100, 100, vec![height; 100 * 100]).unwrap();
        let bounds =
            GridBounds::new(DVec2::new(1000.0, 2000.0), DVec2::new(1200.0, 2200.0)).unwrap();
        (Arc::new(BathyMesh::from_height_grid(&grid, &bounds).unwrap()), bounds)
    }

    fn ping(timestamp_ms: i64, x: f64) -> SidescanPing {
        ping_with_samples(timestamp_ms, x, (0..64).map(|i| 100 + i).collect())
    }

    fn ping_with_samples(timestamp_ms: i64, x: f64, samples: Vec<i32>) -> SidescanPing {
        let side = PingSide::new(samples, 0.08, 60.0);
        SidescanPing {
            timestamp_ms,
            position: DVec3::new(x, 2100.3, -10.0),
            heading: 0.0,
            pitch: None,
            roll: None,
            port: side.clone(),
            stbd: side,
        }
    }

    fn config() -> DrapingConfig {
        DrapingConfig {
            nbr_windows: 16,
            texture_resolution: 1.0,
            tracing_map_size: 150.0,
            ..Default::default()
        }
    }

    fn engine(pings: Vec<SidescanPing>, config: DrapingConfig) -> DrapingEngine {
        let (mesh, bounds) = flat_survey();
        DrapingEngine::new(mesh, bounds, pings, SoundSpeedProfile::constant(), config).unwrap()
    }

    #[test]
    fn test_three_pings_reach_done() {
        let pings = vec![ping(0, 1090.1), ping(100, 1100.1), ping(200, 1110.1)];
        let mut engine = engine(pings, config());
        assert_eq!(engine.state(), DrapingState::Idle);

        for expected in 0..3 {
            let report = engine.step().unwrap();
            assert_eq!(report.ping_index, expected);
        }
        assert_eq!(engine.state(), DrapingState::Done);

        let before = engine.accumulator().clone();
        assert!(engine.step().is_none());
        assert_eq!(engine.accumulator(), &before);
        assert_eq!(engine.stats().pings_processed, 3);
    }

    #[test]
    fn test_no_pings_is_done() {
        let mut engine = engine(Vec::new(), config());
        assert!(engine.is_done());
        assert_eq!(engine.run_to_end(), 0);
    }

    #[test]
    fn test_windows_inside_water_column_are_skipped() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        let report = engine.step().unwrap();

        assert_relative_eq!(report.altitude.unwrap(), 20.0, epsilon = 1e-9);
        // Window b centre range is 1500 * (b + 0.5) * 0.005 / 2 = 3.75 * (b + 0.5).
        // Ranges up to 20 m are water column: b = 0..=4 on each side.
        assert_eq!(engine.stats().windows_water_column, 10);
        for side in Side::BOTH {
            let modelled = &report.side(side).modelled;
            assert!(modelled[..5].iter().all(Option::is_none));
            assert!(modelled[5..].iter().all(Option::is_some));
        }
    }

    #[test]
    fn test_flat_seabed_lambertian_matches_geometry() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        let report = engine.step().unwrap();

        // Over a flat seabed the intensity is cos(theta) = altitude / range.
        for window in 5..16 {
            let range = 3.75 * (window as f64 + 0.5);
            let expected = 20.0 / range;
            let port = report.port.modelled[window].unwrap();
            let stbd = report.stbd.modelled[window].unwrap();
            assert_relative_eq!(port, expected, epsilon = 1e-9);
            assert_relative_eq!(stbd, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_measured_waveform_is_binned() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        let report = engine.step().unwrap();
        // 64 samples into 16 windows: four consecutive samples per window.
        assert_eq!(report.port.measured[0], Some(101.5));
        assert_eq!(report.stbd.measured[15], Some(161.5));
    }

    #[test]
    fn test_port_lands_left_of_track() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        engine.step();
        let (texture, bounds) = engine.texture();
        assert_eq!(bounds.min_x, 1000.0);

        // Heading 0 faces +x, so port is +y and starboard is -y of the vehicle row.
        let cols = engine.accumulator().cols();
        let touched: Vec<usize> = texture
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != TEXTURE_BACKGROUND)
            .map(|(index, _)| index)
            .collect();
        assert_eq!(touched.len(), 22);
        assert!(touched.iter().all(|index| index % cols == 100));
        assert_eq!(touched.iter().filter(|&&index| index / cols > 100).count(), 11);
        assert_eq!(touched.iter().filter(|&&index| index / cols < 100).count(), 11);
    }

    #[test]
    fn test_outside_bathymetry_is_skipped() {
        let mut outside = ping(0, 1100.1);
        outside.position.x = 900.0;
        let mut engine = engine(vec![outside, ping(100, 1100.1)], config());

        let report = engine.step().unwrap();
        assert!(report.altitude.is_none());
        assert_eq!(report.accumulated, 0);
        assert_eq!(report.skipped, 32);
        assert_eq!(engine.stats().pings_outside_bathymetry, 1);
        assert_eq!(engine.accumulator().total_observations(), 0);

        assert!(engine.step().unwrap().accumulated > 0);
    }

    #[test]
    fn test_setters_apply_from_next_step() {
        let mut engine = engine(vec![ping(0, 1100.1), ping(100, 1100.1)], config());
        let first = engine.step().unwrap();
        engine.set_intensity_multiplier(2.0).unwrap();
        let second = engine.step().unwrap();

        let a = first.port.modelled[10].unwrap();
        let b = second.port.modelled[10].unwrap();
        assert_relative_eq!(b, 2.0 * a, epsilon = 1e-12);
        assert!(engine.set_intensity_multiplier(-0.5).is_err());
        assert!(engine.set_tracing_map_size(0.0).is_err());
    }

    #[test]
    fn test_sensor_yaw_swaps_sides() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        engine.set_sensor_yaw(std::f64::consts::PI);
        engine.step();
        assert_relative_eq!(engine.config().sensor_yaw, std::f64::consts::PI, epsilon = 1e-12);
        assert!(engine.stats().windows_accumulated > 0);
    }

    #[test]
    fn test_layered_profile_traces_without_fallback() {
        let (mesh, bounds) = flat_survey();
        let profile = SoundSpeedProfile::new(vec![
            SoundSpeedEntry::new(0.0, 1490.0),
            SoundSpeedEntry::new(15.0, 1500.0),
            SoundSpeedEntry::new(100.0, 1510.0),
        ])
        .unwrap();
        let mut engine =
            DrapingEngine::new(mesh, bounds, vec![ping(0, 1100.1)], profile, config()).unwrap();
        let report = engine.step().unwrap();

        assert!(report.accumulated > 0);
        assert_eq!(engine.stats().straight_fallbacks, 0);
    }

    #[test]
    fn test_runs_are_deterministic_with_jitter() {
        let jittered = DrapingConfig {
            beam_jitter: 0.02,
            seed: 7,
            ..config()
        };
        let pings = vec![ping(0, 1090.1), ping(100, 1100.1), ping(200, 1110.1)];

        let mut a = engine(pings.clone(), jittered.clone());
        let mut b = engine(pings, jittered);
        a.run_to_end();
        b.run_to_end();
        assert_eq!(a.accumulator(), b.accumulator());
        assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn test_model_based_requires_calibration() {
        let (mesh, bounds) = flat_survey();
        let model_based = DrapingConfig {
            intensity_model: crate::config::IntensityModelKind::ModelBased,
            ..config()
        };
        assert!(
            DrapingEngine::new(
                mesh.clone(),
                bounds,
                vec![ping(0, 1100.1)],
                SoundSpeedProfile::constant(),
                model_based.clone()
            )
            .is_err()
        );

        let mut engine = DrapingEngine::with_calibration(
            mesh,
            bounds,
            vec![ping(0, 1100.1)],
            SoundSpeedProfile::constant(),
            model_based,
            Arc::new(|_, _| 0.25),
        )
        .unwrap();
        let report = engine.step().unwrap();
        assert_eq!(report.port.modelled[8], Some(0.25));
    }

    #[test]
    fn test_texture_holds_measured_amplitudes() {
        let drape = |amplitude: i32, multiplier: f64| {
            let config = DrapingConfig {
                intensity_multiplier: multiplier,
                ..config()
            };
            let mut engine = engine(vec![ping_with_samples(0, 1100.1, vec![amplitude; 64])], config);
            let report = engine.step().unwrap();
            assert_eq!(report.accumulated, 22);
            engine.accumulator().read()
        };

        let silent = drape(0, 1.0);
        let loud = drape(30000, 1.0);
        let halved = drape(30000, 0.5);
        assert_ne!(silent, loud);

        let touched: Vec<(f64, f64)> = loud
            .iter()
            .zip(&halved)
            .filter(|(value, _)| **value != TEXTURE_BACKGROUND)
            .map(|(&a, &b)| (a, b))
            .collect();
        assert_eq!(touched.len(), 22);
        assert!(touched.iter().all(|&(a, b)| a == 30000.0 && b == 15000.0));
    }

    #[test]
    fn test_hits_are_binned_by_traced_time() {
        let (mesh, bounds) = flat_survey_at(-40.0);
        let profile = SoundSpeedProfile::new(vec![
            SoundSpeedEntry::new(0.0, 1440.0),
            SoundSpeedEntry::new(10.0, 1480.0),
            SoundSpeedEntry::new(20.0, 1530.0),
            SoundSpeedEntry::new(100.0, 1540.0),
        ])
        .unwrap();
        let config = DrapingConfig {
            nbr_windows: 32,
            tracing_map_size: 300.0,
            ..config()
        };
        // At the surface, 50 m from the mesh edge so port rays stay on the mesh.
        let mut surface_ping = ping_with_samples(0, 1100.1, (0..64).collect());
        surface_ping.position = DVec3::new(1100.1, 2050.3, 0.0);
        surface_ping.port.time_duration = 0.12;
        surface_ping.stbd.time_duration = 0.12;

        let credited = |ray_tracing_enabled: bool| {
            let mut engine = DrapingEngine::new(
                mesh.clone(),
                bounds,
                vec![surface_ping.clone()],
                profile.clone(),
                DrapingConfig {
                    ray_tracing_enabled,
                    ..config.clone()
                },
            )
            .unwrap();
            let report = engine.step().unwrap();
            report
                .port
                .modelled
                .iter()
                .enumerate()
                .filter_map(|(window, value)| value.map(|_| window))
                .collect::<Vec<usize>>()
        };

        // Straight rays at the mean velocity land exactly where they were planned:
        // windows past the 40 m water column, up to the end of the record.
        let straight = credited(false);
        assert_eq!(straight, (14..32).collect::<Vec<usize>>());

        // Window 24 launches at acos(40 / r) with r its straight-ray range. The
        // refracted ray meets the seabed later than the window it was planned for.
        let window_duration = 0.12 / 32.0;
        let range = profile.simple_velocity() * 24.5 * window_duration / 2.0;
        let launch = across_track_direction((40.0 / range).acos(), Side::Port.across_track_sign());
        let path = profile.trace(DVec3::ZERO, launch).unwrap();
        let seabed = &path.segments[2];
        let travel_time = seabed.time_at(20.0 / -seabed.direction.z);
        let expected = (2.0 * travel_time / window_duration).floor() as usize;
        assert!(expected > 24);

        let traced = credited(true);
        assert_ne!(traced, straight);
        assert!(traced.contains(&expected));
    }

    #[test]
    fn test_seeded_texture_is_averaged() {
        let (_, bounds) = flat_survey();
        let mut engine = engine(vec![ping_with_samples(0, 1100.1, vec![100; 64])], config());
        let (rows, cols) = (engine.accumulator().rows(), engine.accumulator().cols());
        let seeded = TextureAccumulator::from_texture(bounds, rows, cols, &vec![10.0; rows * cols]).unwrap();
        engine.set_texture(seeded).unwrap();

        engine.step();
        let texture = engine.accumulator().read();
        // Each touched cell holds the seed plus one observation of 100.
        assert_eq!(texture.iter().filter(|&&value| value == 55.0).count(), 22);
        assert_eq!(texture.iter().filter(|&&value| value == 10.0).count(), rows * cols - 22);
    }

    #[test]
    fn test_texture_with_other_bounds_is_rejected() {
        let mut engine = engine(vec![ping(0, 1100.1)], config());
        let other = GridBounds::new(DVec2::new(0.0, 0.0), DVec2::new(200.0, 200.0)).unwrap();
        let texture = TextureAccumulator::with_resolution(other, 1.0).unwrap();
        assert!(engine.set_texture(texture).is_err());
    }

    #[test]
    fn test_hits_beyond_texture_are_counted() {
        let (mesh, _) = flat_survey();
        // Same origin as the mesh, but the texture stops 50 m short in y.
        let short = GridBounds::new(DVec2::new(1000.0, 2000.0), DVec2::new(1200.0, 2150.0)).unwrap();
        let mut engine = DrapingEngine::new(
            mesh,
            short,
            vec![ping(0, 1100.1)],
            SoundSpeedProfile::constant(),
            config(),
        )
        .unwrap();
        let report = engine.step().unwrap();

        // Windows 14 and 15 reach more than 50 m across track on the +y side.
        assert_eq!(engine.stats().windows_outside_texture, 2);
        assert_eq!(report.accumulated, 20);
    }

    #[test]
    fn test_recrop_only_when_window_changes() {
        let pings = vec![ping(0, 1090.1), ping(100, 1100.1), ping(200, 1110.1), ping(300, 1110.1)];
        let mut engine = engine(pings, config());
        for _ in 0..3 {
            engine.step();
        }
        assert_eq!(engine.recrop_count(), 1);

        engine.set_tracing_map_size(120.0).unwrap();
        engine.step();
        assert_eq!(engine.recrop_count(), 2);
    }

    #[test]
    fn test_intensity_model_swap_changes_modelled_only() {
        let mut engine = engine(vec![ping(0, 1100.1), ping(100, 1100.1)], config());
        let first = engine.step().unwrap();
        let texture = engine.accumulator().read();

        engine.set_intensity_model(IntensityModel::model_based(|_, _| 0.75));
        let second = engine.step().unwrap();

        assert_ne!(first.port.modelled[10], Some(0.75));
        assert!(second.port.modelled[5..].iter().all(|value| *value == Some(0.75)));
        // Both pings observe the same amplitudes in the same cells.
        assert_eq!(engine.accumulator().read(), texture);
    }
}
