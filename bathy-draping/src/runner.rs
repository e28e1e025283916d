/// Survey runner orchestrating reconstruction and draping.
use bathy_draping::bounds::GridBounds;
use bathy_draping::config::DrapingConfig;
use bathy_draping::draper::{DrapingEngine, DrapingStats};
use bathy_draping::mesh::mesh_from_pings;
use bathy_draping::synthetic::{SurveyConfig, SyntheticSurvey};
use constants::texture::TEXTURE_BACKGROUND;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Draping and survey settings read from an optional JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub draping: DrapingConfig,
    pub survey: SurveyConfig,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        let config: RunConfig = serde_json::from_str(&text)?;
        Ok(Self {
            draping: config.draping.validated()?,
            survey: config.survey,
        })
    }
}

/// Summary printed once the run completes.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub pings: usize,
    pub beams: usize,
    pub grid_rows: usize,
    pub grid_cols: usize,
    pub filled_cells: usize,
    pub mesh_vertices: usize,
    pub mesh_faces: usize,
    pub texture_rows: usize,
    pub texture_cols: usize,
    pub coverage: f64,
    pub mean_intensity: Option<f64>,
    pub bounds: GridBounds,
    pub stats: DrapingStats,
    pub elapsed_ms: u128,
}

pub struct SurveyRunner {
    config: RunConfig,
}

impl SurveyRunner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Generates the survey, rebuilds the seabed and drapes every ping.
    pub fn run(&self) -> Result<RunSummary, Box<dyn std::error::Error>> {
        let started = Instant::now();
        let draping = &self.config.draping;

        let survey = SyntheticSurvey::generate(&self.config.survey)?;
        let beams = survey.multibeam.iter().map(|ping| ping.beams.len()).sum();

        let (mesh, grid, bounds) = mesh_from_pings(&survey.multibeam, draping.grid_resolution)?;
        self.log_bounds(&bounds);
        let (mesh_vertices, mesh_faces) = (mesh.vertices.len(), mesh.faces.len());

        let mut engine = DrapingEngine::new(
            Arc::new(mesh),
            bounds,
            survey.sidescan,
            survey.profile,
            draping.clone(),
        )?;

        let pb = ProgressBar::new(engine.ping_count() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.green/blue}] {pos}/{len} pings ({percent}%) {msg}")?
                .progress_chars("▉▊▋▌▍▎▏ "),
        );
        pb.set_message("Draping side-scan");

        while let Some(report) = engine.step() {
            if report.altitude.is_none() {
                pb.set_message(format!("Ping {} outside bathymetry", report.ping_index));
            }
            pb.inc(1);
        }
        pb.finish_with_message("Draping complete");

        let accumulator = engine.accumulator();
        let texture = accumulator.read();
        let touched: Vec<f64> = texture
            .iter()
            .copied()
            .filter(|&value| value != TEXTURE_BACKGROUND)
            .collect();
        let mean_intensity =
            (!touched.is_empty()).then(|| touched.iter().sum::<f64>() / touched.len() as f64);

        let summary = RunSummary {
            pings: engine.ping_count(),
            beams,
            grid_rows: grid.rows(),
            grid_cols: grid.cols(),
            filled_cells: grid.filled_cells(),
            mesh_vertices,
            mesh_faces,
            texture_rows: accumulator.rows(),
            texture_cols: accumulator.cols(),
            coverage: accumulator.coverage(),
            mean_intensity,
            bounds,
            stats: engine.stats().clone(),
            elapsed_ms: started.elapsed().as_millis(),
        };

        info!(
            coverage = summary.coverage,
            accumulated = summary.stats.windows_accumulated,
            elapsed_ms = summary.elapsed_ms,
            "Survey draped"
        );
        Ok(summary)
    }

    fn log_bounds(&self, bounds: &GridBounds) {
        info!(
            "Survey bounds X [{:.2}, {:.2}] Y [{:.2}, {:.2}] ({:.1} x {:.1} m)",
            bounds.min_x,
            bounds.max_x,
            bounds.min_y,
            bounds.max_y,
            bounds.width(),
            bounds.height()
        );
    }
}
