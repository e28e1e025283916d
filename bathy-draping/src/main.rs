/// Side-scan draping over a synthetic survey, main entry point
mod runner;

use runner::{RunConfig, SurveyRunner};
use std::env;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bathy_draping=info,drape_survey=info".into()),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!("Usage: {} [config.json]", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(1) {
        Some(path) => RunConfig::from_path(Path::new(path))?,
        None => RunConfig::default(),
    };

    let summary = SurveyRunner::new(config).run()?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
