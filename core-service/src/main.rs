//! Equipment Health Core - Main Entry Point
//!
//! Loads (or bootstraps) a model snapshot and scores a short simulated
//! telemetry stream, logging one JSON report per reading.

use std::sync::Arc;

use equipment_health_core::constants::{APP_NAME, APP_VERSION};
use equipment_health_core::logic::simulator::{SimulatorConfig, TelemetrySimulator};
use equipment_health_core::{
    Analyzer, EngineConfig, EngineResult, JsonFileStore, ModelRegistry, TrainingPipeline,
};

const DEMO_READINGS: usize = 20;

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    if let Err(e) = run() {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

fn run() -> EngineResult<()> {
    let config = EngineConfig::from_env()?;

    let store = match &config.snapshot_path {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::at_default_location(),
    };
    let registry = Arc::new(ModelRegistry::bootstrap(Box::new(store))?);

    if !registry.is_loaded() {
        log::info!("No model snapshot found - bootstrapping from synthetic data");
        let pipeline = TrainingPipeline::new(config.training.clone(), config.fusion);
        let cancel = config.training.cancel_token();
        pipeline.run(&registry, pipeline.synthetic_source(), &cancel)?;
    }

    if let Ok(info) = serde_json::to_string(&registry.info()) {
        log::info!("Registry: {}", info);
    }

    let analyzer = Analyzer::new(Arc::clone(&registry), config);
    let simulator = TelemetrySimulator::new(SimulatorConfig::default());

    let mut anomalies = 0;
    for reading in simulator.take(DEMO_READINGS) {
        match analyzer.evaluate(&reading.sample) {
            Ok(report) => {
                if report.anomaly.is_anomaly {
                    anomalies += 1;
                }
                log::info!(
                    "{} (injected={}): {}",
                    report.device_id,
                    reading.injected,
                    serde_json::to_string(&report)?
                );
            }
            Err(e) => log::warn!("{}: {}", reading.sample.device_id, e),
        }
    }

    log::info!("Scored {} readings, {} flagged anomalous", DEMO_READINGS, anomalies);
    Ok(())
}
