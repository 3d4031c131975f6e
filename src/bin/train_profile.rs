// src/bin/train_profile.rs

use anyhow::{Context, Result};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Instant;

use gradewatch_lib::collection::{MarkingDataset, collect_training_corpus};
use gradewatch_lib::config::{self, AppConfig};
use gradewatch_lib::profiling::ProfileRepository;
use gradewatch_lib::{CanvasClient, ProfileError};

/// Trains one profile per grader, either from a saved dataset or from a fresh Canvas walk.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    config::load_env_files();

    let start_time = Instant::now();
    let app_config = AppConfig::from_env().context("Failed to load configuration")?;
    let dataset_paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();

    let datasets = if dataset_paths.is_empty() {
        collect_from_canvas(&app_config).await?
    } else {
        dataset_paths
            .iter()
            .map(|path| MarkingDataset::load(path))
            .collect::<Result<Vec<_>>>()?
    };

    if datasets.is_empty() {
        info!("No marking data found. Nothing to train.");
        return Ok(());
    }

    let mut repository: ProfileRepository = ProfileRepository::with_file_store(&app_config.model_dir);
    let mut trained = 0;

    for dataset in &datasets {
        match repository.train(&dataset.grader_id, &dataset.samples) {
            Ok(report) => {
                trained += 1;
                info!(
                    "Grader {}: profile v{} trained on {} samples (MAE: {}, R²: {})",
                    report.grader_id,
                    report.version,
                    report.samples_used,
                    report
                        .performance
                        .mae
                        .map_or("n/a".to_string(), |m| format!("{:.2}", m)),
                    report
                        .performance
                        .r2
                        .map_or("n/a".to_string(), |r| format!("{:.3}", r)),
                );
                let strictness = &report.patterns.grading_strictness;
                info!(
                    "  average grade {:.1}% (strict: {}, lenient: {})",
                    strictness.average_grade, strictness.is_strict, strictness.is_lenient
                );
            }
            Err(ProfileError::InsufficientData {
                required,
                available,
            }) => {
                warn!(
                    "Grader {}: only {} samples, need {}. Skipping.",
                    dataset.grader_id, available, required
                );
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to train profile for {}", dataset.grader_id));
            }
        }
    }

    info!(
        "Trained {}/{} grader profiles in {:.2?}",
        trained,
        datasets.len(),
        start_time.elapsed()
    );
    Ok(())
}

async fn collect_from_canvas(app_config: &AppConfig) -> Result<Vec<MarkingDataset>> {
    let client = CanvasClient::new(&app_config.canvas_api_base, app_config.canvas_token.clone())
        .context("Failed to build Canvas client")?;
    let report = collect_training_corpus(&client).await?;

    for failure in &report.failures {
        warn!(
            "Collection skipped course {} assignment {:?}: {}",
            failure.course_id, failure.assignment_id, failure.message
        );
    }

    let mut datasets = Vec::with_capacity(report.by_grader.len());
    for (grader_id, samples) in report.by_grader {
        let dataset = MarkingDataset::new(grader_id, samples);
        let path = app_config
            .model_dir
            .join(format!("marking_data_{}.json", dataset.grader_id));
        dataset.save(&path)?;
        datasets.push(dataset);
    }
    Ok(datasets)
}
