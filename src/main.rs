// src/main.rs
use anyhow::{Context, Result, bail};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;

use gradewatch_lib::config::{self, AppConfig};
use gradewatch_lib::monitor::{GradeMonitor, JsonFileCacheStore};
use gradewatch_lib::notification::{LogSink, NotificationSink, OutboxSink};
use gradewatch_lib::rubric_analysis::{GradeCheck, check_grade_against_rubric};
use gradewatch_lib::{AssignmentId, CanvasClient, CourseId};

const USAGE: &str = "usage: gradewatch [--once | --check <course_id> <assignment_id>]";

enum Mode {
    Loop,
    Once,
    Check(CourseId, AssignmentId),
}

fn parse_args() -> Result<Mode> {
    let mut argv = std::env::args().skip(1);
    match argv.next().as_deref() {
        None => Ok(Mode::Loop),
        Some("--once") => Ok(Mode::Once),
        Some("--check") => {
            let course = argv.next().context(USAGE)?;
            let assignment = argv.next().context(USAGE)?;
            Ok(Mode::Check(
                CourseId(course.parse().context("course_id must be a number")?),
                AssignmentId(assignment.parse().context("assignment_id must be a number")?),
            ))
        }
        Some(other) => bail!("unknown argument {}\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    config::load_env_files();
    let mode = parse_args()?;
    let app_config = AppConfig::from_env().context("Failed to load configuration")?;

    let client = CanvasClient::new(&app_config.canvas_api_base, app_config.canvas_token.clone())
        .context("Failed to build Canvas client")?;

    if let Mode::Check(course_id, assignment_id) = mode {
        return run_single_check(&client, course_id, assignment_id).await;
    }

    let sink: Arc<dyn NotificationSink> = match &app_config.outbox_file {
        Some(path) => {
            info!("Discrepancy drafts will be appended to {}", path.display());
            Arc::new(OutboxSink::new(path))
        }
        None => Arc::new(LogSink),
    };
    let monitor = GradeMonitor::new(
        Arc::new(client),
        Arc::new(JsonFileCacheStore::new(&app_config.grades_cache_file)),
        sink,
    );

    if let Mode::Once = mode {
        monitor.run_pass().await?;
        return Ok(());
    }

    info!(
        "Starting grade monitor, polling every {:.1} hours",
        app_config.monitor_interval.as_secs_f64() / 3600.0
    );
    let mut interval = tokio::time::interval(app_config.monitor_interval);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let start_time = Instant::now();
                // A failed pass leaves the cache untouched; the next tick retries from it
                if let Err(e) = monitor.run_pass().await {
                    error!("Monitoring pass failed: {:#}", e);
                }
                info!("Pass finished in {:.2?}", start_time.elapsed());
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("Received Ctrl+C, stopping grade monitor");
                break;
            }
        }
    }
    Ok(())
}

async fn run_single_check(
    client: &CanvasClient,
    course_id: CourseId,
    assignment_id: AssignmentId,
) -> Result<()> {
    let check = check_grade_against_rubric(client, course_id, assignment_id)
        .await
        .with_context(|| format!("Failed to check assignment {}", assignment_id))?;

    match &check {
        GradeCheck::NoRubric { submission } => {
            info!(
                "No rubric found for assignment {} (score: {:?})",
                assignment_id, submission.score
            );
        }
        GradeCheck::Completed { .. } => {
            if let Some(report) = check.report() {
                info!("{}", report.message());
                for finding in report.flagged_criteria() {
                    warn!(
                        "  {}: {}",
                        finding.description.as_deref().unwrap_or(&finding.criterion_id),
                        finding.discrepancy_reason.as_deref().unwrap_or("flagged")
                    );
                }
            }
        }
    }
    println!("{}", serde_json::to_string_pretty(&check.analysis())?);
    Ok(())
}
