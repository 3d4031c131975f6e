// src/bin/predict_grade.rs

use anyhow::{Context, Result, bail};
use log::{info, warn};

use gradewatch_lib::config::{self, AppConfig};
use gradewatch_lib::profiling::{ProfileRepository, extract_features};
use gradewatch_lib::{AssignmentId, CanvasClient, CourseId, GraderId, LmsSource, ProfileError};

const USAGE: &str = "usage: predict_grade <course_id> <assignment_id>";

/// Predicts the instructor's expected grade for one assignment and flags a deviating score.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    config::load_env_files();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [course, assignment] = args.as_slice() else {
        bail!(USAGE);
    };
    let course_id = CourseId(course.parse().context("course_id must be a number")?);
    let assignment_id = AssignmentId(assignment.parse().context("assignment_id must be a number")?);

    let app_config = AppConfig::from_env().context("Failed to load configuration")?;
    let client = CanvasClient::new(&app_config.canvas_api_base, app_config.canvas_token.clone())
        .context("Failed to build Canvas client")?;

    let instructor = client
        .get_instructor(course_id)
        .await
        .context("Failed to resolve the course instructor")?;
    let grader_id = GraderId::from(&instructor);
    let assignment = client.get_assignment(course_id, assignment_id).await?;
    let submission = client.get_own_submission(course_id, assignment_id).await?;
    let rubric = client
        .get_rubric(course_id, assignment_id)
        .await
        .unwrap_or_else(|e| {
            warn!("Continuing without rubric: {}", e);
            None
        });

    let features = extract_features(&assignment, &submission, rubric.as_deref());

    let mut repository: ProfileRepository = ProfileRepository::with_file_store(&app_config.model_dir);
    let stats = repository.stats(&grader_id);
    info!(
        "Profile for {} ({}): trained={}, v{}, {} samples",
        instructor.name, grader_id, stats.is_trained, stats.version, stats.samples_used
    );

    let prediction = match repository.predict(&grader_id, &features) {
        Ok(prediction) => prediction,
        Err(ProfileError::NotTrained(_)) => {
            bail!("No trained profile for {}; run train_profile first", grader_id)
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Expected grade for {}: {:.1}% ({:.1} points, confidence {:.2})",
        assignment.name,
        prediction.predicted_percentage,
        prediction.predicted_score,
        prediction.confidence
    );
    info!("{}", prediction.explanation);
    if prediction.is_anomaly {
        warn!(
            "Assignment looks unusual for this grader (anomaly score {:.3})",
            prediction.anomaly_score
        );
    }

    if let Some(score) = submission.score {
        let assessment = repository.detect_anomaly(&grader_id, score, &features)?;
        let summary = format!(
            "Actual {:.1}% vs expected {:.1}%: difference {:.1} (threshold {:.1}, severity {})",
            assessment.actual_percentage,
            assessment.predicted_percentage,
            assessment.difference,
            assessment.threshold,
            assessment.severity.as_str()
        );
        if assessment.is_significant_anomaly {
            warn!("{}", summary);
            warn!("{}", assessment.explanation);
        } else {
            info!("{}", summary);
        }
    }

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}
