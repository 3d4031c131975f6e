// src/collection.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::lms::LmsSource;
use crate::models::{AssignmentId, CourseId, GraderId};
use crate::profiling::{TrainingSample, extract_training_sample};

/// A per-item failure recorded during a batch walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionFailure {
    pub course_id: CourseId,
    pub assignment_id: Option<AssignmentId>,
    pub message: String,
}

/// Labeled samples grouped by the course instructor who marked them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CollectionReport {
    pub by_grader: BTreeMap<GraderId, Vec<TrainingSample>>,
    pub assignments_visited: usize,
    /// Courses or assignments dropped after a fetch failure.
    pub skipped: usize,
    /// Submissions without a usable score or points possible.
    pub unlabeled: usize,
    pub failures: Vec<CollectionFailure>,
}

impl CollectionReport {
    pub fn total_samples(&self) -> usize {
        self.by_grader.values().map(Vec::len).sum()
    }

    fn record_failure(
        &mut self,
        course_id: CourseId,
        assignment_id: Option<AssignmentId>,
        message: impl ToString,
    ) {
        self.skipped += 1;
        self.failures.push(CollectionFailure {
            course_id,
            assignment_id,
            message: message.to_string(),
        });
    }
}

/// Walks every course and builds a training corpus for each course's instructor.
///
/// Fetch failures never abort the walk; they are counted and recorded in the report.
pub async fn collect_training_corpus(source: &dyn LmsSource) -> Result<CollectionReport> {
    let courses = source
        .list_courses()
        .await
        .context("Failed to list courses for training collection")?;
    info!("Collecting marking data from {} courses", courses.len());

    let mut report = CollectionReport::default();

    for course in &courses {
        let grader = match source.get_instructor(course.id).await {
            Ok(instructor) => GraderId::from(&instructor),
            Err(e) => {
                warn!("Skipping course {}: no instructor ({})", course.id, e);
                report.record_failure(course.id, None, e);
                continue;
            }
        };

        let assignments = match source.list_assignments(course.id).await {
            Ok(assignments) => assignments,
            Err(e) => {
                warn!("Skipping course {}: {}", course.id, e);
                report.record_failure(course.id, None, e);
                continue;
            }
        };

        for assignment in assignments.iter().filter(|a| a.has_submitted_submissions) {
            report.assignments_visited += 1;

            let submission = match source.get_own_submission(course.id, assignment.id).await {
                Ok(submission) => submission,
                Err(e) => {
                    warn!(
                        "Skipping assignment {} in course {}: {}",
                        assignment.id, course.id, e
                    );
                    report.record_failure(course.id, Some(assignment.id), e);
                    continue;
                }
            };

            // Ok(None) means no rubric is attached; an error would mislabel the sample
            let rubric = match source.get_rubric(course.id, assignment.id).await {
                Ok(rubric) => rubric,
                Err(e) => {
                    warn!(
                        "Skipping assignment {} in course {}: rubric fetch failed ({})",
                        assignment.id, course.id, e
                    );
                    report.record_failure(course.id, Some(assignment.id), e);
                    continue;
                }
            };

            match extract_training_sample(assignment, &submission, rubric.as_deref()) {
                Some(sample) => report.by_grader.entry(grader.clone()).or_default().push(sample),
                None => report.unlabeled += 1,
            }
        }
    }

    info!(
        "Collected {} samples for {} graders ({} assignments visited, {} skipped, {} unlabeled)",
        report.total_samples(),
        report.by_grader.len(),
        report.assignments_visited,
        report.skipped,
        report.unlabeled
    );
    Ok(report)
}

/// One grader's training corpus as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkingDataset {
    pub grader_id: GraderId,
    pub collected_at: DateTime<Utc>,
    pub samples: Vec<TrainingSample>,
}

impl MarkingDataset {
    pub fn new(grader_id: GraderId, samples: Vec<TrainingSample>) -> Self {
        Self {
            grader_id,
            collected_at: Utc::now(),
            samples,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized =
            serde_json::to_string_pretty(self).context("Failed to serialize marking dataset")?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write dataset to {}", path.display()))?;
        info!(
            "Saved {} samples for grader {} to {}",
            self.samples.len(),
            self.grader_id,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Dataset {} is not valid JSON", path.display()))
    }
}
