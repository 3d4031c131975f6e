// src/monitor.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{StoreError, UpstreamFetchError};
use crate::lms::LmsSource;
use crate::models::{Assignment, AssignmentId, Course, CourseId, Submission};
use crate::notification::{DiscrepancyEvent, NotificationSink};
use crate::results::MonitorPassReport;
use crate::rubric_analysis::{RubricAnalysis, analyze_submission};

/// Last observed submission per `<course>_<assignment>` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeSnapshot {
    entries: BTreeMap<String, Submission>,
}

impl GradeSnapshot {
    pub fn key(course_id: CourseId, assignment_id: AssignmentId) -> String {
        format!("{}_{}", course_id, assignment_id)
    }

    pub fn get(&self, course_id: CourseId, assignment_id: AssignmentId) -> Option<&Submission> {
        self.entries.get(&Self::key(course_id, assignment_id))
    }

    pub fn insert(
        &mut self,
        course_id: CourseId,
        assignment_id: AssignmentId,
        submission: Submission,
    ) -> Option<Submission> {
        self.entries
            .insert(Self::key(course_id, assignment_id), submission)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Opaque persistence of the grade snapshot between passes.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self) -> Result<GradeSnapshot, StoreError>;
    async fn save(&self, snapshot: &GradeSnapshot) -> Result<(), StoreError>;
}

/// Snapshot kept in a single JSON file; a missing file is an empty snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileCacheStore {
    path: PathBuf,
}

impl JsonFileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    async fn load(&self) -> Result<GradeSnapshot, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(GradeSnapshot::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, snapshot: &GradeSnapshot) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serialized)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

/// Walks every course and assignment, diffing the caller's grades against the last snapshot.
///
/// Passes must not overlap; each one owns its snapshot from load to save.
pub struct GradeMonitor {
    source: Arc<dyn LmsSource>,
    cache: Arc<dyn CacheStore>,
    sink: Arc<dyn NotificationSink>,
}

impl GradeMonitor {
    pub fn new(
        source: Arc<dyn LmsSource>,
        cache: Arc<dyn CacheStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            source,
            cache,
            sink,
        }
    }

    pub async fn run_pass(&self) -> Result<MonitorPassReport> {
        let start_time = Instant::now();
        let mut report = MonitorPassReport::new();
        info!("Running grade monitoring pass {}", report.run_id);

        let mut snapshot = self
            .cache
            .load()
            .await
            .context("Failed to load grades cache")?;
        debug!("Loaded {} cached submissions", snapshot.len());

        let courses = self
            .source
            .list_courses()
            .await
            .context("Failed to list courses; aborting pass without saving")?;

        for course in &courses {
            report.courses_visited += 1;
            let assignments = match self.source.list_assignments(course.id).await {
                Ok(assignments) => assignments,
                Err(e) => {
                    warn!("Skipping course {} ({}): {}", course.name, course.id, e);
                    report.skipped += 1;
                    continue;
                }
            };

            for assignment in assignments.iter().filter(|a| a.has_submitted_submissions) {
                report.assignments_checked += 1;
                if let Err(e) = self
                    .process_assignment(course, assignment, &mut snapshot, &mut report)
                    .await
                {
                    warn!(
                        "Error processing assignment {} in course {}: {}",
                        assignment.id, course.id, e
                    );
                    report.skipped += 1;
                }
            }
        }

        self.cache
            .save(&snapshot)
            .await
            .context("Failed to save grades cache")?;

        report.duration = start_time.elapsed();
        report.log_summary();
        Ok(report)
    }

    async fn process_assignment(
        &self,
        course: &Course,
        assignment: &Assignment,
        snapshot: &mut GradeSnapshot,
        report: &mut MonitorPassReport,
    ) -> Result<(), UpstreamFetchError> {
        let submission = self
            .source
            .get_own_submission(course.id, assignment.id)
            .await?;

        let changed = match snapshot.get(course.id, assignment.id) {
            None => {
                info!(
                    "New grade for {} in {}: {:?}",
                    assignment.name, course.name, submission.score
                );
                true
            }
            Some(cached) if cached.score != submission.score => {
                info!(
                    "Grade changed for {} in {}: {:?} -> {:?}",
                    assignment.name, course.name, cached.score, submission.score
                );
                true
            }
            Some(_) => false,
        };
        let graded = submission.is_graded();
        snapshot.insert(course.id, assignment.id, submission.clone());

        if !changed || !graded {
            return Ok(());
        }
        report.grades_changed += 1;

        let rubric = self.source.get_rubric(course.id, assignment.id).await?;
        let analysis = match rubric {
            Some(rubric) if !rubric.is_empty() => analyze_submission(&submission, assignment, &rubric),
            _ => RubricAnalysis::NoRubricData,
        };
        report.grades_analyzed += 1;

        let Some(discrepancy) = analysis.report().filter(|r| r.has_discrepancy) else {
            return Ok(());
        };
        report.discrepancies_found += 1;
        warn!(
            "Grade discrepancy detected for {}: {}",
            assignment.name,
            discrepancy.message()
        );

        let instructor = self
            .source
            .get_instructor(course.id)
            .await
            .map_err(|e| warn!("Instructor lookup failed for course {}: {}", course.id, e))
            .ok();
        let student = self
            .source
            .get_current_user()
            .await
            .map_err(|e| warn!("Current user lookup failed: {}", e))
            .ok();

        let event = DiscrepancyEvent::new(
            course.clone(),
            assignment.clone(),
            discrepancy,
            instructor,
            student,
        );
        match self.sink.notify(&event).await {
            Ok(()) => report.notifications_sent += 1,
            Err(e) => warn!(
                "Failed to deliver discrepancy notice for {}: {:#}",
                assignment.name, e
            ),
        }
        Ok(())
    }
}
