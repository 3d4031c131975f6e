// src/notification.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::models::{Assignment, Course, User};
use crate::rubric_analysis::{CriterionFinding, DiscrepancyReport};

/// A graded submission whose recorded score disagrees with its rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyEvent {
    pub course: Course,
    pub assignment: Assignment,
    /// Looked up best-effort; absent when the LMS lookup failed.
    pub instructor: Option<User>,
    pub student: Option<User>,
    pub actual_score: f64,
    pub calculated_score: f64,
    pub score_difference: f64,
    pub criteria: Vec<CriterionFinding>,
    pub detected_at: DateTime<Utc>,
}

impl DiscrepancyEvent {
    pub fn new(
        course: Course,
        assignment: Assignment,
        report: &DiscrepancyReport,
        instructor: Option<User>,
        student: Option<User>,
    ) -> Self {
        Self {
            course,
            assignment,
            instructor,
            student,
            actual_score: report.actual_score,
            calculated_score: report.calculated_score,
            score_difference: report.score_difference,
            criteria: report.criteria.clone(),
            detected_at: Utc::now(),
        }
    }
}

/// A review request addressed to the instructor. Never sent automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub to: Option<String>,
    pub subject: String,
    pub body: String,
}

impl EmailDraft {
    pub fn from_event(event: &DiscrepancyEvent) -> Self {
        let assignment_name = &event.assignment.name;
        let course_name = &event.course.name;
        let instructor_name = event
            .instructor
            .as_ref()
            .map_or("Instructor", |u| u.name.as_str());

        let mut criteria_details = String::new();
        for finding in &event.criteria {
            let _ = writeln!(
                criteria_details,
                "- {}: {} / {} points",
                finding.description.as_deref().unwrap_or(&finding.criterion_id),
                format_points(finding.points_awarded),
                format_points(finding.possible_points)
            );
            if finding.has_discrepancy {
                if let Some(reason) = &finding.discrepancy_reason {
                    let _ = writeln!(criteria_details, "  * Issue: {}", reason);
                }
            }
        }

        let mut body = format!(
            "Dear Professor {instructor_name},\n\n\
             I hope this email finds you well. I am writing to request a review of my grade for \
             the assignment \"{assignment_name}\" in {course_name}.\n\n\
             Based on my review of the rubric, I believe there may be a discrepancy of \
             approximately {} points between my current score of {} and the calculated score \
             of {} based on the rubric criteria.\n\n\
             Here's a breakdown of the rubric assessment:\n\n\
             {criteria_details}\n\
             I would greatly appreciate it if you could review my submission and rubric \
             assessment at your convenience.\n\n\
             Thank you for your time and consideration.\n\n\
             Sincerely,",
            format_points(event.score_difference),
            format_points(event.actual_score),
            format_points(event.calculated_score),
        );
        if let Some(student) = &event.student {
            let _ = write!(body, "\n{}", student.name);
            if let Some(email) = &student.email {
                let _ = write!(body, "\n{}", email);
            }
        }

        EmailDraft {
            to: event.instructor.as_ref().and_then(|u| u.email.clone()),
            subject: format!("Grade Review Request: {} in {}", assignment_name, course_name),
            body,
        }
    }
}

// Two decimals at most, without trailing zeros
fn format_points(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{}", rounded)
}

/// Destination for discrepancy events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &DiscrepancyEvent) -> Result<()>;
}

/// Renders the draft into the log.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, event: &DiscrepancyEvent) -> Result<()> {
        let draft = EmailDraft::from_event(event);
        info!(
            "Grade discrepancy in {} / {}: drafted email to {}",
            event.course.name,
            event.assignment.name,
            draft.to.as_deref().unwrap_or("<unknown instructor>")
        );
        info!("Subject: {}\n{}", draft.subject, draft.body);
        Ok(())
    }
}

#[derive(Serialize)]
struct OutboxEntry<'a> {
    course_id: u64,
    assignment_id: u64,
    created_at: DateTime<Utc>,
    #[serde(flatten)]
    draft: &'a EmailDraft,
}

/// Appends each draft as one JSON line.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NotificationSink for OutboxSink {
    async fn notify(&self, event: &DiscrepancyEvent) -> Result<()> {
        let draft = EmailDraft::from_event(event);
        let entry = OutboxEntry {
            course_id: event.course.id.0,
            assignment_id: event.assignment.id.0,
            created_at: event.detected_at,
            draft: &draft,
        };
        let mut line = serde_json::to_string(&entry).context("Failed to serialize email draft")?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open outbox {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to outbox {}", self.path.display()))?;
        file.flush().await?;

        info!(
            "Queued review request for {} in {} to {}",
            event.assignment.name,
            event.course.name,
            self.path.display()
        );
        Ok(())
    }
}
