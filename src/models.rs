// src/models.rs

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

//------------------------------------------------------------------------------
// IDENTIFIER TYPES
//------------------------------------------------------------------------------
// Using newtype pattern for type safety to prevent mixing different ID types

/// Strongly typed identifier for Canvas courses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub u64);

/// Strongly typed identifier for Canvas assignments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub u64);

/// Identity of the instructor whose marking a profile learns
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraderId(pub String);

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GraderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&User> for GraderId {
    fn from(user: &User) -> Self {
        GraderId(user.id.to_string())
    }
}

// Canvas sends explicit nulls for several collection fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//------------------------------------------------------------------------------
// COURSES AND USERS
//------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

//------------------------------------------------------------------------------
// ASSIGNMENTS AND RUBRICS
//------------------------------------------------------------------------------

/// An assignment as listed by the LMS.
///
/// `points_possible` on this record is the single canonical maximum score; the copy
/// embedded in submission payloads is never consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub points_possible: Option<f64>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub submission_types: Vec<String>,
    #[serde(default)]
    pub allowed_attempts: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_submitted_submissions: bool,
}

impl Assignment {
    /// Canonical points possible, treating a missing value as zero.
    pub fn points_possible_or_zero(&self) -> f64 {
        self.points_possible.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: f64,
}

/// A scored dimension of an assignment with a discrete set of point-valued ratings.
/// Ratings are looked up by id; their order carries no meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ratings: Vec<Rating>,
}

impl RubricCriterion {
    pub fn rating(&self, rating_id: &str) -> Option<&Rating> {
        self.ratings.iter().find(|r| r.id == rating_id)
    }
}

//------------------------------------------------------------------------------
// SUBMISSIONS
//------------------------------------------------------------------------------

/// The grader's assessment of one rubric criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriterionAssessment {
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default)]
    pub rating_id: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl CriterionAssessment {
    pub fn awarded_points(&self) -> f64 {
        self.points.unwrap_or(0.0)
    }

    /// Canvas reports "no rating selected" as either null or an empty string.
    pub fn selected_rating(&self) -> Option<&str> {
        self.rating_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Rubric assessments keyed by criterion id
pub type RubricAssessment = HashMap<String, CriterionAssessment>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionComment {
    #[serde(default, deserialize_with = "null_as_default")]
    pub comment: String,
}

/// The caller's own submission for one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub graded_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub late: bool,
    #[serde(default)]
    pub attempt: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub submission_comments: Vec<SubmissionComment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rubric_assessment: RubricAssessment,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.workflow_state.as_deref() == Some("graded")
    }

    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// Percentage of `points_possible`, if both sides are known and the maximum is positive.
    pub fn percentage(&self, points_possible: Option<f64>) -> Option<f64> {
        match (self.score, points_possible) {
            (Some(score), Some(possible)) if possible > 0.0 => Some(score / possible * 100.0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_tolerates_canvas_nulls() {
        let raw = r#"{
            "id": 7,
            "score": 8.5,
            "workflow_state": "graded",
            "late": null,
            "attempt": null,
            "submission_comments": null,
            "rubric_assessment": {"_c1": {"points": 5, "rating_id": "", "comments": "ok"}}
        }"#;
        let submission: Submission = serde_json::from_str(raw).unwrap();
        assert!(submission.is_graded());
        assert!(!submission.late);
        assert!(submission.submission_comments.is_empty());
        let assessment = &submission.rubric_assessment["_c1"];
        assert_eq!(assessment.awarded_points(), 5.0);
        assert_eq!(assessment.selected_rating(), None);
    }

    #[test]
    fn percentage_requires_positive_points_possible() {
        let mut submission: Submission = serde_json::from_str(r#"{"score": 8.0}"#).unwrap();
        assert_eq!(submission.percentage(Some(10.0)), Some(80.0));
        assert_eq!(submission.percentage(Some(0.0)), None);
        assert_eq!(submission.percentage(None), None);
        submission.score = None;
        assert_eq!(submission.percentage(Some(10.0)), None);
    }
}
