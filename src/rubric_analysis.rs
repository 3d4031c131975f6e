// src/rubric_analysis.rs

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::SCORE_EPSILON;
use crate::error::UpstreamFetchError;
use crate::lms::LmsSource;
use crate::models::{
    Assignment, AssignmentId, CourseId, RubricAssessment, RubricCriterion, Submission,
};

/// Outcome of checking one criterion of the rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionFinding {
    pub criterion_id: String,
    pub description: Option<String>,
    pub possible_points: f64,
    pub points_awarded: f64,
    pub rating_id: Option<String>,
    pub rating_description: Option<String>,
    /// Point value of the matched rating, when a rating was matched.
    pub expected_points: Option<f64>,
    pub has_discrepancy: bool,
    pub discrepancy_reason: Option<String>,
    pub comments: Option<String>,
}

/// Comparison of a recorded score with the score recomputed from the rubric.
///
/// The per-criterion and aggregate flags are independent: a criterion can be flagged
/// while the totals still agree, and vice versa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub actual_score: f64,
    pub points_possible: f64,
    pub calculated_score: f64,
    pub score_difference: f64,
    pub has_discrepancy: bool,
    pub criteria: Vec<CriterionFinding>,
    pub criteria_with_discrepancies: usize,
}

impl DiscrepancyReport {
    pub fn message(&self) -> String {
        if self.has_discrepancy {
            format!(
                "Possible grade discrepancy of {} points",
                round_points(self.score_difference)
            )
        } else {
            "Grade appears correct".to_string()
        }
    }

    pub fn flagged_criteria(&self) -> impl Iterator<Item = &CriterionFinding> {
        self.criteria.iter().filter(|c| c.has_discrepancy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RubricAnalysis {
    /// No rubric criteria exist; nothing was compared.
    NoRubricData,
    AnalysisComplete(DiscrepancyReport),
}

impl RubricAnalysis {
    pub fn report(&self) -> Option<&DiscrepancyReport> {
        match self {
            RubricAnalysis::NoRubricData => None,
            RubricAnalysis::AnalysisComplete(report) => Some(report),
        }
    }

    pub fn has_discrepancy(&self) -> bool {
        self.report().is_some_and(|r| r.has_discrepancy)
    }
}

/// Recomputes the score from the rubric assessment and compares it to `actual_score`.
///
/// Pure and deterministic; findings are emitted in rubric order.
pub fn analyze_grade_against_rubric(
    actual_score: f64,
    points_possible: f64,
    rubric: &[RubricCriterion],
    assessment: &RubricAssessment,
) -> RubricAnalysis {
    if rubric.is_empty() {
        return RubricAnalysis::NoRubricData;
    }

    let mut calculated_score = 0.0;
    let mut criteria = Vec::with_capacity(rubric.len());

    for criterion in rubric {
        let criterion_assessment = assessment.get(&criterion.id);
        let points_awarded = criterion_assessment.map_or(0.0, |a| a.awarded_points());
        let rating_id = criterion_assessment.and_then(|a| a.selected_rating());
        let rating = rating_id.and_then(|id| criterion.rating(id));

        calculated_score += points_awarded;

        // Without a matched rating there is nothing to compare the award against
        let discrepancy_reason = rating.and_then(|r| {
            if (r.points - points_awarded).abs() > SCORE_EPSILON {
                let label = r.description.as_deref().unwrap_or(&r.id);
                Some(format!(
                    "rating '{}' should be worth {} points, but {} were awarded",
                    label, r.points, points_awarded
                ))
            } else {
                None
            }
        });

        criteria.push(CriterionFinding {
            criterion_id: criterion.id.clone(),
            description: criterion.description.clone(),
            possible_points: criterion.points,
            points_awarded,
            rating_id: rating_id.map(str::to_string),
            rating_description: rating.and_then(|r| r.description.clone()),
            expected_points: rating.map(|r| r.points),
            has_discrepancy: discrepancy_reason.is_some(),
            discrepancy_reason,
            comments: criterion_assessment.and_then(|a| a.comments.clone()),
        });
    }

    let score_difference = (calculated_score - actual_score).abs();
    let criteria_with_discrepancies = criteria.iter().filter(|c| c.has_discrepancy).count();

    debug!(
        "Rubric analysis: actual={}, calculated={}, flagged criteria={}",
        actual_score, calculated_score, criteria_with_discrepancies
    );

    RubricAnalysis::AnalysisComplete(DiscrepancyReport {
        actual_score,
        points_possible,
        calculated_score,
        score_difference,
        has_discrepancy: score_difference > SCORE_EPSILON,
        criteria,
        criteria_with_discrepancies,
    })
}

/// Analyzes a fetched submission against its assignment's canonical points possible.
pub fn analyze_submission(
    submission: &Submission,
    assignment: &Assignment,
    rubric: &[RubricCriterion],
) -> RubricAnalysis {
    analyze_grade_against_rubric(
        submission.score_or_zero(),
        assignment.points_possible_or_zero(),
        rubric,
        &submission.rubric_assessment,
    )
}

/// Result of a full fetch-and-check for one assignment.
#[derive(Debug, Clone)]
pub enum GradeCheck {
    NoRubric {
        submission: Submission,
    },
    Completed {
        submission: Submission,
        rubric: Vec<RubricCriterion>,
        analysis: RubricAnalysis,
    },
}

impl GradeCheck {
    pub fn analysis(&self) -> Option<&RubricAnalysis> {
        match self {
            GradeCheck::NoRubric { .. } => None,
            GradeCheck::Completed { analysis, .. } => Some(analysis),
        }
    }

    pub fn report(&self) -> Option<&DiscrepancyReport> {
        self.analysis().and_then(RubricAnalysis::report)
    }
}

/// Fetches the caller's submission, the assignment and its rubric, then analyzes them.
pub async fn check_grade_against_rubric(
    source: &dyn LmsSource,
    course_id: CourseId,
    assignment_id: AssignmentId,
) -> Result<GradeCheck, UpstreamFetchError> {
    let submission = source.get_own_submission(course_id, assignment_id).await?;
    let assignment = source.get_assignment(course_id, assignment_id).await?;
    let rubric = match source.get_rubric(course_id, assignment_id).await? {
        Some(rubric) if !rubric.is_empty() => rubric,
        _ => return Ok(GradeCheck::NoRubric { submission }),
    };

    let analysis = analyze_submission(&submission, &assignment, &rubric);
    Ok(GradeCheck::Completed {
        submission,
        rubric,
        analysis,
    })
}

fn round_points(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
