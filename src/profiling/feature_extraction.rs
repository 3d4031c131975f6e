// src/profiling/feature_extraction.rs
use serde::{Deserialize, Serialize};

use super::types::{FeatureMetadata, TrainingSample};
use crate::models::{Assignment, RubricCriterion, Submission};

/// Bumped whenever the order or meaning of the feature vector changes.
/// Profiles trained under another schema version are discarded on load.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Length of the flat vector produced by [`AssignmentFeatures::to_vec`].
pub const FEATURE_COUNT: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    Quiz,
    Essay,
    Lab,
    Project,
    Discussion,
    Homework,
    Other,
}

impl AssignmentType {
    /// One-hot order inside the feature vector.
    pub const ALL: [AssignmentType; 7] = [
        AssignmentType::Quiz,
        AssignmentType::Essay,
        AssignmentType::Lab,
        AssignmentType::Project,
        AssignmentType::Discussion,
        AssignmentType::Homework,
        AssignmentType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Quiz => "quiz",
            AssignmentType::Essay => "essay",
            AssignmentType::Lab => "lab",
            AssignmentType::Project => "project",
            AssignmentType::Discussion => "discussion",
            AssignmentType::Homework => "homework",
            AssignmentType::Other => "other",
        }
    }

    // Keywords per category, longest first
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            AssignmentType::Quiz => &["quiz", "test", "exam"],
            AssignmentType::Essay => &["analysis", "report", "essay", "paper"],
            AssignmentType::Lab => &["experiment", "practical", "lab"],
            AssignmentType::Project => &["assignment", "project"],
            AssignmentType::Discussion => &["discussion", "forum", "post"],
            AssignmentType::Homework => &["homework", "problem", "hw"],
            AssignmentType::Other => &[],
        }
    }

    /// Classifies by keywords over the title and description.
    /// Categories are tried in [`AssignmentType::ALL`] order and the first hit wins.
    pub fn classify(title: &str, description: Option<&str>) -> Self {
        let text = format!("{} {}", title, description.unwrap_or_default()).to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.trim_end_matches(|c: char| c.is_ascii_digit()))
            .filter(|w| !w.is_empty())
            .collect();

        for category in AssignmentType::ALL {
            let hit = category
                .keywords()
                .iter()
                .any(|kw| words.iter().any(|w| word_matches(w, kw)));
            if hit {
                return category;
            }
        }
        AssignmentType::Other
    }
}

// Whole-word match that also accepts simple plurals ("labs", "quizzes")
fn word_matches(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some("") | Some("s") | Some("es") => true,
        Some("zes") => keyword.ends_with('z'),
        _ => false,
    }
}

/// Lightweight signals derived from the grader's written feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSignals {
    pub feedback_length: f64,
    /// (positive - negative) / matched lexicon words, in [-1, 1].
    pub sentiment: f64,
    pub specific_points_mentioned: bool,
    pub improvement_suggestions: bool,
    pub positive_reinforcement: bool,
    pub word_count: f64,
    pub comment_count: f64,
}

const POSITIVE_WORDS: &[&str] = &[
    "good", "great", "excellent", "nice", "strong", "clear", "impressive", "perfect",
    "thorough", "correct", "well",
];
const NEGATIVE_WORDS: &[&str] = &[
    "poor", "missing", "incorrect", "wrong", "unclear", "weak", "lacks", "lacking",
    "incomplete", "error", "errors", "confusing",
];
const SPECIFIC_MARKERS: &[&str] = &[
    "line", "page", "section", "question", "paragraph", "part", "step", "figure",
];
const SUGGESTION_MARKERS: &[&str] = &[
    "should", "could", "consider", "improve", "try", "recommend", "instead",
];
const PRAISE_MARKERS: &[&str] = &["good", "great", "excellent", "nice", "impressive", "well"];

impl FeedbackSignals {
    pub fn from_comments<'a>(comments: impl IntoIterator<Item = &'a str>) -> Self {
        let comments: Vec<&str> = comments
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if comments.is_empty() {
            return Self::default();
        }

        let text = comments.join("\n").to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let contains_any = |markers: &[&str]| words.iter().any(|w| markers.contains(w));

        let positive = words.iter().filter(|w| POSITIVE_WORDS.contains(*w)).count();
        let negative = words.iter().filter(|w| NEGATIVE_WORDS.contains(*w)).count();
        let sentiment = if positive + negative == 0 {
            0.0
        } else {
            (positive as f64 - negative as f64) / (positive + negative) as f64
        };

        Self {
            feedback_length: comments.iter().map(|c| c.chars().count()).sum::<usize>() as f64,
            sentiment,
            specific_points_mentioned: text.chars().any(|c| c.is_ascii_digit())
                || contains_any(SPECIFIC_MARKERS),
            improvement_suggestions: contains_any(SUGGESTION_MARKERS)
                || text.contains("next time"),
            positive_reinforcement: contains_any(PRAISE_MARKERS) || text.contains("well done"),
            word_count: text.split_whitespace().count() as f64,
            comment_count: comments.len() as f64,
        }
    }
}

/// Criteria count with mean and population variance of awarded/possible ratios.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricSummary {
    pub criteria_count: f64,
    pub average_ratio: f64,
    pub ratio_variance: f64,
}

impl RubricSummary {
    /// Zero triple when there is no rubric or nothing was assessed.
    pub fn from_assessment(rubric: Option<&[RubricCriterion]>, submission: &Submission) -> Self {
        let rubric = match rubric {
            Some(r) if !r.is_empty() && !submission.rubric_assessment.is_empty() => r,
            _ => return Self::default(),
        };

        let ratios: Vec<f64> = rubric
            .iter()
            .filter(|c| c.points > 0.0)
            .map(|c| {
                let awarded = submission
                    .rubric_assessment
                    .get(&c.id)
                    .map_or(0.0, |a| a.awarded_points());
                awarded / c.points
            })
            .collect();

        let (average_ratio, ratio_variance) = mean_and_variance(&ratios);
        Self {
            criteria_count: rubric.len() as f64,
            average_ratio,
            ratio_variance,
        }
    }
}

/// Fixed-schema numeric description of one assignment and its submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentFeatures {
    pub points_possible: f64,
    pub late: bool,
    pub attempt_count: f64,
    pub assignment_type: AssignmentType,
    pub feedback: FeedbackSignals,
    pub due_date_set: bool,
    pub has_description: bool,
    pub description_length: f64,
    pub allowed_attempts: f64,
    pub rubric: RubricSummary,
}

impl AssignmentFeatures {
    /// Flattens into the order documented by [`get_feature_metadata`].
    pub fn to_vec(&self) -> Vec<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let mut features = Vec::with_capacity(FEATURE_COUNT);

        features.push(self.points_possible);
        features.push(flag(self.late));
        features.push(self.attempt_count);
        for atype in AssignmentType::ALL {
            features.push(flag(atype == self.assignment_type));
        }
        features.push(self.feedback.feedback_length);
        features.push(self.feedback.sentiment);
        features.push(flag(self.feedback.specific_points_mentioned));
        features.push(flag(self.feedback.improvement_suggestions));
        features.push(flag(self.feedback.positive_reinforcement));
        features.push(self.feedback.word_count);
        features.push(self.feedback.comment_count);
        features.push(flag(self.due_date_set));
        features.push(flag(self.has_description));
        features.push(self.description_length);
        features.push(self.allowed_attempts);
        features.push(self.rubric.criteria_count);
        features.push(self.rubric.average_ratio);
        features.push(self.rubric.ratio_variance);

        debug_assert_eq!(features.len(), FEATURE_COUNT);
        features
    }
}

/// Maps one assignment, the caller's submission and the optional rubric into features.
pub fn extract_features(
    assignment: &Assignment,
    submission: &Submission,
    rubric: Option<&[RubricCriterion]>,
) -> AssignmentFeatures {
    let description = assignment
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty());

    let rubric_comments = submission
        .rubric_assessment
        .values()
        .filter_map(|a| a.comments.as_deref());
    let comments = submission
        .submission_comments
        .iter()
        .map(|c| c.comment.as_str())
        .chain(rubric_comments);

    AssignmentFeatures {
        points_possible: assignment.points_possible_or_zero(),
        late: submission.late,
        attempt_count: submission.attempt.map_or(0.0, f64::from),
        assignment_type: AssignmentType::classify(&assignment.name, description),
        feedback: FeedbackSignals::from_comments(comments),
        due_date_set: assignment.due_at.is_some(),
        has_description: description.is_some(),
        description_length: description.map_or(0.0, |d| d.chars().count() as f64),
        allowed_attempts: assignment.allowed_attempts.map_or(0.0, |a| a as f64),
        rubric: RubricSummary::from_assessment(rubric, submission),
    }
}

/// Builds a labeled sample, or `None` when no percentage can be determined.
pub fn extract_training_sample(
    assignment: &Assignment,
    submission: &Submission,
    rubric: Option<&[RubricCriterion]>,
) -> Option<TrainingSample> {
    let percentage = submission.percentage(assignment.points_possible)?;
    Some(TrainingSample {
        features: extract_features(assignment, submission, rubric),
        percentage,
    })
}

pub(crate) fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

fn meta(name: &str, description: &str, min_value: f64, max_value: f64) -> FeatureMetadata {
    FeatureMetadata {
        name: name.to_string(),
        description: description.to_string(),
        min_value,
        max_value,
    }
}

// Feature metadata, index-aligned with AssignmentFeatures::to_vec
pub fn get_feature_metadata() -> Vec<FeatureMetadata> {
    let mut metadata = vec![
        meta("points_possible", "Maximum score of the assignment.", 0.0, f64::MAX),
        meta("late", "Submission was marked late.", 0.0, 1.0),
        meta("attempt_count", "Attempt number of the graded submission.", 0.0, f64::MAX),
    ];
    for atype in AssignmentType::ALL {
        metadata.push(meta(
            &format!("type_{}", atype.as_str()),
            "One-hot assignment type.",
            0.0,
            1.0,
        ));
    }
    metadata.extend([
        meta("feedback_length", "Characters of written feedback.", 0.0, f64::MAX),
        meta("feedback_sentiment", "Lexicon sentiment of the feedback.", -1.0, 1.0),
        meta("specific_points_mentioned", "Feedback cites specific places.", 0.0, 1.0),
        meta("improvement_suggestions", "Feedback suggests improvements.", 0.0, 1.0),
        meta("positive_reinforcement", "Feedback contains praise.", 0.0, 1.0),
        meta("word_count", "Words of written feedback.", 0.0, f64::MAX),
        meta("comment_count", "Number of feedback comments.", 0.0, f64::MAX),
        meta("due_date_set", "Assignment has a due date.", 0.0, 1.0),
        meta("has_description", "Assignment has a description.", 0.0, 1.0),
        meta("description_length", "Characters of assignment description.", 0.0, f64::MAX),
        meta("allowed_attempts", "Allowed attempts (-1 for unlimited).", -1.0, f64::MAX),
        meta("rubric_criteria_count", "Number of rubric criteria.", 0.0, f64::MAX),
        meta("rubric_average_ratio", "Mean awarded/possible ratio per criterion.", 0.0, 1.0),
        meta("rubric_ratio_variance", "Variance of per-criterion ratios.", 0.0, 1.0),
    ]);
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_priority_order() {
        assert_eq!(AssignmentType::classify("Midterm Quiz 1", None), AssignmentType::Quiz);
        // "report" (essay) is checked before "lab"
        assert_eq!(AssignmentType::classify("Lab Report 3", None), AssignmentType::Essay);
        assert_eq!(AssignmentType::classify("HW3", None), AssignmentType::Homework);
        assert_eq!(AssignmentType::classify("Weekly Quizzes", None), AssignmentType::Quiz);
        assert_eq!(
            AssignmentType::classify("Week 2", Some("Post your reply in the forum")),
            AssignmentType::Discussion
        );
        assert_eq!(AssignmentType::classify("Attendance", None), AssignmentType::Other);
    }

    #[test]
    fn keywords_do_not_match_inside_other_words() {
        assert_eq!(AssignmentType::classify("Latest examples", None), AssignmentType::Other);
        assert_eq!(AssignmentType::classify("Show your work", None), AssignmentType::Other);
    }

    #[test]
    fn metadata_matches_vector_length() {
        assert_eq!(get_feature_metadata().len(), FEATURE_COUNT);
    }

    #[test]
    fn feedback_signals_detect_tone_and_markers() {
        let signals = FeedbackSignals::from_comments([
            "Great work on section 2.",
            "You should cite your sources; the conclusion is unclear.",
        ]);
        assert_eq!(signals.comment_count, 2.0);
        assert!(signals.specific_points_mentioned);
        assert!(signals.improvement_suggestions);
        assert!(signals.positive_reinforcement);
        assert_eq!(signals.sentiment, 0.0);
    }

    #[test]
    fn empty_feedback_is_all_zero() {
        assert_eq!(FeedbackSignals::from_comments(["  ", ""]), FeedbackSignals::default());
    }

    #[test]
    fn mean_and_variance_are_population_statistics() {
        let (mean, variance) = mean_and_variance(&[0.5, 1.0]);
        assert_eq!(mean, 0.75);
        assert_eq!(variance, 0.0625);
    }
}
