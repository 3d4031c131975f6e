// src/profiling/patterns.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::feature_extraction::{AssignmentType, mean_and_variance};
use super::types::TrainingSample;
use crate::config::{DETAILED_FEEDBACK_LENGTH, LENIENT_GRADING_MEAN, STRICT_GRADING_MEAN};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeTendency {
    pub average: f64,
    pub std: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackStyle {
    pub average_length: f64,
    pub average_sentiment: f64,
    pub gives_detailed_feedback: bool,
    pub generally_positive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GradingStrictness {
    pub average_grade: f64,
    pub grade_variance: f64,
    pub is_strict: bool,
    pub is_lenient: bool,
}

/// Summary of how one grader marks, learned alongside the models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkingPatterns {
    pub assignment_type_tendencies: BTreeMap<AssignmentType, TypeTendency>,
    pub feedback_style: FeedbackStyle,
    pub grading_strictness: GradingStrictness,
}

impl MarkingPatterns {
    pub fn from_samples(samples: &[TrainingSample]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut by_type: BTreeMap<AssignmentType, Vec<f64>> = BTreeMap::new();
        for sample in samples {
            by_type
                .entry(sample.features.assignment_type)
                .or_default()
                .push(sample.percentage);
        }
        let assignment_type_tendencies = by_type
            .into_iter()
            .map(|(atype, scores)| {
                let (average, variance) = mean_and_variance(&scores);
                let tendency = TypeTendency {
                    average,
                    std: variance.sqrt(),
                    count: scores.len(),
                };
                (atype, tendency)
            })
            .collect();

        let lengths: Vec<f64> = samples
            .iter()
            .map(|s| s.features.feedback.feedback_length)
            .collect();
        let sentiments: Vec<f64> = samples.iter().map(|s| s.features.feedback.sentiment).collect();
        let (average_length, _) = mean_and_variance(&lengths);
        let (average_sentiment, _) = mean_and_variance(&sentiments);

        let grades: Vec<f64> = samples.iter().map(|s| s.percentage).collect();
        let (average_grade, grade_variance) = mean_and_variance(&grades);

        Self {
            assignment_type_tendencies,
            feedback_style: FeedbackStyle {
                average_length,
                average_sentiment,
                gives_detailed_feedback: average_length > DETAILED_FEEDBACK_LENGTH,
                generally_positive: average_sentiment > 0.0,
            },
            // Strict and lenient cannot both hold since 75 < 85
            grading_strictness: GradingStrictness {
                average_grade,
                grade_variance,
                is_strict: average_grade < STRICT_GRADING_MEAN,
                is_lenient: average_grade > LENIENT_GRADING_MEAN,
            },
        }
    }

    pub fn tendency(&self, atype: AssignmentType) -> Option<&TypeTendency> {
        self.assignment_type_tendencies.get(&atype)
    }
}
