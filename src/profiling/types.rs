// src/profiling/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::feature_extraction::AssignmentFeatures;
use super::patterns::MarkingPatterns;
use crate::config::HIGH_SEVERITY_FACTOR;
use crate::models::GraderId;

/// One labeled row of the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: AssignmentFeatures,
    /// Grade as a percentage of points possible.
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureMetadata {
    pub name: String,
    pub description: String,
    pub min_value: f64,
    pub max_value: f64,
}

/// Holdout metrics of the last training run.
/// Both metrics are `None` when the corpus was too small to hold out an evaluation split.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub mae: Option<f64>,
    pub r2: Option<f64>,
    pub holdout_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub grader_id: GraderId,
    pub version: u32,
    pub samples_used: usize,
    pub performance: ModelPerformance,
    pub patterns: MarkingPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradePrediction {
    pub predicted_percentage: f64,
    pub predicted_score: f64,
    pub confidence: f64,
    pub is_anomaly: bool,
    /// Isolation forest decision value; negative values are outliers.
    pub anomaly_score: f64,
    pub explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Monotonic in `difference` for a fixed threshold; both bounds are exclusive.
    pub fn classify(difference: f64, threshold: f64) -> Self {
        if difference > threshold * HIGH_SEVERITY_FACTOR {
            Severity::High
        } else if difference > threshold {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAssessment {
    pub actual_percentage: f64,
    pub predicted_percentage: f64,
    pub difference: f64,
    pub is_significant_anomaly: bool,
    pub threshold: f64,
    pub severity: Severity,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileStats {
    pub grader_id: GraderId,
    pub is_trained: bool,
    pub version: u32,
    pub feature_schema_version: u32,
    pub samples_used: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub performance: Option<ModelPerformance>,
    pub patterns: MarkingPatterns,
}
