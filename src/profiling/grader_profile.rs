// src/profiling/grader_profile.rs
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// SmartCore imports
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::metrics::{mean_absolute_error, r2};
use smartcore::model_selection::train_test_split;

use super::anomaly::{AnomalyDetector, IsolationForest};
use super::feature_extraction::{AssignmentFeatures, AssignmentType, FEATURE_SCHEMA_VERSION};
use super::patterns::MarkingPatterns;
use super::regressor::{ForestRegressor, Regressor};
use super::scaler::{FeatureScaler, matrix_rows};
use super::types::{
    AnomalyAssessment, GradePrediction, ModelPerformance, ProfileStats, Severity,
    TrainingReport, TrainingSample,
};
use crate::config::{
    ANOMALY_STD_MULTIPLIER, BASE_CONFIDENCE, CONFIDENCE_PER_SAMPLE, DEFAULT_ANOMALY_THRESHOLD,
    HOLDOUT_FRACTION, HOLDOUT_MIN_SAMPLES, MAX_CONFIDENCE, MIN_TRAINING_SAMPLES, MODEL_SEED,
};
use crate::error::{ModelLoadError, ProfileError, StoreError};
use crate::models::GraderId;

/// Fitted sub-models; they only ever exist together.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModels<R, A> {
    pub scaler: FeatureScaler,
    pub regressor: R,
    pub anomaly_detector: A,
}

/// Learned marking behaviour of one grader.
///
/// Starts untrained; `train` replaces the whole state on success and leaves it
/// untouched on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraderProfile<R = ForestRegressor, A = IsolationForest> {
    grader_id: GraderId,
    feature_schema_version: u32,
    version: u32,
    is_trained: bool,
    last_updated: Option<DateTime<Utc>>,
    samples_used: usize,
    performance: Option<ModelPerformance>,
    patterns: MarkingPatterns,
    models: Option<TrainedModels<R, A>>,
}

impl<R, A> GraderProfile<R, A>
where
    R: Regressor,
    A: AnomalyDetector,
{
    pub fn new(grader_id: GraderId) -> Self {
        Self {
            grader_id,
            feature_schema_version: FEATURE_SCHEMA_VERSION,
            version: 0,
            is_trained: false,
            last_updated: None,
            samples_used: 0,
            performance: None,
            patterns: MarkingPatterns::default(),
            models: None,
        }
    }

    /// Starts numbering after `version`, so a retrained profile never reuses a version.
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn grader_id(&self) -> &GraderId {
        &self.grader_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_trained(&self) -> bool {
        self.is_trained && self.models.is_some()
    }

    pub fn patterns(&self) -> &MarkingPatterns {
        &self.patterns
    }

    pub fn train(&mut self, samples: &[TrainingSample]) -> Result<TrainingReport, ProfileError> {
        if samples.len() < MIN_TRAINING_SAMPLES {
            return Err(ProfileError::InsufficientData {
                required: MIN_TRAINING_SAMPLES,
                available: samples.len(),
            });
        }

        info!(
            "Training grader profile {} with {} samples",
            self.grader_id,
            samples.len()
        );

        let rows: Vec<Vec<f64>> = samples.iter().map(|s| s.features.to_vec()).collect();
        let labels: Vec<f64> = samples.iter().map(|s| s.percentage).collect();

        let scaler = FeatureScaler::fit(&rows)?;
        let scaled = scaler.transform(&rows)?;
        debug!(
            "Built training matrix: {} samples, {} features",
            scaled.len(),
            scaler.n_features()
        );

        let (regressor, performance) = if samples.len() > HOLDOUT_MIN_SAMPLES {
            fit_with_holdout::<R>(&scaled, &labels)?
        } else {
            let regressor = R::fit(&scaled, &labels)?;
            (regressor, ModelPerformance::default())
        };

        let anomaly_detector = A::fit(&scaled)?;
        let patterns = MarkingPatterns::from_samples(samples);

        match (performance.mae, performance.r2) {
            (Some(mae), Some(r2)) => info!("Model trained - MAE: {:.2}, R²: {:.3}", mae, r2),
            _ => info!("Model trained with limited data"),
        }

        // Nothing above mutated self, so a failure leaves the previous state intact
        self.models = Some(TrainedModels {
            scaler,
            regressor,
            anomaly_detector,
        });
        self.patterns = patterns;
        self.performance = Some(performance.clone());
        self.samples_used = samples.len();
        self.feature_schema_version = FEATURE_SCHEMA_VERSION;
        self.is_trained = true;
        self.last_updated = Some(Utc::now());
        self.version += 1;

        Ok(TrainingReport {
            grader_id: self.grader_id.clone(),
            version: self.version,
            samples_used: self.samples_used,
            performance,
            patterns: self.patterns.clone(),
        })
    }

    pub fn predict(&self, features: &AssignmentFeatures) -> Result<GradePrediction, ProfileError> {
        let models = self.trained_models()?;

        let row = models.scaler.transform_row(&features.to_vec())?;
        let rows = [row];
        let raw = models
            .regressor
            .predict(&rows)?
            .first()
            .copied()
            .ok_or_else(|| ProfileError::Inference("Regressor returned no prediction".into()))?;

        let anomaly_score = models
            .anomaly_detector
            .score(&rows)
            .first()
            .copied()
            .unwrap_or(0.0);
        let is_anomaly = models
            .anomaly_detector
            .predict(&rows)
            .first()
            .copied()
            .unwrap_or(false);

        let predicted_percentage = round_to(raw, 1);
        let points_possible = effective_points_possible(features.points_possible);

        Ok(GradePrediction {
            predicted_percentage,
            predicted_score: round_to(predicted_percentage / 100.0 * points_possible, 1),
            confidence: self.confidence_for(features.assignment_type),
            is_anomaly,
            anomaly_score,
            explanation: self.explain_prediction(features.assignment_type, predicted_percentage),
        })
    }

    pub fn detect_anomaly(
        &self,
        actual_score: f64,
        features: &AssignmentFeatures,
    ) -> Result<AnomalyAssessment, ProfileError> {
        let prediction = self.predict(features)?;

        let predicted_percentage = prediction.predicted_percentage;
        let actual_percentage =
            actual_score / effective_points_possible(features.points_possible) * 100.0;
        let difference = (actual_percentage - predicted_percentage).abs();
        let threshold = self.anomaly_threshold(features.assignment_type);

        Ok(AnomalyAssessment {
            actual_percentage,
            predicted_percentage,
            difference: round_to(difference, 1),
            is_significant_anomaly: difference > threshold,
            threshold,
            severity: Severity::classify(difference, threshold),
            explanation: explain_anomaly(
                actual_percentage,
                predicted_percentage,
                features.assignment_type,
            ),
        })
    }

    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            grader_id: self.grader_id.clone(),
            is_trained: self.is_trained(),
            version: self.version,
            feature_schema_version: self.feature_schema_version,
            samples_used: self.samples_used,
            last_updated: self.last_updated,
            performance: self.performance.clone(),
            patterns: self.patterns.clone(),
        }
    }

    /// 0.3 base plus 0.1 per historical sample of the type, capped at 0.9.
    pub fn confidence_for(&self, atype: AssignmentType) -> f64 {
        match self.patterns.tendency(atype) {
            Some(tendency) => round_to(
                (BASE_CONFIDENCE + tendency.count as f64 * CONFIDENCE_PER_SAMPLE)
                    .min(MAX_CONFIDENCE),
                2,
            ),
            None => BASE_CONFIDENCE,
        }
    }

    /// Twice the type's historical std when known and positive, otherwise 15 points.
    pub fn anomaly_threshold(&self, atype: AssignmentType) -> f64 {
        match self.patterns.tendency(atype) {
            Some(tendency) if tendency.std > 0.0 => tendency.std * ANOMALY_STD_MULTIPLIER,
            _ => DEFAULT_ANOMALY_THRESHOLD,
        }
    }

    fn trained_models(&self) -> Result<&TrainedModels<R, A>, ProfileError> {
        match &self.models {
            Some(models) if self.is_trained => Ok(models),
            _ => Err(ProfileError::NotTrained(self.grader_id.clone())),
        }
    }

    fn explain_prediction(&self, atype: AssignmentType, predicted_percentage: f64) -> String {
        let mut explanation = match self.patterns.tendency(atype) {
            Some(tendency) => format!(
                "Based on {} similar {} assignments (avg: {:.1}%), ",
                tendency.count,
                atype.as_str(),
                tendency.average
            ),
            None => "Based on overall grading patterns, ".to_string(),
        };

        explanation.push_str(match predicted_percentage {
            p if p > 85.0 => "this appears to be high-quality work.",
            p if p > 75.0 => "this appears to be good work with minor issues.",
            p if p > 65.0 => "this appears to be average work needing improvement.",
            _ => "this appears to need significant improvement.",
        });
        explanation
    }
}

impl<R, A> GraderProfile<R, A>
where
    R: Regressor + Serialize + DeserializeOwned,
    A: AnomalyDetector + Serialize + DeserializeOwned,
{
    pub fn to_json(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rejects state written under a different feature schema.
    pub fn from_json(value: Value) -> Result<Self, ModelLoadError> {
        let profile: Self = serde_json::from_value(value)?;
        if profile.feature_schema_version != FEATURE_SCHEMA_VERSION {
            return Err(ModelLoadError::SchemaMismatch {
                found: profile.feature_schema_version,
                expected: FEATURE_SCHEMA_VERSION,
            });
        }
        Ok(profile)
    }
}

fn fit_with_holdout<R: Regressor>(
    scaled: &[Vec<f64>],
    labels: &[f64],
) -> Result<(R, ModelPerformance), ProfileError> {
    let n = scaled.len();
    let holdout_size = (n as f64 * HOLDOUT_FRACTION).ceil() as usize;
    // train_test_split floors n * test_size; the half-sample margin lands on holdout_size
    let test_size = ((holdout_size as f64 + 0.5) / n as f64) as f32;

    let (x_train, x_test, y_train, y_test) = train_test_split(
        &DenseMatrix::from_2d_vec(&scaled.to_vec()),
        &labels.to_vec(),
        test_size,
        true,
        Some(MODEL_SEED),
    );

    let regressor = R::fit(&matrix_rows(&x_train), &y_train)?;
    let y_pred = regressor.predict(&matrix_rows(&x_test))?;

    Ok((
        regressor,
        ModelPerformance {
            mae: Some(mean_absolute_error(&y_test, &y_pred)),
            r2: Some(holdout_r2(&y_test, &y_pred)),
            holdout_size: y_test.len(),
        },
    ))
}

// SmartCore divides by the target variance, which is zero for a constant holdout
fn holdout_r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let constant = actual.windows(2).all(|w| w[0] == w[1]);
    if !constant {
        return r2(&actual.to_vec(), &predicted.to_vec());
    }
    if actual.iter().zip(predicted).all(|(a, p)| a == p) {
        1.0
    } else {
        0.0
    }
}

// Scores without a positive maximum are read on a 100-point scale
fn effective_points_possible(points_possible: f64) -> f64 {
    if points_possible > 0.0 {
        points_possible
    } else {
        100.0
    }
}

fn explain_anomaly(actual: f64, predicted: f64, atype: AssignmentType) -> String {
    let difference = actual - predicted;
    if difference > 0.0 {
        format!(
            "Grade is {:.1}% higher than expected for this {}. This could indicate generous grading or exceptional work.",
            difference.abs(),
            atype.as_str()
        )
    } else {
        format!(
            "Grade is {:.1}% lower than expected for this {}. This could indicate strict grading or potential grading error.",
            difference.abs(),
            atype.as_str()
        )
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r2_of_perfect_fit_is_one() {
        assert_eq!(holdout_r2(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]), 1.0);
        assert_eq!(holdout_r2(&[5.0, 5.0], &[5.0, 5.0]), 1.0);
        assert_eq!(holdout_r2(&[5.0, 5.0], &[4.0, 6.0]), 0.0);
    }

    #[test]
    fn r2_of_imperfect_fit_is_below_one() {
        let score = holdout_r2(&[1.0, 2.0, 3.0], &[1.0, 2.0, 4.0]);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn non_positive_points_possible_reads_as_percentage() {
        assert_eq!(effective_points_possible(0.0), 100.0);
        assert_eq!(effective_points_possible(-5.0), 100.0);
        assert_eq!(effective_points_possible(20.0), 20.0);
    }

    #[test]
    fn untrained_profile_reports_defaults() {
        let profile: GraderProfile = GraderProfile::new(GraderId("42".into()));
        let stats = profile.stats();
        assert!(!stats.is_trained);
        assert_eq!(stats.performance, None);
        assert_eq!(profile.confidence_for(AssignmentType::Quiz), BASE_CONFIDENCE);
        assert_eq!(
            profile.anomaly_threshold(AssignmentType::Quiz),
            DEFAULT_ANOMALY_THRESHOLD
        );
    }
}
