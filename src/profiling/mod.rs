// src/profiling/mod.rs
pub mod anomaly;
pub mod feature_extraction;
pub mod grader_profile;
pub mod patterns;
pub mod regressor;
pub mod repository;
pub mod scaler;
pub mod types;

pub use anomaly::{AnomalyDetector, IsolationForest};
pub use feature_extraction::{
    AssignmentFeatures, AssignmentType, FEATURE_COUNT, FEATURE_SCHEMA_VERSION, extract_features,
    extract_training_sample, get_feature_metadata,
};
pub use grader_profile::GraderProfile;
pub use patterns::MarkingPatterns;
pub use regressor::{ForestRegressor, Regressor};
pub use repository::{FileModelStore, InMemoryModelStore, ModelStore, ProfileRepository};
pub use types::{
    AnomalyAssessment, GradePrediction, ModelPerformance, ProfileStats, Severity,
    TrainingReport, TrainingSample,
};
