// tests/grader_profile_tests.rs

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use gradewatch_lib::error::StoreError;
use gradewatch_lib::profiling::feature_extraction::{FeedbackSignals, RubricSummary};
use gradewatch_lib::profiling::{
    AssignmentFeatures, AssignmentType, GraderProfile, InMemoryModelStore, ModelStore,
    ProfileRepository, Severity, TrainingSample,
};
use gradewatch_lib::{GraderId, ProfileError};

/// In-memory store whose saves can be switched to fail.
#[derive(Clone, Default)]
struct SharedStore {
    inner: Arc<InMemoryModelStore>,
    fail_saves: Arc<AtomicBool>,
}

impl ModelStore for SharedStore {
    fn load(&self, grader_id: &GraderId) -> Result<Option<Value>, StoreError> {
        self.inner.load(grader_id)
    }

    fn save(&self, grader_id: &GraderId, state: &Value) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.save(grader_id, state)
    }
}

fn grader() -> GraderId {
    GraderId("1001".to_string())
}

fn features(assignment_type: AssignmentType, description_length: f64) -> AssignmentFeatures {
    AssignmentFeatures {
        points_possible: 100.0,
        late: false,
        attempt_count: 1.0,
        assignment_type,
        feedback: FeedbackSignals::default(),
        due_date_set: true,
        has_description: description_length > 0.0,
        description_length,
        allowed_attempts: 1.0,
        rubric: RubricSummary::default(),
    }
}

fn sample(assignment_type: AssignmentType, description_length: f64, percentage: f64) -> TrainingSample {
    TrainingSample {
        features: features(assignment_type, description_length),
        percentage,
    }
}

/// Three quizzes marked at 60% and three essays marked at 90%.
fn two_cluster_corpus() -> Vec<TrainingSample> {
    let mut samples = Vec::new();
    for _ in 0..3 {
        samples.push(sample(AssignmentType::Quiz, 10.0, 60.0));
        samples.push(sample(AssignmentType::Essay, 500.0, 90.0));
    }
    samples
}

fn repository(store: &SharedStore) -> ProfileRepository {
    ProfileRepository::new(Box::new(store.clone()))
}

#[test]
fn training_below_minimum_leaves_persisted_profile_unchanged() {
    let store = SharedStore::default();
    let mut repo = repository(&store);
    repo.train(&grader(), &two_cluster_corpus()).unwrap();
    let persisted_before = store.load(&grader()).unwrap();

    let err = repo
        .train(&grader(), &two_cluster_corpus()[..3])
        .unwrap_err();
    assert!(matches!(
        err,
        ProfileError::InsufficientData {
            required: 5,
            available: 3
        }
    ));
    assert_eq!(store.load(&grader()).unwrap(), persisted_before);
    assert_eq!(repo.stats(&grader()).version, 1);
    assert_eq!(repo.stats(&grader()).samples_used, 6);
}

#[test]
fn untrained_profile_refuses_predictions() {
    let mut repo = repository(&SharedStore::default());
    let quiz = features(AssignmentType::Quiz, 10.0);

    assert!(matches!(
        repo.predict(&grader(), &quiz),
        Err(ProfileError::NotTrained(id)) if id == grader()
    ));
    assert!(matches!(
        repo.detect_anomaly(&grader(), 50.0, &quiz),
        Err(ProfileError::NotTrained(_))
    ));
    assert!(!repo.stats(&grader()).is_trained);
}

#[test]
fn prediction_reproduces_training_labels() {
    let mut repo = repository(&SharedStore::default());
    let report = repo.train(&grader(), &two_cluster_corpus()).unwrap();
    assert_eq!(report.version, 1);
    assert_eq!(report.performance.mae, None);

    let quiz = repo
        .predict(&grader(), &features(AssignmentType::Quiz, 10.0))
        .unwrap();
    let essay = repo
        .predict(&grader(), &features(AssignmentType::Essay, 500.0))
        .unwrap();
    assert!((quiz.predicted_percentage - 60.0).abs() < 5.0, "{:?}", quiz);
    assert!((essay.predicted_percentage - 90.0).abs() < 5.0, "{:?}", essay);
    assert_eq!(quiz.predicted_score, quiz.predicted_percentage);
    assert_eq!(quiz.confidence, 0.6);
    assert!(quiz.explanation.starts_with("Based on 3 similar quiz assignments"));

    let stats = repo.stats(&grader());
    assert!(stats.is_trained);
    assert_eq!(stats.samples_used, 6);
    assert!(stats.last_updated.is_some());
}

#[test]
fn unseen_type_gets_base_confidence() {
    let mut profile: GraderProfile = GraderProfile::new(grader());
    profile.train(&two_cluster_corpus()).unwrap();
    let lab = profile.predict(&features(AssignmentType::Lab, 0.0)).unwrap();
    assert_eq!(lab.confidence, 0.3);
    assert!(lab.explanation.starts_with("Based on overall grading patterns"));
}

#[test]
fn larger_corpus_reports_holdout_metrics() {
    let mut samples = two_cluster_corpus();
    samples.extend(two_cluster_corpus());
    let mut profile: GraderProfile = GraderProfile::new(grader());

    let report = profile.train(&samples).unwrap();
    assert_eq!(report.performance.holdout_size, 3);
    assert!(report.performance.mae.is_some());
    assert!(report.performance.r2.is_some());
}

#[test]
fn trained_profile_round_trips_through_json() {
    let mut profile: GraderProfile = GraderProfile::new(grader());
    profile.train(&two_cluster_corpus()).unwrap();
    let quiz = features(AssignmentType::Quiz, 10.0);
    let before = profile.predict(&quiz).unwrap();

    let restored: GraderProfile = GraderProfile::from_json(profile.to_json().unwrap()).unwrap();
    assert!(restored.is_trained());
    assert_eq!(restored.version(), profile.version());
    let after = restored.predict(&quiz).unwrap();
    assert_eq!(after.predicted_percentage, before.predicted_percentage);
    assert_eq!(after.confidence, before.confidence);
}

#[test]
fn generous_grade_is_a_high_severity_anomaly() {
    let mut profile: GraderProfile = GraderProfile::new(grader());
    profile.train(&two_cluster_corpus()).unwrap();

    // Every quiz was marked 60, so the spread is zero and the default threshold applies
    let quiz = features(AssignmentType::Quiz, 10.0);
    assert_eq!(profile.anomaly_threshold(AssignmentType::Quiz), 15.0);

    let assessment = profile.detect_anomaly(95.0, &quiz).unwrap();
    assert!((assessment.actual_percentage - 95.0).abs() < 1e-9);
    assert!(assessment.is_significant_anomaly);
    assert_eq!(assessment.severity, Severity::High);
    assert!(assessment.explanation.contains("higher than expected for this quiz"));

    let matching = profile.detect_anomaly(60.0, &quiz).unwrap();
    assert!(!matching.is_significant_anomaly);
    assert_eq!(matching.severity, Severity::Low);
}

#[test]
fn threshold_follows_type_spread() {
    let mut samples = two_cluster_corpus();
    samples.push(sample(AssignmentType::Quiz, 10.0, 80.0));
    let mut profile: GraderProfile = GraderProfile::new(grader());
    profile.train(&samples).unwrap();

    let tendency = profile.patterns().tendency(AssignmentType::Quiz).unwrap();
    assert_eq!(tendency.count, 4);
    assert_eq!(tendency.average, 65.0);
    assert!((profile.anomaly_threshold(AssignmentType::Quiz) - 2.0 * tendency.std).abs() < 1e-9);
}

#[test]
fn patterns_summarize_strictness() {
    let mut profile: GraderProfile = GraderProfile::new(grader());
    profile.train(&two_cluster_corpus()).unwrap();

    let strictness = &profile.patterns().grading_strictness;
    assert_eq!(strictness.average_grade, 75.0);
    assert!(!strictness.is_strict);
    assert!(!strictness.is_lenient);
    assert!(!profile.patterns().feedback_style.gives_detailed_feedback);
}

#[test]
fn corrupt_or_stale_state_loads_as_untrained() {
    let store = SharedStore::default();
    store
        .inner
        .save(&grader(), &json!({"unexpected": "shape"}))
        .unwrap();
    assert!(!repository(&store).stats(&grader()).is_trained);

    let mut repo = repository(&store);
    repo.train(&grader(), &two_cluster_corpus()).unwrap();
    let mut stale = store.load(&grader()).unwrap().unwrap();
    stale["feature_schema_version"] = json!(0);
    store.inner.save(&grader(), &stale).unwrap();

    let stats = repository(&store).stats(&grader());
    assert!(!stats.is_trained);
    assert_eq!(stats.version, 0);
}

#[test]
fn failed_save_keeps_previous_profile() {
    let store = SharedStore::default();
    let mut repo = repository(&store);
    repo.train(&grader(), &two_cluster_corpus()).unwrap();
    let before = repo
        .predict(&grader(), &features(AssignmentType::Quiz, 10.0))
        .unwrap();

    store.fail_saves.store(true, Ordering::SeqCst);
    let mut shifted = two_cluster_corpus();
    for s in shifted.iter_mut() {
        s.percentage -= 30.0;
    }
    let err = repo.train(&grader(), &shifted).unwrap_err();
    assert!(matches!(err, ProfileError::Persistence(_)));

    let stats = repo.stats(&grader());
    assert_eq!(stats.version, 1);
    let after = repo
        .predict(&grader(), &features(AssignmentType::Quiz, 10.0))
        .unwrap();
    assert_eq!(before, after);
}

#[test]
fn profile_survives_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let quiz = features(AssignmentType::Quiz, 10.0);

    let mut first: ProfileRepository = ProfileRepository::with_file_store(dir.path());
    first.train(&grader(), &two_cluster_corpus()).unwrap();
    let expected = first.predict(&grader(), &quiz).unwrap();

    let mut second: ProfileRepository = ProfileRepository::with_file_store(dir.path());
    let stats = second.stats(&grader());
    assert!(stats.is_trained);
    assert_eq!(stats.version, 1);
    let reloaded = second.predict(&grader(), &quiz).unwrap();
    assert_eq!(reloaded.predicted_percentage, expected.predicted_percentage);
    assert_eq!(reloaded.confidence, expected.confidence);

    second.train(&grader(), &two_cluster_corpus()).unwrap();
    assert_eq!(second.stats(&grader()).version, 2);
}
