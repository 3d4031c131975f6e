// tests/feature_extraction_tests.rs

use gradewatch_lib::models::{Assignment, AssignmentId, Submission};
use gradewatch_lib::profiling::{
    AssignmentType, FEATURE_COUNT, extract_features, extract_training_sample,
    get_feature_metadata,
};

fn assignment(name: &str, description: Option<&str>, points_possible: Option<f64>) -> Assignment {
    Assignment {
        id: AssignmentId(1),
        name: name.to_string(),
        description: description.map(str::to_string),
        points_possible,
        due_at: None,
        submission_types: vec![],
        allowed_attempts: None,
        has_submitted_submissions: true,
    }
}

fn submission(raw: serde_json::Value) -> Submission {
    serde_json::from_value(raw).expect("valid submission fixture")
}

#[test]
fn midterm_quiz_without_description_is_a_quiz() {
    let features = extract_features(
        &assignment("Midterm Quiz 1", None, Some(20.0)),
        &submission(serde_json::json!({"score": 15.0})),
        None,
    );
    assert_eq!(features.assignment_type, AssignmentType::Quiz);
    assert!(!features.has_description);
    assert_eq!(features.description_length, 0.0);
}

#[test]
fn missing_inputs_default_to_zero() {
    let features = extract_features(
        &assignment("Untitled", None, None),
        &submission(serde_json::json!({})),
        None,
    );
    let vector = features.to_vec();

    assert_eq!(vector.len(), FEATURE_COUNT);
    assert_eq!(features.points_possible, 0.0);
    assert_eq!(features.attempt_count, 0.0);
    assert_eq!(features.allowed_attempts, 0.0);
    assert_eq!(features.assignment_type, AssignmentType::Other);
    // Only the "other" one-hot slot is set
    assert_eq!(vector.iter().filter(|v| **v != 0.0).count(), 1);
}

#[test]
fn feedback_combines_submission_and_rubric_comments() {
    let features = extract_features(
        &assignment("Essay 2", Some("Write 500 words."), Some(10.0)),
        &submission(serde_json::json!({
            "score": 7.0,
            "late": true,
            "attempt": 2,
            "submission_comments": [{"comment": "Excellent intro."}],
            "rubric_assessment": {"c1": {"points": 7, "comments": "Consider citing page 4."}}
        })),
        None,
    );

    assert!(features.late);
    assert_eq!(features.attempt_count, 2.0);
    assert_eq!(features.feedback.comment_count, 2.0);
    assert!(features.feedback.positive_reinforcement);
    assert!(features.feedback.improvement_suggestions);
    assert!(features.feedback.specific_points_mentioned);
    assert_eq!(features.description_length, 16.0);
}

#[test]
fn unlabeled_submissions_yield_no_sample() {
    let scored = submission(serde_json::json!({"score": 4.0}));
    assert!(extract_training_sample(&assignment("Lab 1", None, Some(0.0)), &scored, None).is_none());
    assert!(extract_training_sample(&assignment("Lab 1", None, None), &scored, None).is_none());

    let sample = extract_training_sample(&assignment("Lab 1", None, Some(5.0)), &scored, None)
        .expect("labeled sample");
    assert_eq!(sample.percentage, 80.0);
    assert_eq!(sample.features.assignment_type, AssignmentType::Lab);
}

#[test]
fn metadata_names_are_unique() {
    let metadata = get_feature_metadata();
    let mut names: Vec<&str> = metadata.iter().map(|m| m.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), FEATURE_COUNT);
}
