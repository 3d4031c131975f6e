// tests/notification_tests.rs

mod common;

use common::{assignment, course, graded, instructor, rubric, student};
use gradewatch_lib::analyze_grade_against_rubric;
use gradewatch_lib::notification::{DiscrepancyEvent, NotificationSink, OutboxSink};

fn event(assignment_id: u64, name: &str, score: f64) -> DiscrepancyEvent {
    let submission = graded(score, 10.0, "r1");
    let analysis = analyze_grade_against_rubric(score, 10.0, &rubric(), &submission.rubric_assessment);
    let report = analysis.report().expect("rubric was compared");
    DiscrepancyEvent::new(
        course(10, "History 101"),
        assignment(assignment_id, name, 10.0),
        report,
        Some(instructor()),
        Some(student()),
    )
}

#[tokio::test]
async fn outbox_appends_one_json_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.jsonl");
    let sink = OutboxSink::new(&path);

    sink.notify(&event(100, "Essay 1", 5.0)).await.unwrap();
    sink.notify(&event(101, "Essay 2", 7.0)).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["course_id"], 10);
    assert_eq!(lines[0]["assignment_id"], 100);
    assert_eq!(
        lines[0]["subject"],
        "Grade Review Request: Essay 1 in History 101"
    );
    assert_eq!(lines[1]["assignment_id"], 101);
    assert_eq!(
        lines[1]["subject"],
        "Grade Review Request: Essay 2 in History 101"
    );
    assert_eq!(lines[1]["to"], "ada@example.edu");
}

#[tokio::test]
async fn outbox_in_missing_directory_reports_error() {
    let dir = tempfile::tempdir().unwrap();
    let sink = OutboxSink::new(dir.path().join("absent").join("outbox.jsonl"));
    assert!(sink.notify(&event(100, "Essay 1", 5.0)).await.is_err());
}
