// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

use gradewatch_lib::models::{
    Assignment, AssignmentId, Course, CourseId, CriterionAssessment, Rating, RubricCriterion,
    Submission, User,
};
use gradewatch_lib::{LmsSource, UpstreamFetchError};

// Mock LMS serving canned records; unknown keys fail like a 404 would
#[derive(Default)]
pub struct MockLms {
    pub courses: Vec<Course>,
    pub fail_course_listing: bool,
    pub assignments: HashMap<CourseId, Vec<Assignment>>,
    pub submissions: RwLock<HashMap<(CourseId, AssignmentId), Submission>>,
    pub rubrics: HashMap<AssignmentId, Vec<RubricCriterion>>,
    pub instructors: HashMap<CourseId, User>,
    pub failing_rubrics: HashSet<AssignmentId>,
}

impl MockLms {
    pub async fn set_submission(&self, course: CourseId, assignment: AssignmentId, submission: Submission) {
        self.submissions
            .write()
            .await
            .insert((course, assignment), submission);
    }
}

fn not_found(resource: String) -> UpstreamFetchError {
    UpstreamFetchError::new(resource, "404 Not Found")
}

#[async_trait]
impl LmsSource for MockLms {
    async fn list_courses(&self) -> Result<Vec<Course>, UpstreamFetchError> {
        if self.fail_course_listing {
            return Err(UpstreamFetchError::new("courses", "503 Service Unavailable"));
        }
        Ok(self.courses.clone())
    }

    async fn get_course(&self, course_id: CourseId) -> Result<Course, UpstreamFetchError> {
        self.courses
            .iter()
            .find(|c| c.id == course_id)
            .cloned()
            .ok_or_else(|| not_found(format!("course {}", course_id)))
    }

    async fn list_assignments(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, UpstreamFetchError> {
        self.assignments
            .get(&course_id)
            .cloned()
            .ok_or_else(|| not_found(format!("assignments of course {}", course_id)))
    }

    async fn get_assignment(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Assignment, UpstreamFetchError> {
        self.assignments
            .get(&course_id)
            .and_then(|all| all.iter().find(|a| a.id == assignment_id))
            .cloned()
            .ok_or_else(|| not_found(format!("assignment {}", assignment_id)))
    }

    async fn get_own_submission(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Submission, UpstreamFetchError> {
        self.submissions
            .read()
            .await
            .get(&(course_id, assignment_id))
            .cloned()
            .ok_or_else(|| not_found(format!("submission for assignment {}", assignment_id)))
    }

    async fn get_rubric(
        &self,
        _course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Vec<RubricCriterion>>, UpstreamFetchError> {
        if self.failing_rubrics.contains(&assignment_id) {
            return Err(UpstreamFetchError::new("rubric", "500 Internal Server Error"));
        }
        Ok(self.rubrics.get(&assignment_id).cloned())
    }

    async fn get_instructor(&self, course_id: CourseId) -> Result<User, UpstreamFetchError> {
        self.instructors
            .get(&course_id)
            .cloned()
            .ok_or_else(|| not_found(format!("instructor of course {}", course_id)))
    }

    async fn get_current_user(&self) -> Result<User, UpstreamFetchError> {
        Ok(student())
    }
}

pub fn course(id: u64, name: &str) -> Course {
    Course {
        id: CourseId(id),
        name: name.to_string(),
    }
}

pub fn assignment(id: u64, name: &str, points_possible: f64) -> Assignment {
    Assignment {
        id: AssignmentId(id),
        name: name.to_string(),
        description: None,
        points_possible: Some(points_possible),
        due_at: None,
        submission_types: vec!["online_upload".to_string()],
        allowed_attempts: Some(1),
        has_submitted_submissions: true,
    }
}

pub fn instructor() -> User {
    User {
        id: 77,
        name: "Ada Lovelace".to_string(),
        email: Some("ada@example.edu".to_string()),
    }
}

pub fn student() -> User {
    User {
        id: 5,
        name: "Sam Student".to_string(),
        email: Some("sam@example.edu".to_string()),
    }
}

/// One criterion worth 10 with ratings r1 (10 points) and r2 (5 points).
pub fn rubric() -> Vec<RubricCriterion> {
    vec![RubricCriterion {
        id: "c1".to_string(),
        description: Some("Argument".to_string()),
        points: 10.0,
        ratings: vec![
            Rating {
                id: "r1".to_string(),
                description: Some("Full marks".to_string()),
                points: 10.0,
            },
            Rating {
                id: "r2".to_string(),
                description: Some("Partial".to_string()),
                points: 5.0,
            },
        ],
    }]
}

/// A graded submission with `awarded` points on c1 under rating `rating_id`.
pub fn graded(score: f64, awarded: f64, rating_id: &str) -> Submission {
    let mut submission: Submission = serde_json::from_value(serde_json::json!({
        "id": 1,
        "score": score,
        "workflow_state": "graded",
        "attempt": 1,
    }))
    .expect("valid submission fixture");
    submission.rubric_assessment.insert(
        "c1".to_string(),
        CriterionAssessment {
            points: Some(awarded),
            rating_id: Some(rating_id.to_string()),
            comments: Some("Good structure, consider more sources".to_string()),
        },
    );
    submission
}
