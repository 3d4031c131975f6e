// src/lib.rs
pub mod collection;
pub mod config;
pub mod error;
pub mod lms;
pub mod models;
pub mod monitor;
pub mod notification;
pub mod profiling;
pub mod results;
pub mod rubric_analysis;

// Re-export common types for easier access
pub use models::{
    Assignment, AssignmentId, Course, CourseId, CriterionAssessment, GraderId, Rating,
    RubricCriterion, Submission, User,
};

// Re-export important functionality
pub use error::{ModelLoadError, ProfileError, StoreError, UpstreamFetchError};
pub use lms::{CanvasClient, LmsSource};
pub use monitor::GradeMonitor;
pub use profiling::{GraderProfile, ProfileRepository};
pub use rubric_analysis::{RubricAnalysis, analyze_grade_against_rubric};
