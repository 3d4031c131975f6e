// src/results.rs

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Statistics of one monitoring pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorPassReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,

    pub courses_visited: usize,
    pub assignments_checked: usize,
    /// Submissions that were new to the cache or whose score changed.
    pub grades_changed: usize,
    /// Changed grades that ran through the rubric analysis.
    pub grades_analyzed: usize,
    pub discrepancies_found: usize,
    pub notifications_sent: usize,
    /// Courses or assignments whose fetch failed; the pass continued without them.
    pub skipped: usize,

    pub duration: Duration,
}

impl MonitorPassReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            courses_visited: 0,
            assignments_checked: 0,
            grades_changed: 0,
            grades_analyzed: 0,
            discrepancies_found: 0,
            notifications_sent: 0,
            skipped: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn log_summary(&self) {
        info!("Monitor pass {} summary:", self.run_id);
        info!("  Courses visited: {}", self.courses_visited);
        info!("  Assignments checked: {}", self.assignments_checked);
        info!(
            "  Grades changed: {} (analyzed against rubric: {})",
            self.grades_changed, self.grades_analyzed
        );
        info!(
            "  Discrepancies found: {} (notifications sent: {})",
            self.discrepancies_found, self.notifications_sent
        );
        info!("  Skipped after errors: {}", self.skipped);
        info!("  Duration: {:.2?}", self.duration);
    }
}

impl Default for MonitorPassReport {
    fn default() -> Self {
        Self::new()
    }
}
