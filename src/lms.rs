// src/lms.rs

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::error::UpstreamFetchError;
use crate::models::{Assignment, AssignmentId, Course, CourseId, RubricCriterion, Submission, User};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const PAGE_SIZE: &str = "100";
const MAX_PAGES: usize = 50;

/// Read-only view of the learning-management system.
///
/// Rubric and assignment lookups take the course id because Canvas routes them under it.
#[async_trait]
pub trait LmsSource: Send + Sync {
    async fn list_courses(&self) -> Result<Vec<Course>, UpstreamFetchError>;
    async fn get_course(&self, course_id: CourseId) -> Result<Course, UpstreamFetchError>;
    async fn list_assignments(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, UpstreamFetchError>;
    async fn get_assignment(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Assignment, UpstreamFetchError>;
    /// The caller's own submission, including comments and rubric assessment.
    async fn get_own_submission(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Submission, UpstreamFetchError>;
    async fn get_rubric(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Vec<RubricCriterion>>, UpstreamFetchError>;
    async fn get_instructor(&self, course_id: CourseId) -> Result<User, UpstreamFetchError>;
    async fn get_current_user(&self) -> Result<User, UpstreamFetchError>;
}

// Only the rubric part of the assignment payload
#[derive(Deserialize)]
struct AssignmentRubric {
    #[serde(default)]
    rubric: Option<Vec<RubricCriterion>>,
}

/// Canvas REST API client authenticated with a static bearer token.
///
/// `api_base` may carry a path prefix (`https://host/canvas`); requests go to
/// `<api_base>/api/v1/...`. List endpoints follow the `Link: rel="next"` header,
/// up to 50 pages of 100 items.
#[derive(Clone, Debug)]
pub struct CanvasClient {
    http: Client,
    base: Url,
    token: String,
}

impl CanvasClient {
    pub fn new(api_base: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let mut root = Url::parse(api_base)?;
        // Url::join replaces the last segment unless the path ends in '/'
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let base = root.join("api/v1/")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base,
            token: token.into(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamFetchError> {
        self.base
            .join(path)
            .map_err(|e| UpstreamFetchError::new(path, e))
    }

    async fn send(
        &self,
        path: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Response, UpstreamFetchError> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| UpstreamFetchError::new(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamFetchError::new(
                path,
                format!("Canvas API error: {} - {}", status, body),
            ));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, UpstreamFetchError> {
        let url = self.endpoint(path)?;
        self.send(path, url, query)
            .await?
            .json::<T>()
            .await
            .map_err(|e| UpstreamFetchError::new(path, e))
    }

    /// Collects every page of a list endpoint.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, UpstreamFetchError> {
        let mut items = Vec::new();
        let mut response = self.send(path, self.endpoint(path)?, query).await?;

        for page in 1.. {
            let next = next_page_link(response.headers());
            let batch: Vec<T> = response
                .json()
                .await
                .map_err(|e| UpstreamFetchError::new(path, e))?;
            items.extend(batch);

            let Some(next) = next else { break };
            if page >= MAX_PAGES {
                warn!("Stopping {} after {} pages", path, MAX_PAGES);
                break;
            }
            // The next link already carries the query string
            response = self.send(path, next, &[]).await?;
        }
        Ok(items)
    }
}

/// The `rel="next"` target of a Canvas `Link` header.
fn next_page_link(headers: &HeaderMap) -> Option<Url> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param == "rel=\"next\"" || param == "rel=next"
            });
            if !is_next {
                return None;
            }
            let target = target.strip_prefix('<')?.strip_suffix('>')?;
            Url::parse(target).ok()
        })
}

#[async_trait]
impl LmsSource for CanvasClient {
    async fn list_courses(&self) -> Result<Vec<Course>, UpstreamFetchError> {
        self.get_paginated("courses", &[("per_page", PAGE_SIZE)]).await
    }

    async fn get_course(&self, course_id: CourseId) -> Result<Course, UpstreamFetchError> {
        self.get_json(&format!("courses/{}", course_id), &[]).await
    }

    async fn list_assignments(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<Assignment>, UpstreamFetchError> {
        self.get_paginated(
            &format!("courses/{}/assignments", course_id),
            &[("per_page", PAGE_SIZE)],
        )
        .await
    }

    async fn get_assignment(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Assignment, UpstreamFetchError> {
        self.get_json(
            &format!("courses/{}/assignments/{}", course_id, assignment_id),
            &[],
        )
        .await
    }

    async fn get_own_submission(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Submission, UpstreamFetchError> {
        self.get_json(
            &format!(
                "courses/{}/assignments/{}/submissions/self",
                course_id, assignment_id
            ),
            &[
                ("include[]", "submission_comments"),
                ("include[]", "rubric_assessment"),
            ],
        )
        .await
    }

    async fn get_rubric(
        &self,
        course_id: CourseId,
        assignment_id: AssignmentId,
    ) -> Result<Option<Vec<RubricCriterion>>, UpstreamFetchError> {
        let payload: AssignmentRubric = self
            .get_json(
                &format!("courses/{}/assignments/{}", course_id, assignment_id),
                &[],
            )
            .await?;
        Ok(payload.rubric)
    }

    async fn get_instructor(&self, course_id: CourseId) -> Result<User, UpstreamFetchError> {
        let path = format!("courses/{}/users", course_id);
        let teachers: Vec<User> = self
            .get_json(&path, &[("enrollment_type[]", "teacher")])
            .await?;
        teachers
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamFetchError::new(path, "course has no teacher enrollment"))
    }

    async fn get_current_user(&self) -> Result<User, UpstreamFetchError> {
        self.get_json("users/self", &[]).await
    }
}
