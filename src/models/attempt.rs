// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::Topic;
use crate::scoring::{SubmittedAnswer, TopicBreakdown};

/// Represents the 'attempts' table in the database.
/// `finished_at` is NULL while the attempt is in progress; the aggregate
/// fields are written exactly once, when the attempt is finished.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub student_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub items_total: i64,
    pub items_correct: i64,
    pub score_pct: f64,
}

/// Represents the 'responses' table in the database.
/// One graded answer to one question within one attempt. Rows are
/// written in a single batch at submission and never updated; the stored
/// `is_correct` flag is authoritative even if the bank changes later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Response {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub chosen_option: String,
    pub is_correct: bool,
    pub response_time_s: f64,
}

/// Result of starting or resuming a quiz session.
#[derive(Debug, Serialize)]
pub struct StartQuizResponse {
    pub attempt_id: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// True when an existing in-progress attempt was resumed.
    pub resumed: bool,
}

/// DTO for submitting a batch of answers for an attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitQuizRequest {
    pub attempt_id: i64,
    pub answers: Vec<SubmittedAnswer>,
}

/// Result of grading and finishing an attempt.
#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub attempt_id: i64,
    pub score_pct: f64,
    pub items_total: i64,
    pub items_correct: i64,
    pub breakdown: TopicBreakdown,
    pub unlocked: bool,
}

/// One reviewed answer: chosen vs correct option, with the explanation.
#[derive(Debug, Serialize, FromRow)]
pub struct ReviewItem {
    pub question_id: i64,
    pub topic: Topic,
    pub question: String,
    pub chosen_option: String,
    pub correct_option: String,
    pub is_correct: bool,
    pub explanation: String,
    pub response_time_s: f64,
}

/// Full review of a finished attempt.
#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub attempt: Attempt,
    pub items: Vec<ReviewItem>,
    pub breakdown: TopicBreakdown,
    /// Unlock state of the student, driven by their latest finished
    /// attempt (which may be newer than the attempt under review).
    pub unlocked: bool,
}

/// Student dashboard view: latest finished attempt plus history.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub latest_attempt: Option<Attempt>,
    pub breakdown: TopicBreakdown,
    pub unlocked: bool,
    pub next_module: &'static str,
    /// Last finished attempts, newest first, for the score chart.
    pub recent_attempts: Vec<Attempt>,
}

/// DTO for the feedback form. Accepted and validated but intentionally
/// not persisted.
#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5."))]
    pub rating: i64,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}
