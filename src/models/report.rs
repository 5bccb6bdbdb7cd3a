// src/models/report.rs
//
// Read-only DTOs for the lecturer analytics views. These are simple
// grouped aggregations over students, attempts, and responses.

use serde::Serialize;
use sqlx::FromRow;

use crate::models::question::Topic;

/// Accuracy across all responses for one topic.
#[derive(Debug, Serialize, FromRow)]
pub struct TopicAccuracy {
    pub topic: Topic,
    /// Fraction of correct responses in [0,1]; NULL when nobody has
    /// answered a question of this topic yet.
    pub accuracy: Option<f64>,
    pub response_count: i64,
}

/// Finished attempts per calendar day.
#[derive(Debug, Serialize, FromRow)]
pub struct DailyAttempts {
    pub day: String,
    pub attempts: i64,
}

/// Headline numbers plus per-topic accuracy for the lecturer overview.
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub student_count: i64,
    pub attempt_count: i64,
    pub response_count: i64,
    pub topic_accuracy: Vec<TopicAccuracy>,
    /// Finished attempts per day over the last 14 days.
    pub daily_attempts: Vec<DailyAttempts>,
}

/// One row of the student ranking, finished attempts only.
#[derive(Debug, Serialize, FromRow)]
pub struct RankingEntry {
    pub name: String,
    pub email: String,
    pub avg_score: f64,
    pub best_score: f64,
    /// Score of the latest finished attempt.
    pub last_score: f64,
    pub attempt_count: i64,
}

/// Per-question difficulty: low correct rate means hard.
#[derive(Debug, Serialize, FromRow)]
pub struct QuestionStat {
    pub question_id: i64,
    pub topic: Topic,
    pub question: String,
    pub correct_rate: Option<f64>,
    pub response_count: i64,
}

/// Per-question response latency: high average time means slow.
#[derive(Debug, Serialize, FromRow)]
pub struct QuestionTiming {
    pub question_id: i64,
    pub question: String,
    pub avg_time_s: f64,
    pub response_count: i64,
}
