// src/handlers/reports.rs
//
// Lecturer-only read-only rollups across students, attempts, and
// questions. Nothing here mutates state.

use axum::{Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::report::{
        DailyAttempts, OverviewResponse, QuestionStat, QuestionTiming, RankingEntry,
        TopicAccuracy,
    },
};

/// Headline counts, per-topic accuracy, and a 14-day attempt chart.
pub async fn overview(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let student_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'student'")
            .fetch_one(&pool)
            .await?;
    let attempt_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts")
        .fetch_one(&pool)
        .await?;
    let response_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses")
        .fetch_one(&pool)
        .await?;

    let topic_accuracy = sqlx::query_as::<_, TopicAccuracy>(
        r#"
        SELECT
            q.topic,
            AVG(r.is_correct) AS accuracy,
            COUNT(r.id) AS response_count
        FROM questions q
        LEFT JOIN responses r ON q.id = r.question_id
        GROUP BY q.topic
        ORDER BY q.topic
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to compute topic accuracy: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let daily_attempts = sqlx::query_as::<_, DailyAttempts>(
        r#"
        SELECT DATE(finished_at) AS day, COUNT(*) AS attempts
        FROM attempts
        WHERE finished_at IS NOT NULL
          AND DATE(finished_at) >= DATE('now', '-14 days')
        GROUP BY day
        ORDER BY day
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(OverviewResponse {
        student_count,
        attempt_count,
        response_count,
        topic_accuracy,
        daily_attempts,
    }))
}

/// Student rankings over finished attempts, best average first.
pub async fn rankings(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let rankings = sqlx::query_as::<_, RankingEntry>(
        r#"
        SELECT
            u.name,
            u.email,
            AVG(a.score_pct) AS avg_score,
            MAX(a.score_pct) AS best_score,
            (
                SELECT a2.score_pct FROM attempts a2
                WHERE a2.student_id = u.id AND a2.finished_at IS NOT NULL
                ORDER BY a2.finished_at DESC, a2.id DESC
                LIMIT 1
            ) AS last_score,
            COUNT(a.id) AS attempt_count
        FROM users u
        JOIN attempts a ON a.student_id = u.id AND a.finished_at IS NOT NULL
        WHERE u.role = 'student'
        GROUP BY u.id
        ORDER BY avg_score DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to compute rankings: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(rankings))
}

/// Per-question correct rate, hardest questions first.
pub async fn question_stats(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let stats = sqlx::query_as::<_, QuestionStat>(
        r#"
        SELECT
            q.id AS question_id,
            q.topic,
            q.question,
            AVG(r.is_correct) AS correct_rate,
            COUNT(r.id) AS response_count
        FROM questions q
        LEFT JOIN responses r ON q.id = r.question_id
        GROUP BY q.id
        ORDER BY correct_rate IS NULL, correct_rate ASC, q.id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(stats))
}

/// Average response latency per question, slowest first.
pub async fn response_times(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let timings = sqlx::query_as::<_, QuestionTiming>(
        r#"
        SELECT
            q.id AS question_id,
            q.question,
            AVG(r.response_time_s) AS avg_time_s,
            COUNT(r.id) AS response_count
        FROM responses r
        JOIN questions q ON q.id = r.question_id
        GROUP BY q.id
        ORDER BY avg_time_s DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(timings))
}
