// src/handlers/quiz.rs
//
// Attempt lifecycle: start-or-resume, grade-and-finish, review, and the
// student dashboard. An attempt moves from in-progress to finished
// exactly once; aggregates are written only at submission.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::{
    config::NEXT_MODULE_NAME,
    error::AppError,
    models::{
        attempt::{
            Attempt, DashboardResponse, ReviewItem, ReviewResponse, StartQuizResponse,
            SubmitQuizRequest, SubmitQuizResponse,
        },
        question::{PresentedQuestion, Question, Topic},
    },
    scoring::{TopicBreakdown, grade_submission},
    utils::jwt::Claims,
};

const ATTEMPT_COLUMNS: &str =
    "id, student_id, started_at, finished_at, items_total, items_correct, score_pct";

/// Returns the full question bank for a presentation.
///
/// Question order and option order are shuffled per call; the correct
/// option and the explanation never leave the server. The sequence is
/// one-shot: resuming an attempt re-randomizes presentation without
/// touching already-graded responses.
pub async fn get_questions(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, topic, question, options, correct_option, explanation
        FROM questions
        ORDER BY RANDOM()
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch question bank: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut rng = rand::thread_rng();
    let presented: Vec<PresentedQuestion> = questions
        .into_iter()
        .map(|q| PresentedQuestion::from_question(q, &mut rng))
        .collect();

    Ok(Json(presented))
}

/// Starts a new attempt, or resumes the student's in-progress one.
///
/// A student has at most one unfinished attempt at a time; a partial
/// unique index on `attempts(student_id) WHERE finished_at IS NULL`
/// backstops concurrent start requests.
pub async fn start_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    if let Some(open) = open_attempt(&pool, student_id).await? {
        return Ok(Json(StartQuizResponse {
            attempt_id: open.id,
            started_at: open.started_at,
            resumed: true,
        }));
    }

    let started_at = Utc::now();
    let insert = sqlx::query("INSERT INTO attempts (student_id, started_at) VALUES (?, ?)")
        .bind(student_id)
        .bind(started_at)
        .execute(&pool)
        .await;

    match insert {
        Ok(result) => Ok(Json(StartQuizResponse {
            attempt_id: result.last_insert_rowid(),
            started_at,
            resumed: false,
        })),
        // A concurrent request won the insert; resume its attempt.
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
            let open = open_attempt(&pool, student_id)
                .await?
                .ok_or(AppError::InternalServerError(
                    "Open attempt vanished after unique violation".to_string(),
                ))?;
            Ok(Json(StartQuizResponse {
                attempt_id: open.id,
                started_at: open.started_at,
                resumed: true,
            }))
        }
        Err(e) => {
            tracing::error!("Failed to create attempt: {:?}", e);
            Err(AppError::from(e))
        }
    }
}

/// Grades a submitted answer batch and finishes the attempt.
///
/// The attempt must belong to the requester and still be in progress.
/// Unknown or duplicate question ids reject the whole batch; an empty
/// batch finishes the attempt with zero items and a 0.0 score. Response
/// rows and attempt aggregates are written in one transaction, and a
/// second submission for the same attempt is rejected.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let attempt = fetch_attempt(&pool, req.attempt_id).await?;
    let attempt = match attempt {
        Some(a) if a.student_id == student_id => a,
        _ => return Err(AppError::InvalidAttempt("Attempt not found".to_string())),
    };
    if attempt.finished_at.is_some() {
        return Err(AppError::InvalidAttempt(
            "Attempt is already finished".to_string(),
        ));
    }

    // Answer key as stored right now; the graded flags below are
    // persisted and never recomputed from the bank afterwards.
    let key_rows = sqlx::query_as::<_, (i64, Topic, String)>(
        "SELECT id, topic, correct_option FROM questions",
    )
    .fetch_all(&pool)
    .await?;
    let key: HashMap<i64, (Topic, String)> = key_rows
        .into_iter()
        .map(|(id, topic, correct)| (id, (topic, correct)))
        .collect();

    let outcome = grade_submission(&req.answers, &key)
        .map_err(|e| AppError::MalformedSubmission(e.to_string()))?;

    let finished_at = Utc::now();
    let mut tx = pool.begin().await?;

    // The single authoritative write of the aggregates. The guard on
    // finished_at rejects a concurrent double-submission.
    let updated = sqlx::query(
        r#"
        UPDATE attempts
        SET finished_at = ?, items_total = ?, items_correct = ?, score_pct = ?
        WHERE id = ? AND finished_at IS NULL
        "#,
    )
    .bind(finished_at)
    .bind(outcome.items_total)
    .bind(outcome.items_correct)
    .bind(outcome.score_pct)
    .bind(attempt.id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::InvalidAttempt(
            "Attempt is already finished".to_string(),
        ));
    }

    for answer in &outcome.answers {
        sqlx::query(
            r#"
            INSERT INTO responses (attempt_id, question_id, chosen_option, is_correct, response_time_s)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(attempt.id)
        .bind(answer.question_id)
        .bind(&answer.chosen_option)
        .bind(answer.is_correct)
        .bind(answer.response_time_s)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        attempt_id = attempt.id,
        items_total = outcome.items_total,
        items_correct = outcome.items_correct,
        score_pct = outcome.score_pct,
        "Attempt graded and finished"
    );

    // This attempt just became the student's latest finished attempt,
    // so its breakdown drives the unlock decision.
    let unlocked = outcome.breakdown.is_unlocked();

    Ok(Json(SubmitQuizResponse {
        attempt_id: attempt.id,
        score_pct: outcome.score_pct,
        items_total: outcome.items_total,
        items_correct: outcome.items_correct,
        breakdown: outcome.breakdown,
        unlocked,
    }))
}

/// Full review of a finished attempt: chosen vs correct option per
/// question, explanation, topic breakdown, and the unlock flag.
pub async fn review_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let attempt = fetch_attempt(&pool, attempt_id).await?;
    let attempt = match attempt {
        Some(a) if a.student_id == student_id => a,
        _ => return Err(AppError::InvalidAttempt("Attempt not found".to_string())),
    };
    if attempt.finished_at.is_none() {
        return Err(AppError::InvalidAttempt(
            "Attempt is still in progress".to_string(),
        ));
    }

    let items = sqlx::query_as::<_, ReviewItem>(
        r#"
        SELECT
            r.question_id,
            q.topic,
            q.question,
            r.chosen_option,
            q.correct_option,
            r.is_correct,
            q.explanation,
            r.response_time_s
        FROM responses r
        JOIN questions q ON q.id = r.question_id
        WHERE r.attempt_id = ?
        ORDER BY r.question_id
        "#,
    )
    .bind(attempt.id)
    .fetch_all(&pool)
    .await?;

    let breakdown =
        TopicBreakdown::from_responses(items.iter().map(|i| (i.topic, i.is_correct)));

    // Unlock always reflects the latest finished attempt, which may be
    // newer than the one under review.
    let unlocked = match latest_finished_attempt(&pool, student_id).await? {
        Some(latest) if latest.id == attempt.id => breakdown.is_unlocked(),
        Some(latest) => breakdown_for_attempt(&pool, latest.id).await?.is_unlocked(),
        None => false,
    };

    Ok(Json(ReviewResponse {
        attempt,
        items,
        breakdown,
        unlocked,
    }))
}

/// Student dashboard: latest finished attempt, per-topic mastery,
/// unlock state, and recent scores for the chart.
pub async fn dashboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.sub.parse::<i64>().unwrap_or(0);

    let latest = latest_finished_attempt(&pool, student_id).await?;

    let Some(latest) = latest else {
        return Ok(Json(DashboardResponse {
            latest_attempt: None,
            breakdown: TopicBreakdown::from_responses(std::iter::empty()),
            unlocked: false,
            next_module: NEXT_MODULE_NAME,
            recent_attempts: Vec::new(),
        }));
    };

    let breakdown = breakdown_for_attempt(&pool, latest.id).await?;
    let unlocked = breakdown.is_unlocked();

    let recent_attempts = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        SELECT {ATTEMPT_COLUMNS}
        FROM attempts
        WHERE student_id = ? AND finished_at IS NOT NULL
        ORDER BY finished_at DESC, id DESC
        LIMIT 10
        "#
    ))
    .bind(student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(DashboardResponse {
        latest_attempt: Some(latest),
        breakdown,
        unlocked,
        next_module: NEXT_MODULE_NAME,
        recent_attempts,
    }))
}

async fn fetch_attempt(pool: &SqlitePool, attempt_id: i64) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = ?"
    ))
    .bind(attempt_id)
    .fetch_optional(pool)
    .await?;
    Ok(attempt)
}

async fn open_attempt(pool: &SqlitePool, student_id: i64) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE student_id = ? AND finished_at IS NULL"
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(attempt)
}

/// Deterministic latest-finished selection: finish time descending,
/// ties broken by attempt id descending.
pub async fn latest_finished_attempt(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Option<Attempt>, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        r#"
        SELECT {ATTEMPT_COLUMNS}
        FROM attempts
        WHERE student_id = ? AND finished_at IS NOT NULL
        ORDER BY finished_at DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await?;
    Ok(attempt)
}

/// Per-topic accuracy of one attempt, computed from the stored
/// response/question join, never from a re-randomized presentation.
pub async fn breakdown_for_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
) -> Result<TopicBreakdown, AppError> {
    let rows = sqlx::query_as::<_, (Topic, bool)>(
        r#"
        SELECT q.topic, r.is_correct
        FROM responses r
        JOIN questions q ON q.id = r.question_id
        WHERE r.attempt_id = ?
        "#,
    )
    .bind(attempt_id)
    .fetch_all(pool)
    .await?;

    Ok(TopicBreakdown::from_responses(rows))
}
