// src/seed.rs
//
// Explicit, idempotent deployment-time seeding. Nothing here is
// triggered by request handling; main runs it once after migrations.

use serde::Deserialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::models::question::Topic;
use crate::utils::hash::hash_password;

const QUESTION_BANK: &str = include_str!("../seed/question_bank.json");

/// One question of the embedded bank. The source data records the
/// correct answer as a letter into the canonical option order; it is
/// resolved to the option text at insert time, since grading compares
/// option text.
#[derive(Debug, Deserialize)]
struct SeedQuestion {
    topic: Topic,
    question: String,
    options: Vec<String>,
    correct_letter: String,
    #[serde(default)]
    explanation: String,
}

/// Inserts the fixed question bank if the questions table is empty.
/// A non-empty table is left untouched, whatever its contents.
pub async fn seed_question_bank(pool: &SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        tracing::info!("Question bank already present ({} questions), skipping seed", existing);
        return Ok(());
    }

    let questions: Vec<SeedQuestion> = serde_json::from_str(QUESTION_BANK)?;

    let mut tx = pool.begin().await?;
    for q in &questions {
        if q.options.len() != 4 {
            return Err(format!("Question '{}' must have exactly 4 options", q.question).into());
        }
        let index = match q.correct_letter.as_str() {
            "A" => 0,
            "B" => 1,
            "C" => 2,
            "D" => 3,
            other => {
                return Err(format!(
                    "Question '{}' has invalid correct letter '{}'",
                    q.question, other
                )
                .into());
            }
        };
        let correct_option = &q.options[index];

        sqlx::query(
            r#"
            INSERT INTO questions (topic, question, options, correct_option, explanation)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(q.topic)
        .bind(&q.question)
        .bind(serde_json::to_string(&q.options)?)
        .bind(correct_option)
        .bind(&q.explanation)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!("Seeded question bank with {} questions", questions.len());
    Ok(())
}

/// Creates the lecturer account from configuration if it does not exist.
pub async fn seed_lecturer(
    pool: &SqlitePool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.lecturer_email, &config.lecturer_password) {
        let email = email.trim().to_lowercase();
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            tracing::info!("Seeding lecturer account: {}", email);
            let hashed_password = hash_password(password)?;

            sqlx::query(
                "INSERT INTO users (name, email, password_hash, role) VALUES (?, ?, ?, 'lecturer')",
            )
            .bind("Lecturer")
            .bind(&email)
            .bind(hashed_password)
            .execute(pool)
            .await?;
            tracing::info!("Lecturer account created successfully.");
        }
    }
    Ok(())
}
