// tests/quiz_flow_tests.rs
//
// End-to-end coverage of the attempt lifecycle and the mastery/unlock
// rules: start-or-resume, grading, idempotent finish, review, and the
// latest-attempt unlock decision.

use pla_backend::{config::Config, routes, seed, state::AppState};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

async fn spawn_app() -> (String, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    seed::seed_question_bank(&pool)
        .await
        .expect("Failed to seed question bank");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "quiz_flow_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        lecturer_email: None,
        lecturer_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

async fn register_and_login(client: &reqwest::Client, address: &str) -> String {
    let email = format!("s_{}@demo.edu", &uuid::Uuid::new_v4().to_string()[..8]);

    client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "name": "Test Student",
            "email": email,
            "password": "Student123!"
        }))
        .send()
        .await
        .unwrap();

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": "Student123!"}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    login["token"].as_str().unwrap().to_string()
}

async fn lecturer_token(client: &reqwest::Client, address: &str, pool: &SqlitePool) -> String {
    let email = format!("l_{}@lct.edu", &uuid::Uuid::new_v4().to_string()[..8]);
    let hash = pla_backend::utils::hash::hash_password("Admin123!").unwrap();

    sqlx::query("INSERT INTO users (name, email, password_hash, role) VALUES (?, ?, ?, 'lecturer')")
        .bind("Lecturer")
        .bind(&email)
        .bind(hash)
        .execute(pool)
        .await
        .unwrap();

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"email": email, "password": "Admin123!"}))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap();

    login["token"].as_str().unwrap().to_string()
}

/// The stored bank: (question id, topic, options, correct option text).
async fn answer_key(pool: &SqlitePool) -> Vec<(i64, String, Vec<String>, String)> {
    let rows = sqlx::query_as::<_, (i64, String, String, String)>(
        "SELECT id, topic, options, correct_option FROM questions ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .unwrap();

    rows.into_iter()
        .map(|(id, topic, options, correct)| {
            let options: Vec<String> = serde_json::from_str(&options).unwrap();
            (id, topic, options, correct)
        })
        .collect()
}

fn wrong_option(options: &[String], correct: &str) -> String {
    options
        .iter()
        .find(|o| o.as_str() != correct)
        .expect("Every question has a wrong option")
        .clone()
}

async fn start_attempt(client: &reqwest::Client, address: &str, token: &str) -> serde_json::Value {
    client
        .post(format!("{}/api/quiz/start", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn submit(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    attempt_id: i64,
    answers: &[serde_json::Value],
) -> reqwest::Response {
    client
        .post(format!("{}/api/quiz/submit", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"attempt_id": attempt_id, "answers": answers}))
        .send()
        .await
        .unwrap()
}

fn all_correct_answers(key: &[(i64, String, Vec<String>, String)]) -> Vec<serde_json::Value> {
    key.iter()
        .map(|(id, _, _, correct)| {
            serde_json::json!({"question_id": id, "chosen_option": correct, "response_time_s": 4.5})
        })
        .collect()
}

#[tokio::test]
async fn start_then_resume_returns_same_attempt() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let first = start_attempt(&client, &address, &token).await;
    assert_eq!(first["resumed"], false);

    let second = start_attempt(&client, &address, &token).await;
    assert_eq!(second["resumed"], true);
    assert_eq!(second["attempt_id"], first["attempt_id"]);
}

#[tokio::test]
async fn concurrent_starts_share_one_attempt() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let (a, b) = tokio::join!(
        start_attempt(&client, &address, &token),
        start_attempt(&client, &address, &token)
    );
    assert_eq!(a["attempt_id"], b["attempt_id"]);

    let open: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE finished_at IS NULL")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(open, 1);
}

#[tokio::test]
async fn perfect_submission_scores_100_and_unlocks() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let response = submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["score_pct"], 100.0);
    assert_eq!(body["items_total"], 30);
    assert_eq!(body["items_correct"], 30);
    assert_eq!(body["breakdown"]["fundamentals"]["pct"], 100.0);
    assert_eq!(body["breakdown"]["normalization"]["pct"], 100.0);
    assert_eq!(body["unlocked"], true);

    // The dashboard agrees with the submission result.
    let dashboard: serde_json::Value = client
        .get(format!("{}/api/quiz/dashboard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["latest_attempt"]["id"], attempt_id);
    assert_eq!(dashboard["unlocked"], true);
    assert_eq!(dashboard["next_module"], "Database Development Process");
    assert_eq!(dashboard["recent_attempts"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn all_wrong_submission_scores_zero() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let answers: Vec<serde_json::Value> = key
        .iter()
        .map(|(id, _, options, correct)| {
            serde_json::json!({
                "question_id": id,
                "chosen_option": wrong_option(options, correct),
                "response_time_s": 2.0
            })
        })
        .collect();

    let body: serde_json::Value = submit(&client, &address, &token, attempt_id, &answers)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["score_pct"], 0.0);
    assert_eq!(body["items_correct"], 0);
    assert_eq!(body["breakdown"]["fundamentals"]["pct"], 0.0);
    assert_eq!(body["breakdown"]["normalization"]["pct"], 0.0);
    assert_eq!(body["unlocked"], false);
}

#[tokio::test]
async fn single_topic_miss_blocks_unlock() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    // All fundamentals correct; exactly one normalization answer wrong.
    let mut missed = false;
    let answers: Vec<serde_json::Value> = key
        .iter()
        .map(|(id, topic, options, correct)| {
            let chosen = if topic == "normalization" && !missed {
                missed = true;
                wrong_option(options, correct)
            } else {
                correct.clone()
            };
            serde_json::json!({"question_id": id, "chosen_option": chosen, "response_time_s": 3.0})
        })
        .collect();

    let body: serde_json::Value = submit(&client, &address, &token, attempt_id, &answers)
        .await
        .json()
        .await
        .unwrap();

    // 29/30 overall, 15/15 and 14/15 per topic: no unlock.
    assert_eq!(body["items_correct"], 29);
    assert_eq!(body["score_pct"], 96.7);
    assert_eq!(body["breakdown"]["fundamentals"]["pct"], 100.0);
    assert_eq!(body["breakdown"]["normalization"]["pct"], 93.3);
    assert_eq!(body["unlocked"], false);
}

#[tokio::test]
async fn resubmission_is_rejected_and_changes_nothing() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let first = submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;
    assert_eq!(first.status().as_u16(), 200);

    // Second grade-and-finish on the same attempt must be rejected.
    let second = submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;
    assert_eq!(second.status().as_u16(), 409);

    let response_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE attempt_id = ?")
            .bind(attempt_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(response_count, 30);

    let (items_total, items_correct, score_pct): (i64, i64, f64) = sqlx::query_as(
        "SELECT items_total, items_correct, score_pct FROM attempts WHERE id = ?",
    )
    .bind(attempt_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(items_total, 30);
    assert_eq!(items_correct, 30);
    assert_eq!(score_pct, 100.0);
}

#[tokio::test]
async fn empty_submission_finishes_with_zero_score() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let response = submit(&client, &address, &token, attempt_id, &[]).await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["score_pct"], 0.0);
    assert_eq!(body["items_total"], 0);
    assert_eq!(body["unlocked"], false);

    // The attempt is finished; starting again opens a fresh one.
    let next = start_attempt(&client, &address, &token).await;
    assert_eq!(next["resumed"], false);
    assert_ne!(next["attempt_id"], started["attempt_id"]);
}

#[tokio::test]
async fn unknown_question_rejects_the_whole_batch() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let mut answers = all_correct_answers(&key);
    answers.push(serde_json::json!({
        "question_id": 999_999,
        "chosen_option": "Anything",
        "response_time_s": 1.0
    }));

    let response = submit(&client, &address, &token, attempt_id, &answers).await;
    assert_eq!(response.status().as_u16(), 400);

    // Nothing was graded; the attempt is still open and can be finished.
    let response_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM responses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(response_count, 0);

    let retry = submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;
    assert_eq!(retry.status().as_u16(), 200);
}

#[tokio::test]
async fn duplicate_question_rejects_the_whole_batch() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let mut answers = all_correct_answers(&key);
    answers.push(answers[0].clone());

    let response = submit(&client, &address, &token, attempt_id, &answers).await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn submitting_another_students_attempt_is_rejected() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token_a = register_and_login(&client, &address).await;
    let token_b = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token_a).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    let response = submit(&client, &address, &token_b, attempt_id, &all_correct_answers(&key)).await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn review_reflects_stored_grading() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();
    submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;

    let review: serde_json::Value = client
        .get(format!("{}/api/quiz/attempts/{}/review", address, attempt_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(review["attempt"]["id"], attempt_id);
    let items = review["items"].as_array().unwrap();
    assert_eq!(items.len(), 30);
    for item in items {
        assert_eq!(item["is_correct"], true);
        assert_eq!(item["chosen_option"], item["correct_option"]);
        assert!(item["explanation"].as_str().is_some());
    }
    assert_eq!(review["breakdown"]["fundamentals"]["pct"], 100.0);
    assert_eq!(review["unlocked"], true);
}

#[tokio::test]
async fn review_is_owner_only_and_finished_only() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token_a = register_and_login(&client, &address).await;
    let token_b = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token_a).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();

    // Still in progress: no review yet.
    let in_progress = client
        .get(format!("{}/api/quiz/attempts/{}/review", address, attempt_id))
        .header("Authorization", format!("Bearer {}", token_a))
        .send()
        .await
        .unwrap();
    assert_eq!(in_progress.status().as_u16(), 409);

    submit(&client, &address, &token_a, attempt_id, &all_correct_answers(&key)).await;

    // Another student cannot see it.
    let foreign = client
        .get(format!("{}/api/quiz/attempts/{}/review", address, attempt_id))
        .header("Authorization", format!("Bearer {}", token_b))
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status().as_u16(), 409);
}

#[tokio::test]
async fn grading_is_not_recomputed_when_the_bank_changes() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &token).await;
    let attempt_id = started["attempt_id"].as_i64().unwrap();
    submit(&client, &address, &token, attempt_id, &all_correct_answers(&key)).await;

    // Tamper with one question's correct answer after grading.
    let (first_id, _, options, correct) = &key[0];
    sqlx::query("UPDATE questions SET correct_option = ? WHERE id = ?")
        .bind(wrong_option(options, correct))
        .bind(first_id)
        .execute(&pool)
        .await
        .unwrap();

    // Stored correctness is authoritative: still a perfect, unlocked attempt.
    let dashboard: serde_json::Value = client
        .get(format!("{}/api/quiz/dashboard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["latest_attempt"]["score_pct"], 100.0);
    assert_eq!(dashboard["unlocked"], true);
}

#[tokio::test]
async fn unlock_follows_the_latest_attempt_not_the_best() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    // First attempt: perfect.
    let first = start_attempt(&client, &address, &token).await;
    submit(
        &client,
        &address,
        &token,
        first["attempt_id"].as_i64().unwrap(),
        &all_correct_answers(&key),
    )
    .await;

    // Second attempt: one miss.
    let second = start_attempt(&client, &address, &token).await;
    let mut answers = all_correct_answers(&key);
    let (id, _, options, correct) = &key[0];
    answers[0] = serde_json::json!({
        "question_id": id,
        "chosen_option": wrong_option(options, correct),
        "response_time_s": 3.0
    });
    submit(
        &client,
        &address,
        &token,
        second["attempt_id"].as_i64().unwrap(),
        &answers,
    )
    .await;

    // Latest attempt is imperfect: locked again, despite the perfect history.
    let dashboard: serde_json::Value = client
        .get(format!("{}/api/quiz/dashboard", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["latest_attempt"]["id"], second["attempt_id"]);
    assert_eq!(dashboard["unlocked"], false);
    assert_eq!(dashboard["recent_attempts"].as_array().unwrap().len(), 2);

    let open: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE finished_at IS NULL")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(open, 0);
}

#[tokio::test]
async fn lecturer_analytics_aggregate_finished_attempts() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let student = register_and_login(&client, &address).await;
    let key = answer_key(&pool).await;

    let started = start_attempt(&client, &address, &student).await;
    submit(
        &client,
        &address,
        &student,
        started["attempt_id"].as_i64().unwrap(),
        &all_correct_answers(&key),
    )
    .await;

    let token = lecturer_token(&client, &address, &pool).await;

    let overview: serde_json::Value = client
        .get(format!("{}/api/admin/overview", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["student_count"], 1);
    assert_eq!(overview["attempt_count"], 1);
    assert_eq!(overview["response_count"], 30);
    for topic in overview["topic_accuracy"].as_array().unwrap() {
        assert_eq!(topic["accuracy"], 1.0);
        assert_eq!(topic["response_count"], 15);
    }
    assert_eq!(overview["daily_attempts"].as_array().unwrap().len(), 1);

    let rankings: Vec<serde_json::Value> = client
        .get(format!("{}/api/admin/rankings", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rankings.len(), 1);
    assert_eq!(rankings[0]["avg_score"], 100.0);
    assert_eq!(rankings[0]["best_score"], 100.0);
    assert_eq!(rankings[0]["last_score"], 100.0);
    assert_eq!(rankings[0]["attempt_count"], 1);

    let timings: Vec<serde_json::Value> = client
        .get(format!("{}/api/admin/response-times", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(timings.len(), 30);
    for t in &timings {
        assert_eq!(t["avg_time_s"], 4.5);
        assert_eq!(t["response_count"], 1);
    }
}
