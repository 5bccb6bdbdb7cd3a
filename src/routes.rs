// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, feedback, quiz, reports},
    state::AppState,
    utils::jwt::{auth_middleware, lecturer_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quiz, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Student-facing quiz routes: present, start/resume, submit, review.
    let quiz_routes = Router::new()
        .route("/questions", get(quiz::get_questions))
        .route("/start", post(quiz::start_quiz))
        .route("/submit", post(quiz::submit_quiz))
        .route("/attempts/{id}/review", get(quiz::review_attempt))
        .route("/dashboard", get(quiz::dashboard))
        .route("/feedback", post(feedback::submit_feedback))
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Lecturer analytics, read-only.
    let admin_routes = Router::new()
        .route("/overview", get(reports::overview))
        .route("/rankings", get(reports::rankings))
        .route("/questions", get(reports::question_stats))
        .route("/response-times", get(reports::response_times))
        .layer(middleware::from_fn(lecturer_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
