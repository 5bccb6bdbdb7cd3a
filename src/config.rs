// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Name of the module unlocked once both topics reach full mastery.
pub const NEXT_MODULE_NAME: &str = "Database Development Process";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    /// Optional lecturer account seeded at startup.
    pub lecturer_email: Option<String>,
    pub lecturer_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            lecturer_email: env::var("LECTURER_EMAIL").ok(),
            lecturer_password: env::var("LECTURER_PASSWORD").ok(),
        }
    }
}
