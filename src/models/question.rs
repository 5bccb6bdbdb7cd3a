// src/models/question.rs

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};

/// The two fixed curriculum topics every question is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Topic {
    Fundamentals,
    Normalization,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::Fundamentals, Topic::Normalization];

    /// Human-readable topic name shown in the UI.
    pub fn label(&self) -> &'static str {
        match self {
            Topic::Fundamentals => "Data Modeling & DBMS Fundamentals",
            Topic::Normalization => "Normalization & Dependencies",
        }
    }
}

/// Represents the 'questions' table in the database.
/// The bank is fixed per deployment: 30 questions, 15 per topic,
/// each with exactly 4 options and one correct option.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub topic: Topic,

    /// The text content of the question.
    pub question: String,

    /// The 4 answer options, stored as a JSON array in canonical order.
    pub options: Json<Vec<String>>,

    /// Full text of the correct option. Grading compares the submitted
    /// option text against this value verbatim, so it stays stable no
    /// matter how options are shuffled for presentation.
    pub correct_option: String,

    /// Explanation shown during review.
    pub explanation: String,
}

/// DTO for sending a question to the client.
/// Excludes the correct option and the explanation.
#[derive(Debug, Serialize)]
pub struct PresentedQuestion {
    pub id: i64,
    pub topic: Topic,
    pub topic_label: &'static str,
    pub question: String,
    pub options: Vec<String>,
}

impl PresentedQuestion {
    /// Builds the client-facing view of a question with its options
    /// shuffled for this presentation only.
    pub fn from_question<R: rand::Rng>(q: Question, rng: &mut R) -> Self {
        let mut options = q.options.0;
        options.shuffle(rng);
        Self {
            id: q.id,
            topic: q.topic,
            topic_label: q.topic.label(),
            question: q.question,
            options,
        }
    }
}
