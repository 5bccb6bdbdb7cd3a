// src/scoring.rs
//
// Pure scoring primitives shared by quiz submission, review, and the
// student dashboard. Everything here operates on plain values so it can
// be tested without a database.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::models::question::Topic;

/// Rounds `100 * correct / total` to one decimal place.
/// Returns 0.0 when `total` is zero instead of dividing by zero.
pub fn score_pct(correct: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let pct = correct as f64 / total as f64 * 100.0;
    (pct * 10.0).round() / 10.0
}

/// Per-topic accuracy for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TopicScore {
    pub correct: i64,
    pub total: i64,
    pub pct: f64,
}

impl TopicScore {
    fn from_counts(correct: i64, total: i64) -> Self {
        Self {
            correct,
            total,
            pct: score_pct(correct, total),
        }
    }
}

/// Accuracy per curriculum topic. Both topics are always present,
/// even when an attempt has no responses for one of them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TopicBreakdown {
    pub fundamentals: TopicScore,
    pub normalization: TopicScore,
}

impl TopicBreakdown {
    /// Partitions `(topic, is_correct)` pairs into per-topic scores.
    pub fn from_responses<I>(responses: I) -> Self
    where
        I: IntoIterator<Item = (Topic, bool)>,
    {
        let mut correct: HashMap<Topic, i64> = HashMap::new();
        let mut total: HashMap<Topic, i64> = HashMap::new();
        for (topic, is_correct) in responses {
            *total.entry(topic).or_default() += 1;
            if is_correct {
                *correct.entry(topic).or_default() += 1;
            }
        }
        let score = |t: Topic| {
            TopicScore::from_counts(
                correct.get(&t).copied().unwrap_or(0),
                total.get(&t).copied().unwrap_or(0),
            )
        };
        Self {
            fundamentals: score(Topic::Fundamentals),
            normalization: score(Topic::Normalization),
        }
    }

    pub fn get(&self, topic: Topic) -> TopicScore {
        match topic {
            Topic::Fundamentals => self.fundamentals,
            Topic::Normalization => self.normalization,
        }
    }

    /// The next module unlocks only on full mastery of every topic:
    /// strict equality with 100.0 on both. Partial mastery never unlocks.
    pub fn is_unlocked(&self) -> bool {
        Topic::ALL.iter().all(|t| self.get(*t).pct == 100.0)
    }
}

/// One answer as submitted by the client.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    /// Full text of the chosen option.
    pub chosen_option: String,
    #[serde(default)]
    pub response_time_s: f64,
}

/// One graded answer, ready to be persisted as a response row.
#[derive(Debug, Clone)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub chosen_option: String,
    pub is_correct: bool,
    pub response_time_s: f64,
}

/// Result of grading one submission batch.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub answers: Vec<GradedAnswer>,
    pub items_total: i64,
    pub items_correct: i64,
    pub score_pct: f64,
    pub breakdown: TopicBreakdown,
}

/// A submission batch that cannot be graded. The whole batch is
/// rejected; nothing is partially graded.
#[derive(Debug, PartialEq, Eq)]
pub enum GradeError {
    UnknownQuestion(i64),
    DuplicateQuestion(i64),
}

impl fmt::Display for GradeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeError::UnknownQuestion(id) => {
                write!(f, "Submission references unknown question {}", id)
            }
            GradeError::DuplicateQuestion(id) => {
                write!(f, "Submission answers question {} more than once", id)
            }
        }
    }
}

/// Grades a submission batch against the answer key.
///
/// `key` maps question id to `(topic, correct option text)` as stored in
/// the question bank at grading time. Correctness is exact string
/// equality between the chosen and the stored correct option text.
/// An empty batch grades to zero items and a 0.0 score.
pub fn grade_submission(
    answers: &[SubmittedAnswer],
    key: &HashMap<i64, (Topic, String)>,
) -> Result<GradeOutcome, GradeError> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut graded = Vec::with_capacity(answers.len());
    let mut by_topic = Vec::with_capacity(answers.len());
    let mut items_correct = 0;

    for answer in answers {
        if !seen.insert(answer.question_id) {
            return Err(GradeError::DuplicateQuestion(answer.question_id));
        }
        let (topic, correct_option) = key
            .get(&answer.question_id)
            .ok_or(GradeError::UnknownQuestion(answer.question_id))?;

        let is_correct = answer.chosen_option == *correct_option;
        if is_correct {
            items_correct += 1;
        }
        by_topic.push((*topic, is_correct));
        graded.push(GradedAnswer {
            question_id: answer.question_id,
            chosen_option: answer.chosen_option.clone(),
            is_correct,
            response_time_s: answer.response_time_s,
        });
    }

    let items_total = graded.len() as i64;
    Ok(GradeOutcome {
        items_total,
        items_correct,
        score_pct: score_pct(items_correct, items_total),
        breakdown: TopicBreakdown::from_responses(by_topic),
        answers: graded,
    })
}
