//! Question bank: where categories and trivia questions come from.
//!
//! The orchestrator only sees the [`QuestionSource`] trait. [`QuestionBank`] is the
//! in-memory implementation loaded from the seed JSON format:
//!
//! ```json
//! { "normal": [ { "category": "...", "question": "... <BLANK> ...", "answer": "..." } ],
//!   "final":  [ ... ] }
//! ```

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::types::Question;

/// Placeholder used by the seed files for the blank in a question
const BLANK_MARKER: &str = "<BLANK>";
const BLANK_RENDERED: &str = "______";

/// Sample bank compiled into the binary, used when no file is configured
const SAMPLE_BANK: &str = include_str!("../data/questions.json");

/// Errors that can occur while looking up questions
#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("no question for category '{0}'")]
    NotFound(String),

    #[error("question bank is empty")]
    Empty,

    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Supplier of categories and questions for a game session
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Distinct categories, in a stable order
    async fn list_categories(&self) -> Result<Vec<String>, QuestionError>;

    /// One question (with its answer) from the given category
    async fn fetch_by_category(&self, category: &str) -> Result<Question, QuestionError>;
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    normal: Vec<SeedQuestion>,
    /// Final-round questions are kept in the seed format but not played
    #[serde(default, rename = "final")]
    _final_round: Vec<SeedQuestion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedQuestion {
    category: String,
    question: String,
    answer: String,
    #[serde(default)]
    #[allow(dead_code)] // Part of the seed format, not used for scoring
    alternate_spellings: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    suggestions: Vec<String>,
}

/// In-memory question bank
#[derive(Debug, Clone, Default)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// Parse a bank from the seed JSON format
    pub fn from_json(json: &str) -> Result<Self, QuestionError> {
        let seed: SeedFile = serde_json::from_str(json)?;

        let questions: Vec<Question> = seed
            .normal
            .into_iter()
            .filter(|q| {
                !q.category.trim().is_empty()
                    && !q.question.trim().is_empty()
                    && !q.answer.trim().is_empty()
            })
            .map(|q| Question {
                category: q.category.trim().to_string(),
                text: q.question.replace(BLANK_MARKER, BLANK_RENDERED),
                answer: q.answer.trim().to_string(),
            })
            .collect();

        if questions.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(Self { questions })
    }

    /// Load a bank from a seed file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QuestionError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The sample bank bundled with the server
    pub fn sample() -> Self {
        match Self::from_json(SAMPLE_BANK) {
            Ok(bank) => bank,
            Err(e) => {
                tracing::error!("Bundled question bank is invalid: {}", e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[async_trait]
impl QuestionSource for QuestionBank {
    async fn list_categories(&self) -> Result<Vec<String>, QuestionError> {
        let mut seen = HashSet::new();
        let categories: Vec<String> = self
            .questions
            .iter()
            .filter(|q| seen.insert(q.category.as_str()))
            .map(|q| q.category.clone())
            .collect();

        if categories.is_empty() {
            return Err(QuestionError::Empty);
        }
        Ok(categories)
    }

    async fn fetch_by_category(&self, category: &str) -> Result<Question, QuestionError> {
        let matching: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| q.category == category)
            .collect();

        matching
            .choose(&mut rand::rng())
            .map(|q| (*q).clone())
            .ok_or_else(|| QuestionError::NotFound(category.to_string()))
    }
}
