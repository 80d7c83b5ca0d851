use std::path::Path;

use tracing::info;

use crate::question::models::{Question, QuestionPool};

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("Failed to read question file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question bank is empty")]
    Empty,

    #[error("Question {id} has correct index {index} but only {options} options")]
    InvalidCorrectIndex {
        id: String,
        index: usize,
        options: usize,
    },
}

pub fn load_questions(path: impl AsRef<Path>) -> Result<QuestionPool, QuestionError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let pool = parse_questions(&bytes)?;
    info!("Loaded {} questions from {}", pool.len(), path.display());

    Ok(pool)
}

pub fn parse_questions(bytes: &[u8]) -> Result<QuestionPool, QuestionError> {
    let questions: Vec<Question> = serde_json::from_slice(bytes)?;
    let pool = QuestionPool::new(questions);
    if pool.is_empty() {
        return Err(QuestionError::Empty);
    }

    let invalid = pool
        .questions()
        .iter()
        .find(|q| q.correct_index >= q.options.len());
    if let Some(q) = invalid {
        return Err(QuestionError::InvalidCorrectIndex {
            id: q.id.clone(),
            index: q.correct_index,
            options: q.options.len(),
        });
    }

    Ok(pool)
}
