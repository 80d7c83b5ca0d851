use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl Question {
    pub fn is_correct(&self, answer_index: usize) -> bool {
        self.correct_index == answer_index
    }

    /// Player facing copy, without the correct index.
    pub fn to_view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            options: self.options.clone(),
            question_text: self.question_text.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub options: Vec<String>,
    pub question_text: String,
}

/// The question bank loaded at startup. Shared read-only by every lobby.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    questions: Vec<Question>,
}

impl QuestionPool {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions a match asking for `requested` will actually get.
    /// 0 or anything above the pool size means the whole pool.
    pub fn effective_count(&self, requested: usize) -> usize {
        if requested == 0 || requested > self.questions.len() {
            self.questions.len()
        } else {
            requested
        }
    }

    /// Shuffles a copy of the pool and keeps the first `effective_count(requested)`.
    pub fn select(&self, requested: usize) -> Vec<Question> {
        let mut shuffled = self.questions.clone();
        shuffled.shuffle(&mut rand::rng());
        shuffled.truncate(self.effective_count(requested));
        shuffled
    }
}
