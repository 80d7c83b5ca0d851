use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{lobby::error::SubmissionError, question::models::QuestionView};

pub const CORRECT_ANSWER_POINTS: u32 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    Waiting,
    Starting,
    Started,
    Ended,
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameState::Waiting => write!(f, "waiting"),
            GameState::Starting => write!(f, "starting"),
            GameState::Started => write!(f, "started"),
            GameState::Ended => write!(f, "ended"),
        }
    }
}

/// Outbound notification pushed into a player's outbox.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum LobbyEvent {
    Countdown {
        #[serde(rename = "countdownMs")]
        countdown_ms: u64,
    },
    Question {
        question: QuestionView,
    },
    GameOver {
        #[serde(rename = "gameOver")]
        game_over: bool,
    },
}

impl LobbyEvent {
    pub fn game_over() -> Self {
        LobbyEvent::GameOver { game_over: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub state: GameState,
    pub winning_score: u32,
    pub winners: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartedGame {
    pub countdown_ms: u64,
    pub question_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct { points: u32, score: u32 },
    /// `resolved` is true when this was the last outstanding answer and the
    /// lobby moved on.
    Incorrect { score: u32, resolved: bool },
    Rejected(SubmissionError),
}

impl AnswerOutcome {
    pub fn points(&self) -> u32 {
        match self {
            AnswerOutcome::Correct { points, .. } => *points,
            _ => 0,
        }
    }
}

/* Transport payloads */

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyRequest {
    #[serde(default)]
    pub question_count: usize,
    #[serde(default)]
    pub countdown_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLobbyResponse {
    pub session_id: String,
    pub lobby_id: String,
    pub question_count: usize,
    pub countdown_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLobbyResponse {
    pub message: String,
    pub lobby_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub lobby_id: String,
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameResponse {
    pub countdown_ms: u64,
    pub question_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    pub lobby_id: String,
    pub session_id: String,
    pub question_id: String,
    /// Any index outside the question's options, negative included, is a wrong answer.
    pub answer: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerResponse {
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_error: Option<String>,
}

impl From<AnswerOutcome> for SubmitAnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        match outcome {
            AnswerOutcome::Correct { points, score } => Self {
                points,
                score: Some(score),
                submission_error: None,
            },
            AnswerOutcome::Incorrect { score, resolved } => {
                let message = match resolved {
                    true => "incorrect answer (from all players now)",
                    false => "incorrect answer",
                };

                Self {
                    points: 0,
                    score: Some(score),
                    submission_error: Some(message.into()),
                }
            }
            AnswerOutcome::Rejected(e) => Self {
                points: 0,
                score: None,
                submission_error: Some(e.to_string()),
            },
        }
    }
}
