use crate::lobby::models::GameState;

/// Structural failures. These are surfaced to the caller as failed requests.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LobbyError {
    #[error("Lobby not found: {0}")]
    LobbyNotFound(String),

    #[error("Cannot add player, lobby is {0} and not waiting")]
    InvalidState(GameState),

    #[error("Player with session {0} is already in the lobby")]
    DuplicateSession(String),

    #[error("Player session is not in the lobby: {0}")]
    PlayerNotInLobby(String),

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Event feed for session {0} is already subscribed")]
    FeedTaken(String),

    #[error("Lobby lock was poisoned")]
    PoisonedLock,
}

/// Rejected submissions. Normal gameplay results, returned as values.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("game has already ended")]
    GameEnded,

    #[error("game is not started")]
    GameNotStarted,

    #[error("incorrect question ID")]
    StaleQuestion,

    #[error("player not found")]
    PlayerNotFound,

    #[error("player already answered this question")]
    AlreadyAnswered,
}
