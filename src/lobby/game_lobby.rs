use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    lobby::{
        error::{LobbyError, SubmissionError},
        models::{
            AnswerOutcome, CORRECT_ANSWER_POINTS, GameState, GameStatus, LobbyEvent, StartedGame,
        },
        player::{Player, PlayerFeed},
    },
    question::models::{Question, QuestionPool},
};

/// One match. Every mutable field sits behind a single lock and every public
/// operation holds it for its whole duration.
#[derive(Debug)]
pub struct GameLobby {
    id: String,
    question_count: usize,
    countdown_ms: u64,
    pool: Arc<QuestionPool>,
    inner: Mutex<LobbyInner>,
}

#[derive(Debug)]
struct LobbyInner {
    lobby_id: String,
    state: GameState,
    players: Vec<Player>,
    questions: Vec<Question>,
    current_index: usize,
    last_interaction: DateTime<Utc>,
}

impl GameLobby {
    pub fn new(
        id: impl Into<String>,
        question_count: usize,
        countdown_ms: u64,
        pool: Arc<QuestionPool>,
    ) -> Self {
        let id = id.into();

        Self {
            id: id.clone(),
            question_count,
            countdown_ms,
            pool,
            inner: Mutex::new(LobbyInner {
                lobby_id: id,
                state: GameState::Waiting,
                players: Vec::new(),
                questions: Vec::new(),
                current_index: 0,
                last_interaction: Utc::now(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LobbyInner>, LobbyError> {
        self.inner.lock().map_err(|e| {
            error!("Lobby {} lock error: {}", self.id, e);
            LobbyError::PoisonedLock
        })
    }

    /// Countdown notice, one message per question and the game over notice.
    fn outbox_capacity(&self) -> usize {
        self.pool.effective_count(self.question_count) + 2
    }

    pub fn add_player(&self, session_id: &str) -> Result<(), LobbyError> {
        let mut inner = self.lock()?;

        if inner.state != GameState::Waiting {
            return Err(LobbyError::InvalidState(inner.state));
        }

        if inner.find_player(session_id).is_some() {
            return Err(LobbyError::DuplicateSession(session_id.to_string()));
        }

        inner
            .players
            .push(Player::new(session_id, self.outbox_capacity()));
        inner.last_interaction = Utc::now();
        info!("Player {} joined lobby {}", session_id, self.id);

        Ok(())
    }

    pub fn state(&self) -> Result<GameState, LobbyError> {
        Ok(self.lock()?.state)
    }

    /// Selects the question sequence, moves to `Starting`, tells every player
    /// how long the countdown is and schedules the move to `Started`.
    pub fn start_game(self: &Arc<Self>, requester: &str) -> Result<StartedGame, LobbyError> {
        let question_count = {
            let mut inner = self.lock()?;

            if inner.find_player(requester).is_none() {
                return Err(LobbyError::PlayerNotInLobby(requester.to_string()));
            }

            if inner.state != GameState::Waiting {
                return Err(LobbyError::AlreadyStarted);
            }

            inner.state = GameState::Starting;
            inner.last_interaction = Utc::now();
            inner.questions = self.pool.select(self.question_count);
            inner.broadcast(LobbyEvent::Countdown {
                countdown_ms: self.countdown_ms,
            });

            inner.questions.len()
        };

        info!(
            "Lobby {} starting with {} questions in {} ms",
            self.id, question_count, self.countdown_ms
        );
        self.spawn_countdown();

        Ok(StartedGame {
            countdown_ms: self.countdown_ms,
            question_count,
        })
    }

    fn spawn_countdown(self: &Arc<Self>) {
        let lobby = Arc::clone(self);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(lobby.countdown_ms)).await;
            if let Err(e) = lobby.finish_countdown() {
                error!("Lobby {} failed to leave countdown: {}", lobby.id, e);
            }
        });
    }

    fn finish_countdown(&self) -> Result<(), LobbyError> {
        let mut inner = self.lock()?;

        if inner.state != GameState::Starting {
            warn!(
                "Lobby {} countdown elapsed in state {}, ignoring",
                self.id, inner.state
            );
            return Ok(());
        }

        if inner.questions.is_empty() {
            warn!("Lobby {} has no questions, ending right away", self.id);
            inner.end_game();
            return Ok(());
        }

        inner.state = GameState::Started;
        inner.current_index = 0;
        debug!("Lobby {} countdown elapsed", self.id);
        inner.send_current_question();

        Ok(())
    }

    /// Adjudicates one submission. Rejections are ordinary outcomes, only a
    /// poisoned lock is an error.
    pub fn submit_answer(
        &self,
        session_id: &str,
        question_id: &str,
        answer_index: usize,
    ) -> Result<AnswerOutcome, LobbyError> {
        let mut inner = self.lock()?;
        inner.last_interaction = Utc::now();

        let outcome = inner.adjudicate(session_id, question_id, answer_index);
        debug!(
            "Lobby {} submission from {} for {}: {:?}",
            self.id, session_id, question_id, outcome
        );

        Ok(outcome)
    }

    pub fn game_status(&self) -> Result<GameStatus, LobbyError> {
        let inner = self.lock()?;

        let winning_score = inner.players.iter().map(|p| p.score).max().unwrap_or(0);
        let winners = inner
            .players
            .iter()
            .filter(|p| p.score == winning_score)
            .map(|p| p.session_id.clone())
            .collect();

        Ok(GameStatus {
            state: inner.state,
            winning_score,
            winners,
        })
    }

    /// Fails the same way `take_feed` would, without taking the feed.
    pub fn check_feed(&self, session_id: &str) -> Result<(), LobbyError> {
        let inner = self.lock()?;

        match inner.find_player(session_id) {
            None => Err(LobbyError::PlayerNotInLobby(session_id.to_string())),
            Some(player) if !player.has_feed() => {
                Err(LobbyError::FeedTaken(session_id.to_string()))
            }
            Some(_) => Ok(()),
        }
    }

    pub fn take_feed(&self, session_id: &str) -> Result<PlayerFeed, LobbyError> {
        let mut inner = self.lock()?;

        let Some(player) = inner.find_player_mut(session_id) else {
            return Err(LobbyError::PlayerNotInLobby(session_id.to_string()));
        };

        player
            .take_feed()
            .ok_or_else(|| LobbyError::FeedTaken(session_id.to_string()))
    }

    /// Puts a feed back after its subscriber went away.
    pub fn restore_feed(&self, session_id: &str, feed: PlayerFeed) -> Result<(), LobbyError> {
        let mut inner = self.lock()?;

        let Some(player) = inner.find_player_mut(session_id) else {
            return Err(LobbyError::PlayerNotInLobby(session_id.to_string()));
        };

        player.restore_feed(feed);
        Ok(())
    }

    /// Closes every outbox and returns true if the last interaction is older
    /// than `expiry`. A poisoned lobby is always treated as expired.
    pub fn expire_if_idle(&self, now: DateTime<Utc>, expiry: chrono::Duration) -> bool {
        let mut inner = match self.inner.lock() {
            Ok(inner) => inner,
            Err(poisoned) => {
                error!("Lobby {} lock is poisoned, evicting it", self.id);
                let mut inner = poisoned.into_inner();
                inner.close_outboxes();
                return true;
            }
        };

        if now - inner.last_interaction <= expiry {
            return false;
        }

        info!(
            "Removing idle lobby {}, closing outboxes of {} players",
            self.id,
            inner.players.len()
        );
        inner.close_outboxes();

        true
    }

    #[cfg(test)]
    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    #[cfg(test)]
    pub(crate) fn question_count(&self) -> usize {
        self.question_count
    }

    #[cfg(test)]
    pub(crate) fn countdown_ms(&self) -> u64 {
        self.countdown_ms
    }

    #[cfg(test)]
    pub(crate) fn last_interaction(&self) -> DateTime<Utc> {
        self.inner
            .lock()
            .map(|inner| inner.last_interaction)
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.lock();
            panic!("lobby {} poisoned", self.id);
        }));
        assert!(result.is_err());
    }

    #[cfg(test)]
    pub(crate) fn set_last_interaction(&self, at: DateTime<Utc>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_interaction = at;
        }
    }

    #[cfg(test)]
    pub(crate) fn selected_questions(&self) -> Vec<Question> {
        self.inner
            .lock()
            .map(|inner| inner.questions.clone())
            .unwrap_or_default()
    }
}

impl LobbyInner {
    fn find_player(&self, session_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.session_id == session_id)
    }

    fn find_player_mut(&mut self, session_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.session_id == session_id)
    }

    fn broadcast(&self, event: LobbyEvent) {
        for player in &self.players {
            player.send(event.clone());
        }
    }

    fn adjudicate(
        &mut self,
        session_id: &str,
        question_id: &str,
        answer_index: usize,
    ) -> AnswerOutcome {
        match self.state {
            GameState::Ended => return AnswerOutcome::Rejected(SubmissionError::GameEnded),
            GameState::Started => {}
            GameState::Waiting | GameState::Starting => {
                return AnswerOutcome::Rejected(SubmissionError::GameNotStarted);
            }
        }

        // Only the question everyone is looking at can be answered.
        let is_correct = match self.questions.get(self.current_index) {
            Some(current) if current.id == question_id => current.is_correct(answer_index),
            _ => return AnswerOutcome::Rejected(SubmissionError::StaleQuestion),
        };

        let Some(player) = self.find_player_mut(session_id) else {
            return AnswerOutcome::Rejected(SubmissionError::PlayerNotFound);
        };

        // Recording consumes the player's single attempt, right or wrong.
        if !player.record_answer(question_id) {
            return AnswerOutcome::Rejected(SubmissionError::AlreadyAnswered);
        }

        if !is_correct {
            let score = player.score;
            let resolved = self.all_answered(question_id);
            if resolved {
                self.resolve_question();
            }

            return AnswerOutcome::Incorrect { score, resolved };
        }

        player.score += CORRECT_ANSWER_POINTS;
        let score = player.score;
        self.resolve_question();

        AnswerOutcome::Correct {
            points: CORRECT_ANSWER_POINTS,
            score,
        }
    }

    fn all_answered(&self, question_id: &str) -> bool {
        self.players.iter().all(|p| p.has_answered(question_id))
    }

    /// Advances to the next question or ends the match. Caller holds the lock.
    fn resolve_question(&mut self) {
        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            self.send_current_question();
        } else {
            self.end_game();
        }
    }

    fn send_current_question(&self) {
        let Some(question) = self.questions.get(self.current_index) else {
            error!(
                "Lobby {} has no question at index {}",
                self.lobby_id, self.current_index
            );
            return;
        };

        info!(
            "Lobby {} sending question {} ({}/{})",
            self.lobby_id,
            question.id,
            self.current_index + 1,
            self.questions.len()
        );
        self.broadcast(LobbyEvent::Question {
            question: question.to_view(),
        });
    }

    fn end_game(&mut self) {
        // The index carries no meaning once ended.
        self.current_index = 0;
        self.state = GameState::Ended;
        info!("Lobby {} game over", self.lobby_id);
        self.broadcast(LobbyEvent::game_over());
    }

    fn close_outboxes(&mut self) {
        for player in self.players.iter_mut() {
            player.close_outbox();
        }
    }
}
