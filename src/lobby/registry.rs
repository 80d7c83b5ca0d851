use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    lobby::{
        error::LobbyError,
        game_lobby::GameLobby,
        models::{AnswerOutcome, GameStatus, StartedGame},
        player::PlayerFeed,
    },
    question::models::QuestionPool,
};

/// Directory of live lobbies addressed by id.
///
/// The map's own locks are only held for lookups, inserts and the expiry
/// sweep. Lookups clone the `Arc` out and release the map before touching the
/// lobby, so lobby operations never run while a map lock is held. The sweep
/// is the one place that nests: map lock, then lobby lock.
#[derive(Debug, Clone)]
pub struct LobbyRegistry {
    lobbies: Arc<DashMap<String, Arc<GameLobby>>>,
    pool: Arc<QuestionPool>,
    expiry: chrono::Duration,
}

impl LobbyRegistry {
    pub fn new(pool: Arc<QuestionPool>, expiry: chrono::Duration) -> Self {
        Self {
            lobbies: Arc::new(DashMap::new()),
            pool,
            expiry,
        }
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    pub fn get_lobby(&self, lobby_id: &str) -> Option<Arc<GameLobby>> {
        self.lobbies.get(lobby_id).map(|entry| Arc::clone(entry.value()))
    }

    fn require_lobby(&self, lobby_id: &str) -> Result<Arc<GameLobby>, LobbyError> {
        self.get_lobby(lobby_id)
            .ok_or_else(|| LobbyError::LobbyNotFound(lobby_id.to_string()))
    }

    /// Creates a lobby in `Waiting`, optionally seated with its first player.
    pub fn add_lobby(
        &self,
        question_count: usize,
        countdown_ms: u64,
        first_player: Option<&str>,
    ) -> Result<String, LobbyError> {
        let lobby_id = Uuid::new_v4().to_string();
        let lobby = GameLobby::new(
            lobby_id.clone(),
            question_count,
            countdown_ms,
            Arc::clone(&self.pool),
        );

        if let Some(session_id) = first_player {
            lobby.add_player(session_id)?;
        }

        self.lobbies.insert(lobby_id.clone(), Arc::new(lobby));
        info!(
            "Created lobby {} ({} questions, {} ms countdown)",
            lobby_id, question_count, countdown_ms
        );

        Ok(lobby_id)
    }

    pub fn join_lobby(&self, lobby_id: &str, session_id: &str) -> Result<(), LobbyError> {
        self.require_lobby(lobby_id)?.add_player(session_id)
    }

    pub fn start_game(&self, lobby_id: &str, requester: &str) -> Result<StartedGame, LobbyError> {
        self.require_lobby(lobby_id)?.start_game(requester)
    }

    pub fn submit_answer(
        &self,
        lobby_id: &str,
        session_id: &str,
        question_id: &str,
        answer_index: usize,
    ) -> Result<AnswerOutcome, LobbyError> {
        self.require_lobby(lobby_id)?
            .submit_answer(session_id, question_id, answer_index)
    }

    pub fn game_status(&self, lobby_id: &str) -> Result<GameStatus, LobbyError> {
        self.require_lobby(lobby_id)?.game_status()
    }

    pub fn check_subscription(&self, lobby_id: &str, session_id: &str) -> Result<(), LobbyError> {
        self.require_lobby(lobby_id)?.check_feed(session_id)
    }

    pub fn subscribe(&self, lobby_id: &str, session_id: &str) -> Result<PlayerFeed, LobbyError> {
        self.require_lobby(lobby_id)?.take_feed(session_id)
    }

    pub fn restore_feed(
        &self,
        lobby_id: &str,
        session_id: &str,
        feed: PlayerFeed,
    ) -> Result<(), LobbyError> {
        self.require_lobby(lobby_id)?.restore_feed(session_id, feed)
    }

    /// Removes every lobby idle for longer than the expiry interval, relative
    /// to `now`. Returns how many were removed.
    pub fn cleanup_expired_lobbies(&self, now: chrono::DateTime<Utc>) -> usize {
        let expiry = self.expiry;
        let mut removed = 0;
        self.lobbies.retain(|_, lobby| {
            let expired = lobby.expire_if_idle(now, expiry);
            if expired {
                removed += 1;
            }
            !expired
        });

        removed
    }

    pub fn start_cleanup_routine(&self, tick: Duration) -> JoinHandle<()> {
        info!("Starting lobby cleanup routine every {:?}", tick);
        let registry = self.clone();
        let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));

        tokio::spawn(async move {
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                if registry.is_empty() {
                    continue;
                }

                debug!("Running lobby cleanup over {} lobbies", registry.len());

                let removed = registry.cleanup_expired_lobbies(Utc::now());
                if removed > 0 {
                    info!("Cleaned up {} expired lobbies", removed);
                }
            }
        })
    }
}
